//! The streamed event protocol observed by batch callers.
//!
//! Workers emit zero or more intermediate events and exactly one `result`
//! event; the scheduler terminates every stream with `batch_done`. Any
//! transport (HTTP chunked stream, message queue, direct channel) can carry
//! these without changing the core's contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BatchSummary, RowOutcome};

/// Severity of a streamed log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// One event in a batch's output stream.
///
/// Ordering within a single row's events is guaranteed; ordering across rows
/// is arrival order only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    /// Free-form progress log for the client console.
    Log {
        message: String,
        level: LogLevel,
        timestamp: DateTime<Utc>,
    },
    /// A row finished one pipeline step.
    Progress {
        current: usize,
        total: usize,
        sku: String,
    },
    /// Terminal disposition of one row.
    Result { sku: String, outcome: RowOutcome },
    /// The stream is complete; no further events follow.
    BatchDone { summary: BatchSummary },
}

impl BatchEvent {
    /// Convenience constructor for info-level logs.
    pub fn info(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
            level: LogLevel::Info,
            timestamp: Utc::now(),
        }
    }

    /// Convenience constructor for warning-level logs.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
            level: LogLevel::Warning,
            timestamp: Utc::now(),
        }
    }
}
