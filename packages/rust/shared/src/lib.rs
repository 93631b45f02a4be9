//! Shared types, error model, and configuration for copyforge.
//!
//! This crate is the foundation depended on by all other copyforge crates.
//! It provides:
//! - [`CopyforgeError`] — the unified error type
//! - Domain types ([`Row`], [`ContentBundle`], [`AuditResult`], [`Attempt`],
//!   [`RowOutcome`], [`BatchSummary`])
//! - The streamed event protocol ([`BatchEvent`])
//! - The in-memory tabular model ([`Table`]) with key normalization
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod events;
pub mod table;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AuditConfig, ColumnsConfig, GatewayConfig, ModelConfig, PipelineConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{CopyforgeError, Result};
pub use events::{BatchEvent, LogLevel};
pub use table::{Table, normalize_key};
pub use types::{
    Attempt, AuditResult, BatchSummary, CategoryScore, ContentBundle, RefinementFeedback, Row,
    RowOutcome,
};
