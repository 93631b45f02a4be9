//! Bounded retry with exponential backoff.
//!
//! The backoff sequence starts at `base_backoff`, doubles per retry, and is
//! capped at `max_backoff`. Backoff is distinct from the per-call timeout: a
//! call that times out counts as one transient attempt, then waits out its
//! backoff like any other transient failure.

use std::future::Future;
use std::time::Duration;

use copyforge_shared::GatewayConfig;
use tracing::{debug, warn};

use crate::CallError;

/// Classification of a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// HTTP 429 or provider rate-limit signal.
    RateLimited,
    /// HTTP 5xx or connection failure.
    Unavailable,
    /// The per-call timeout elapsed.
    Timeout,
    /// The service answered with an empty or blank body.
    EmptyResponse,
    /// The body arrived but did not validate as usable output.
    Malformed,
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RateLimited => "rate limited",
            Self::Unavailable => "service unavailable",
            Self::Timeout => "timeout",
            Self::EmptyResponse => "empty response",
            Self::Malformed => "malformed response",
        };
        f.write_str(name)
    }
}

/// Retry discipline for one class of external call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first call. Treated as at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_backoff: Duration,
    /// Ceiling for the doubling delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl From<&GatewayConfig> for RetryPolicy {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            max_attempts: config.call_max_retries,
            base_backoff: config.base_backoff(),
            max_backoff: config.max_backoff(),
        }
    }
}

impl RetryPolicy {
    /// The backoff delay after the given 1-based attempt number.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let doubled = self
            .base_backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        doubled.min(self.max_backoff)
    }
}

/// Run `op` until it succeeds, fails permanently, or the attempt budget is
/// spent. Returns the last error on exhaustion.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut op: F,
) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_err = CallError::permanent(format!("{op_name}: no attempt made"));

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(op = op_name, attempt, "call recovered after retry");
                }
                return Ok(value);
            }
            Err(err @ CallError::Permanent { .. }) => {
                warn!(op = op_name, error = %err, "permanent call failure, not retrying");
                return Err(err);
            }
            Err(err) => {
                let delay = policy.backoff_after(attempt);
                if attempt < attempts {
                    warn!(
                        op = op_name,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient call failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    warn!(op = op_name, attempts, error = %err, "retry budget exhausted");
                }
                last_err = err;
            }
        }
    }

    Err(last_err)
}
