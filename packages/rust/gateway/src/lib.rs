//! External call gateway: the one place that talks to the outside world.
//!
//! Wraps single calls to the text-generation service and reference-document
//! retrieval with a uniform retry/backoff discipline. The gateway classifies
//! failures as transient or permanent and retries only the former; it never
//! decides row policy — after exhaustion the caller chooses skip, error, or
//! fallback.

mod document;
mod model;
mod retry;
mod scripted;

use std::sync::Arc;

pub use document::{DocumentFetcher, HttpDocumentFetcher};
pub use model::{HttpModelClient, ModelClient};
pub use retry::{RetryPolicy, TransientKind, with_retry};
pub use scripted::{ScriptedClient, ScriptedFetcher};

use copyforge_shared::GatewayConfig;
use url::Url;

// ---------------------------------------------------------------------------
// CallError
// ---------------------------------------------------------------------------

/// Typed outcome of a failed external call.
///
/// Transient failures are eligible for gateway-level retry; permanent ones
/// fail immediately.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    /// Rate limit, service unavailable, timeout, or an empty or malformed
    /// response.
    #[error("transient call failure ({kind}): {message}")]
    Transient {
        kind: TransientKind,
        message: String,
    },

    /// Auth error, malformed request, or another permanent 4xx.
    #[error("permanent call failure: {message}")]
    Permanent { message: String },
}

impl CallError {
    pub fn transient(kind: TransientKind, message: impl Into<String>) -> Self {
        Self::Transient {
            kind,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// True when the gateway may retry this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl From<CallError> for copyforge_shared::CopyforgeError {
    fn from(err: CallError) -> Self {
        Self::Network(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Retrying front door for every external call the pipeline makes.
///
/// Holds the injected model client and document fetcher (no module-level
/// singletons — tests pass scripted implementations) and applies the same
/// [`RetryPolicy`] to both.
pub struct Gateway {
    model: Arc<dyn ModelClient>,
    documents: Arc<dyn DocumentFetcher>,
    policy: RetryPolicy,
}

impl Gateway {
    /// Build a gateway around explicit client implementations.
    pub fn new(
        model: Arc<dyn ModelClient>,
        documents: Arc<dyn DocumentFetcher>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            model,
            documents,
            policy,
        }
    }

    /// Build the production gateway from config: HTTP clients, config policy.
    pub fn from_config(config: &GatewayConfig, model: HttpModelClient) -> Result<Self, CallError> {
        let fetcher = HttpDocumentFetcher::new(config.call_timeout())?;
        Ok(Self {
            model: Arc::new(model),
            documents: Arc::new(fetcher),
            policy: RetryPolicy::from(config),
        })
    }

    /// One model completion, retried on transient failure. The response is
    /// validated by `parse` inside the retry loop, so a body that arrives but
    /// is unusable spends a retry attempt exactly like an empty one.
    pub async fn complete<T, F>(&self, prompt: &str, parse: F) -> Result<T, CallError>
    where
        F: Fn(&str) -> Result<T, String>,
    {
        let model = Arc::clone(&self.model);
        let parse = &parse;
        with_retry(&self.policy, "model completion", || {
            let model = Arc::clone(&model);
            let prompt = prompt.to_string();
            async move {
                let text = model.complete(&prompt).await?;
                parse(&text).map_err(|e| CallError::transient(TransientKind::Malformed, e))
            }
        })
        .await
    }

    /// Fetch a reference document's text, retried on transient failure.
    pub async fn fetch_document(&self, url: &Url) -> Result<String, CallError> {
        let documents = Arc::clone(&self.documents);
        with_retry(&self.policy, "document fetch", || {
            let documents = Arc::clone(&documents);
            let url = url.clone();
            async move { documents.fetch(&url).await }
        })
        .await
    }

    /// The retry policy in force (mainly for logging/tests).
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}
