//! Text-generation service client.

use async_trait::async_trait;
use copyforge_shared::ModelConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{CallError, TransientKind};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("copyforge/", env!("CARGO_PKG_VERSION"));

/// A single call to the text-generation service. Implementations perform
/// exactly one call; retry lives in the [`Gateway`](crate::Gateway).
///
/// Object-safe so schedulers and tests can inject mock clients.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send one prompt, return the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String, CallError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Wire request for the generation endpoint.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Wire response from the generation endpoint.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    text: String,
}

/// Production [`ModelClient`] over HTTP.
pub struct HttpModelClient {
    client: reqwest::Client,
    endpoint: String,
    model_id: String,
    api_key: String,
}

impl HttpModelClient {
    /// Build the client from config, reading the API key from the configured
    /// env var. The per-call timeout is applied at the `reqwest` client level.
    pub fn new(config: &ModelConfig, timeout: std::time::Duration) -> Result<Self, CallError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                CallError::permanent(format!("API key env var {} not set", config.api_key_env))
            })?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CallError::permanent(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model_id: config.model_id.clone(),
            api_key,
        })
    }

    /// Test/bench constructor with an explicit key and endpoint.
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        model_id: impl Into<String>,
        api_key: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, CallError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CallError::permanent(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model_id: model_id.into(),
            api_key: api_key.into(),
        })
    }
}

/// Map an HTTP status to the gateway failure taxonomy.
pub(crate) fn classify_status(status: reqwest::StatusCode, context: &str) -> CallError {
    if status.as_u16() == 429 {
        CallError::transient(TransientKind::RateLimited, format!("{context}: HTTP 429"))
    } else if status.is_server_error() {
        CallError::transient(
            TransientKind::Unavailable,
            format!("{context}: HTTP {status}"),
        )
    } else {
        CallError::permanent(format!("{context}: HTTP {status}"))
    }
}

/// Map a `reqwest` transport error to the gateway failure taxonomy.
pub(crate) fn classify_transport(err: &reqwest::Error, context: &str) -> CallError {
    if err.is_timeout() {
        CallError::transient(TransientKind::Timeout, format!("{context}: {err}"))
    } else {
        CallError::transient(TransientKind::Unavailable, format!("{context}: {err}"))
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(&self, prompt: &str) -> Result<String, CallError> {
        debug!(endpoint = %self.endpoint, prompt_len = prompt.len(), "sending generation request");

        let request = GenerateRequest {
            model: &self.model_id,
            prompt,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e, &self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, &self.endpoint));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            CallError::transient(
                TransientKind::EmptyResponse,
                format!("{}: unreadable response body: {e}", self.endpoint),
            )
        })?;

        if body.text.trim().is_empty() {
            return Err(CallError::transient(
                TransientKind::EmptyResponse,
                format!("{}: model returned an empty response", self.endpoint),
            ));
        }

        Ok(body.text)
    }
}
