//! Scripted client implementations for tests.
//!
//! Compiled into the library so downstream crates can drive the pipeline
//! against canned responses without a network.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use url::Url;

use crate::{CallError, DocumentFetcher, ModelClient, TransientKind};

/// [`ModelClient`] that replays a fixed script of responses, one per call,
/// then fails permanently once the script runs out.
pub struct ScriptedClient {
    script: Mutex<Vec<Result<String, CallError>>>,
    repeat: Option<Result<String, CallError>>,
    calls: Arc<AtomicU32>,
}

impl ScriptedClient {
    /// Replay `responses` in order.
    pub fn new(responses: Vec<Result<String, CallError>>) -> Self {
        let mut script = responses;
        script.reverse();
        Self {
            script: Mutex::new(script),
            repeat: None,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fail every call with the given transient kind.
    pub fn always_transient(kind: TransientKind) -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            repeat: Some(Err(CallError::transient(kind, "scripted transient failure"))),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Return the same response text for every call.
    pub fn always_text(text: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            repeat: Some(Ok(text.into())),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Shared call counter, incremented once per `complete`.
    pub fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn complete(&self, _prompt: &str) -> Result<String, CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(response) = &self.repeat {
            return response.clone();
        }
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        match script.pop() {
            Some(response) => response,
            None => Err(CallError::permanent("scripted client ran out of responses")),
        }
    }
}

/// [`DocumentFetcher`] that replays a fixed script, or returns empty text.
pub struct ScriptedFetcher {
    script: Mutex<Vec<Result<String, CallError>>>,
    fallback: Result<String, CallError>,
}

impl ScriptedFetcher {
    /// Replay `responses` in order, then fail permanently.
    pub fn new(responses: Vec<Result<String, CallError>>) -> Self {
        let mut script = responses;
        script.reverse();
        Self {
            script: Mutex::new(script),
            fallback: Err(CallError::permanent("scripted fetcher ran out of responses")),
        }
    }

    /// Return empty text for every fetch.
    pub fn empty() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            fallback: Ok(String::new()),
        }
    }

    /// Return the same text for every fetch.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            fallback: Ok(text.into()),
        }
    }
}

#[async_trait]
impl DocumentFetcher for ScriptedFetcher {
    async fn fetch(&self, _url: &Url) -> Result<String, CallError> {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        match script.pop() {
            Some(response) => response,
            None => self.fallback.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_client_replays_in_order() {
        let client = ScriptedClient::new(vec![
            Ok("first".to_string()),
            Ok("second".to_string()),
        ]);
        assert_eq!(client.complete("p").await.unwrap(), "first");
        assert_eq!(client.complete("p").await.unwrap(), "second");
        assert!(client.complete("p").await.is_err());
        assert_eq!(client.calls().load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn scripted_fetcher_empty_returns_blank_text() {
        let fetcher = ScriptedFetcher::empty();
        let url = Url::parse("https://example.com/doc").unwrap();
        assert_eq!(fetcher.fetch(&url).await.unwrap(), "");
    }
}
