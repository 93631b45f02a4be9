//! Reference-document retrieval.
//!
//! Fetches a row's reference URL and reduces the page to visible text so the
//! generator can quote it. Scripts, styles, and markup are stripped; the
//! pipeline only needs the words.

use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;
use tracing::debug;
use url::Url;

use crate::model::{classify_status, classify_transport};
use crate::{CallError, TransientKind};

/// A single retrieval of a reference document's visible text. One call per
/// invocation; retry lives in the [`Gateway`](crate::Gateway).
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch the document and return its visible text.
    async fn fetch(&self, url: &Url) -> Result<String, CallError>;
}

/// Production [`DocumentFetcher`] over HTTP.
pub struct HttpDocumentFetcher {
    client: reqwest::Client,
}

impl HttpDocumentFetcher {
    pub fn new(timeout: Duration) -> Result<Self, CallError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("copyforge/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| CallError::permanent(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, CallError> {
        debug!(url = %url, "fetching reference document");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_transport(&e, url.as_str()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, url.as_str()));
        }

        let body = response.text().await.map_err(|e| {
            CallError::transient(
                TransientKind::EmptyResponse,
                format!("{url}: unreadable response body: {e}"),
            )
        })?;

        Ok(visible_text(&body))
    }
}

/// Extract the visible text of an HTML page: drop script/style subtrees and
/// join the remaining text nodes with newlines. Plain-text bodies pass
/// through unchanged apart from whitespace normalization.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    collect_visible(document.root_element(), &mut out);
    out
}

fn collect_visible(element: scraper::ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(el) = scraper::ElementRef::wrap(child) {
            let name = el.value().name();
            if matches!(name, "script" | "style" | "noscript") {
                continue;
            }
            collect_visible(el, out);
        } else if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(trimmed);
            }
        }
    }
}
