//! Per-row processing: validation, reference fetch, quality loop, outcome.
//!
//! The worker is the error boundary for a row. Whatever goes wrong inside it
//! becomes a `RowOutcome`; it never propagates, so sibling rows are never
//! aborted by one bad product.

use std::sync::Arc;

use copyforge_content::finalize_html;
use copyforge_gateway::Gateway;
use copyforge_shared::{
    ContentBundle, CopyforgeError, PipelineConfig, RefinementFeedback, Row, RowOutcome,
};
use tracing::{info, warn};
use url::Url;

use crate::quality::QualityLoop;

pub struct RowWorker {
    gateway: Arc<Gateway>,
    quality: QualityLoop,
    reference_attr: String,
    validated_attr: String,
    validated_sentinel: String,
}

impl RowWorker {
    pub fn new(gateway: Arc<Gateway>, quality: QualityLoop, config: &PipelineConfig) -> Self {
        Self {
            gateway,
            quality,
            reference_attr: config.reference_attr.clone(),
            validated_attr: config.validated_attr.clone(),
            validated_sentinel: config.validated_sentinel.clone(),
        }
    }

    /// Process one row end to end. Exactly one outcome per call.
    pub async fn process(&self, row: &Row) -> RowOutcome {
        // Cheap checks first; no external call is spent on a row that was
        // never cleared for generation.
        let validated = row
            .attr(&self.validated_attr)
            .is_some_and(|v| v.eq_ignore_ascii_case(&self.validated_sentinel));
        if !validated {
            return self.skip(row, "row not validated for generation");
        }

        let Some(reference) = row.attr(&self.reference_attr) else {
            return self.skip(row, "reference document link missing");
        };
        let url = match Url::parse(reference) {
            Ok(url) => url,
            Err(e) => return self.skip(row, format!("reference document link invalid: {e}")),
        };

        let source_text = match self.gateway.fetch_document(&url).await {
            Ok(text) => text,
            Err(e) => {
                let err = CopyforgeError::from(e);
                warn!(sku = %row.sku, error = %err, "reference document fetch failed");
                return RowOutcome::Error {
                    sku: row.sku.clone(),
                    reason: err.to_string(),
                };
            }
        };
        if source_text.trim().is_empty() {
            return self.skip(row, "reference document has no extractable text");
        }

        match self.quality.run(row, &source_text).await {
            Ok(verdict) => self.success(row, verdict),
            Err(e) => {
                warn!(sku = %row.sku, error = %e, "quality loop failed");
                RowOutcome::Error {
                    sku: row.sku.clone(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Re-run a row a reviewer sent back, starting from its stored content.
    /// Validation gates do not apply; the content already exists.
    pub async fn process_reprocess(
        &self,
        row: &Row,
        prior: ContentBundle,
        feedback: RefinementFeedback,
    ) -> RowOutcome {
        let verdict = self.quality.run_reprocess(row, prior, feedback).await;
        self.success(row, verdict)
    }

    fn success(&self, row: &Row, mut verdict: crate::quality::Verdict) -> RowOutcome {
        verdict.attempt.bundle.html_body = finalize_html(&verdict.attempt.bundle.html_body);
        RowOutcome::Success {
            sku: row.sku.clone(),
            attempt: verdict.attempt,
            accepted: verdict.accepted,
        }
    }

    fn skip(&self, row: &Row, reason: impl Into<String>) -> RowOutcome {
        let reason = reason.into();
        info!(sku = %row.sku, reason = %reason, "row skipped");
        RowOutcome::Skipped {
            sku: row.sku.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copyforge_content::{Auditor, Generator, PromptLibrary};
    use copyforge_gateway::{CallError, RetryPolicy, ScriptedClient, ScriptedFetcher};
    use std::time::Duration;

    const STRONG: &str = concat!(
        "<h2>Overview</h2><p>Short.</p><ul><li>x</li></ul>",
        "<div class=\"faq-section\"><details><summary>Q?</summary><p>A.</p></details></div>",
        "<p>Sources consulted: <a href=\"https://a.example.gov/x\">ref</a></p>",
        "<p>Registration 1. Manufactured by Acme.</p>",
    );

    fn payload(html: &str) -> String {
        serde_json::json!({"title": "T", "meta_description": "M", "html_body": html}).to_string()
    }

    fn worker(
        model: ScriptedClient,
        fetcher: ScriptedFetcher,
        config: &PipelineConfig,
    ) -> RowWorker {
        worker_with_retries(model, fetcher, config, 1)
    }

    fn worker_with_retries(
        model: ScriptedClient,
        fetcher: ScriptedFetcher,
        config: &PipelineConfig,
        max_attempts: u32,
    ) -> RowWorker {
        let gateway = Arc::new(Gateway::new(
            Arc::new(model),
            Arc::new(fetcher),
            RetryPolicy {
                max_attempts,
                base_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(1),
            },
        ));
        let quality = QualityLoop::new(
            Generator::new(Arc::clone(&gateway), PromptLibrary::default()),
            Auditor::default(),
            config,
        );
        RowWorker::new(gateway, quality, config)
    }

    fn valid_row() -> Row {
        Row::new("SKU-1", "Vitamin C")
            .with_attr("validated", "yes")
            .with_attr("reference_url", "https://docs.example.com/leaflet")
    }

    #[tokio::test]
    async fn unvalidated_row_is_skipped_without_calls() {
        let model = ScriptedClient::new(vec![]);
        let calls = model.calls();
        let config = PipelineConfig::default();
        let worker = worker(model, ScriptedFetcher::with_text("doc"), &config);

        let row = Row::new("SKU-2", "Thing").with_attr("reference_url", "https://e.com/d");
        let outcome = worker.process(&row).await;
        assert!(matches!(outcome, RowOutcome::Skipped { .. }));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_reference_link_is_skipped() {
        let config = PipelineConfig::default();
        let worker = worker(
            ScriptedClient::new(vec![]),
            ScriptedFetcher::with_text("doc"),
            &config,
        );

        let row = Row::new("SKU-3", "Thing").with_attr("validated", "YES");
        let outcome = worker.process(&row).await;
        let RowOutcome::Skipped { reason, .. } = outcome else {
            panic!("expected skip");
        };
        assert!(reason.contains("link missing"));
    }

    #[tokio::test]
    async fn empty_reference_text_is_skipped_before_generation() {
        let model = ScriptedClient::new(vec![Ok(payload(STRONG))]);
        let calls = model.calls();
        let config = PipelineConfig::default();
        let worker = worker(model, ScriptedFetcher::empty(), &config);

        let outcome = worker.process(&valid_row()).await;
        assert!(matches!(outcome, RowOutcome::Skipped { .. }));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_failure_is_a_row_error() {
        let config = PipelineConfig::default();
        let worker = worker(
            ScriptedClient::new(vec![]),
            ScriptedFetcher::new(vec![Err(CallError::permanent("404"))]),
            &config,
        );

        let outcome = worker.process(&valid_row()).await;
        assert!(matches!(outcome, RowOutcome::Error { .. }));
    }

    #[tokio::test]
    async fn unusable_generation_is_a_row_error() {
        let config = PipelineConfig::default();
        let worker = worker(
            ScriptedClient::new(vec![Ok("no json here".to_string())]),
            ScriptedFetcher::with_text("leaflet text"),
            &config,
        );

        let outcome = worker.process(&valid_row()).await;
        let RowOutcome::Error { reason, .. } = outcome else {
            panic!("expected error");
        };
        assert!(reason.contains("parse"));
    }

    #[tokio::test]
    async fn malformed_generation_spends_the_full_retry_ceiling() {
        let model = ScriptedClient::always_text("this is not json");
        let calls = model.calls();
        let config = PipelineConfig::default();
        let worker = worker_with_retries(model, ScriptedFetcher::with_text("leaflet text"), &config, 4);

        let outcome = worker.process(&valid_row()).await;
        let RowOutcome::Error { reason, .. } = outcome else {
            panic!("expected error");
        };
        assert!(reason.contains("malformed"));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn successful_row_carries_finalized_html() {
        let config = PipelineConfig::default();
        let worker = worker(
            ScriptedClient::new(vec![Ok(payload(STRONG))]),
            ScriptedFetcher::with_text("leaflet text"),
            &config,
        );

        let outcome = worker.process(&valid_row()).await;
        let RowOutcome::Success {
            attempt, accepted, ..
        } = outcome
        else {
            panic!("expected success");
        };
        assert!(accepted);
        assert!(attempt.bundle.html_body.starts_with("<div class=\"copyforge-content\">"));
    }

    #[tokio::test]
    async fn below_target_row_is_success_but_not_accepted() {
        let weak = payload("<h2>Only</h2>");
        let config = PipelineConfig {
            max_attempts: 1,
            ..PipelineConfig::default()
        };
        let worker = worker(
            ScriptedClient::new(vec![Ok(weak)]),
            ScriptedFetcher::with_text("leaflet text"),
            &config,
        );

        let outcome = worker.process(&valid_row()).await;
        let RowOutcome::Success { accepted, .. } = outcome else {
            panic!("expected success");
        };
        assert!(!accepted);
    }

    #[tokio::test]
    async fn reprocess_skips_validation_gates() {
        let config = PipelineConfig::default();
        let worker = worker(
            ScriptedClient::new(vec![Ok(payload(STRONG))]),
            ScriptedFetcher::empty(),
            &config,
        );

        let prior = ContentBundle {
            title: "Old".into(),
            meta_description: "Old".into(),
            html_body: "<h2>Old</h2>".into(),
            raw: serde_json::Value::Null,
        };
        // No validated flag, no reference link.
        let row = Row::new("SKU-9", "Thing");
        let feedback = RefinementFeedback::User {
            text: "rework the FAQ".into(),
        };
        let outcome = worker.process_reprocess(&row, prior, feedback).await;
        assert!(matches!(outcome, RowOutcome::Success { accepted: true, .. }));
    }
}
