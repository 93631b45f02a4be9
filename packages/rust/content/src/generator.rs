//! Draft generation and revision over the call gateway.

use std::collections::BTreeMap;
use std::sync::Arc;

use copyforge_shared::{ContentBundle, CopyforgeError, RefinementFeedback, Result, Row};
use copyforge_gateway::Gateway;
use tracing::{debug, warn};

use crate::parser::extract_bundle;
use crate::prompts::PromptLibrary;

/// Produces and revises [`ContentBundle`]s for one row at a time.
///
/// Holds the injected gateway; one `generate` or `refine` call maps to one
/// gateway completion (which retries transiently inside).
pub struct Generator {
    gateway: Arc<Gateway>,
    prompts: PromptLibrary,
}

impl Generator {
    pub fn new(gateway: Arc<Gateway>, prompts: PromptLibrary) -> Self {
        Self { gateway, prompts }
    }

    /// Produce the first draft for a row from its attributes and the fetched
    /// reference text. The response is parsed inside the gateway call, so an
    /// unparseable body is retried like any other transient failure; only an
    /// exhausted or permanent call surfaces as a `Generation` error. A low
    /// audit score is not an error.
    pub async fn generate(&self, row: &Row, source_text: &str) -> Result<ContentBundle> {
        let mut vars = BTreeMap::new();
        vars.insert("product_name", row.name.clone());
        vars.insert("attributes", format_attributes(row));
        vars.insert("source_text", source_text.to_string());

        let prompt = self.prompts.render_draft(&vars)?;
        debug!(sku = %row.sku, prompt_len = prompt.len(), "generating draft");

        self.gateway
            .complete(&prompt, |text| {
                extract_bundle(text).map_err(|e| e.to_string())
            })
            .await
            .map_err(|e| CopyforgeError::Generation(e.to_string()))
    }

    /// Revise a draft against feedback. Never loses content: if the model
    /// call fails or the response does not parse, the previous bundle is
    /// returned unchanged and the failure is logged.
    pub async fn refine(
        &self,
        row: &Row,
        previous: &ContentBundle,
        feedback: &RefinementFeedback,
    ) -> ContentBundle {
        let previous_json = serde_json::json!({
            "title": previous.title,
            "meta_description": previous.meta_description,
            "html_body": previous.html_body,
        })
        .to_string();

        let mut vars = BTreeMap::new();
        vars.insert("product_name", row.name.clone());
        vars.insert("previous", previous_json);
        vars.insert("feedback", format_feedback(feedback));

        let prompt = match self.prompts.render_revise(&vars) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(sku = %row.sku, error = %e, "revision prompt failed to render, keeping previous draft");
                return previous.clone();
            }
        };

        let parse = |text: &str| extract_bundle(text).map_err(|e| e.to_string());
        match self.gateway.complete(&prompt, parse).await {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(sku = %row.sku, error = %e, "revision call failed, keeping previous draft");
                previous.clone()
            }
        }
    }
}

/// Row attributes as `- key: value` lines for the draft prompt.
fn format_attributes(row: &Row) -> String {
    if row.attributes.is_empty() {
        return "- (none)".to_string();
    }
    row.attributes
        .iter()
        .map(|(k, v)| format!("- {k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Flatten feedback into revision notes for the prompt.
fn format_feedback(feedback: &RefinementFeedback) -> String {
    match feedback {
        RefinementFeedback::User { text } => text.clone(),
        RefinementFeedback::Audit { audit } => audit_notes(audit),
        RefinementFeedback::Both { text, audit } => {
            format!("{}\n{}", text, audit_notes(audit))
        }
    }
}

fn audit_notes(audit: &copyforge_shared::AuditResult) -> String {
    let mut notes = vec![format!("Previous draft scored {}/100.", audit.score)];
    for line in audit.all_feedback() {
        notes.push(format!("- {line}"));
    }
    notes.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use copyforge_gateway::{
        CallError, RetryPolicy, ScriptedClient, ScriptedFetcher, TransientKind,
    };
    use std::time::Duration;

    const VALID: &str = r#"{"title": "T", "meta_description": "M", "html_body": "<h2>B</h2>"}"#;

    fn fast_gateway(model: ScriptedClient) -> Arc<Gateway> {
        Arc::new(Gateway::new(
            Arc::new(model),
            Arc::new(ScriptedFetcher::empty()),
            RetryPolicy {
                max_attempts: 2,
                base_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
            },
        ))
    }

    fn row() -> Row {
        Row::new("SKU-1", "Vitamin C 500mg").with_attr("brand", "Acme")
    }

    #[tokio::test(start_paused = true)]
    async fn generate_parses_model_output() {
        let gateway = fast_gateway(ScriptedClient::new(vec![Ok(VALID.to_string())]));
        let generator = Generator::new(gateway, PromptLibrary::default());

        let bundle = generator.generate(&row(), "reference text").await.unwrap();
        assert_eq!(bundle.title, "T");
    }

    #[tokio::test(start_paused = true)]
    async fn generate_surfaces_call_failure_as_generation_error() {
        let gateway = fast_gateway(ScriptedClient::always_transient(TransientKind::Unavailable));
        let generator = Generator::new(gateway, PromptLibrary::default());

        let err = generator.generate(&row(), "ref").await.unwrap_err();
        assert!(matches!(err, CopyforgeError::Generation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn generate_retries_garbage_before_erroring() {
        let model = ScriptedClient::always_text("not json");
        let calls = model.calls();
        let gateway = fast_gateway(model);
        let generator = Generator::new(gateway, PromptLibrary::default());

        let err = generator.generate(&row(), "ref").await.unwrap_err();
        assert!(matches!(err, CopyforgeError::Generation(_)));
        assert!(err.to_string().contains("malformed"));
        // Both attempts of the 2-attempt policy are spent on the bad body.
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refine_returns_previous_on_call_failure() {
        let gateway = fast_gateway(ScriptedClient::new(vec![Err(CallError::permanent("401"))]));
        let generator = Generator::new(gateway, PromptLibrary::default());
        let previous = extract_bundle(VALID).unwrap();

        let feedback = RefinementFeedback::User {
            text: "mention the manufacturer".to_string(),
        };
        let revised = generator.refine(&row(), &previous, &feedback).await;
        assert_eq!(revised, previous);
    }

    #[tokio::test(start_paused = true)]
    async fn refine_returns_previous_on_unparseable_output() {
        let gateway = fast_gateway(ScriptedClient::always_text("oops"));
        let generator = Generator::new(gateway, PromptLibrary::default());
        let previous = extract_bundle(VALID).unwrap();

        let feedback = RefinementFeedback::User {
            text: "tighten the title".to_string(),
        };
        let revised = generator.refine(&row(), &previous, &feedback).await;
        assert_eq!(revised, previous);
    }

    #[tokio::test(start_paused = true)]
    async fn refine_applies_model_revision() {
        let improved =
            r#"{"title": "T2", "meta_description": "M2", "html_body": "<h2>B2</h2>"}"#;
        let gateway = fast_gateway(ScriptedClient::new(vec![Ok(improved.to_string())]));
        let generator = Generator::new(gateway, PromptLibrary::default());
        let previous = extract_bundle(VALID).unwrap();

        let audit = copyforge_shared::AuditResult::from_breakdown(Default::default());
        let feedback = RefinementFeedback::Audit { audit };
        let revised = generator.refine(&row(), &previous, &feedback).await;
        assert_eq!(revised.title, "T2");
    }
}
