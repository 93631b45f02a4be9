//! Prompt templates for the generation and revision calls.
//!
//! Templates use `{{name}}` placeholders and are injected into the
//! [`Generator`](crate::Generator), so tests and deployments can swap wording
//! without touching the pipeline.

use std::collections::BTreeMap;

use copyforge_shared::{CopyforgeError, Result};

/// Default draft prompt. Asks for the exact JSON shape the parser expects.
const DRAFT_TEMPLATE: &str = r#"You are an e-commerce copywriter. Write marketing copy for the product below.

Product: {{product_name}}
Key attributes:
{{attributes}}

Reference material (quote facts only from here):
{{source_text}}

Respond with a single JSON object, no commentary:
{"title": "...", "meta_description": "...", "html_body": "..."}

The html_body must be an HTML fragment: <h2> section headings (never <h1>),
short paragraphs, at least one list, an FAQ in <div class="faq-section"> using
<details>/<summary>, a sources-consulted note linking the reference material,
and the product registration and manufacturer details."#;

/// Default revision prompt. Presents the previous draft plus the feedback.
const REVISE_TEMPLATE: &str = r#"You are an e-commerce copywriter revising an earlier draft.

Product: {{product_name}}

Previous draft (JSON):
{{previous}}

Revision notes:
{{feedback}}

Apply the notes and respond with the full corrected JSON object in the same
{"title", "meta_description", "html_body"} shape, no commentary."#;

/// Named prompt templates with `{{placeholder}}` substitution.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    draft: String,
    revise: String,
}

impl PromptLibrary {
    /// Override the built-in templates, e.g. from a config file.
    pub fn new(draft: impl Into<String>, revise: impl Into<String>) -> Self {
        Self {
            draft: draft.into(),
            revise: revise.into(),
        }
    }

    /// Render the draft prompt.
    pub fn render_draft(&self, vars: &BTreeMap<&str, String>) -> Result<String> {
        render(&self.draft, vars)
    }

    /// Render the revision prompt.
    pub fn render_revise(&self, vars: &BTreeMap<&str, String>) -> Result<String> {
        render(&self.revise, vars)
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new(DRAFT_TEMPLATE, REVISE_TEMPLATE)
    }
}

/// Substitute every `{{name}}` in `template`. Placeholders are located in the
/// template itself, never in substituted values, so reference text containing
/// brace syntax passes through untouched. An unknown placeholder is a config
/// error: silently shipping a literal `{{product_name}}` to the model wastes
/// a paid call.
fn render(template: &str, vars: &BTreeMap<&str, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let Some(end) = tail.find("}}") else {
            return Err(CopyforgeError::config(
                "prompt template has an unterminated {{ placeholder",
            ));
        };
        let name = &tail[..end];
        let value = vars.get(name).ok_or_else(|| {
            CopyforgeError::config(format!(
                "prompt template has unbound placeholder {{{{{name}}}}}"
            ))
        })?;
        out.push_str(value);
        rest = &tail[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}
