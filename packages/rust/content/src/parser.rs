//! Extraction of a [`ContentBundle`] from raw model output.
//!
//! Models wrap their JSON in markdown fences, preamble prose, or trailing
//! commentary. The extractor strips fences, locates the outermost JSON
//! object, and deserializes it into typed fields. Every failure mode is a
//! typed [`CopyforgeError::Parse`], never a panic.

use copyforge_shared::{ContentBundle, CopyforgeError, Result};
use serde::Deserialize;

/// Typed shape of the model's JSON payload.
#[derive(Debug, Deserialize)]
struct BundlePayload {
    title: String,
    meta_description: String,
    html_body: String,
}

/// Parse raw model output into a [`ContentBundle`].
///
/// Accepts the object bare, fenced, or embedded in surrounding prose.
/// Required fields: `title`, `meta_description`, `html_body`, all non-blank.
pub fn extract_bundle(text: &str) -> Result<ContentBundle> {
    let stripped = strip_fences(text);
    let object = outermost_object(stripped)
        .ok_or_else(|| CopyforgeError::parse("no JSON object found in model output"))?;

    let raw: serde_json::Value = serde_json::from_str(object)
        .map_err(|e| CopyforgeError::parse(format!("malformed JSON in model output: {e}")))?;

    let payload: BundlePayload = serde_json::from_value(raw.clone())
        .map_err(|e| CopyforgeError::parse(format!("model output missing required field: {e}")))?;

    for (name, value) in [
        ("title", &payload.title),
        ("meta_description", &payload.meta_description),
        ("html_body", &payload.html_body),
    ] {
        if value.trim().is_empty() {
            return Err(CopyforgeError::parse(format!(
                "model output field `{name}` is blank"
            )));
        }
    }

    Ok(ContentBundle {
        title: payload.title.trim().to_string(),
        meta_description: payload.meta_description.trim().to_string(),
        html_body: payload.html_body.trim().to_string(),
        raw,
    })
}

/// Remove a leading ```/```json fence and its closing fence, if present.
pub(crate) fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Slice out the outermost brace-balanced `{..}` object, respecting strings.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
