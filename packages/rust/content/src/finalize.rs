//! Final cleanup of a winning draft before it lands in the output table.
//!
//! Models sometimes emit a full page skeleton instead of a fragment. The
//! finalizer strips code fences, drops any `<head>` block, unwraps the page
//! wrapper tags, and scopes the result in a container div so downstream
//! styling cannot leak.

use std::sync::LazyLock;

use regex::Regex;

use crate::parser::strip_fences;

/// Class of the scoping container every finalized fragment is wrapped in.
pub const CONTAINER_CLASS: &str = "copyforge-content";

static HEAD_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<head[^>]*>.*?</head>").unwrap());

static WRAPPER_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(?:html|body|header|footer)[^>]*>").unwrap());

static DOCTYPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<!doctype[^>]*>").unwrap());

/// Reduce model HTML to a scoped fragment.
pub fn finalize_html(html: &str) -> String {
    let stripped = strip_fences(html);
    let without_head = HEAD_BLOCK.replace_all(stripped, "");
    let without_doctype = DOCTYPE.replace_all(&without_head, "");
    let fragment = WRAPPER_TAGS.replace_all(&without_doctype, "");
    let fragment = fragment.trim();

    if fragment.starts_with(&format!("<div class=\"{CONTAINER_CLASS}\"")) {
        return fragment.to_string();
    }
    format!("<div class=\"{CONTAINER_CLASS}\">{fragment}</div>")
}
