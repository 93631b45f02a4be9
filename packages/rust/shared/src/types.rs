//! Core domain types for the copy-generation pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// One unit of input work — a single product listing.
///
/// Rows are immutable once read from the input table; workers never mutate
/// them in place and instead produce a separate [`RowOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    /// Stable product identifier (SKU / barcode).
    pub sku: String,
    /// Display name of the product.
    pub name: String,
    /// Named source attributes (reference document URL, keywords, brand,
    /// validation flag, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Row {
    /// Create a row with no attributes.
    pub fn new(sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Look up a non-empty attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Builder-style attribute setter, mainly for tests and adapters.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// ContentBundle
// ---------------------------------------------------------------------------

/// A candidate piece of generated content for one product.
///
/// Produced by the generator/refiner, consumed by the auditor and the result
/// assembler. Each refinement attempt produces a new bundle; prior bundles are
/// kept only long enough to compare scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBundle {
    /// SEO page title.
    pub title: String,
    /// Meta-description for the listing.
    pub meta_description: String,
    /// HTML body of the product description.
    pub html_body: String,
    /// The raw structured payload the model returned, kept for traceability.
    #[serde(default)]
    pub raw: serde_json::Value,
}

// ---------------------------------------------------------------------------
// AuditResult
// ---------------------------------------------------------------------------

/// Score detail for one audit category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// Points awarded for this category.
    pub score: u32,
    /// Maximum points this category can contribute.
    pub max_score: u32,
    /// Human-readable deficiencies (empty when the category passed fully).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feedback: Vec<String>,
}

/// Output of one quality audit of a [`ContentBundle`]. Never mutated.
///
/// Invariant: `score` always equals the sum of the category scores in
/// `breakdown`. Construct via [`AuditResult::from_breakdown`] to uphold it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResult {
    /// Total quality score, 0..=100.
    pub score: u32,
    /// Per-category breakdown; keys are category names.
    pub breakdown: BTreeMap<String, CategoryScore>,
}

impl AuditResult {
    /// Build an audit result whose total is the sum of its categories.
    pub fn from_breakdown(breakdown: BTreeMap<String, CategoryScore>) -> Self {
        let score = breakdown.values().map(|c| c.score).sum();
        Self { score, breakdown }
    }

    /// All feedback strings across categories, in key order.
    pub fn all_feedback(&self) -> Vec<&str> {
        self.breakdown
            .values()
            .flat_map(|c| c.feedback.iter().map(String::as_str))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Attempt
// ---------------------------------------------------------------------------

/// One generate-or-refine-then-audit cycle for a row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based attempt number within the quality loop.
    pub number: u32,
    /// The content produced by this attempt.
    pub bundle: ContentBundle,
    /// The audit of that content.
    pub audit: AuditResult,
}

// ---------------------------------------------------------------------------
// RefinementFeedback
// ---------------------------------------------------------------------------

/// Feedback driving a refinement pass.
///
/// A tagged union so the refiner's contract is statically checkable, instead
/// of an ad-hoc dictionary payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefinementFeedback {
    /// Free-form feedback from a human reviewer (reprocess requests).
    User { text: String },
    /// A prior audit's structured deficiencies.
    Audit { audit: AuditResult },
    /// Both at once.
    Both { text: String, audit: AuditResult },
}

// ---------------------------------------------------------------------------
// RowOutcome
// ---------------------------------------------------------------------------

/// Terminal disposition of one row. Exactly one is produced per input row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    /// A usable attempt exists (even if below the score target).
    Success {
        sku: String,
        /// The best-scoring attempt seen across the loop.
        attempt: Attempt,
        /// Whether the score met the configured target.
        accepted: bool,
    },
    /// A pre-condition failed; no external-call budget was spent on content.
    Skipped { sku: String, reason: String },
    /// The row's pipeline failed with no usable attempt.
    Error { sku: String, reason: String },
}

impl RowOutcome {
    /// The row key this outcome belongs to.
    pub fn sku(&self) -> &str {
        match self {
            Self::Success { sku, .. } | Self::Skipped { sku, .. } | Self::Error { sku, .. } => sku,
        }
    }
}

// ---------------------------------------------------------------------------
// BatchSummary
// ---------------------------------------------------------------------------

/// Running counters for a batch, updated as outcomes arrive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl BatchSummary {
    /// Start a summary for a batch of `total` rows.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Fold one terminal outcome into the counters.
    pub fn record(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Success { .. } => self.success += 1,
            RowOutcome::Skipped { .. } => self.skipped += 1,
            RowOutcome::Error { .. } => self.errors += 1,
        }
    }

    /// True once every row has a terminal disposition.
    pub fn is_complete(&self) -> bool {
        self.success + self.skipped + self.errors == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(score: u32, max: u32) -> CategoryScore {
        CategoryScore {
            score,
            max_score: max,
            feedback: vec![],
        }
    }

    #[test]
    fn audit_total_is_sum_of_categories() {
        let mut breakdown = BTreeMap::new();
        breakdown.insert("headings".into(), category(20, 20));
        breakdown.insert("faq".into(), category(10, 20));
        breakdown.insert("citations".into(), category(0, 20));

        let audit = AuditResult::from_breakdown(breakdown);
        assert_eq!(audit.score, 30);
        let sum: u32 = audit.breakdown.values().map(|c| c.score).sum();
        assert_eq!(audit.score, sum);
    }

    #[test]
    fn row_attr_ignores_blank_values() {
        let row = Row::new("789", "Vitamin C")
            .with_attr("reference_url", "   ")
            .with_attr("brand", "Acme");
        assert_eq!(row.attr("reference_url"), None);
        assert_eq!(row.attr("brand"), Some("Acme"));
        assert_eq!(row.attr("missing"), None);
    }

    #[test]
    fn summary_counters_balance() {
        let mut summary = BatchSummary::new(3);
        summary.record(&RowOutcome::Skipped {
            sku: "1".into(),
            reason: "no reference".into(),
        });
        summary.record(&RowOutcome::Error {
            sku: "2".into(),
            reason: "boom".into(),
        });
        assert!(!summary.is_complete());

        summary.record(&RowOutcome::Success {
            sku: "3".into(),
            attempt: Attempt {
                number: 1,
                bundle: ContentBundle {
                    title: "t".into(),
                    meta_description: "m".into(),
                    html_body: "<h2>x</h2>".into(),
                    raw: serde_json::Value::Null,
                },
                audit: AuditResult::from_breakdown(BTreeMap::new()),
            },
            accepted: false,
        });
        assert!(summary.is_complete());
        assert_eq!(summary.success + summary.skipped + summary.errors, 3);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = RowOutcome::Skipped {
            sku: "123".into(),
            reason: "validation flag not set".into(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains(r#""status":"skipped"#));
        assert!(json.contains(r#""sku":"123"#));
    }

    #[test]
    fn refinement_feedback_roundtrip() {
        let feedback = RefinementFeedback::Both {
            text: "tone it down".into(),
            audit: AuditResult::from_breakdown(BTreeMap::new()),
        };
        let json = serde_json::to_string(&feedback).unwrap();
        assert!(json.contains(r#""kind":"both"#));
        let parsed: RefinementFeedback = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, RefinementFeedback::Both { .. }));
    }
}
