//! Deterministic quality audit of generated HTML.
//!
//! Five categories of 20 points each, two 10-point checks per category. The
//! audit is a pure function of the bundle and the audit config: the same
//! draft always scores the same, so the quality loop can compare attempts.

use std::collections::BTreeMap;

use copyforge_shared::{AuditConfig, AuditResult, CategoryScore, ContentBundle};
use scraper::{Html, Selector};

/// Maximum points per audit category.
pub const CATEGORY_MAX: u32 = 20;

/// Points per individual check (two checks per category).
const CHECK_POINTS: u32 = 10;

/// Phrases that count as a transparency note about sources.
const TRANSPARENCY_MARKERS: &[&str] = &["sources consulted", "references:", "based on"];

/// Phrases that signal a product-registration disclosure.
const REGISTRATION_MARKERS: &[&str] = &["registration", "registered under", "license no"];

/// Phrases that identify the manufacturer.
const MANUFACTURER_MARKERS: &[&str] = &["manufactured by", "manufacturer", "produced by"];

/// Scores a [`ContentBundle`] against the editorial checklist.
pub struct Auditor {
    config: AuditConfig,
    h1: Selector,
    h2: Selector,
    lists: Selector,
    paragraphs: Selector,
    faq_section: Selector,
    faq_details: Selector,
    links: Selector,
}

impl Auditor {
    pub fn new(config: AuditConfig) -> Self {
        let parse = |s: &str| Selector::parse(s).unwrap();
        Self {
            config,
            h1: parse("h1"),
            h2: parse("h2"),
            lists: parse("ul, ol"),
            paragraphs: parse("p"),
            faq_section: parse(".faq-section"),
            faq_details: parse(".faq-section details summary"),
            links: parse("a[href]"),
        }
    }

    /// Audit a bundle's HTML body. Blank HTML scores zero in every category.
    pub fn audit(&self, bundle: &ContentBundle) -> AuditResult {
        let html = bundle.html_body.trim();
        let mut breakdown = BTreeMap::new();

        if html.is_empty() {
            for (name, feedback) in [
                ("headings", "no HTML to audit"),
                ("readability", "no HTML to audit"),
                ("faq", "no HTML to audit"),
                ("citations", "no HTML to audit"),
                ("verifiable_data", "no HTML to audit"),
            ] {
                breakdown.insert(
                    name.to_string(),
                    CategoryScore {
                        score: 0,
                        max_score: CATEGORY_MAX,
                        feedback: vec![feedback.to_string()],
                    },
                );
            }
            return AuditResult::from_breakdown(breakdown);
        }

        let fragment = Html::parse_fragment(html);
        let text = fragment
            .root_element()
            .text()
            .collect::<String>()
            .to_lowercase();

        breakdown.insert("headings".into(), self.audit_headings(&fragment));
        breakdown.insert("readability".into(), self.audit_readability(&fragment));
        breakdown.insert("faq".into(), self.audit_faq(&fragment));
        breakdown.insert("citations".into(), self.audit_citations(&fragment, &text));
        breakdown.insert("verifiable_data".into(), self.audit_verifiable(&text));

        AuditResult::from_breakdown(breakdown)
    }

    /// Page structure: the fragment lands inside an existing page, so it must
    /// not bring its own `<h1>`, and it needs `<h2>` section headings.
    fn audit_headings(&self, fragment: &Html) -> CategoryScore {
        let mut category = Category::new();
        category.check(
            fragment.select(&self.h1).next().is_none(),
            "remove the <h1>; the page template already provides one",
        );
        category.check(
            fragment.select(&self.h2).next().is_some(),
            "add <h2> section headings to structure the content",
        );
        category.into_score()
    }

    fn audit_readability(&self, fragment: &Html) -> CategoryScore {
        let mut category = Category::new();
        category.check(
            fragment.select(&self.lists).next().is_some(),
            "use bulleted or numbered lists to break up dense prose",
        );

        let mut words = 0usize;
        let mut paragraphs = 0usize;
        for p in fragment.select(&self.paragraphs) {
            words += p.text().collect::<String>().split_whitespace().count();
            paragraphs += 1;
        }
        let average_ok =
            paragraphs > 0 && words / paragraphs <= self.config.paragraph_word_ceiling;
        category.check(
            average_ok,
            "shorten paragraphs; readers skim long unbroken blocks",
        );
        category.into_score()
    }

    fn audit_faq(&self, fragment: &Html) -> CategoryScore {
        let mut category = Category::new();
        category.check(
            fragment.select(&self.faq_section).next().is_some(),
            "add a frequently-asked-questions block in a `faq-section` container",
        );
        category.check(
            fragment.select(&self.faq_details).next().is_some(),
            "render each FAQ entry as <details> with a <summary> question",
        );
        category.into_score()
    }

    fn audit_citations(&self, fragment: &Html, text: &str) -> CategoryScore {
        let mut category = Category::new();
        category.check(
            TRANSPARENCY_MARKERS.iter().any(|m| text.contains(m)),
            "state the sources the content draws on",
        );

        let suffix = self.config.authority_suffix.to_lowercase();
        let has_authority_link = fragment.select(&self.links).any(|a| {
            a.value()
                .attr("href")
                .and_then(link_host)
                .is_some_and(|host| host.ends_with(&suffix))
        });
        category.check(
            has_authority_link,
            format!(
                "link to an authoritative source (a {} domain)",
                self.config.authority_suffix
            ),
        );
        category.into_score()
    }

    fn audit_verifiable(&self, text: &str) -> CategoryScore {
        let mut category = Category::new();
        category.check(
            REGISTRATION_MARKERS.iter().any(|m| text.contains(m)),
            "include the product registration details",
        );
        category.check(
            MANUFACTURER_MARKERS.iter().any(|m| text.contains(m)),
            "name the manufacturer",
        );
        category.into_score()
    }
}

impl Default for Auditor {
    fn default() -> Self {
        Self::new(AuditConfig::default())
    }
}

/// Accumulates pass/fail checks into one [`CategoryScore`].
struct Category {
    score: u32,
    feedback: Vec<String>,
}

impl Category {
    fn new() -> Self {
        Self {
            score: 0,
            feedback: Vec::new(),
        }
    }

    fn check(&mut self, passed: bool, feedback: impl Into<String>) {
        if passed {
            self.score += CHECK_POINTS;
        } else {
            self.feedback.push(feedback.into());
        }
    }

    fn into_score(self) -> CategoryScore {
        CategoryScore {
            score: self.score,
            max_score: CATEGORY_MAX,
            feedback: self.feedback,
        }
    }
}

/// Host of an absolute link. Relative links have no host and never count as
/// authority citations.
fn link_host(href: &str) -> Option<String> {
    let url = url::Url::parse(href).ok()?;
    url.host_str().map(str::to_lowercase)
}
