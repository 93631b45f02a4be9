//! The generate → audit → refine loop for a single row.

use copyforge_content::{Auditor, Generator};
use copyforge_shared::{
    Attempt, ContentBundle, PipelineConfig, RefinementFeedback, Result, Row,
};
use tracing::{debug, info};

/// What the loop settled on for a row.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// The best attempt produced, by audit score.
    pub attempt: Attempt,
    /// Whether that attempt met the score target.
    pub accepted: bool,
}

/// Drives drafts through the audit until one meets the target score or the
/// attempt cap runs out.
///
/// A refinement can regress, so the loop tracks the running best attempt and
/// returns that, never simply the last.
pub struct QualityLoop {
    generator: Generator,
    auditor: Auditor,
    min_score_target: u32,
    max_attempts: u32,
}

impl QualityLoop {
    pub fn new(generator: Generator, auditor: Auditor, config: &PipelineConfig) -> Self {
        Self {
            generator,
            auditor,
            min_score_target: config.min_score_target,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Full loop from a fresh draft. A generation failure on the first
    /// attempt is terminal; after that the refiner's keep-previous fallback
    /// means every iteration yields a usable bundle.
    pub async fn run(&self, row: &Row, source_text: &str) -> Result<Verdict> {
        let bundle = self.generator.generate(row, source_text).await?;
        let audit = self.auditor.audit(&bundle);
        debug!(sku = %row.sku, score = audit.score, "first draft audited");

        let first = Attempt {
            number: 1,
            bundle,
            audit,
        };
        Ok(self.refine_until_done(row, first).await)
    }

    /// Re-entry for rows a reviewer sent back: start from the stored bundle
    /// and the reviewer's notes instead of a fresh draft.
    pub async fn run_reprocess(
        &self,
        row: &Row,
        prior: ContentBundle,
        feedback: RefinementFeedback,
    ) -> Verdict {
        let bundle = self.generator.refine(row, &prior, &feedback).await;
        let audit = self.auditor.audit(&bundle);
        debug!(sku = %row.sku, score = audit.score, "reprocessed draft audited");

        let first = Attempt {
            number: 1,
            bundle,
            audit,
        };
        self.refine_until_done(row, first).await
    }

    /// Shared tail: refine with audit feedback until accepted or capped,
    /// keeping the max-scoring attempt.
    async fn refine_until_done(&self, row: &Row, first: Attempt) -> Verdict {
        let mut current = first;
        let mut best = current.clone();

        while current.audit.score < self.min_score_target && current.number < self.max_attempts {
            let feedback = RefinementFeedback::Audit {
                audit: current.audit.clone(),
            };
            let bundle = self.generator.refine(row, &current.bundle, &feedback).await;
            let audit = self.auditor.audit(&bundle);

            current = Attempt {
                number: current.number + 1,
                bundle,
                audit,
            };
            debug!(sku = %row.sku, attempt = current.number, score = current.audit.score, "refined draft audited");

            if current.audit.score > best.audit.score {
                best = current.clone();
            }
        }

        let accepted = best.audit.score >= self.min_score_target;
        info!(
            sku = %row.sku,
            attempts = current.number,
            score = best.audit.score,
            accepted,
            "quality loop finished"
        );
        Verdict {
            attempt: best,
            accepted,
        }
    }
}
