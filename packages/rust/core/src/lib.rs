//! Batch orchestration engine for copyforge.
//!
//! Wiring order mirrors the data flow: a [`QualityLoop`] turns one row's
//! reference text into an audited draft, a [`RowWorker`] wraps the loop in
//! validation and error containment, the [`BatchScheduler`] fans workers out
//! under a concurrency cap, and the assembler folds the outcomes back into
//! the caller's table.

mod assembler;
mod quality;
mod scheduler;
mod worker;

pub use assembler::{assemble, disapproved_rows};
pub use quality::{QualityLoop, Verdict};
pub use scheduler::{BatchScheduler, CancelFlag};
pub use worker::RowWorker;

use std::sync::Arc;

use copyforge_content::{Auditor, Generator, PromptLibrary};
use copyforge_gateway::{Gateway, HttpModelClient};
use copyforge_shared::{AppConfig, Result};

/// Build the production row worker from config: HTTP gateway, default
/// prompts, configured auditor.
///
/// Fails when the model API key env var is unset; everything else is
/// constructed from defaults the config can override.
pub fn build_worker(config: &AppConfig) -> Result<Arc<RowWorker>> {
    let model = HttpModelClient::new(&config.model, config.gateway.call_timeout())
        .map_err(|e| copyforge_shared::CopyforgeError::config(e.to_string()))?;
    let gateway = Arc::new(
        Gateway::from_config(&config.gateway, model)
            .map_err(|e| copyforge_shared::CopyforgeError::config(e.to_string()))?,
    );

    let quality = QualityLoop::new(
        Generator::new(Arc::clone(&gateway), PromptLibrary::default()),
        Auditor::new(config.audit.clone()),
        &config.pipeline,
    );
    Ok(Arc::new(RowWorker::new(gateway, quality, &config.pipeline)))
}

/// Build the production scheduler from config.
pub fn build_scheduler(config: &AppConfig) -> Result<BatchScheduler> {
    Ok(BatchScheduler::new(build_worker(config)?, &config.pipeline))
}
