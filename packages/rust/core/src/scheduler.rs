//! Batch scheduling: bounded-concurrency fan-out with a single event stream.
//!
//! All rows are spawned up front; a semaphore admits `max_concurrent_rows` at
//! a time. Progress flows through one bounded mpsc channel, so a slow
//! consumer backpressures the workers instead of growing an unbounded queue.
//! The driver joins every worker before emitting the terminal `batch_done`
//! event; joining is the completion criterion, not channel silence.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use copyforge_shared::{BatchEvent, BatchSummary, PipelineConfig, Row, RowOutcome};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::worker::RowWorker;

/// Cooperative cancellation handle shared between the caller and the batch.
///
/// Once set, rows not yet admitted resolve as skipped; rows already past the
/// semaphore finish their work.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct BatchScheduler {
    worker: Arc<RowWorker>,
    max_concurrent_rows: usize,
    event_buffer: usize,
}

impl BatchScheduler {
    pub fn new(worker: Arc<RowWorker>, config: &PipelineConfig) -> Self {
        Self {
            worker,
            max_concurrent_rows: config.max_concurrent_rows.max(1),
            event_buffer: config.event_buffer.max(1),
        }
    }

    /// Launch the batch. Returns the event stream and a handle resolving to
    /// the final summary once every row has been accounted for.
    ///
    /// The receiver may be dropped early; workers then run to completion with
    /// their sends discarded, and the summary is still correct.
    pub fn run(
        &self,
        rows: Vec<Row>,
        cancel: CancelFlag,
    ) -> (mpsc::Receiver<BatchEvent>, JoinHandle<BatchSummary>) {
        let total = rows.len();
        let (tx, rx) = mpsc::channel(self.event_buffer);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_rows));
        let completed = Arc::new(AtomicUsize::new(0));

        info!(total, cap = self.max_concurrent_rows, "batch started");

        let mut handles = Vec::with_capacity(total);
        for row in rows {
            let worker = Arc::clone(&self.worker);
            let semaphore = Arc::clone(&semaphore);
            let completed = Arc::clone(&completed);
            let cancel = cancel.clone();
            let tx = tx.clone();

            let sku = row.sku.clone();
            let handle = tokio::spawn(async move {
                // A closed semaphore cannot happen here; it lives as long as
                // the tasks do. Treat failure as cancellation anyway.
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return RowOutcome::Skipped {
                            sku: row.sku.clone(),
                            reason: "batch cancelled".to_string(),
                        };
                    }
                };

                let outcome = if cancel.is_cancelled() {
                    RowOutcome::Skipped {
                        sku: row.sku.clone(),
                        reason: "batch cancelled".to_string(),
                    }
                } else {
                    let _ = tx
                        .send(BatchEvent::info(format!("processing {}", row.sku)))
                        .await;
                    worker.process(&row).await
                };

                let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = tx
                    .send(BatchEvent::Progress {
                        current,
                        total,
                        sku: row.sku.clone(),
                    })
                    .await;
                let _ = tx
                    .send(BatchEvent::Result {
                        sku: row.sku.clone(),
                        outcome: outcome.clone(),
                    })
                    .await;
                outcome
            });
            handles.push((sku, handle));
        }
        drop(tx);

        let (done_tx, driver_rx) = mpsc::channel(1);
        let driver = tokio::spawn(async move {
            let mut summary = BatchSummary::new(total);
            for (sku, handle) in handles {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        // A panic in one row must not sink the batch.
                        error!(sku = %sku, error = %e, "row task failed to join");
                        let outcome = RowOutcome::Error {
                            sku,
                            reason: format!("row task panicked: {e}"),
                        };
                        let _ = done_tx
                            .send(BatchEvent::Result {
                                sku: outcome.sku().to_string(),
                                outcome: outcome.clone(),
                            })
                            .await;
                        outcome
                    }
                };
                summary.record(&outcome);
            }

            info!(
                success = summary.success,
                skipped = summary.skipped,
                errors = summary.errors,
                "batch finished"
            );
            let _ = done_tx
                .send(BatchEvent::BatchDone {
                    summary: summary.clone(),
                })
                .await;
            summary
        });

        (merge_receivers(rx, driver_rx, self.event_buffer), driver)
    }
}

/// Funnel worker events and driver events into one ordered stream. Worker
/// events drain first; the driver only produces after joining workers, so
/// `batch_done` is always last.
fn merge_receivers(
    mut workers: mpsc::Receiver<BatchEvent>,
    mut driver: mpsc::Receiver<BatchEvent>,
    buffer: usize,
) -> mpsc::Receiver<BatchEvent> {
    let (tx, rx) = mpsc::channel(buffer);
    tokio::spawn(async move {
        while let Some(event) = workers.recv().await {
            if tx.send(event).await.is_err() {
                return;
            }
        }
        while let Some(event) = driver.recv().await {
            if tx.send(event).await.is_err() {
                return;
            }
        }
    });
    rx
}
