// Batch orchestrator: drives one removal strategy across an item arena.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::core::errors::{ErrorKind, ProcessError};
use crate::core::types::{
    BatchItem, BatchReport, ItemReport, ProcessingState, ProgressFn, StopToken,
};
use crate::services::strategy::RemovalStrategy;

/// Per-run knobs. Defaults match the single-operator workflow: strictly
/// sequential, every item processed fresh.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Leave items already in `Success` untouched. Used for re-runs after a
    /// partial failure so only failed or new items are attempted.
    pub skip_already_succeeded: bool,
    /// Maximum in-flight items. 1 preserves strict input-order processing.
    pub concurrency: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_already_succeeded: false,
            concurrency: 1,
        }
    }
}

/// Coordinates a batch run over a mutable item arena.
///
/// The orchestrator owns no items: callers pass the arena in, states are
/// updated in place, and the returned report is a derived summary. Per-item
/// failures are recorded and the run continues; nothing an individual image
/// does can abort the batch.
pub struct BatchOrchestrator {
    stop: StopToken,
    progress: Option<ProgressFn>,
}

impl BatchOrchestrator {
    pub fn new(stop: StopToken) -> Self {
        Self {
            stop,
            progress: None,
        }
    }

    /// Register a progress observer called with `(completed, total)`.
    /// `completed` counts skipped, succeeded, and failed items alike and
    /// never decreases within a run.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    fn emit_progress(&self, completed: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress(completed, total);
        }
    }

    /// Process every item in the arena with the given strategy.
    #[instrument(skip_all, fields(total = items.len(), strategy = strategy.name(), concurrency = options.concurrency))]
    pub async fn run(
        &self,
        items: &mut [BatchItem],
        strategy: Arc<dyn RemovalStrategy>,
        options: RunOptions,
    ) -> BatchReport {
        let started = Instant::now();

        let skipped = if options.concurrency > 1 {
            self.run_concurrent(items, strategy, options).await
        } else {
            self.run_sequential(items, strategy, options).await
        };

        let report = summarize(items, skipped, started);
        info!(
            successful = report.successful,
            failed = report.failed,
            skipped = report.skipped,
            elapsed_ms = report.processing_time_ms,
            "batch finished"
        );
        report
    }

    async fn run_sequential(
        &self,
        items: &mut [BatchItem],
        strategy: Arc<dyn RemovalStrategy>,
        options: RunOptions,
    ) -> usize {
        let total = items.len();
        let mut completed = 0usize;
        let mut skipped = 0usize;

        for item in items.iter_mut() {
            if self.stop.is_stopped() {
                info!(completed, total, "stop requested, leaving remaining items pending");
                break;
            }

            if options.skip_already_succeeded && item.state.is_success() {
                skipped += 1;
                completed += 1;
                self.emit_progress(completed, total);
                continue;
            }

            item.state = ProcessingState::InProgress;
            let state = process_one(item, strategy.as_ref()).await;
            item.state = state;

            completed += 1;
            self.emit_progress(completed, total);
        }

        skipped
    }

    async fn run_concurrent(
        &self,
        items: &mut [BatchItem],
        strategy: Arc<dyn RemovalStrategy>,
        options: RunOptions,
    ) -> usize {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(options.concurrency));

        // Progress is emitted only from this task, first for skips and then
        // as handles join, so observers see a monotonic sequence.
        let mut completed = 0usize;
        let mut skipped = 0usize;
        let mut indices = Vec::with_capacity(total);
        let mut handles = Vec::with_capacity(total);

        for (idx, item) in items.iter_mut().enumerate() {
            if options.skip_already_succeeded && item.state.is_success() {
                skipped += 1;
                completed += 1;
                self.emit_progress(completed, total);
                continue;
            }

            item.state = ProcessingState::InProgress;

            let semaphore = Arc::clone(&semaphore);
            let strategy = Arc::clone(&strategy);
            let stop = self.stop.clone();
            let snapshot = item.clone();

            indices.push(idx);
            handles.push(tokio::spawn(async move {
                // Semaphore lives as long as every handle; acquire cannot fail.
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return None,
                };
                if stop.is_stopped() {
                    return None;
                }
                Some(process_one(&snapshot, strategy.as_ref()).await)
            }));
        }

        for (idx, joined) in indices.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(Some(state)) => {
                    items[idx].state = state;
                    completed += 1;
                    self.emit_progress(completed, total);
                }
                Ok(None) => {
                    // Stopped before starting: revert so a re-run picks it up.
                    items[idx].state = ProcessingState::Pending;
                }
                Err(e) => {
                    // Crashed worker: its item still must end the run terminal.
                    warn!(item = %items[idx].name, error = %e, "worker task crashed");
                    items[idx].state = ProcessingState::Failed {
                        kind: ErrorKind::Internal,
                        message: format!("worker task crashed: {}", e),
                    };
                    completed += 1;
                    self.emit_progress(completed, total);
                }
            }
        }

        skipped
    }
}

async fn process_one(item: &BatchItem, strategy: &dyn RemovalStrategy) -> ProcessingState {
    match strategy
        .process(Arc::clone(&item.original_bytes), &item.mime_type)
        .await
    {
        Ok(bytes) => ProcessingState::Success {
            processed_bytes: Arc::new(bytes),
        },
        Err(e) => {
            warn!(item = %item.name, kind = ?e.kind(), error = %e, "item failed");
            failed_state(&e)
        }
    }
}

fn failed_state(e: &ProcessError) -> ProcessingState {
    ProcessingState::Failed {
        kind: e.kind(),
        message: e.to_string(),
    }
}

fn summarize(items: &[BatchItem], skipped: usize, started: Instant) -> BatchReport {
    let results: Vec<ItemReport> = items
        .iter()
        .map(|item| match &item.state {
            ProcessingState::Failed { kind, message } => ItemReport {
                name: item.name.clone(),
                success: false,
                error_kind: Some(*kind),
                error: Some(message.clone()),
            },
            state => ItemReport {
                name: item.name.clone(),
                success: state.is_success(),
                error_kind: None,
                error: None,
            },
        })
        .collect();

    BatchReport {
        total: items.len(),
        successful: results.iter().filter(|r| r.success).count(),
        failed: results
            .iter()
            .filter(|r| !r.success && r.error_kind.is_some())
            .count(),
        skipped,
        processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        results,
    }
}
