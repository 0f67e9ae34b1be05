//! Batched upload of every pending queue entry.

use crate::Backend;
use crate::error::{ServiceError, ServiceResult, UploadError};
use crate::queue::{QueueEntry, QueueHandle};
use crate::uploader::{FileUploader, UploadSettings};
use futures::future::join_all;
use mapas_core::{BatchPlan, CategoryId, UploadStatus};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

/// Observer of a batch run. Every method defaults to a no-op.
pub trait UploadEvents: Send + Sync {
    /// Batch `index` (1-based) of `batches` is starting with `files` files.
    fn batch_started(&self, _index: usize, _batches: usize, _files: usize) {}

    /// Percentage of processed entries, reported after each batch.
    fn progress(&self, _percent: u8) {}

    /// At least one file was stored and recorded.
    fn uploads_completed(&self, _succeeded: usize) {}

    /// At least one file ended in error.
    fn uploads_failed(&self, _failed: usize) {}
}

/// Observer that ignores every event.
pub struct NoEvents;

impl UploadEvents for NoEvents {}

/// Outcome of a batch run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Entries left pending because the run was cancelled.
    pub cancelled: usize,
    /// Batches that were started.
    pub batches: usize,
}

/// Runs the upload queue batch by batch.
pub struct BatchUploader {
    queue: QueueHandle,
    uploader: FileUploader,
}

impl BatchUploader {
    pub fn new(backend: Backend, queue: QueueHandle, settings: UploadSettings) -> Self {
        Self {
            queue,
            uploader: FileUploader::new(backend, settings),
        }
    }

    pub fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    /// Upload every pending entry into `category`.
    ///
    /// Fails without touching the backend when nothing is pending or no
    /// category is selected. Files of one batch upload concurrently;
    /// batches run one after another with a pause in between. A failed
    /// file never stops its siblings or later batches.
    pub async fn run(
        &self,
        category: Option<CategoryId>,
        events: &dyn UploadEvents,
        cancel: &CancellationToken,
    ) -> ServiceResult<BatchReport> {
        let pending: Vec<QueueEntry> = self.queue.snapshot().pending().cloned().collect();
        if pending.is_empty() {
            return Err(ServiceError::NothingToUpload);
        }
        let category = category.ok_or(mapas_core::Error::Required { field: "category" })?;

        let plan = BatchPlan::for_total(pending.len());
        let batch_count = plan.batch_count();
        info!(
            files = plan.total,
            batches = batch_count,
            batch_size = plan.batch_size,
            "starting upload"
        );

        let mut report = BatchReport::default();
        let mut processed = 0;

        for (index, range) in plan.batches().enumerate() {
            if index > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = sleep(plan.pause) => {}
                }
            }
            if cancel.is_cancelled() {
                report.cancelled += plan.total - processed;
                break;
            }

            // Entries removed or edited since the run started use their
            // current state.
            let snapshot = self.queue.snapshot();
            let batch: Vec<&QueueEntry> = pending[range.clone()]
                .iter()
                .filter_map(|entry| snapshot.get(entry.id))
                .filter(|entry| entry.status == UploadStatus::Pending)
                .collect();

            report.batches += 1;
            events.batch_started(index + 1, batch_count, batch.len());

            let span = info_span!("batch", batch = index + 1, files = batch.len());
            let results = join_all(
                batch
                    .iter()
                    .map(|entry| self.uploader.upload(&self.queue, entry, category, cancel)),
            )
            .instrument(span)
            .await;

            for result in results {
                match result {
                    Ok(_) => report.succeeded += 1,
                    Err(UploadError::Cancelled) => report.cancelled += 1,
                    Err(UploadError::Withdrawn) => {}
                    Err(_) => report.failed += 1,
                }
            }

            processed += range.len();
            events.progress(percent(processed, plan.total));
        }

        if report.succeeded > 0 {
            events.uploads_completed(report.succeeded);
        }
        if report.failed > 0 {
            warn!(failed = report.failed, "some uploads failed");
            events.uploads_failed(report.failed);
        }
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled,
            "upload finished"
        );
        Ok(report)
    }

    /// Reset every errored entry to pending and run again.
    pub async fn retry_failed(
        &self,
        category: Option<CategoryId>,
        events: &dyn UploadEvents,
        cancel: &CancellationToken,
    ) -> ServiceResult<BatchReport> {
        if self.queue.snapshot().count(UploadStatus::Error) == 0 {
            return Err(ServiceError::NothingToRetry);
        }
        // Validate before resetting so a rejected retry leaves the queue as is.
        if category.is_none() {
            return Err(mapas_core::Error::Required { field: "category" }.into());
        }
        let reset = self.queue.reset_failed();
        info!(reset, "retrying failed uploads");
        self.run(category, events, cancel).await
    }
}

fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed * 100 + total / 2) / total).min(100) as u8
}
