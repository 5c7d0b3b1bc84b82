/*!
 * Concurrent batch uploader
 *
 * Records are split into contiguous batches. Each batch runs as one task and
 * uploads its records one after another; at most `max_workers` batch tasks
 * run at the same time. Every record gets a fresh remote key, so running the
 * uploader twice over the same directory never overwrites earlier uploads.
 */

use super::retry::{upload_record, RetryPolicy};
use crate::error::PipelineError;
use crate::progress::counter_bar;
use crate::source::RawRecord;
use crate::storage::{BlobStore, StoreError};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Result of uploading one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub name: String,
    pub succeeded: bool,
}

/// Aggregated result of an upload run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadSummary {
    /// Number of batches the input was split into
    pub batches: usize,
    pub successful: usize,
    pub failed: usize,
    pub elapsed: Duration,
    /// Set when the run stopped before uploading anything
    pub aborted: Option<String>,
}

impl UploadSummary {
    pub fn total(&self) -> usize {
        self.successful + self.failed
    }

    /// Successful uploads per second, `None` when no time elapsed
    pub fn throughput(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            Some(self.successful as f64 / secs)
        } else {
            None
        }
    }

    /// True when nothing failed and the run was not aborted
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && self.aborted.is_none()
    }
}

impl fmt::Display for UploadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reason) = &self.aborted {
            return write!(f, "Upload aborted: {}", reason);
        }
        write!(
            f,
            "{} successful, {} failed in {} batches, {:.2}s, ",
            self.successful,
            self.failed,
            self.batches,
            self.elapsed.as_secs_f64()
        )?;
        match self.throughput() {
            Some(rate) => write!(f, "{:.2} files/s", rate),
            None => write!(f, "N/A (no time elapsed)"),
        }
    }
}

/// Build the remote key for a local file name: `<stem>_<uuid>.json`
///
/// Only the final extension is stripped, so `a.b.info` becomes `a.b_<uuid>.json`.
pub fn remote_key(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}_{}.json", stem, uuid::Uuid::new_v4())
}

/// Split records into contiguous batches of at most `batch_size`
pub fn partition(records: Vec<RawRecord>, batch_size: usize) -> Vec<Vec<RawRecord>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(records.len().div_ceil(batch_size));
    let mut iter = records.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(batch_size).collect());
    }
    batches
}

/// Uploads records to one container with bounded concurrency
pub struct BatchUploader {
    store: Arc<dyn BlobStore>,
    container: String,
    policy: RetryPolicy,
    show_progress: bool,
}

impl BatchUploader {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
            policy: RetryPolicy::default(),
            show_progress: false,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Make sure the target container exists
    ///
    /// A failed existence check is not fatal: creation is attempted anyway and
    /// a container that turns out to exist already counts as success.
    pub async fn ensure_container(&self) -> Result<(), PipelineError> {
        match self.store.container_exists(&self.container).await {
            Ok(true) => {
                debug!(container = %self.container, "Container exists");
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => {
                warn!(container = %self.container, error = %e, "Container check failed, attempting creation");
            }
        }

        match self.store.create_container(&self.container).await {
            Ok(()) => {
                info!(container = %self.container, "Created container");
                Ok(())
            }
            Err(StoreError::AlreadyExists(_)) => Ok(()),
            Err(source) => Err(PipelineError::ContainerSetup {
                container: self.container.clone(),
                source,
            }),
        }
    }

    /// Upload all records and report the aggregated outcome
    ///
    /// Never fails: a container that cannot be set up yields a summary with
    /// zero counts and `aborted` set, and per-record failures are counted.
    pub async fn upload_all(
        &self,
        records: Vec<RawRecord>,
        batch_size: usize,
        max_workers: usize,
    ) -> UploadSummary {
        let start = Instant::now();
        let total = records.len();

        if total == 0 {
            return UploadSummary::default();
        }

        if let Err(e) = self.ensure_container().await {
            error!(error = %e, "Aborting upload");
            return UploadSummary {
                elapsed: start.elapsed(),
                aborted: Some(e.to_string()),
                ..UploadSummary::default()
            };
        }

        let batches = partition(records, batch_size);
        let batch_count = batches.len();
        let max_workers = max_workers.max(1);
        info!(
            records = total,
            batches = batch_count,
            workers = max_workers,
            container = %self.container,
            backend = self.store.backend_name(),
            "Starting upload"
        );

        let progress = counter_bar(batch_count as u64, "Uploading", self.show_progress);
        let semaphore = Arc::new(Semaphore::new(max_workers));
        let mut tasks = JoinSet::new();

        for (index, batch) in batches.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let store = self.store.clone();
            let container = self.container.clone();
            let policy = self.policy.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return batch
                        .into_iter()
                        .map(|record| TransferOutcome {
                            name: record.name,
                            succeeded: false,
                        })
                        .collect::<Vec<_>>();
                };
                upload_batch(store.as_ref(), &container, &policy, index, batch).await
            });
        }

        let mut successful = 0;
        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcomes) => {
                    for outcome in outcomes {
                        if outcome.succeeded {
                            successful += 1;
                        } else {
                            failed += 1;
                        }
                    }
                }
                Err(e) => error!(error = %e, "Upload task terminated abnormally"),
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        // Records of tasks that panicked never reported an outcome
        failed += total - successful - failed;

        let summary = UploadSummary {
            batches: batch_count,
            successful,
            failed,
            elapsed: start.elapsed(),
            aborted: None,
        };
        info!(
            successful = summary.successful,
            failed = summary.failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Upload finished"
        );
        summary
    }
}

async fn upload_batch(
    store: &dyn BlobStore,
    container: &str,
    policy: &RetryPolicy,
    index: usize,
    batch: Vec<RawRecord>,
) -> Vec<TransferOutcome> {
    debug!(batch = index, size = batch.len(), "Batch started");
    let mut outcomes = Vec::with_capacity(batch.len());

    for record in batch {
        let key = remote_key(&record.name);
        let succeeded = match upload_record(store, container, &key, &record.payload, policy).await {
            Ok(()) => {
                debug!(name = %record.name, key = %key, "Uploaded");
                true
            }
            Err(e) => {
                warn!(name = %record.name, key = %key, error = %e, "Upload failed");
                false
            }
        };
        outcomes.push(TransferOutcome {
            name: record.name,
            succeeded,
        });
    }

    outcomes
}
