/*!
 * Scheduled mover: source container -> document store + archive container
 *
 * Each run lists up to `max_blobs` objects from the source container and
 * moves them one at a time:
 *
 * 1. download and parse the object as JSON
 * 2. extract the normalized record
 * 3. upsert the record into the document container
 * 4. copy the original bytes into the archive container (overwrite)
 * 5. delete the object from the source container
 *
 * Steps 3 to 5 run strictly in that order and a failing step stops work on
 * that object, so an object is only ever deleted after it has been both
 * stored and archived. A crash between steps leaves the object in the source
 * container and the next run repeats it; the upsert makes that repeat
 * harmless.
 */

use crate::documents::DocumentStore;
use crate::error::{PipelineError, RecordError};
use crate::extract::extract;
use crate::storage::{BlobStore, StoreError, StoreResult};
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default cap on objects handled per run
pub const DEFAULT_MAX_BLOBS_PER_EXECUTION: usize = 100;

/// Step of the per-object state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStage {
    Download,
    Parse,
    Extract,
    Upsert,
    Archive,
    Delete,
}

impl fmt::Display for MoveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MoveStage::Download => "download",
            MoveStage::Parse => "parse",
            MoveStage::Extract => "extract",
            MoveStage::Upsert => "upsert",
            MoveStage::Archive => "archive",
            MoveStage::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// One object that could not be moved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFailure {
    pub name: String,
    pub stage: MoveStage,
    pub error: String,
}

/// Accounting for one mover run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveReport {
    /// Objects returned by the listing
    pub listed: usize,
    pub processed_count: usize,
    pub error_count: usize,
    pub failures: Vec<ObjectFailure>,
    pub elapsed: Duration,
    /// Set when the run ended early (listing failed)
    pub aborted: Option<String>,
}

impl MoveReport {
    pub fn is_clean(&self) -> bool {
        self.error_count == 0 && self.aborted.is_none()
    }
}

impl fmt::Display for MoveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {}, errors {}",
            self.processed_count, self.error_count
        )?;
        if let Some(reason) = &self.aborted {
            write!(f, " (aborted: {})", reason)?;
        }
        Ok(())
    }
}

/// Moves objects from a source container into a document store
pub struct TransferMover {
    blobs: Arc<dyn BlobStore>,
    documents: Arc<dyn DocumentStore>,
    source_container: String,
    archive_container: String,
    document_container: String,
    max_blobs: usize,
}

impl TransferMover {
    /// Create a mover with the default container names
    /// (`posts` -> `synced`, documents into `posts`)
    pub fn new(blobs: Arc<dyn BlobStore>, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            blobs,
            documents,
            source_container: "posts".to_string(),
            archive_container: "synced".to_string(),
            document_container: "posts".to_string(),
            max_blobs: DEFAULT_MAX_BLOBS_PER_EXECUTION,
        }
    }

    pub fn with_source_container(mut self, name: impl Into<String>) -> Self {
        self.source_container = name.into();
        self
    }

    pub fn with_archive_container(mut self, name: impl Into<String>) -> Self {
        self.archive_container = name.into();
        self
    }

    pub fn with_document_container(mut self, name: impl Into<String>) -> Self {
        self.document_container = name.into();
        self
    }

    /// Cap the number of objects handled per run; a cap of 0 lists nothing
    pub fn with_max_blobs(mut self, max: usize) -> Self {
        self.max_blobs = max;
        self
    }

    /// Create the archive container if it is missing
    pub async fn ensure_archive_container(&self) -> StoreResult<()> {
        if self.blobs.container_exists(&self.archive_container).await? {
            return Ok(());
        }
        match self.blobs.create_container(&self.archive_container).await {
            Ok(()) => {
                info!(container = %self.archive_container, "Created archive container");
                Ok(())
            }
            Err(StoreError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Run one pass over the source container
    ///
    /// Never fails: per-object failures are counted and a listing failure ends
    /// the run with `aborted` set.
    pub async fn run_once(&self) -> MoveReport {
        let start = Instant::now();
        let mut report = MoveReport::default();

        let names = match self
            .blobs
            .list(&self.source_container, Some(self.max_blobs))
            .await
        {
            Ok(names) => names,
            Err(source) => {
                let e = PipelineError::Listing {
                    container: self.source_container.clone(),
                    source,
                };
                error!(error = %e, "Aborting mover run");
                report.aborted = Some(e.to_string());
                report.elapsed = start.elapsed();
                return report;
            }
        };

        report.listed = names.len();
        debug!(container = %self.source_container, objects = names.len(), "Listed source objects");

        for name in names {
            match self.move_object(&name).await {
                Ok(id) => {
                    info!(name = %name, id = %id, "Moved object");
                    report.processed_count += 1;
                }
                Err(failure) => {
                    warn!(name = %failure.name, stage = %failure.stage, error = %failure.error, "Failed to move object");
                    report.error_count += 1;
                    report.failures.push(failure);
                }
            }
        }

        report.elapsed = start.elapsed();
        info!(
            processed = report.processed_count,
            errors = report.error_count,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Mover run finished"
        );
        report
    }

    /// Move one object; returns the document id on success
    async fn move_object(&self, name: &str) -> Result<String, ObjectFailure> {
        let fail = |stage: MoveStage, error: String| ObjectFailure {
            name: name.to_string(),
            stage,
            error,
        };

        let bytes: Bytes = self
            .blobs
            .get(&self.source_container, name)
            .await
            .map_err(|e| fail(MoveStage::Download, e.to_string()))?;

        let payload: serde_json::Value = serde_json::from_slice(&bytes).map_err(|source| {
            fail(
                MoveStage::Parse,
                RecordError::InvalidJson {
                    name: name.to_string(),
                    source,
                }
                .to_string(),
            )
        })?;

        let record = extract(&payload).map_err(|source| {
            fail(
                MoveStage::Extract,
                RecordError::Extraction {
                    name: name.to_string(),
                    source,
                }
                .to_string(),
            )
        })?;
        let id = record.document_id().ok_or_else(|| {
            fail(
                MoveStage::Extract,
                "record has neither a shortcode nor an id".to_string(),
            )
        })?;
        let document = serde_json::to_value(&record)
            .map_err(|e| fail(MoveStage::Extract, e.to_string()))?;

        self.documents
            .upsert(&self.document_container, &document)
            .await
            .map_err(|e| fail(MoveStage::Upsert, e.to_string()))?;

        self.blobs
            .put(&self.archive_container, name, bytes)
            .await
            .map_err(|e| fail(MoveStage::Archive, e.to_string()))?;

        self.blobs
            .delete(&self.source_container, name)
            .await
            .map_err(|e| fail(MoveStage::Delete, e.to_string()))?;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::MemoryDocumentStore;
    use crate::storage::MemoryBlobStore;

    async fn setup(objects: &[(&str, &str)]) -> (MemoryBlobStore, MemoryDocumentStore, TransferMover) {
        let blobs = MemoryBlobStore::with_containers(&["posts", "synced"]).await;
        for (name, body) in objects {
            blobs
                .put("posts", name, Bytes::from(body.to_string()))
                .await
                .unwrap();
        }
        let documents = MemoryDocumentStore::new();
        let mover = TransferMover::new(Arc::new(blobs.clone()), Arc::new(documents.clone()));
        (blobs, documents, mover)
    }

    #[tokio::test]
    async fn test_moves_object() {
        let body = r#"{"shortcode":"abc","owner":{"username":"u"}}"#;
        let (blobs, documents, mover) = setup(&[("abc.json", body)]).await;

        let report = mover.run_once().await;

        assert_eq!(report.processed_count, 1);
        assert_eq!(report.error_count, 0);
        assert!(report.is_clean());
        let doc = documents.get("posts", "abc").await.unwrap();
        assert_eq!(doc["id"], serde_json::json!("abc"));
        assert_eq!(doc["owner"]["username"], serde_json::json!("u"));
        assert!(doc["caption"].is_null());
        assert_eq!(blobs.object_count("posts").await, 0);
        assert_eq!(
            blobs.object("synced", "abc.json").await.unwrap(),
            Bytes::from(body)
        );
    }

    #[tokio::test]
    async fn test_record_without_id_left_in_place() {
        let (blobs, documents, mover) = setup(&[("anon.json", "{}")]).await;

        let report = mover.run_once().await;

        assert_eq!(report.error_count, 1);
        assert_eq!(report.failures[0].stage, MoveStage::Extract);
        assert_eq!(documents.count("posts").await, 0);
        assert!(blobs.object("posts", "anon.json").await.is_some());
    }

    #[tokio::test]
    async fn test_non_object_payload_fails_extraction() {
        let (blobs, _documents, mover) = setup(&[("list.json", "[1,2,3]")]).await;

        let report = mover.run_once().await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, MoveStage::Extract);
        assert!(report.failures[0].error.starts_with("list.json: "));
        assert!(blobs.object("posts", "list.json").await.is_some());
    }

    #[tokio::test]
    async fn test_ensure_archive_container() {
        let blobs = MemoryBlobStore::with_containers(&["posts"]).await;
        let mover = TransferMover::new(Arc::new(blobs.clone()), Arc::new(MemoryDocumentStore::new()))
            .with_archive_container("done");

        mover.ensure_archive_container().await.unwrap();
        mover.ensure_archive_container().await.unwrap();
        assert!(blobs.container_exists("done").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_source_container_aborts() {
        let blobs = MemoryBlobStore::new();
        let mover = TransferMover::new(Arc::new(blobs), Arc::new(MemoryDocumentStore::new()));

        let report = mover.run_once().await;

        let aborted = report.aborted.unwrap();
        assert!(aborted.starts_with("Failed to list container 'posts'"));
        assert_eq!(report.processed_count, 0);
        assert_eq!(report.error_count, 0);
    }

    #[tokio::test]
    async fn test_zero_cap_moves_nothing() {
        let (blobs, documents, mover) = setup(&[("abc.json", r#"{"shortcode":"abc"}"#)]).await;
        let mover = mover.with_max_blobs(0);

        let report = mover.run_once().await;

        assert_eq!(report.listed, 0);
        assert!(report.is_clean());
        assert_eq!(documents.count("posts").await, 0);
        assert!(blobs.object("posts", "abc.json").await.is_some());
    }

    #[test]
    fn test_report_display() {
        let report = MoveReport {
            processed_count: 3,
            error_count: 1,
            ..Default::default()
        };
        assert_eq!(report.to_string(), "processed 3, errors 1");
        assert!(!report.is_clean());
    }
}
