//! Integration tests for the mover
//!
//! Covers the per-run cap, the upsert -> archive -> delete ordering, and what
//! is left behind when a stage fails.

use async_trait::async_trait;
use blobrelay::documents::{DocumentStore, LocalDocumentStore, MemoryDocumentStore};
use blobrelay::logging::init_test_logging;
use blobrelay::mover::{MoveStage, TransferMover};
use blobrelay::source::read_records;
use blobrelay::storage::{BlobStore, LocalBlobStore, MemoryBlobStore, StoreError, StoreResult};
use blobrelay::transfer::BatchUploader;
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

async fn blobs_with(objects: &[(&str, String)]) -> MemoryBlobStore {
    let blobs = MemoryBlobStore::with_containers(&["posts", "synced"]).await;
    for (name, body) in objects {
        blobs
            .put("posts", name, Bytes::from(body.clone()))
            .await
            .unwrap();
    }
    blobs
}

fn mover(blobs: &MemoryBlobStore, documents: Arc<dyn DocumentStore>) -> TransferMover {
    TransferMover::new(Arc::new(blobs.clone()), documents)
}

/// Document store that rejects every write
struct RejectingDocuments;

#[async_trait]
impl DocumentStore for RejectingDocuments {
    async fn upsert(&self, _container: &str, _document: &Value) -> StoreResult<()> {
        Err(StoreError::Service {
            status: 503,
            message: "unavailable".to_string(),
        })
    }

    fn backend_name(&self) -> &str {
        "rejecting"
    }
}

/// Blob store whose archive container refuses writes
struct ReadOnlyArchive(MemoryBlobStore);

#[async_trait]
impl BlobStore for ReadOnlyArchive {
    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        self.0.container_exists(container).await
    }

    async fn create_container(&self, container: &str) -> StoreResult<()> {
        self.0.create_container(container).await
    }

    async fn put(&self, container: &str, key: &str, data: Bytes) -> StoreResult<()> {
        if container == "synced" {
            return Err(StoreError::PermissionDenied(format!("{}/{}", container, key)));
        }
        self.0.put(container, key, data).await
    }

    async fn get(&self, container: &str, key: &str) -> StoreResult<Bytes> {
        self.0.get(container, key).await
    }

    async fn list(&self, container: &str, limit: Option<usize>) -> StoreResult<Vec<String>> {
        self.0.list(container, limit).await
    }

    async fn delete(&self, container: &str, key: &str) -> StoreResult<()> {
        self.0.delete(container, key).await
    }

    fn backend_name(&self) -> &str {
        "read-only-archive"
    }
}

/// Blob store that refuses to delete one source object
struct StickySource {
    inner: MemoryBlobStore,
    sticky: &'static str,
}

#[async_trait]
impl BlobStore for StickySource {
    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        self.inner.container_exists(container).await
    }

    async fn create_container(&self, container: &str) -> StoreResult<()> {
        self.inner.create_container(container).await
    }

    async fn put(&self, container: &str, key: &str, data: Bytes) -> StoreResult<()> {
        self.inner.put(container, key, data).await
    }

    async fn get(&self, container: &str, key: &str) -> StoreResult<Bytes> {
        self.inner.get(container, key).await
    }

    async fn list(&self, container: &str, limit: Option<usize>) -> StoreResult<Vec<String>> {
        self.inner.list(container, limit).await
    }

    async fn delete(&self, container: &str, key: &str) -> StoreResult<()> {
        if container == "posts" && key == self.sticky {
            return Err(StoreError::Service {
                status: 409,
                message: "lease held".to_string(),
            });
        }
        self.inner.delete(container, key).await
    }

    fn backend_name(&self) -> &str {
        "sticky-source"
    }
}

#[tokio::test]
async fn test_abc_end_to_end() {
    init_test_logging();
    let payload = json!({
        "shortcode": "abc",
        "id": "999",
        "owner": {
            "username": "u",
            "is_unpublished": false,
            "full_name": "User",
            "is_verified": true,
            "id": "1",
            "is_private": false,
            "profile_pic_url": "https://example.invalid/p.jpg"
        },
        "location": null,
        "is_ad": false,
        "taken_at_timestamp": 1700000000,
        "comments_disabled": false,
        "edge_media_to_caption": {"edges": [{"node": {"text": "hello"}}]},
        "edge_media_preview_comment": {
            "count": 2,
            "edges": [{"node": {"text": "nice", "created_at": 1700000100,
                                "owner": {"username": "c", "is_verified": false, "id": "2"}}}]
        },
        "display_url": "https://example.invalid/d.jpg"
    });
    let raw = payload.to_string();
    let blobs = blobs_with(&[("abc.json", raw.clone())]).await;
    let documents = MemoryDocumentStore::new();

    let report = mover(&blobs, Arc::new(documents.clone())).run_once().await;

    assert_eq!(report.processed_count, 1);
    assert_eq!(report.error_count, 0);

    let doc = documents.get("posts", "abc").await.unwrap();
    assert_eq!(doc["id"], json!("abc"));
    assert_eq!(doc["caption"], json!("hello"));
    assert_eq!(doc["comments_count"], json!(2));
    assert_eq!(doc["owner"]["username"], json!("u"));
    assert_eq!(doc["comments_preview"][0]["owner"]["id"], json!("2"));
    assert!(doc.get("display_url").is_none());
    assert!(doc["owner"].get("profile_pic_url").is_none());

    assert_eq!(blobs.object_count("posts").await, 0);
    assert_eq!(blobs.object("synced", "abc.json").await.unwrap(), Bytes::from(raw));
}

#[tokio::test]
async fn test_cap_limits_objects_per_run() {
    let objects: Vec<(&str, String)> = ["a.json", "b.json", "c.json", "d.json", "e.json"]
        .into_iter()
        .map(|name| (name, json!({ "shortcode": name.trim_end_matches(".json") }).to_string()))
        .collect();
    let blobs = blobs_with(&objects).await;
    let documents = MemoryDocumentStore::new();
    let mover = mover(&blobs, Arc::new(documents.clone())).with_max_blobs(2);

    let report = mover.run_once().await;

    assert_eq!(report.listed, 2);
    assert_eq!(report.processed_count, 2);
    assert_eq!(blobs.object_count("posts").await, 3);
    assert_eq!(blobs.object_count("synced").await, 2);
    assert_eq!(documents.count("posts").await, 2);

    // later runs drain the rest
    mover.run_once().await;
    mover.run_once().await;
    assert_eq!(blobs.object_count("posts").await, 0);
    assert_eq!(documents.count("posts").await, 5);
}

#[tokio::test]
async fn test_invalid_json_left_untouched() {
    let blobs = blobs_with(&[
        ("bad.json", "{not json".to_string()),
        ("good.json", r#"{"shortcode":"g"}"#.to_string()),
    ])
    .await;
    let documents = MemoryDocumentStore::new();

    let report = mover(&blobs, Arc::new(documents.clone())).run_once().await;

    assert_eq!(report.processed_count, 1);
    assert_eq!(report.error_count, 1);
    assert_eq!(report.failures[0].name, "bad.json");
    assert_eq!(report.failures[0].stage, MoveStage::Parse);
    assert_eq!(
        blobs.object("posts", "bad.json").await.unwrap(),
        Bytes::from_static(b"{not json")
    );
    assert!(blobs.object("synced", "bad.json").await.is_none());
    assert!(documents.get("posts", "g").await.is_some());
}

#[tokio::test]
async fn test_type_mismatch_left_untouched() {
    let blobs = blobs_with(&[("odd.json", r#"{"shortcode":"o","owner":"x"}"#.to_string())]).await;

    let report = mover(&blobs, Arc::new(MemoryDocumentStore::new()))
        .run_once()
        .await;

    assert_eq!(report.failures[0].stage, MoveStage::Extract);
    assert!(blobs.object("posts", "odd.json").await.is_some());
}

#[tokio::test]
async fn test_upsert_failure_skips_archive_and_delete() {
    let blobs = blobs_with(&[("abc.json", r#"{"shortcode":"abc"}"#.to_string())]).await;

    let report = mover(&blobs, Arc::new(RejectingDocuments)).run_once().await;

    assert_eq!(report.processed_count, 0);
    assert_eq!(report.error_count, 1);
    assert_eq!(report.failures[0].stage, MoveStage::Upsert);
    assert!(blobs.object("posts", "abc.json").await.is_some());
    assert!(blobs.object("synced", "abc.json").await.is_none());
}

#[tokio::test]
async fn test_archive_failure_keeps_source() {
    let inner = blobs_with(&[("abc.json", r#"{"shortcode":"abc"}"#.to_string())]).await;
    let documents = MemoryDocumentStore::new();
    let mover = TransferMover::new(
        Arc::new(ReadOnlyArchive(inner.clone())),
        Arc::new(documents.clone()),
    );

    let report = mover.run_once().await;

    assert_eq!(report.failures[0].stage, MoveStage::Archive);
    // the document was stored, the object stays for the next run
    assert!(documents.get("posts", "abc").await.is_some());
    assert!(inner.object("posts", "abc.json").await.is_some());
}

#[tokio::test]
async fn test_delete_failure_keeps_source_and_continues() {
    let inner = blobs_with(&[
        ("a.json", r#"{"shortcode":"a"}"#.to_string()),
        ("b.json", r#"{"shortcode":"b"}"#.to_string()),
    ])
    .await;
    let documents = MemoryDocumentStore::new();
    let mover = TransferMover::new(
        Arc::new(StickySource {
            inner: inner.clone(),
            sticky: "a.json",
        }),
        Arc::new(documents.clone()),
    );

    let report = mover.run_once().await;

    assert_eq!(report.error_count, 1);
    assert_eq!(report.processed_count, 1);
    assert_eq!(report.failures[0].name, "a.json");
    assert_eq!(report.failures[0].stage, MoveStage::Delete);
    assert!(documents.get("posts", "a").await.is_some());
    assert!(inner.object("synced", "a.json").await.is_some());
    assert!(inner.object("posts", "a.json").await.is_some());

    // the object after the failed one is still moved
    assert!(documents.get("posts", "b").await.is_some());
    assert!(inner.object("posts", "b.json").await.is_none());
}

#[tokio::test]
async fn test_replayed_object_upserts_once() {
    let body = r#"{"shortcode":"abc","caption":"ignored"}"#.to_string();
    let blobs = blobs_with(&[("abc.json", body.clone())]).await;
    let documents = MemoryDocumentStore::new();
    let mover = mover(&blobs, Arc::new(documents.clone()));

    mover.run_once().await;
    blobs
        .put("posts", "abc.json", Bytes::from(body))
        .await
        .unwrap();
    let report = mover.run_once().await;

    assert_eq!(report.processed_count, 1);
    assert_eq!(documents.count("posts").await, 1);
    assert_eq!(blobs.object_count("synced").await, 1);
}

#[tokio::test]
async fn test_id_falls_back_to_source_id() {
    let blobs = blobs_with(&[("n.json", r#"{"shortcode":"","id":"123"}"#.to_string())]).await;
    let documents = MemoryDocumentStore::new();

    mover(&blobs, Arc::new(documents.clone())).run_once().await;

    assert_eq!(documents.get("posts", "123").await.unwrap()["id"], json!("123"));
}

#[tokio::test]
async fn test_empty_source_is_clean() {
    let blobs = blobs_with(&[]).await;

    let report = mover(&blobs, Arc::new(MemoryDocumentStore::new()))
        .run_once()
        .await;

    assert!(report.is_clean());
    assert_eq!(report.listed, 0);
}

#[tokio::test]
async fn test_upload_then_move_with_local_backends() {
    let input = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    for code in ["p1", "p2", "p3"] {
        std::fs::write(
            input.path().join(format!("{}.info", code)),
            json!({ "shortcode": code, "owner": {"username": "u"} }).to_string(),
        )
        .unwrap();
    }

    let blobs = Arc::new(LocalBlobStore::new(root.path()));
    let records = read_records(input.path(), ".info", None).unwrap();
    let summary = BatchUploader::new(blobs.clone(), "posts")
        .upload_all(records, 2, 2)
        .await;
    assert_eq!(summary.successful, 3);

    let documents = LocalDocumentStore::new(root.path().join("documents"), "instagram");
    let mover = TransferMover::new(blobs.clone(), Arc::new(documents.clone()));
    mover.ensure_archive_container().await.unwrap();
    let report = mover.run_once().await;

    assert_eq!(report.processed_count, 3);
    assert!(blobs.list("posts", None).await.unwrap().is_empty());
    assert_eq!(blobs.list("synced", None).await.unwrap().len(), 3);
    assert!(documents.document_path("posts", "p2").exists());

    let stored: Value = serde_json::from_slice(
        &std::fs::read(documents.document_path("posts", "p2")).unwrap(),
    )
    .unwrap();
    assert_eq!(stored["id"], json!("p2"));
    assert_eq!(stored["owner"]["username"], json!("u"));
    assert!(stored["caption"].is_null());
}
