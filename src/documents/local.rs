//! Filesystem-backed document store
//!
//! Layout: `<root>/<database>/<container>/<url-encoded id>.json`.

use super::{document_key, DocumentStore};
use crate::storage::{StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local directory [`DocumentStore`]
#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    database_dir: PathBuf,
}

impl LocalDocumentStore {
    pub fn new<P: AsRef<Path>>(root: P, database: &str) -> Self {
        Self {
            database_dir: root.as_ref().join(database),
        }
    }

    /// Path where a document with `id` is stored
    pub fn document_path(&self, container: &str, id: &str) -> PathBuf {
        self.database_dir
            .join(container)
            .join(format!("{}.json", urlencoding::encode(id)))
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn upsert(&self, container: &str, document: &Value) -> StoreResult<()> {
        if container.is_empty() || container.contains(['/', '\\']) || container == ".." {
            return Err(StoreError::InvalidKey(container.to_string()));
        }
        let id = document_key(document)?;
        let target = self.document_path(container, &id);
        let dir = self.database_dir.join(container);
        fs::create_dir_all(&dir).await?;

        let body = serde_json::to_vec_pretty(document)
            .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
        let staging = dir.join(format!(".staging-{}", uuid::Uuid::new_v4()));
        fs::write(&staging, body).await?;
        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(StoreError::from(e));
        }
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "local"
    }
}
