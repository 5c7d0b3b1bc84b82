//! Filesystem-backed object store
//!
//! Each container is a directory under `root`; each object is a file in it.
//! Writes go to a hidden staging file first and are renamed into place, so a
//! reader never observes a half-written object.

use super::error::{StoreError, StoreResult};
use super::{validate_key, BlobStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const STAGING_PREFIX: &str = ".staging-";

/// Local directory [`BlobStore`]
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a store rooted at `root` (created lazily by `create_container`)
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Root directory holding the containers
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_path(&self, container: &str) -> StoreResult<PathBuf> {
        validate_key(container)?;
        Ok(self.root.join(container))
    }

    fn object_path(&self, container: &str, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.container_path(container)?.join(key))
    }

    async fn require_container(&self, container: &str) -> StoreResult<PathBuf> {
        let dir = self.container_path(container)?;
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(StoreError::ContainerNotFound(container.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::ContainerNotFound(container.to_string()))
            }
            Err(e) => Err(StoreError::from(e)),
        }
    }

    fn not_found(container: &str, key: &str, e: std::io::Error) -> StoreError {
        if e.kind() == ErrorKind::NotFound {
            StoreError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            }
        } else {
            StoreError::from(e)
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        match self.require_container(container).await {
            Ok(_) => Ok(true),
            Err(StoreError::ContainerNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_container(&self, container: &str) -> StoreResult<()> {
        let dir = self.container_path(container)?;
        fs::create_dir_all(&self.root).await?;
        match fs::create_dir(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists(container.to_string()))
            }
            Err(e) => Err(StoreError::from(e)),
        }
    }

    async fn put(&self, container: &str, key: &str, data: Bytes) -> StoreResult<()> {
        let dir = self.require_container(container).await?;
        let target = self.object_path(container, key)?;
        let staging = dir.join(format!("{}{}", STAGING_PREFIX, uuid::Uuid::new_v4()));

        fs::write(&staging, &data).await?;
        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(StoreError::from(e));
        }
        Ok(())
    }

    async fn get(&self, container: &str, key: &str) -> StoreResult<Bytes> {
        self.require_container(container).await?;
        let path = self.object_path(container, key)?;
        fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| Self::not_found(container, key, e))
    }

    async fn list(&self, container: &str, limit: Option<usize>) -> StoreResult<Vec<String>> {
        let dir = self.require_container(container).await?;
        let mut entries = fs::read_dir(&dir).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(STAGING_PREFIX) {
                continue;
            }
            names.push(name);
        }

        names.sort();
        if let Some(limit) = limit {
            names.truncate(limit);
        }
        Ok(names)
    }

    async fn delete(&self, container: &str, key: &str) -> StoreResult<()> {
        self.require_container(container).await?;
        let path = self.object_path(container, key)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| Self::not_found(container, key, e))
    }

    fn backend_name(&self) -> &str {
        "local"
    }
}
