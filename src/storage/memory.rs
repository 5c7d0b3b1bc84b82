//! In-memory object store
//!
//! Containers and objects live in ordered maps, so listing order is the
//! lexicographic key order.

use super::error::{StoreError, StoreResult};
use super::BlobStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Containers = BTreeMap<String, BTreeMap<String, Bytes>>;

/// In-memory [`BlobStore`]
///
/// Cloning yields another handle onto the same containers.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    containers: Arc<RwLock<Containers>>,
}

impl MemoryBlobStore {
    /// Create an empty store with no containers
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given empty containers
    pub async fn with_containers(names: &[&str]) -> Self {
        let store = Self::new();
        {
            let mut containers = store.containers.write().await;
            for name in names {
                containers.insert(name.to_string(), BTreeMap::new());
            }
        }
        store
    }

    /// Number of objects in a container (0 if it doesn't exist)
    pub async fn object_count(&self, container: &str) -> usize {
        self.containers
            .read()
            .await
            .get(container)
            .map_or(0, |objects| objects.len())
    }

    /// Fetch an object without going through the trait (for assertions)
    pub async fn object(&self, container: &str, key: &str) -> Option<Bytes> {
        self.containers
            .read()
            .await
            .get(container)
            .and_then(|objects| objects.get(key).cloned())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        Ok(self.containers.read().await.contains_key(container))
    }

    async fn create_container(&self, container: &str) -> StoreResult<()> {
        let mut containers = self.containers.write().await;
        if containers.contains_key(container) {
            return Err(StoreError::AlreadyExists(container.to_string()));
        }
        containers.insert(container.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn put(&self, container: &str, key: &str, data: Bytes) -> StoreResult<()> {
        let mut containers = self.containers.write().await;
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, container: &str, key: &str) -> StoreResult<Bytes> {
        let containers = self.containers.read().await;
        let objects = containers
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        objects.get(key).cloned().ok_or_else(|| StoreError::NotFound {
            container: container.to_string(),
            key: key.to_string(),
        })
    }

    async fn list(&self, container: &str, limit: Option<usize>) -> StoreResult<Vec<String>> {
        let containers = self.containers.read().await;
        let objects = containers
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        Ok(objects
            .keys()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn delete(&self, container: &str, key: &str) -> StoreResult<()> {
        let mut containers = self.containers.write().await;
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            })
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
