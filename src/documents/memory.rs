//! In-memory document store

use super::{document_key, DocumentStore};
use crate::storage::StoreResult;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory [`DocumentStore`]; clones share the same documents
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    containers: Arc<RwLock<HashMap<String, BTreeMap<String, Value>>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a document by container and id
    pub async fn get(&self, container: &str, id: &str) -> Option<Value> {
        self.containers
            .read()
            .await
            .get(container)
            .and_then(|docs| docs.get(id).cloned())
    }

    /// Number of documents in a container
    pub async fn count(&self, container: &str) -> usize {
        self.containers
            .read()
            .await
            .get(container)
            .map_or(0, |docs| docs.len())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn upsert(&self, container: &str, document: &Value) -> StoreResult<()> {
        let id = document_key(document)?;
        self.containers
            .write()
            .await
            .entry(container.to_string())
            .or_default()
            .insert(id, document.clone());
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_replaces() {
        let store = MemoryDocumentStore::new();
        store
            .upsert("posts", &json!({"id": "a", "v": 1}))
            .await
            .unwrap();
        store
            .upsert("posts", &json!({"id": "a", "v": 2}))
            .await
            .unwrap();

        assert_eq!(store.count("posts").await, 1);
        assert_eq!(store.get("posts", "a").await.unwrap()["v"], json!(2));
    }

    #[tokio::test]
    async fn test_upsert_requires_id() {
        let store = MemoryDocumentStore::new();
        assert!(store.upsert("posts", &json!({"v": 1})).await.is_err());
        assert_eq!(store.count("posts").await, 0);
    }
}
