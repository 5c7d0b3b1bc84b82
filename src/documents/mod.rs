//! Document database abstraction
//!
//! The mover only ever upserts, keyed by the document's `id` field, so that
//! replaying the same object is harmless.

mod cosmos;
mod local;
mod memory;

pub use cosmos::CosmosDocumentStore;
pub use local::LocalDocumentStore;
pub use memory::MemoryDocumentStore;

use crate::storage::{StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;

/// Insert-or-replace document storage
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert `document` or replace the existing document with the same `id`
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidDocument` if the document has no usable `id`.
    async fn upsert(&self, container: &str, document: &Value) -> StoreResult<()>;

    /// Short backend name used in logs
    fn backend_name(&self) -> &str;
}

/// Extract the key of a document: a non-empty string or a number `id`
pub fn document_key(document: &Value) -> StoreResult<String> {
    match document.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        Some(other) if !other.is_null() => Err(StoreError::InvalidDocument(format!(
            "'id' must be a string or number, got {}",
            other
        ))),
        _ => Err(StoreError::InvalidDocument(
            "document has no 'id' field".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_key() {
        assert_eq!(document_key(&json!({"id": "abc"})).unwrap(), "abc");
        assert_eq!(document_key(&json!({"id": 42})).unwrap(), "42");
        assert!(document_key(&json!({"id": null})).is_err());
        assert!(document_key(&json!({"id": ""})).is_err());
        assert!(document_key(&json!({"id": [1]})).is_err());
        assert!(document_key(&json!({})).is_err());
    }
}
