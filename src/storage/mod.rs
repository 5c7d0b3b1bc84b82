//! Object storage abstraction
//!
//! The pipeline only needs a narrow set of container-scoped operations, so
//! [`BlobStore`] is deliberately small. Implementations:
//!
//! - [`AzureBlobStore`] - Azure Blob Storage (connection string auth)
//! - [`LocalBlobStore`] - one directory per container under a root path
//! - [`MemoryBlobStore`] - in-process map, for tests and embedding
//!
//! # Example
//!
//! ```no_run
//! use blobrelay::storage::{BlobStore, LocalBlobStore};
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = LocalBlobStore::new("/tmp/blobrelay");
//!     store.create_container("posts").await?;
//!     store.put("posts", "a.json", Bytes::from_static(b"{}")).await?;
//!     println!("{:?}", store.list("posts", None).await?);
//!     Ok(())
//! }
//! ```

pub mod error;

mod azure;
mod local;
mod memory;

pub use azure::AzureBlobStore;
pub use error::{StoreError, StoreResult};
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

use async_trait::async_trait;
use bytes::Bytes;

/// Container-scoped object storage operations
///
/// Implementors must be `Send + Sync`: upload workers share one store handle
/// and issue independent concurrent calls through it.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Check whether a container exists
    async fn container_exists(&self, container: &str) -> StoreResult<bool>;

    /// Create a container
    ///
    /// Returns `StoreError::AlreadyExists` if it is already there.
    async fn create_container(&self, container: &str) -> StoreResult<()>;

    /// Write an object, always overwriting any existing object at `key`
    async fn put(&self, container: &str, key: &str, data: Bytes) -> StoreResult<()>;

    /// Read an object's full contents
    async fn get(&self, container: &str, key: &str) -> StoreResult<Bytes>;

    /// List object names, stopping after `limit` names when given
    ///
    /// Order is whatever the backend returns; it is stable within one call.
    async fn list(&self, container: &str, limit: Option<usize>) -> StoreResult<Vec<String>>;

    /// Delete an object
    async fn delete(&self, container: &str, key: &str) -> StoreResult<()>;

    /// Short backend name used in logs
    fn backend_name(&self) -> &str;
}

/// Reject keys that would escape a flat container namespace
pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty()
        || key == "."
        || key == ".."
        || key.contains('/')
        || key.contains('\\')
        || key.contains('\0')
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
