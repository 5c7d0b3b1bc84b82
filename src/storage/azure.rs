//! Azure Blob Storage backend
//!
//! Authenticates with a storage account connection string, the same value
//! Azure Functions expose as `AzureWebJobsStorage`.
//!
//! # Example
//!
//! ```no_run
//! use blobrelay::storage::{AzureBlobStore, BlobStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conn = std::env::var("AZURE_STORAGE_CONNECTION_STRING")?;
//!     let store = AzureBlobStore::from_connection_string(&conn)?;
//!     for name in store.list("posts", Some(10)).await? {
//!         println!("{}", name);
//!     }
//!     Ok(())
//! }
//! ```

use super::error::{StoreError, StoreResult};
use super::BlobStore;
use async_trait::async_trait;
use azure_core::error::ErrorKind;
use azure_storage::ConnectionString;
use azure_storage_blobs::prelude::*;
use bytes::Bytes;
use futures::StreamExt;

/// Azure Blob Storage [`BlobStore`]
///
/// `BlobServiceClient` is cheap to clone and safe to share between tasks;
/// per-container and per-blob clients are derived on each call.
#[derive(Clone)]
pub struct AzureBlobStore {
    service: BlobServiceClient,
}

impl AzureBlobStore {
    /// Create a store from a storage account connection string
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidConfig` if the string cannot be parsed or
    /// carries no account name / usable credentials.
    pub fn from_connection_string(connection_string: &str) -> StoreResult<Self> {
        let parsed = ConnectionString::new(connection_string).map_err(|e| {
            StoreError::InvalidConfig(format!("Invalid storage connection string: {}", e))
        })?;

        let account = parsed
            .account_name
            .ok_or_else(|| {
                StoreError::InvalidConfig("Connection string has no AccountName".to_string())
            })?;

        let credentials = parsed.storage_credentials().map_err(|e| {
            StoreError::InvalidConfig(format!("Connection string has no credentials: {}", e))
        })?;

        Ok(Self {
            service: BlobServiceClient::new(account, credentials),
        })
    }
}

/// Map an Azure SDK error into a `StoreError`
///
/// HTTP failures are classified by status and service error code; anything
/// else falls back to matching on the rendered message.
fn map_azure_error(e: azure_core::Error, container: &str, key: Option<&str>) -> StoreError {
    match e.kind() {
        ErrorKind::HttpResponse { status, error_code } => classify_status(
            u16::from(*status),
            error_code.as_deref(),
            e.to_string(),
            container,
            key,
        ),
        ErrorKind::Io => StoreError::Network(e.to_string()),
        _ => classify_message(e.to_string(), container, key),
    }
}

fn classify_status(
    status: u16,
    error_code: Option<&str>,
    message: String,
    container: &str,
    key: Option<&str>,
) -> StoreError {
    match (status, error_code) {
        (_, Some("ContainerAlreadyExists")) => StoreError::AlreadyExists(container.to_string()),
        (409, None) if key.is_none() => StoreError::AlreadyExists(container.to_string()),
        (_, Some("ContainerNotFound")) => StoreError::ContainerNotFound(container.to_string()),
        (_, Some("BlobNotFound")) | (404, _) => match key {
            Some(key) => StoreError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            },
            None => StoreError::ContainerNotFound(container.to_string()),
        },
        (503, _) | (_, Some("ServerBusy")) => StoreError::Throttled(message),
        _ => StoreError::from_status(status, message),
    }
}

fn classify_message(message: String, container: &str, key: Option<&str>) -> StoreError {
    if message.contains("ContainerAlreadyExists") {
        StoreError::AlreadyExists(container.to_string())
    } else if message.contains("ContainerNotFound") {
        StoreError::ContainerNotFound(container.to_string())
    } else if message.contains("BlobNotFound") || message.contains("404") {
        match key {
            Some(key) => StoreError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            },
            None => StoreError::ContainerNotFound(container.to_string()),
        }
    } else if message.contains("AuthenticationFailed") || message.contains("401") {
        StoreError::Authentication(message)
    } else if message.contains("AuthorizationFailure") || message.contains("403") {
        StoreError::PermissionDenied(message)
    } else if message.contains("ServerBusy") || message.contains("503") {
        StoreError::Throttled(message)
    } else if message.contains("OperationTimedOut") || message.to_lowercase().contains("timed out")
    {
        StoreError::Timeout(message)
    } else if message.contains("InternalError") || message.contains("500") {
        StoreError::Service {
            status: 500,
            message,
        }
    } else if message.to_lowercase().contains("connection") {
        StoreError::Network(message)
    } else {
        StoreError::Other(message)
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    #[tracing::instrument(skip(self), fields(backend = "azure"))]
    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        self.service
            .container_client(container)
            .exists()
            .await
            .map_err(|e| map_azure_error(e, container, None))
    }

    #[tracing::instrument(skip(self), fields(backend = "azure"))]
    async fn create_container(&self, container: &str) -> StoreResult<()> {
        self.service
            .container_client(container)
            .create()
            .await
            .map(|_| ())
            .map_err(|e| map_azure_error(e, container, None))
    }

    #[tracing::instrument(skip(self, data), fields(backend = "azure", size = data.len()))]
    async fn put(&self, container: &str, key: &str, data: Bytes) -> StoreResult<()> {
        self.service
            .container_client(container)
            .blob_client(key)
            .put_block_blob(data)
            .content_type("application/json")
            .await
            .map(|_| ())
            .map_err(|e| map_azure_error(e, container, Some(key)))
    }

    #[tracing::instrument(skip(self), fields(backend = "azure"))]
    async fn get(&self, container: &str, key: &str) -> StoreResult<Bytes> {
        self.service
            .container_client(container)
            .blob_client(key)
            .get_content()
            .await
            .map(Bytes::from)
            .map_err(|e| map_azure_error(e, container, Some(key)))
    }

    #[tracing::instrument(skip(self), fields(backend = "azure"))]
    async fn list(&self, container: &str, limit: Option<usize>) -> StoreResult<Vec<String>> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut names = Vec::new();
        let mut pages = self
            .service
            .container_client(container)
            .list_blobs()
            .into_stream();

        while names.len() < limit {
            let page = match pages.next().await {
                Some(page) => page.map_err(|e| map_azure_error(e, container, None))?,
                None => break,
            };
            for blob in page.blobs.blobs() {
                if names.len() >= limit {
                    break;
                }
                names.push(blob.name.clone());
            }
        }

        Ok(names)
    }

    #[tracing::instrument(skip(self), fields(backend = "azure"))]
    async fn delete(&self, container: &str, key: &str) -> StoreResult<()> {
        self.service
            .container_client(container)
            .blob_client(key)
            .delete()
            .await
            .map(|_| ())
            .map_err(|e| map_azure_error(e, container, Some(key)))
    }

    fn backend_name(&self) -> &str {
        "azure"
    }
}
