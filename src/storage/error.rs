//! Error types for the storage and document backends
//!
//! Every backend maps its native failures into [`StoreError`] so that retry
//! decisions are made in one place ([`StoreError::is_retriable`]).

use std::io;
use thiserror::Error;

/// Result type alias for backend operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Unified error type for object-store and document-store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Object not found in container
    #[error("Object not found: {container}/{key}")]
    NotFound { container: String, key: String },

    /// Container (or document collection) does not exist
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// Container already exists (returned by create)
    #[error("Container already exists: {0}")]
    AlreadyExists(String),

    /// Key is not a valid flat object name
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Document rejected before or by the document store
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Access denied
    #[error("Access denied: {0}")]
    PermissionDenied(String),

    /// Credentials rejected or missing
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Backend misconfigured (bad connection string, endpoint, key)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Service asked the caller to slow down
    #[error("Request throttled: {0}")]
    Throttled(String),

    /// Service returned an error status
    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Check if this error is transient and worth retrying
    pub fn is_retriable(&self) -> bool {
        match self {
            StoreError::Network(_) | StoreError::Timeout(_) | StoreError::Throttled(_) => true,
            StoreError::Service { status, .. } => *status >= 500 || *status == 408,
            StoreError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::BrokenPipe
            ),

            StoreError::NotFound { .. }
            | StoreError::ContainerNotFound(_)
            | StoreError::AlreadyExists(_)
            | StoreError::InvalidKey(_)
            | StoreError::InvalidDocument(_)
            | StoreError::PermissionDenied(_)
            | StoreError::Authentication(_)
            | StoreError::InvalidConfig(_)
            | StoreError::Other(_) => false,
        }
    }

    /// Check if this error indicates the object or container was not found
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. } | StoreError::ContainerNotFound(_)
        )
    }

    /// Check if this error is related to authentication or authorization
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            StoreError::Authentication(_) | StoreError::PermissionDenied(_)
        )
    }

    /// Classify an HTTP status returned by a backend
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => StoreError::Authentication(message),
            403 => StoreError::PermissionDenied(message),
            408 => StoreError::Timeout(message),
            429 => StoreError::Throttled(message),
            _ => StoreError::Service { status, message },
        }
    }
}
