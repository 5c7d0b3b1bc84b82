/*!
 * Error types for blobrelay
 */

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::extract::ExtractError;
use crate::storage::StoreError;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

/// Run-level errors. Per-record problems never surface here; they are
/// converted into counters by the uploader and the mover.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input directory missing or not enumerable
    #[error("Cannot read input directory {path}: {source}")]
    InputDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The target container could not be confirmed or created
    #[error("Container '{container}' is unavailable: {source}")]
    ContainerSetup {
        container: String,
        #[source]
        source: StoreError,
    },

    /// Listing the source container failed
    #[error("Failed to list container '{container}': {source}")]
    Listing {
        container: String,
        #[source]
        source: StoreError,
    },

    /// Storage or document backend error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PipelineError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_)
            | PipelineError::InputDirectory { .. }
            | PipelineError::ContainerSetup { .. } => EXIT_FATAL,
            PipelineError::Listing { .. } => EXIT_PARTIAL,
            PipelineError::Store(e) if e.is_auth_error() => EXIT_FATAL,
            _ => EXIT_PARTIAL,
        }
    }
}

/// A single local file or remote object that cannot be turned into a record.
/// These are permanent: retrying the same bytes can never succeed.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("{name}: cannot read file: {source}")]
    Unreadable {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("{name}: invalid JSON: {source}")]
    InvalidJson {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{name}: {source}")]
    Extraction {
        name: String,
        #[source]
        source: ExtractError,
    },
}
