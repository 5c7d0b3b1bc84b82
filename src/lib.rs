/*!
 * blobrelay - bulk JSON record relay through object storage
 *
 * Two independent stages:
 * - an uploader that pushes local JSON record files into an object storage
 *   container with bounded concurrency and retry
 * - a mover that drains a container into a document database, archiving each
 *   original object before deleting it
 *
 * Storage backends sit behind the [`storage::BlobStore`] and
 * [`documents::DocumentStore`] traits; Azure Blob Storage, Cosmos DB, local
 * directories and in-memory maps are provided.
 */

pub mod cli_style;
pub mod config;
pub mod documents;
pub mod error;
pub mod extract;
pub mod logging;
pub mod mover;
pub mod progress;
pub mod source;
pub mod storage;
pub mod transfer;

// Re-export commonly used types
pub use config::{DocumentBackendKind, LogLevel, PipelineConfig, StorageBackendKind};
pub use documents::DocumentStore;
pub use error::{PipelineError, RecordError, Result};
pub use extract::{extract, ExtractError, NormalizedRecord};
pub use mover::{MoveReport, MoveStage, TransferMover};
pub use source::{read_records, RawRecord};
pub use storage::{BlobStore, StoreError, StoreResult};
pub use transfer::{BatchUploader, RetryPolicy, UploadSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
