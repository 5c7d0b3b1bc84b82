//! Upload side of the pipeline: retrying single-object writes and the
//! concurrent batch uploader built on top of them.

pub mod retry;
pub mod uploader;

pub use retry::{upload_record, with_retry, RetryPolicy};
pub use uploader::{remote_key, BatchUploader, TransferOutcome, UploadSummary};
