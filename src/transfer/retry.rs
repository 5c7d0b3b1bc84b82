//! Retry with capped exponential backoff
//!
//! Delays grow as `initial_delay * multiplier^(attempt - 1)` and are capped at
//! `max_delay`. There is no jitter: the schedule for the defaults is
//! 1s, 2s, 4s, 8s between five attempts.
//!
//! Only errors for which [`StoreError::is_retriable`] holds are retried;
//! anything else is returned after the first attempt.
//!
//! # Example
//!
//! ```no_run
//! use blobrelay::transfer::retry::{with_retry, RetryPolicy};
//! use blobrelay::storage::{BlobStore, MemoryBlobStore};
//! use bytes::Bytes;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryBlobStore::with_containers(&["posts"]).await;
//! with_retry(&RetryPolicy::default(), "a.json", || {
//!     store.put("posts", "a.json", Bytes::from_static(b"{}"))
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::storage::{BlobStore, StoreError, StoreResult};
use bytes::Bytes;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Growth factor between consecutive delays
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.checked_pow(exponent).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Execute an operation with retry logic
///
/// `label` identifies the operation in retry logs. Returns the last error
/// once attempts are exhausted or a permanent error occurs.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, label: &str, mut operation: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= max_attempts || !e.is_retriable() {
                    return Err(e);
                }

                let delay = policy.calculate_delay(attempt);
                tracing::warn!(
                    target: "blobrelay::retry",
                    operation = label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after error"
                );
                sleep(delay).await;
            }
        }
    }
}

/// Upload one JSON payload to `container/key`, overwriting, with retry
///
/// The payload is serialized once with serde_json's compact encoding and the
/// same bytes are sent on every attempt.
pub async fn upload_record(
    store: &dyn BlobStore,
    container: &str,
    key: &str,
    payload: &Value,
    policy: &RetryPolicy,
) -> StoreResult<()> {
    let body = serde_json::to_vec(payload)
        .map(Bytes::from)
        .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;

    with_retry(policy, key, || store.put(container, key, body.clone())).await
}
