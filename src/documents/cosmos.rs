//! Azure Cosmos DB (SQL API) document backend
//!
//! Talks to the REST API directly: each request is signed with the account
//! master key (HMAC-SHA256 over verb, resource type, resource link and date)
//! and upserts are requested with `x-ms-documentdb-is-upsert: True`.

use super::{document_key, DocumentStore};
use crate::storage::{StoreError, StoreResult};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use ring::hmac;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// REST API version sent with every request
pub const COSMOS_API_VERSION: &str = "2018-12-31";

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Cosmos DB [`DocumentStore`] bound to one database
#[derive(Clone)]
pub struct CosmosDocumentStore {
    client: Client,
    endpoint: String,
    database: String,
    key: Arc<hmac::Key>,
    partition_key_field: String,
}

impl CosmosDocumentStore {
    /// Create a store for `database` on the account at `endpoint`
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidConfig` if the master key is not base64
    /// or the HTTP client cannot be built.
    pub fn new(endpoint: &str, master_key: &str, database: &str) -> StoreResult<Self> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(master_key.trim())
            .map_err(|e| StoreError::InvalidConfig(format!("Cosmos key is not base64: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            database: database.to_string(),
            key: Arc::new(hmac::Key::new(hmac::HMAC_SHA256, &decoded)),
            partition_key_field: "id".to_string(),
        })
    }

    /// Use a different document field as the container's partition key
    pub fn with_partition_key_field(mut self, field: impl Into<String>) -> Self {
        self.partition_key_field = field.into();
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn partition_key_header(&self, document: &Value) -> StoreResult<String> {
        let value = document
            .get(&self.partition_key_field)
            .filter(|v| !v.is_null())
            .ok_or_else(|| {
                StoreError::InvalidDocument(format!(
                    "document has no partition key field '{}'",
                    self.partition_key_field
                ))
            })?;
        serde_json::to_string(&[value]).map_err(|e| StoreError::InvalidDocument(e.to_string()))
    }
}

impl std::fmt::Debug for CosmosDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosmosDocumentStore")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("key", &"<redacted>")
            .field("partition_key_field", &self.partition_key_field)
            .finish()
    }
}

/// Build the `authorization` header value for a master-key signed request
///
/// `date` must be the exact RFC 1123 string sent as `x-ms-date`.
pub fn authorization_token(
    key: &hmac::Key,
    verb: &str,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> String {
    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    );
    let tag = hmac::sign(key, payload.as_bytes());
    let signature = base64::engine::general_purpose::STANDARD.encode(tag.as_ref());
    urlencoding::encode(&format!("type=master&ver=1.0&sig={}", signature)).into_owned()
}

fn rfc1123_now() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn map_request_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout(e.to_string())
    } else {
        StoreError::Network(e.to_string())
    }
}

#[async_trait]
impl DocumentStore for CosmosDocumentStore {
    #[tracing::instrument(skip(self, document), fields(backend = "cosmos", database = %self.database))]
    async fn upsert(&self, container: &str, document: &Value) -> StoreResult<()> {
        let id = document_key(document)?;
        let partition_key = self.partition_key_header(document)?;

        let resource_link = format!("dbs/{}/colls/{}", self.database, container);
        let url = format!("{}/{}/docs", self.endpoint, resource_link);
        let date = rfc1123_now();
        let token = authorization_token(&self.key, "POST", "docs", &resource_link, &date);

        let response = self
            .client
            .post(&url)
            .header("authorization", token)
            .header("x-ms-date", &date)
            .header("x-ms-version", COSMOS_API_VERSION)
            .header("x-ms-documentdb-is-upsert", "True")
            .header("x-ms-documentdb-partitionkey", partition_key)
            .json(document)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(id = %id, status = status.as_u16(), "Document upserted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            400 => StoreError::InvalidDocument(body),
            404 => StoreError::ContainerNotFound(format!("{}/{}", self.database, container)),
            code => StoreError::from_status(code, body),
        })
    }

    fn backend_name(&self) -> &str {
        "cosmos"
    }
}
