/*!
 * Configuration types for blobrelay
 */

use crate::error::{PipelineError, Result};
use crate::transfer::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Object storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// Azure Blob Storage via connection string
    #[default]
    Azure,

    /// One directory per container under `local_root`
    Local,
}

/// Document database backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentBackendKind {
    /// Azure Cosmos DB (SQL API)
    #[default]
    Cosmos,

    /// JSON files under `local_root/documents/<database_name>`
    Local,
}

/// Pipeline configuration shared by the uploader and the mover
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding the record files to upload
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Only files whose name ends with this suffix are uploaded
    #[serde(default = "default_file_suffix")]
    pub file_suffix: String,

    /// Records per upload batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum concurrently running batch tasks
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Upload at most this many candidate files (None = all)
    #[serde(default)]
    pub max_files: Option<usize>,

    /// Container receiving uploads
    #[serde(default = "default_posts_container")]
    pub upload_container: String,

    /// Container the mover drains
    #[serde(default = "default_posts_container")]
    pub source_container: String,

    /// Container receiving moved originals
    #[serde(default = "default_archive_container")]
    pub archive_container: String,

    /// Document database name
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Document container inside the database
    #[serde(default = "default_posts_container")]
    pub document_container: String,

    /// Document field used as the Cosmos partition key
    #[serde(default = "default_partition_key_field")]
    pub partition_key_field: String,

    /// Cap on objects handled per mover run
    #[serde(default = "default_max_blobs_per_execution")]
    pub max_blobs_per_execution: usize,

    /// Object storage backend
    #[serde(default)]
    pub storage: StorageBackendKind,

    /// Document backend
    #[serde(default)]
    pub documents: DocumentBackendKind,

    /// Root directory for the local backends
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    /// Azure Storage connection string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_connection_string: Option<String>,

    /// Cosmos DB account endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosmos_endpoint: Option<String>,

    /// Cosmos DB master key (base64)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosmos_key: Option<String>,

    /// Total upload attempts per record
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay after the first failed attempt, in seconds
    #[serde(default = "default_retry_initial_delay")]
    pub retry_initial_delay_secs: u64,

    /// Upper bound for a single retry delay, in seconds
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_secs: u64,

    /// Show progress bars
    #[serde(default = "default_true")]
    pub show_progress: bool,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// JSON log file (None = stdout only)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_suffix: default_file_suffix(),
            batch_size: default_batch_size(),
            max_workers: default_max_workers(),
            max_files: None,
            upload_container: default_posts_container(),
            source_container: default_posts_container(),
            archive_container: default_archive_container(),
            database_name: default_database_name(),
            document_container: default_posts_container(),
            partition_key_field: default_partition_key_field(),
            max_blobs_per_execution: default_max_blobs_per_execution(),
            storage: StorageBackendKind::default(),
            documents: DocumentBackendKind::default(),
            local_root: default_local_root(),
            storage_connection_string: None,
            cosmos_endpoint: None,
            cosmos_key: None,
            retry_attempts: default_retry_attempts(),
            retry_initial_delay_secs: default_retry_initial_delay(),
            retry_max_delay_secs: default_retry_max_delay(),
            show_progress: true,
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_file_suffix() -> String {
    ".info".to_string()
}

fn default_batch_size() -> usize {
    50
}

fn default_max_workers() -> usize {
    8
}

fn default_posts_container() -> String {
    "posts".to_string()
}

fn default_archive_container() -> String {
    "synced".to_string()
}

fn default_database_name() -> String {
    "instagram".to_string()
}

fn default_partition_key_field() -> String {
    "id".to_string()
}

fn default_max_blobs_per_execution() -> usize {
    100
}

fn default_local_root() -> PathBuf {
    PathBuf::from("blobrelay-data")
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_retry_initial_delay() -> u64 {
    1
}

fn default_retry_max_delay() -> u64 {
    60
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| PipelineError::Config(format!("invalid {}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file
    ///
    /// Credentials are only written if they are set on `self`.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("batch_size", self.batch_size),
            ("max_workers", self.max_workers),
            ("max_blobs_per_execution", self.max_blobs_per_execution),
            ("retry_attempts", self.retry_attempts as usize),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(PipelineError::Config(format!("{} must be at least 1", name)));
            }
        }

        if self.file_suffix.is_empty() {
            return Err(PipelineError::Config("file_suffix must not be empty".to_string()));
        }
        if self.retry_initial_delay_secs > self.retry_max_delay_secs {
            return Err(PipelineError::Config(
                "retry_initial_delay_secs must not exceed retry_max_delay_secs".to_string(),
            ));
        }
        Ok(())
    }

    /// Connection string for the Azure backend
    pub fn require_connection_string(&self) -> Result<&str> {
        self.storage_connection_string
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::Config(
                    "Azure storage requires a connection string (AZURE_STORAGE_CONNECTION_STRING)"
                        .to_string(),
                )
            })
    }

    /// Endpoint and key for the Cosmos backend
    pub fn require_cosmos_credentials(&self) -> Result<(&str, &str)> {
        match (self.cosmos_endpoint.as_deref(), self.cosmos_key.as_deref()) {
            (Some(endpoint), Some(key)) if !endpoint.is_empty() && !key.is_empty() => {
                Ok((endpoint, key))
            }
            _ => Err(PipelineError::Config(
                "Cosmos DB requires COSMOS_ENDPOINT and COSMOS_KEY".to_string(),
            )),
        }
    }

    /// Retry policy for uploads
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            initial_delay: Duration::from_secs(self.retry_initial_delay_secs),
            max_delay: Duration::from_secs(self.retry_max_delay_secs),
            ..RetryPolicy::default()
        }
    }

    /// Effective log level, with `verbose` forcing debug
    pub fn effective_log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }
}
