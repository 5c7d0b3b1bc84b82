/*!
 * blobrelay CLI - Command Line Interface
 */

use anyhow::Context;
use blobrelay::{
    cli_style::{self, move_report_table, print_info, upload_summary_table, Theme},
    config::{DocumentBackendKind, LogLevel, PipelineConfig, StorageBackendKind},
    documents::{CosmosDocumentStore, DocumentStore, LocalDocumentStore},
    error::{PipelineError, EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS},
    logging,
    mover::TransferMover,
    source::read_records_with_progress,
    storage::{AzureBlobStore, BlobStore, LocalBlobStore},
    transfer::BatchUploader,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Legacy name of the storage connection string variable in Azure Functions
const FUNCTIONS_STORAGE_ENV: &str = "AzureWebJobsStorage";

#[derive(Parser)]
#[command(name = "blobrelay")]
#[command(version, about = "Upload JSON records to object storage and move them into a document database", long_about = None)]
struct Cli {
    /// Load settings from a TOML file (flags override it)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Object storage backend
    #[arg(long, value_enum, global = true)]
    storage: Option<StorageArg>,

    /// Document database backend
    #[arg(long, value_enum, global = true)]
    documents: Option<DocumentsArg>,

    /// Root directory for the local backends
    #[arg(long, value_name = "DIR", global = true)]
    local_root: Option<PathBuf>,

    /// Azure Storage connection string
    #[arg(
        long,
        env = "AZURE_STORAGE_CONNECTION_STRING",
        hide_env_values = true,
        global = true
    )]
    connection_string: Option<String>,

    /// Cosmos DB account endpoint
    #[arg(long, env = "COSMOS_ENDPOINT", global = true)]
    cosmos_endpoint: Option<String>,

    /// Cosmos DB master key
    #[arg(long, env = "COSMOS_KEY", hide_env_values = true, global = true)]
    cosmos_key: Option<String>,

    /// Log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Also write JSON logs to this file
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload record files from a local directory
    Upload(UploadArgs),

    /// Move objects from the source container into the document database
    Move(MoveArgs),

    /// Write a configuration file with default values
    InitConfig {
        /// Destination path
        #[arg(value_name = "FILE", default_value = "blobrelay.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct UploadArgs {
    /// Directory containing the record files
    #[arg(short, long, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Records per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Maximum concurrent batches
    #[arg(long)]
    max_workers: Option<usize>,

    /// Upload at most this many files
    #[arg(long)]
    max_files: Option<usize>,

    /// File name suffix to pick up
    #[arg(long)]
    suffix: Option<String>,

    /// Target container
    #[arg(long, env = "UPLOAD_CONTAINER")]
    container: Option<String>,
}

#[derive(Args)]
struct MoveArgs {
    /// Container to drain
    #[arg(long, env = "SOURCE_CONTAINER")]
    source_container: Option<String>,

    /// Container receiving the originals
    #[arg(long, env = "TARGET_CONTAINER")]
    archive_container: Option<String>,

    /// Document database name
    #[arg(long, env = "COSMOS_DB_NAME")]
    database: Option<String>,

    /// Document container name
    #[arg(long, env = "COSMOS_CONTAINER_NAME")]
    document_container: Option<String>,

    /// Maximum objects per run
    #[arg(long, env = "MAX_BLOBS_PER_EXECUTION")]
    max_blobs: Option<usize>,

    /// Keep running, starting a new run every N seconds
    #[arg(long, value_name = "SECS")]
    interval_secs: Option<u64>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum StorageArg {
    Azure,
    Local,
}

impl From<StorageArg> for StorageBackendKind {
    fn from(arg: StorageArg) -> Self {
        match arg {
            StorageArg::Azure => StorageBackendKind::Azure,
            StorageArg::Local => StorageBackendKind::Local,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum DocumentsArg {
    Cosmos,
    Local,
}

impl From<DocumentsArg> for DocumentBackendKind {
    fn from(arg: DocumentsArg) -> Self {
        match arg {
            DocumentsArg::Cosmos => DocumentBackendKind::Cosmos,
            DocumentsArg::Local => DocumentBackendKind::Local,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            cli_style::print_error(&format!("{:#}", e), None);
            e.downcast_ref::<PipelineError>()
                .map_or(EXIT_FATAL, PipelineError::exit_code)
        }
    };
    std::process::exit(code);
}

fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path, force } = &cli.command {
        return init_config(path, *force);
    }

    let config = build_config(&cli)?;
    logging::init_logging(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    match cli.command {
        Commands::Upload(_) => runtime.block_on(upload(&config)),
        Commands::Move(ref args) => runtime.block_on(move_blobs(&config, args.interval_secs)),
        Commands::InitConfig { .. } => Ok(EXIT_SUCCESS),
    }
}

/// Layer the config file, then flags and environment variables
fn build_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match cli.config {
        Some(ref path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(storage) = cli.storage {
        config.storage = storage.into();
    }
    if let Some(documents) = cli.documents {
        config.documents = documents.into();
    }
    if let Some(ref root) = cli.local_root {
        config.local_root = root.clone();
    }
    if let Some(ref connection_string) = cli.connection_string {
        config.storage_connection_string = Some(connection_string.clone());
    } else if config.storage_connection_string.is_none() {
        config.storage_connection_string = std::env::var(FUNCTIONS_STORAGE_ENV).ok();
    }
    if cli.cosmos_endpoint.is_some() {
        config.cosmos_endpoint = cli.cosmos_endpoint.clone();
    }
    if cli.cosmos_key.is_some() {
        config.cosmos_key = cli.cosmos_key.clone();
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file.clone();
    }
    config.verbose |= cli.verbose;
    if cli.no_progress {
        config.show_progress = false;
    }

    match &cli.command {
        Commands::Upload(args) => {
            if args.directory.is_some() {
                config.directory = args.directory.clone();
            }
            if let Some(batch_size) = args.batch_size {
                config.batch_size = batch_size;
            }
            if let Some(max_workers) = args.max_workers {
                config.max_workers = max_workers;
            }
            if args.max_files.is_some() {
                config.max_files = args.max_files;
            }
            if let Some(ref suffix) = args.suffix {
                config.file_suffix = suffix.clone();
            }
            if let Some(ref container) = args.container {
                config.upload_container = container.clone();
            }
        }
        Commands::Move(args) => {
            if let Some(ref name) = args.source_container {
                config.source_container = name.clone();
            }
            if let Some(ref name) = args.archive_container {
                config.archive_container = name.clone();
            }
            if let Some(ref name) = args.database {
                config.database_name = name.clone();
            }
            if let Some(ref name) = args.document_container {
                config.document_container = name.clone();
            }
            if let Some(max) = args.max_blobs {
                config.max_blobs_per_execution = max;
            }
        }
        Commands::InitConfig { .. } => {}
    }

    config.validate()?;
    Ok(config)
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<i32> {
    if path.exists() && !force {
        return Err(PipelineError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ))
        .into());
    }
    PipelineConfig::default().to_file(path)?;
    cli_style::print_success(&format!("Wrote default configuration to {}", path.display()));
    Ok(EXIT_SUCCESS)
}

fn build_blob_store(config: &PipelineConfig) -> anyhow::Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.storage {
        StorageBackendKind::Azure => {
            let connection_string = config.require_connection_string()?;
            let store = AzureBlobStore::from_connection_string(connection_string)
                .map_err(PipelineError::from)
                .context("Failed to configure Azure Blob Storage")?;
            Arc::new(store)
        }
        StorageBackendKind::Local => Arc::new(LocalBlobStore::new(&config.local_root)),
    };
    Ok(store)
}

fn build_document_store(config: &PipelineConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.documents {
        DocumentBackendKind::Cosmos => {
            let (endpoint, key) = config.require_cosmos_credentials()?;
            let store = CosmosDocumentStore::new(endpoint, key, &config.database_name)
                .map_err(PipelineError::from)
                .context("Failed to configure Cosmos DB")?
                .with_partition_key_field(config.partition_key_field.clone());
            Arc::new(store)
        }
        DocumentBackendKind::Local => Arc::new(LocalDocumentStore::new(
            config.local_root.join("documents"),
            &config.database_name,
        )),
    };
    Ok(store)
}

async fn upload(config: &PipelineConfig) -> anyhow::Result<i32> {
    let directory = config
        .directory
        .as_ref()
        .ok_or_else(|| PipelineError::Config("--directory is required".to_string()))?;

    let records = read_records_with_progress(
        directory,
        &config.file_suffix,
        config.max_files,
        config.show_progress,
    )?;

    if records.is_empty() {
        cli_style::print_warning(&format!("No valid {} files found", config.file_suffix));
        return Ok(EXIT_SUCCESS);
    }

    let store = build_blob_store(config)?;
    let uploader = BatchUploader::new(store, config.upload_container.clone())
        .with_retry_policy(config.retry_policy())
        .with_progress(config.show_progress);

    print_info(&format!(
        "Uploading {} records to '{}'",
        Theme::primary(records.len()),
        config.upload_container
    ));
    let summary = uploader
        .upload_all(records, config.batch_size, config.max_workers)
        .await;

    if let Some(ref reason) = summary.aborted {
        cli_style::print_error(reason, Some("Check the storage connection string and permissions"));
        return Ok(EXIT_FATAL);
    }

    println!("{}", upload_summary_table(&summary));
    Ok(if summary.failed > 0 {
        EXIT_PARTIAL
    } else {
        EXIT_SUCCESS
    })
}

async fn move_blobs(config: &PipelineConfig, interval_secs: Option<u64>) -> anyhow::Result<i32> {
    let mover = TransferMover::new(build_blob_store(config)?, build_document_store(config)?)
        .with_source_container(config.source_container.clone())
        .with_archive_container(config.archive_container.clone())
        .with_document_container(config.document_container.clone())
        .with_max_blobs(config.max_blobs_per_execution);

    mover
        .ensure_archive_container()
        .await
        .map_err(|source| PipelineError::ContainerSetup {
            container: config.archive_container.clone(),
            source,
        })?;

    let Some(interval) = interval_secs.map(Duration::from_secs) else {
        let report = mover.run_once().await;
        println!("{}", move_report_table(&report));
        return Ok(if report.is_clean() {
            EXIT_SUCCESS
        } else {
            EXIT_PARTIAL
        });
    };

    print_info(&format!(
        "Moving from '{}' every {}s (Ctrl-C to stop)",
        config.source_container,
        interval.as_secs()
    ));
    loop {
        let report = mover.run_once().await;
        if !report.is_clean() {
            println!("{}", move_report_table(&report));
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping");
                return Ok(EXIT_SUCCESS);
            }
        }
    }
}
