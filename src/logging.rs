/*!
 * Logging and tracing initialization
 */

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// Initialize structured logging based on configuration
///
/// Human-readable output always goes to stdout. When `log_file` is set, a
/// JSON copy of every event is appended to that file as well.
pub fn init_logging(config: &PipelineConfig) -> Result<()> {
    let log_level = config.effective_log_level().to_tracing_level();

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("blobrelay={}", log_level)))
        .map_err(|e| PipelineError::Config(format!("Failed to create log filter: {}", e)))?;

    let log_file = match config.log_file {
        Some(ref log_path) => Some(open_log_file(log_path)?),
        None => None,
    };
    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_writer(Arc::new(file))
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .json()
    });

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| PipelineError::Config(format!("Logging already initialized: {}", e)))
}

/// Open the JSON log file for appending
fn open_log_file(log_path: &Path) -> Result<File> {
    File::options()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|e| {
            PipelineError::Config(format!(
                "Failed to open log file {}: {}",
                log_path.display(),
                e
            ))
        })
}

/// Initialize logging for tests; safe to call from every test
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("blobrelay=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    });
}
