//! Structured logging setup and operation timing.

use anyhow::Result;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;

/// Initialize structured logging system
///
/// Console output goes to stderr, as JSON when `json_console` is set. The
/// returned guard flushes the file appender on drop; keep it alive for the
/// whole process when a log file is configured.
pub fn init_logging(log_level: Option<&str>, log_file: Option<&Path>, json_console: bool) -> Result<Option<WorkerGuard>> {
    // Set up environment filter
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            let level = log_level.unwrap_or("info");
            EnvFilter::try_new(level)
        })
        .map_err(|e| anyhow::anyhow!("Failed to create log filter: {}", e))?;

    let (text_layer, json_layer) = if json_console {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .json();
        (None, Some(layer))
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);
        (Some(layer), None)
    };

    // Add file layer if log file is specified
    let (file_layer, guard) = match log_file {
        Some(log_path) => {
            let directory = log_path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = log_path
                .file_name()
                .map_or_else(|| "insight-prep.log".into(), |name| name.to_string_lossy().into_owned());
            let (non_blocking_appender, guard) = non_blocking(rolling::daily(directory, file_name));

            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking_appender)
                .with_ansi(false)
                .with_target(true)
                .json();
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    Registry::default()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;

    info!("Logging system initialized");
    Ok(guard)
}

/// Initialize logging from the `[logging]` section, with an optional level override.
pub fn init_from_config(config: &LoggingConfig, level_override: Option<&str>) -> Result<Option<WorkerGuard>> {
    let level = level_override.unwrap_or(&config.level);
    init_logging(
        Some(level),
        config.file_path.as_deref().map(Path::new),
        config.format == "json",
    )
}

/// Logs how long a named operation took.
pub struct OperationTimer {
    operation: String,
    start: std::time::Instant,
}

impl OperationTimer {
    /// Start timing `operation`.
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: std::time::Instant::now(),
        }
    }

    /// Log the elapsed time at info level and return it in milliseconds.
    pub fn finish(self) -> u128 {
        let duration = self.start.elapsed().as_millis();
        tracing::info!(
            operation = self.operation.as_str(),
            duration_ms = duration,
            "Operation completed"
        );
        duration
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            let duration = self.start.elapsed().as_millis();
            tracing::debug!(
                operation = self.operation.as_str(),
                duration_ms = duration,
                "Operation finished"
            );
        }
    }
}
