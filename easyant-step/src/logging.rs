//! Logging initialization.
//!
//! Structured logging via `tracing`: a human-readable stderr layer plus an
//! optional JSON file layer with a non-blocking writer. Binaries call
//! `init_logging(&LogConfig::from_env("info").with_stderr())` once at
//! startup and hold the returned guards for the process lifetime.

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable selecting the log level / filter directives.
pub const LOG_LEVEL_VAR: &str = "EASYANT_LOG";

/// Environment variable selecting an optional log file path.
pub const LOG_FILE_VAR: &str = "EASYANT_LOG_FILE";

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    level: String,
    stderr: bool,
    file: Option<PathBuf>,
}

impl LogConfig {
    /// Build from the environment with a fallback level.
    pub fn from_env(default_level: &str) -> Self {
        Self {
            level: std::env::var(LOG_LEVEL_VAR).unwrap_or_else(|_| default_level.to_string()),
            stderr: false,
            file: std::env::var(LOG_FILE_VAR).ok().map(PathBuf::from),
        }
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn level(&self) -> &str {
        &self.level
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// leave the first subscriber in place.
pub fn init_logging(config: &LogConfig) -> Result<Vec<WorkerGuard>> {
    let mut guards = Vec::new();

    let filter =
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = config.stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .compact()
    });

    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            guards.push(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer),
            )
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(guards)
}
