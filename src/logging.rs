//! Logging initialization for octoform.
//!
//! Logs go to stderr unless `logging.to_file` is set, in which case they are
//! written to `{logs_path}/octoform-{datetime}.log`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Guard that must be kept alive for the duration of the program.
    /// When dropped, ensures all buffered logs are flushed.
    pub _guard: Option<WorkerGuard>,

    /// Path to the log file (only set with file logging enabled)
    pub log_file_path: Option<PathBuf>,
}

/// Level filter directive: `--debug` wins over the configured level
fn level_directive(config: &Config, debug_override: bool) -> String {
    if debug_override {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    }
}

/// Log filename with an ISO8601 timestamp
fn log_file_name(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("octoform-{}.log", now.format("%Y%m%dT%H%M%SZ"))
}

fn log_file_path(logs_dir: &Path, now: chrono::DateTime<chrono::Utc>) -> PathBuf {
    logs_dir.join(log_file_name(now))
}

/// Initialize logging from configuration.
///
/// `RUST_LOG` takes precedence over both the configured level and `--debug`.
/// The returned handle must be kept alive for the duration of the program.
pub fn init_logging(config: &Config, debug_override: bool) -> Result<LoggingHandle> {
    let log_level = level_directive(config, debug_override);
    let filter =
        tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or(log_level));

    if config.logging.to_file {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;

        let now = chrono::Utc::now();
        let log_filename = log_file_name(now);
        let log_file_path = log_file_path(&logs_dir, now);

        let file_appender = tracing_appender::rolling::never(&logs_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false) // No ANSI codes in log files
                    .with_writer(non_blocking),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}
