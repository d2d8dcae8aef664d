//! Logging setup.
//!
//! Stdout carries command output, so logs go to a daily-rolling file under
//! the data directory. `RUST_LOG` overrides the default `info` level.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_PREFIX: &str = "worklog.log";

/// Start writing logs to `<dir>/worklog.log.<date>`.
///
/// Logs are flushed by a background worker; keep the returned guard alive
/// until exit or the tail of the log is lost.
pub fn init(dir: &Path) -> Result<WorkerGuard> {
  init_with_level(dir, "info")
}

pub fn init_with_level(dir: &Path, default_level: &str) -> Result<WorkerGuard> {
  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
