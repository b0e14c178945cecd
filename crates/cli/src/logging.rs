//! Logging utilities for CLI commands and the service host

use std::path::Path;

use ccr::config::Config;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Log file name inside `<home>/logs`
const LOG_FILE_NAME: &str = "ccr.log";

/// Initialize logging for CLI commands (stderr only).
///
/// User-facing output goes through `println!`, so only warnings show by default.
pub fn init_cli_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(tracing::Level::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();
}

/// `LOG_LEVEL` as a filter; unrecognized values fall back to info
fn service_level(config: &Config) -> LevelFilter {
  config.log_level.trim().parse().unwrap_or(LevelFilter::INFO)
}

/// Initialize logging for the service host with config-driven settings.
///
/// With `LOG` enabled: daily rolling file under `<home>/logs` (no ANSI).
/// Otherwise: console only.
///
/// Returns the guard that must be kept alive for the duration of the program
pub fn init_service_logging(config: &Config, home: &Path) -> Option<WorkerGuard> {
  // RUST_LOG overrides LOG_LEVEL
  let env_filter = EnvFilter::builder()
    .with_default_directive(service_level(config).into())
    .from_env_lossy();

  if !config.log {
    tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_writer(std::io::stderr)
      .with_target(true)
      .init();
    return None;
  }

  let log_dir = ccr::dirs::log_dir(home);
  if std::fs::create_dir_all(&log_dir).is_err() {
    // Fall back to console-only logging
    init_cli_logging();
    return None;
  }

  let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(true)
    .with_ansi(false)
    .with_writer(file_writer)
    .init();

  Some(guard)
}
