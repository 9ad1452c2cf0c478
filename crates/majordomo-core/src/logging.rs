//! Structured logging setup using `tracing-subscriber` and `tracing-appender`.
//!
//! Two modes:
//! - **Daemon** ([`init_daemon`]): JSON file layer (daily rotation, capped file
//!   count) + human-readable console layer on stderr
//! - **CLI** ([`init_cli`]): console-only for one-shot subcommands

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LogRotationConfig;

/// Holds the non-blocking writer guard for file logging.
///
/// Must be kept alive for the duration of the process; dropping it flushes
/// pending log entries and closes the file.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Initialise logging for the daemon.
///
/// Writes JSON log lines to `{log_dir}/majordomo.log.YYYY-MM-DD`, rotated
/// daily and pruned to `rotation.max_files` files. Console output goes to
/// stderr at `level` unless `RUST_LOG` overrides it.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or the appender
/// cannot be built.
pub fn init_daemon(
    log_dir: &Path,
    level: &str,
    rotation: &LogRotationConfig,
) -> crate::error::Result<LoggingGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("majordomo.log")
        .max_log_files(rotation.max_files)
        .build(log_dir)
        .map_err(|e| crate::error::MajordomoError::Config(format!("log appender: {e}")))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking);

    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(console_layer)
        .init();

    Ok(LoggingGuard { _guard: guard })
}

/// Console-only logging for one-shot subcommands. Controlled by `RUST_LOG`
/// (default: `info`).
pub fn init_cli() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
