use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, fmt::time::ChronoLocal, prelude::*};

const TIMESTAMP_FORMAT: &str = "[%Y-%m-%d %H:%M:%S]";

/// Send log lines to the console and to `log_path`.
///
/// Keep the returned guard alive until the run ends; dropping it flushes
/// the file.
pub fn init(log_path: &Path) -> Result<WorkerGuard> {
    let dir = log_path
        .parent()
        .context("log file path has no parent directory")?;
    let file_name = log_path
        .file_name()
        .context("log file path has no file name")?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_target(false)
        .with_level(false);

    let file = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_target(false)
        .with_level(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(guard)
}
