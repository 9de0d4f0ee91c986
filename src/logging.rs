use std::path::Path;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Installs the global tracing subscriber: pretty/verbose to stderr under
/// `--debug`, otherwise JSON to stderr, plus a non-rolling file layer
/// writing to `log_file`.
///
/// Returns the `tracing_appender` guard; it must be held for the life of the
/// process or buffered log lines are lost on drop.
pub fn init(log_file: &Path, debug: bool) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_file)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .json();

    let stderr_layer = if debug {
        fmt::layer().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).json().boxed()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug {
            Level::TRACE.to_string()
        } else {
            Level::INFO.to_string()
        })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
