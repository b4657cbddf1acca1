//! Structured logging for the dispatch pipeline.
//!
//! The serving path writes JSON lines to a daily-rotated file and mirrors
//! human-readable output to stderr; one-shot administrative subcommands log
//! to stderr only. `RUST_LOG` controls the level in both modes (default
//! `info`).

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the non-blocking file writer alive.
///
/// Dropping the guard flushes pending entries, so the process entry point
/// must hold it until exit. CLI mode carries no file writer but returns the
/// same guard type so both modes are handled uniformly.
pub struct LoggingGuard {
    _file_writer: Option<WorkerGuard>,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialise logging for the serving path.
///
/// JSON lines go to `{logs_dir}/courier.log.YYYY-MM-DD` with daily rotation;
/// a compact human-readable layer mirrors events to stderr.
///
/// # Errors
///
/// Returns an error if the logs directory cannot be created.
pub fn init_production(logs_dir: &Path) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir).map_err(|e| {
        anyhow::anyhow!(
            "failed to create logs directory {}: {e}",
            logs_dir.display()
        )
    })?;

    let appender = tracing_appender::rolling::daily(logs_dir, "courier.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(false)
        .with_writer(writer);
    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(LoggingGuard {
        _file_writer: Some(guard),
    })
}

/// Initialise stderr-only logging for one-shot subcommands.
pub fn init_cli() -> LoggingGuard {
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
    LoggingGuard { _file_writer: None }
}
