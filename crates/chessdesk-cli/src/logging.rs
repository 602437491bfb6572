//! File logging under `${CHESSDESK_HOME}/logs`.
//!
//! stdout belongs to the presenter, so logs go to `chessdesk.log`. `-v` adds
//! a stderr layer. `CHESSDESK_LOG` overrides the filter.

use anyhow::{Context, Result};
use chessdesk_core::config::paths;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_ENV: &str = "CHESSDESK_LOG";
const DEFAULT_FILTER: &str = "chessdesk=info";

/// Installs the global subscriber. Keep the guard alive until exit so
/// buffered lines are flushed.
///
/// # Errors
/// Returns an error if the log directory cannot be created.
pub fn init(verbose: bool) -> Result<WorkerGuard> {
    let dir = paths::logs_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("chessdesk.log")
        .build(&dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let stderr = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .with(stderr)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}
