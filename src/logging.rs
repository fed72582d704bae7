//! Tracing setup: a daily rolling file appender plus a stdout layer, both filtered
//! through `RUST_LOG` via `EnvFilter`.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::Result;

/// Initializes the global tracing subscriber. The returned [`WorkerGuard`] must be held
/// for the lifetime of the process; dropping it flushes and stops the background
/// writer thread, so callers keep it bound in `main`.
pub fn init_logging(log_dir: impl AsRef<Path>) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir.as_ref(), "evocrate.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = fmt::layer().with_target(false).with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(guard)
}
