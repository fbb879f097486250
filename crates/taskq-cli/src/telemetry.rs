//! Log subscriber setup.
//!
//! Filter comes from `TASKQ_LOG` (same syntax as `RUST_LOG`); without it,
//! `info` or `debug` depending on `--verbose`. Logs go to stderr so command
//! output on stdout stays clean.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "TASKQ_LOG";

pub fn init_telemetry(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
