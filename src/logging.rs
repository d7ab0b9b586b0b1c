//! Diagnostic logging.
//!
//! Diagnostics go to stderr through `tracing`, separate from the
//! user-facing status line and report. `RUST_LOG` takes precedence over the
//! verbosity flag.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{GuardError, Result};

/// Install the global subscriber. Call once at startup.
///
/// Logs at `warn` by default and at `debug` when `verbose` is set.
pub fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("token_guard={default_level}")));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| GuardError::Logging(e.to_string()))?;

    tracing::debug!(verbose, "logging initialized");
    Ok(())
}
