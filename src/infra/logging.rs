//! # Logging Module
//!
//! Diagnostic logging via `tracing`. Operator-facing progress goes through
//! `reporting::console`; these logs are for debugging the pipeline itself and
//! are written to stderr.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Installs the global subscriber once. `RUST_LOG` takes precedence; otherwise
/// the crate logs at `debug` when `verbose` is set and at `warn` by default.
pub fn init_logging(verbose: bool) {
    INIT.call_once(|| {
        let default_level = if verbose { "debug" } else { "warn" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("warn,findword_pipeline={default_level}"))
        });

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbose)
                    .compact(),
            )
            .try_init();
    });
}
