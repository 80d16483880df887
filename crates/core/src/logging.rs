//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Directives used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info,vulkanisch=debug,naga=warn";

/// Install the global tracing subscriber.
///
/// Filtering follows `RUST_LOG` and falls back to [`DEFAULT_FILTER`]. Events
/// carry their target and thread id. A second call leaves the first
/// subscriber in place.
///
/// # Example
/// ```no_run
/// vulkanisch_core::init_logging();
/// tracing::info!("Renderer initialized");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
