//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info,renderer=debug,deferred_viewer=debug";

/// Initialize the logging system with tracing.
///
/// Filtering comes from `RUST_LOG` when set, otherwise [`DEFAULT_FILTER`].
/// Vulkan validation output is routed through the same subscriber by the
/// debug messenger in `renderer_rhi`.
///
/// # Example
/// ```
/// renderer_core::init_logging();
/// tracing::info!("Renderer initialized");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A second call (e.g. from several tests in one process) must not panic.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
