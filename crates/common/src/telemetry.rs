//! Logging initialization for the sqlyard service.
//!
//! Sets up a `tracing` subscriber with an `EnvFilter`-driven stdout layer.
//! Structured events use targets (`cache`, `executor`) so deployments can
//! raise or silence individual subsystems via `RUST_LOG`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber. Safe to call more than once; later
/// calls are no-ops (tests share one process).
pub fn init_tracing() {
    let stdout_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(stdout_layer)
        .try_init()
        .ok();
}
