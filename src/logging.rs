//! Tracing subscriber initialisation.

use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Safe to call more
/// than once; later calls are no-ops.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
