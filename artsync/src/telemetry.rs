//! Tracing initialization.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber with env-filter support.
///
/// Safe to call more than once; later calls are no-ops. Intended for
/// binaries and integration tests.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
