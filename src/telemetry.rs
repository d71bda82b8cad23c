//! Tracing initialization for the binary.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber. Quiet by default; turn events on
/// with RUST_LOG (e.g. RUST_LOG=sportello=info). Safe to call more than
/// once.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
