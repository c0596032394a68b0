//! Logging setup for the sensor bridge

use env_logger::Env;

/// Initializes env_logger, defaulting to `info` when RUST_LOG is unset.
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();
    log::info!("Logging initialized");
}
