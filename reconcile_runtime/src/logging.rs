//! Tracing subscriber setup for processes embedding the driver.

use tracing_subscriber::EnvFilter;

/// Map a configured level onto a filter directive, defaulting to `info`.
fn fallback_level(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Install a global fmt subscriber. `RUST_LOG` wins over `level`.
///
/// Returns false if a subscriber was already installed.
pub fn init_logging(level: &str) -> bool {
    let fallback = fallback_level(level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
