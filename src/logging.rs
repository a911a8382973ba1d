//! Tracing subscriber setup
//!
//! The library only emits `tracing` events; binaries and tests call [`init`]
//! once to print them. `RUST_LOG` takes precedence over the level passed in.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber. Safe to call more than once.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("farsiflix_core={}", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
