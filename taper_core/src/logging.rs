//! Tracing setup for the `taper` binary.
//!
//! Plans are written to stdout as tables, JSON or CSV, and those streams
//! are piped into other tools. Diagnostics therefore go to stderr only and
//! stay quiet unless RUST_LOG asks for more.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the stderr subscriber at WARN
///
/// Strategy decisions are logged at DEBUG; `RUST_LOG=taper_core=debug`
/// shows why each step was chosen.
pub fn init() {
    init_with_level("warn")
}

/// Install the stderr subscriber with `default_level` unless RUST_LOG is set
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// Route plan-generation logs into the test harness output
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
