//! Tracing subscriber configuration for the boundary node.
//!
//! Log levels follow these conventions:
//! - ERROR: Unrecoverable failures
//! - WARN: Recoverable but unexpected (connection resets, write failures, evicted live paths)
//! - INFO: Lifecycle (interface up/down, node start, statistics summary)
//! - DEBUG: Routing decisions and drops
//! - TRACE: Wire-level bytes

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` when set, otherwise the configured level.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the human-readable tracing subscriber.
pub fn init(level: &str) {
    tracing_subscriber::fmt().with_env_filter(filter(level)).init();
}

/// Initialize the tracing subscriber with JSON output.
///
/// Activated by setting `RUST_LOG_FORMAT=json`.
pub fn init_json(level: &str) {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter(level))
        .init();
}

/// Initialize the tracing subscriber for tests.
///
/// Uses `try_init` to avoid panicking if called multiple times.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_test_writer()
        .try_init();
}
