//! Error types for the node orchestrator.

use boundary_interfaces::InterfaceError;
use boundary_transport::{CacheStoreError, RouterError};

/// Errors that can occur during node startup and operation.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("interface error: {0}")]
    Interface(#[from] InterfaceError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("router error: {0}")]
    Router(#[from] RouterError),
    #[error("cache store error: {0}")]
    CacheStore(#[from] CacheStoreError),
    #[error("node not started")]
    NotStarted,
    #[error("node already running")]
    AlreadyRunning,
}
