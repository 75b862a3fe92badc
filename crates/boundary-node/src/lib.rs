//! Node orchestration for the boundary router.
//!
//! This crate ties the router to its interfaces: configuration, the announce
//! cache on disk, logging, and the single event loop that owns all routing
//! state.

pub mod cache_store;
pub mod config;
pub mod error;
pub mod interface_enum;
pub mod logging;
pub mod node;

pub use cache_store::FileCacheStore;
pub use config::NodeConfig;
pub use error::NodeError;
pub use interface_enum::AnyInterface;
pub use node::{Node, ShutdownHandle};
