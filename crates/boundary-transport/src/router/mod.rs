//! The boundary router: tables, forwarding policy and header rewrites.

pub mod constants;
mod discovery;
pub mod dispatch;
mod relay;
pub mod rewrite;
pub mod stats;
pub mod tables;
pub mod types;

pub use dispatch::{Router, RouterConfig};
pub use stats::RouterStats;
pub use types::{DropReason, LinkEntry, ReverseEntry, RouterAction};
