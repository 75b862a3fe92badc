//! Routing and forwarding for the boundary router.
//!
//! The [`router::Router`] owns every table (paths, links, reverse entries,
//! pending path requests, packet dedup) and turns one inbound frame into a
//! list of [`router::RouterAction`]s. All tables are capacity-bounded; the
//! [`janitor::Janitor`] culls one of them per elapsed interval.

pub mod cache;
pub mod dedup;
pub mod error;
pub mod interface;
pub mod janitor;
pub mod mtu;
pub mod path;
pub mod router;

pub use cache::{CacheStore, CachedPacket, MemoryCacheStore, NoopCacheStore};
pub use error::{CacheStoreError, PathError, RouterError};
pub use interface::{InterfaceDescriptor, InterfaceId, InterfaceMode, InterfaceRegistry};
pub use janitor::{CullTarget, Janitor};
pub use router::{DropReason, Router, RouterAction, RouterConfig, RouterStats};
