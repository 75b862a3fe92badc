//! Wire types for the boundary router.
//!
//! This crate defines the packet envelope the router inspects (flags, hops,
//! transport id, destination, context), the hash newtypes used as table keys,
//! and the HDLC byte-stuffing used on stream interfaces. Payloads are opaque.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod constants;
pub mod error;
pub mod framing;
pub mod packet;
pub mod types;

pub use constants::{DestinationType, HeaderType, PacketType, TransportType};
pub use error::{FramingError, PacketError};
pub use packet::context::ContextType;
pub use packet::flags::PacketFlags;
pub use packet::wire::RawPacket;
pub use types::{DestinationHash, FullHash, InvalidLength, LinkId, PacketHash, TruncatedHash};
