//! Interfaces for the boundary router.
//!
//! Two transports implement [`Interface`]:
//!
//! - [`stream`]: HDLC-framed TCP, as a multiplexing listener or a dialling
//!   client with reconnect backoff;
//! - [`radio`]: a narrow datagram link behind a [`radio::RadioDriver`].
//!
//! Each interface runs its I/O in tasks on the caller's runtime and hands
//! deframed packets out through [`Interface::receive`].

pub mod error;
pub mod framing;
pub mod radio;
pub mod shutdown;
pub mod stream;
pub mod testing;
pub mod traits;

pub use error::InterfaceError;
pub use framing::{Deframed, FrameDeframer};
pub use radio::{ChannelRadioDriver, RadioConfig, RadioDriver, RadioInterface, RadioStats, UdpRadioDriver};
pub use shutdown::{ShutdownToken, StopSignal};
pub use stream::{
    StreamClientConfig, StreamClientInterface, StreamServerConfig, StreamServerInterface,
    StreamStats, StreamTimeouts,
};
pub use traits::{ConnectionId, InboundFrame, Interface};
