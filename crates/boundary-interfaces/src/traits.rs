//! The interface contract the node drives.

use std::fmt;

use boundary_transport::interface::{InterfaceDescriptor, InterfaceId, InterfaceMode};

use crate::error::InterfaceError;

/// One peer connection within a multiplexed interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A deframed packet and the connection it arrived on, if the interface
/// multiplexes connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub data: Vec<u8>,
    pub connection: Option<ConnectionId>,
}

/// Async interface implemented by the stream and radio transports.
///
/// I/O runs in tasks spawned by `start()`; the node only calls `transmit`
/// and `receive`.
pub trait Interface: Send + Sync {
    fn name(&self) -> &str;

    /// Identity derived from the name; see [`InterfaceId::from_name`].
    fn id(&self) -> InterfaceId;

    fn mode(&self) -> InterfaceMode;

    /// Bits per second, as compared by path preference.
    fn bitrate(&self) -> u64;

    /// Largest frame the interface carries.
    fn hw_mtu(&self) -> usize;

    /// Whether `hw_mtu` is a hard limit link MTU negotiation must honour.
    fn fixed_mtu(&self) -> bool {
        true
    }

    fn can_receive(&self) -> bool {
        true
    }

    fn can_transmit(&self) -> bool {
        true
    }

    fn is_connected(&self) -> bool;

    /// The properties the router's policy needs.
    fn descriptor(&self) -> InterfaceDescriptor {
        let mut descriptor = InterfaceDescriptor::new(self.name(), self.mode(), self.bitrate());
        descriptor.hw_mtu = Some(self.hw_mtu());
        descriptor.fixed_mtu = self.fixed_mtu();
        descriptor.can_receive = self.can_receive();
        descriptor.can_transmit = self.can_transmit();
        descriptor
    }

    fn start(&self) -> impl Future<Output = Result<(), InterfaceError>> + Send;

    /// Stop every task and drop every connection. Calling it twice is harmless.
    fn stop(&self) -> impl Future<Output = Result<(), InterfaceError>> + Send;

    /// Send one packet. A multiplexed interface writes it to every connection
    /// except `exclude`.
    fn transmit(
        &self,
        data: &[u8],
        exclude: Option<ConnectionId>,
    ) -> impl Future<Output = Result<(), InterfaceError>> + Send;

    /// The next deframed packet. Fails with [`InterfaceError::Stopped`] once
    /// the interface has stopped and its queue is drained.
    fn receive(&self) -> impl Future<Output = Result<InboundFrame, InterfaceError>> + Send;
}
