//! Unified enum wrapping all concrete interface types for static dispatch.

use boundary_interfaces::{
    ConnectionId, InboundFrame, Interface, InterfaceError, RadioInterface, StreamClientInterface,
    StreamServerInterface, UdpRadioDriver,
};
use boundary_transport::{InterfaceDescriptor, InterfaceId, InterfaceMode};

/// Wraps all concrete interface types, dispatching trait methods via match.
pub enum AnyInterface {
    Radio(RadioInterface<UdpRadioDriver>),
    StreamClient(StreamClientInterface),
    StreamServer(StreamServerInterface),
}

/// Delegate a sync method that returns a concrete (non-opaque) type.
macro_rules! delegate_sync {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Radio(i) => i.$method($($arg),*),
            Self::StreamClient(i) => i.$method($($arg),*),
            Self::StreamServer(i) => i.$method($($arg),*),
        }
    };
}

/// Delegate an async trait method and await it.
macro_rules! delegate_async {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Radio(i) => i.$method($($arg),*).await,
            Self::StreamClient(i) => i.$method($($arg),*).await,
            Self::StreamServer(i) => i.$method($($arg),*).await,
        }
    };
}

impl AnyInterface {
    pub fn name(&self) -> &str {
        delegate_sync!(self, name)
    }

    pub fn id(&self) -> InterfaceId {
        delegate_sync!(self, id)
    }

    pub fn mode(&self) -> InterfaceMode {
        delegate_sync!(self, mode)
    }

    pub fn can_receive(&self) -> bool {
        delegate_sync!(self, can_receive)
    }

    pub fn is_connected(&self) -> bool {
        delegate_sync!(self, is_connected)
    }

    pub fn descriptor(&self) -> InterfaceDescriptor {
        delegate_sync!(self, descriptor)
    }

    /// Frames this interface discarded as oversized or truncated.
    pub fn malformed_frames(&self) -> u64 {
        match self {
            Self::Radio(i) => i.stats().malformed(),
            Self::StreamClient(i) => i.stats().malformed(),
            Self::StreamServer(i) => i.stats().malformed(),
        }
    }

    pub async fn start(&self) -> Result<(), InterfaceError> {
        delegate_async!(self, start)
    }

    pub async fn stop(&self) -> Result<(), InterfaceError> {
        delegate_async!(self, stop)
    }

    pub async fn transmit(
        &self,
        data: &[u8],
        exclude: Option<ConnectionId>,
    ) -> Result<(), InterfaceError> {
        delegate_async!(self, transmit, data, exclude)
    }

    pub async fn receive(&self) -> Result<InboundFrame, InterfaceError> {
        delegate_async!(self, receive)
    }
}

impl std::fmt::Debug for AnyInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AnyInterface({})", self.name())
    }
}
