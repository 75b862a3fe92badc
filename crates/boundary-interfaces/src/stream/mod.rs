//! Framed reliable-stream interface.
//!
//! [`StreamServerInterface`] listens and multiplexes a bounded set of
//! connections; [`StreamClientInterface`] dials one peer and reconnects with
//! exponential backoff. Both carry HDLC-stuffed packets, deframed per
//! connection by [`FrameDeframer`](crate::framing::FrameDeframer).

pub mod client;
mod connection;
pub mod server;

pub use client::{Backoff, ResolvedAddr, StreamClientInterface};
pub use server::StreamServerInterface;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use boundary_transport::interface::InterfaceMode;

// ---------------------------------------------------------------------------
// Declared capabilities and defaults
// ---------------------------------------------------------------------------

/// Declared link bitrate (10 Mbps), so paths over the stream win ties
/// against radio.
pub const STREAM_BITRATE: u64 = 10_000_000;

/// Hardware MTU of a stream interface.
pub const STREAM_HW_MTU: usize = 1064;

pub const DEFAULT_PORT: u16 = 4242;

pub const DEFAULT_MAX_CLIENTS: usize = 8;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(6);
pub const READ_TIMEOUT: Duration = Duration::from_secs(120);
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(2);
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

pub const RECONNECT_MIN: Duration = Duration::from_secs(10);
pub const RECONNECT_MAX: Duration = Duration::from_secs(120);

/// Longest hostname accepted for a dialled peer.
pub const MAX_HOST_LEN: usize = 63;

/// Size of the socket read buffer.
pub const STREAM_RECV_BUFFER: usize = 4096;

/// Frames queued per connection before further frames for it are dropped.
pub const OUTBOUND_QUEUE: usize = 32;

/// Deframed packets queued between the interface and the node.
pub const INBOUND_QUEUE: usize = 64;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Per-connection timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTimeouts {
    pub connect: Duration,
    /// Inbound silence after which a connection is reset.
    pub read: Duration,
    /// Bound on one frame write; exceeding it resets the connection.
    pub write: Duration,
    pub keepalive: Duration,
}

impl Default for StreamTimeouts {
    fn default() -> Self {
        Self {
            connect: CONNECT_TIMEOUT,
            read: READ_TIMEOUT,
            write: WRITE_TIMEOUT,
            keepalive: KEEPALIVE_INTERVAL,
        }
    }
}

/// Configuration for a [`StreamClientInterface`].
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub mode: InterfaceMode,
    pub timeouts: StreamTimeouts,
    pub reconnect_min: Duration,
    pub reconnect_max: Duration,
    pub hw_mtu: usize,
}

impl StreamClientConfig {
    /// A backbone uplink: boundary mode, default timers.
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            mode: InterfaceMode::Boundary,
            timeouts: StreamTimeouts::default(),
            reconnect_min: RECONNECT_MIN,
            reconnect_max: RECONNECT_MAX,
            hw_mtu: STREAM_HW_MTU,
        }
    }
}

/// Configuration for a [`StreamServerInterface`].
#[derive(Debug, Clone)]
pub struct StreamServerConfig {
    pub name: String,
    pub bind_addr: SocketAddr,
    pub mode: InterfaceMode,
    pub max_clients: usize,
    pub timeouts: StreamTimeouts,
    pub hw_mtu: usize,
}

impl StreamServerConfig {
    /// A local access-point listener with default limits.
    pub fn new(name: impl Into<String>, bind_addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            bind_addr,
            mode: InterfaceMode::AccessPoint,
            max_clients: DEFAULT_MAX_CLIENTS,
            timeouts: StreamTimeouts::default(),
            hw_mtu: STREAM_HW_MTU,
        }
    }
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct StreamCounters {
    pub frames_received: AtomicU64,
    pub oversized_discarded: AtomicU64,
    pub runts_discarded: AtomicU64,
    pub connections_reset: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub frames_dropped: AtomicU64,
}

impl StreamCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StreamStats {
        StreamStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            oversized_discarded: self.oversized_discarded.load(Ordering::Relaxed),
            runts_discarded: self.runts_discarded.load(Ordering::Relaxed),
            connections_reset: self.connections_reset.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a stream interface's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames_received: u64,
    pub oversized_discarded: u64,
    pub runts_discarded: u64,
    /// Connections torn down by reset after a timeout or write failure.
    pub connections_reset: u64,
    /// Connections refused because every slot was taken.
    pub connections_rejected: u64,
    /// Outbound frames dropped on a full connection queue.
    pub frames_dropped: u64,
}

impl StreamStats {
    /// Frames discarded as malformed.
    pub fn malformed(&self) -> u64 {
        self.oversized_discarded + self.runts_discarded
    }
}
