//! The task that owns one stream connection.
//!
//! A connection task reads and deframes inbound bytes, writes queued
//! outbound frames, sends keepalives while idle and watches the read
//! deadline. Any failure ends the task with an abrupt reset.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use boundary_core::framing::hdlc::KEEPALIVE_FRAME;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use super::{STREAM_RECV_BUFFER, StreamCounters, StreamTimeouts};
use crate::framing::{Deframed, FrameDeframer};
use crate::shutdown::StopSignal;
use crate::traits::{ConnectionId, InboundFrame};

/// An HDLC-framed packet shared by every connection it is written to.
pub(crate) type Outbound = Arc<[u8]>;

/// Why a connection task ended.
#[derive(Debug)]
pub(crate) enum ConnectionEnd {
    /// The peer closed the stream.
    Closed,
    ReadTimeout,
    ReadFailed(io::Error),
    WriteFailed(io::Error),
    /// The interface is stopping or its consumer went away.
    Stopped,
}

impl ConnectionEnd {
    fn needs_reset(&self) -> bool {
        !matches!(self, ConnectionEnd::Closed)
    }
}

impl fmt::Display for ConnectionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEnd::Closed => write!(f, "closed by peer"),
            ConnectionEnd::ReadTimeout => write!(f, "read timeout"),
            ConnectionEnd::ReadFailed(e) => write!(f, "read failed: {e}"),
            ConnectionEnd::WriteFailed(e) => write!(f, "write failed: {e}"),
            ConnectionEnd::Stopped => write!(f, "stopped"),
        }
    }
}

/// Everything a connection task needs besides its socket.
pub(crate) struct Connection {
    pub name: Arc<str>,
    pub id: ConnectionId,
    pub hw_mtu: usize,
    pub timeouts: StreamTimeouts,
    pub inbound: mpsc::Sender<InboundFrame>,
    pub counters: Arc<StreamCounters>,
}

impl Connection {
    /// Serve `stream` until it fails, the peer closes, or stop is signalled.
    pub async fn run(
        self,
        mut stream: TcpStream,
        mut outbound: mpsc::Receiver<Outbound>,
        mut stop: StopSignal,
    ) -> ConnectionEnd {
        let mut deframer = FrameDeframer::new(self.hw_mtu);
        let mut buf = vec![0u8; STREAM_RECV_BUFFER];
        let mut read_deadline = Instant::now() + self.timeouts.read;
        let mut keepalive = tokio::time::interval_at(
            Instant::now() + self.timeouts.keepalive,
            self.timeouts.keepalive,
        );
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            tokio::select! {
                result = stream.read(&mut buf) => {
                    let n = match result {
                        Ok(0) => break ConnectionEnd::Closed,
                        Ok(n) => n,
                        Err(e) => break ConnectionEnd::ReadFailed(e),
                    };
                    trace!("{}: {} read {} bytes", self.name, self.id, n);
                    read_deadline = Instant::now() + self.timeouts.read;
                    if !self.deliver(deframer.feed(&buf[..n])).await {
                        break ConnectionEnd::Stopped;
                    }
                }
                _ = tokio::time::sleep_until(read_deadline) => {
                    break ConnectionEnd::ReadTimeout;
                }
                frame = outbound.recv() => {
                    let Some(frame) = frame else {
                        break ConnectionEnd::Stopped;
                    };
                    if let Err(e) = write_frame(&mut stream, &frame, self.timeouts.write).await {
                        break ConnectionEnd::WriteFailed(e);
                    }
                    keepalive.reset();
                }
                _ = keepalive.tick() => {
                    if let Err(e) = write_frame(&mut stream, &KEEPALIVE_FRAME, self.timeouts.write).await {
                        break ConnectionEnd::WriteFailed(e);
                    }
                    trace!("{}: {} keepalive sent", self.name, self.id);
                }
                _ = stop.stopped() => break ConnectionEnd::Stopped,
            }
        };

        if end.needs_reset() {
            if !matches!(end, ConnectionEnd::Stopped) {
                StreamCounters::bump(&self.counters.connections_reset);
                warn!("{}: resetting connection {}: {}", self.name, self.id, end);
            }
            reset(stream);
        }
        end
    }

    /// Hand deframed packets to the node. Returns false once nobody is
    /// listening.
    async fn deliver(&self, frames: Vec<Deframed>) -> bool {
        for frame in frames {
            match frame {
                Deframed::Packet(data) => {
                    StreamCounters::bump(&self.counters.frames_received);
                    let inbound = InboundFrame {
                        data,
                        connection: Some(self.id),
                    };
                    if self.inbound.send(inbound).await.is_err() {
                        return false;
                    }
                }
                Deframed::Oversized { len } => {
                    StreamCounters::bump(&self.counters.oversized_discarded);
                    warn!(
                        "{}: discarded {}-byte frame on {} (MTU {})",
                        self.name, len, self.id, self.hw_mtu
                    );
                }
                Deframed::Runt { len } => {
                    StreamCounters::bump(&self.counters.runts_discarded);
                    debug!("{}: discarded {}-byte runt frame on {}", self.name, len, self.id);
                }
            }
        }
        true
    }
}

async fn write_frame(stream: &mut TcpStream, frame: &[u8], limit: Duration) -> io::Result<()> {
    match tokio::time::timeout(limit, stream.write_all(frame)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
    }
}

/// Close with SO_LINGER 0 so the kernel sends RST and frees the socket's
/// buffers at once instead of lingering in FIN_WAIT.
pub(crate) fn reset(stream: TcpStream) {
    if let Err(e) = socket2::SockRef::from(&stream).set_linger(Some(Duration::ZERO)) {
        debug!("failed to set SO_LINGER on reset: {}", e);
    }
    drop(stream);
}
