//! Listening stream interface with a bounded set of connection slots.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use boundary_core::framing::hdlc::hdlc_frame;
use boundary_transport::interface::{InterfaceId, InterfaceMode};
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use super::connection::{Connection, Outbound, reset};
use super::{INBOUND_QUEUE, OUTBOUND_QUEUE, STREAM_BITRATE, StreamCounters, StreamServerConfig, StreamStats};
use crate::error::InterfaceError;
use crate::shutdown::{ShutdownToken, StopSignal};
use crate::traits::{ConnectionId, InboundFrame, Interface};

struct Slot {
    id: ConnectionId,
    outbound: mpsc::Sender<Outbound>,
}

/// Fixed-size slot array; a connection holds its slot until its task ends.
struct Slots {
    slots: StdMutex<Vec<Option<Slot>>>,
    next_id: AtomicU64,
}

impl Slots {
    fn new(capacity: usize) -> Self {
        Self {
            slots: StdMutex::new((0..capacity).map(|_| None).collect()),
            next_id: AtomicU64::new(1),
        }
    }

    fn claim(&self, outbound: mpsc::Sender<Outbound>) -> Option<ConnectionId> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let free = slots.iter_mut().find(|s| s.is_none())?;
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        *free = Some(Slot { id, outbound });
        Some(id)
    }

    fn release(&self, id: ConnectionId) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        for slot in slots.iter_mut() {
            if slot.as_ref().is_some_and(|s| s.id == id) {
                *slot = None;
            }
        }
    }

    fn active(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.iter().filter(|s| s.is_some()).count()
    }

    fn targets(&self, exclude: Option<ConnectionId>) -> Vec<(ConnectionId, mpsc::Sender<Outbound>)> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .iter()
            .flatten()
            .filter(|s| Some(s.id) != exclude)
            .map(|s| (s.id, s.outbound.clone()))
            .collect()
    }
}

/// A stream listener that multiplexes up to `max_clients` peers behind one
/// interface identity.
///
/// Packets received on any connection are tagged with its [`ConnectionId`],
/// so a rebroadcast on this interface can skip the connection it came from.
pub struct StreamServerInterface {
    config: StreamServerConfig,
    id: InterfaceId,
    local_addr: Mutex<Option<SocketAddr>>,
    slots: Arc<Slots>,
    counters: Arc<StreamCounters>,
    rx_sender: mpsc::Sender<InboundFrame>,
    rx_receiver: Mutex<mpsc::Receiver<InboundFrame>>,
    shutdown: Arc<ShutdownToken>,
}

impl StreamServerInterface {
    pub fn new(config: StreamServerConfig) -> Self {
        let (rx_sender, rx_receiver) = mpsc::channel(INBOUND_QUEUE);
        Self {
            id: InterfaceId::from_name(&config.name),
            slots: Arc::new(Slots::new(config.max_clients)),
            config,
            local_addr: Mutex::new(None),
            counters: Arc::new(StreamCounters::default()),
            rx_sender,
            rx_receiver: Mutex::new(rx_receiver),
            shutdown: Arc::new(ShutdownToken::new()),
        }
    }

    /// The bound address, once started.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Connections currently holding a slot.
    pub fn connection_count(&self) -> usize {
        self.slots.active()
    }

    pub fn stats(&self) -> StreamStats {
        self.counters.snapshot()
    }

    async fn accept_loop(
        listener: TcpListener,
        config: StreamServerConfig,
        slots: Arc<Slots>,
        counters: Arc<StreamCounters>,
        inbound: mpsc::Sender<InboundFrame>,
        shutdown: Arc<ShutdownToken>,
        mut stop: StopSignal,
    ) {
        let name: Arc<str> = Arc::from(config.name.as_str());
        loop {
            let (stream, peer) = tokio::select! {
                result = listener.accept() => match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("{}: accept error: {}", name, e);
                        continue;
                    }
                },
                _ = stop.stopped() => {
                    debug!("{}: accept loop stopping", name);
                    break;
                }
            };

            let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
            let Some(id) = slots.claim(outbound_tx) else {
                StreamCounters::bump(&counters.connections_rejected);
                warn!(
                    "{}: all {} slots in use, resetting connection from {}",
                    name, config.max_clients, peer
                );
                reset(stream);
                continue;
            };
            let _ = stream.set_nodelay(true);
            info!("{}: accepted connection {} from {}", name, id, peer);

            let connection = Connection {
                name: Arc::clone(&name),
                id,
                hw_mtu: config.hw_mtu,
                timeouts: config.timeouts,
                inbound: inbound.clone(),
                counters: Arc::clone(&counters),
            };
            let slots = Arc::clone(&slots);
            let task_name = Arc::clone(&name);
            let signal = stop.clone();
            let handle = tokio::spawn(async move {
                let end = connection.run(stream, outbound_rx, signal).await;
                slots.release(id);
                info!("{}: connection {} from {} ended: {}", task_name, id, peer, end);
            });
            shutdown.track(handle).await;
        }
    }
}

impl Interface for StreamServerInterface {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn id(&self) -> InterfaceId {
        self.id
    }

    fn mode(&self) -> InterfaceMode {
        self.config.mode
    }

    fn bitrate(&self) -> u64 {
        STREAM_BITRATE
    }

    fn hw_mtu(&self) -> usize {
        self.config.hw_mtu
    }

    fn is_connected(&self) -> bool {
        self.shutdown.is_online()
    }

    async fn start(&self) -> Result<(), InterfaceError> {
        if self.shutdown.is_online() {
            return Err(InterfaceError::AlreadyStarted);
        }
        if self.shutdown.is_stopped() {
            return Err(InterfaceError::Stopped);
        }
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let addr = listener.local_addr()?;
        info!("{}: listening on {}", self.config.name, addr);
        *self.local_addr.lock().await = Some(addr);
        self.shutdown.set_online(true);

        let handle = tokio::spawn(Self::accept_loop(
            listener,
            self.config.clone(),
            Arc::clone(&self.slots),
            Arc::clone(&self.counters),
            self.rx_sender.clone(),
            Arc::clone(&self.shutdown),
            self.shutdown.signal(),
        ));
        self.shutdown.track(handle).await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), InterfaceError> {
        self.shutdown.stop();
        self.shutdown.join().await;
        debug!("{}: stopped", self.config.name);
        Ok(())
    }

    async fn transmit(&self, data: &[u8], exclude: Option<ConnectionId>) -> Result<(), InterfaceError> {
        if !self.shutdown.is_online() {
            return Err(InterfaceError::NotConnected);
        }
        if data.len() > self.config.hw_mtu {
            return Err(InterfaceError::Oversized {
                len: data.len(),
                mtu: self.config.hw_mtu,
            });
        }

        let frame: Outbound = Arc::from(hdlc_frame(data));
        for (id, outbound) in self.slots.targets(exclude) {
            match outbound.try_send(Arc::clone(&frame)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    StreamCounters::bump(&self.counters.frames_dropped);
                    warn!("{}: queue full on connection {}, frame dropped", self.config.name, id);
                }
                // connection is ending; its slot is released shortly
                Err(TrySendError::Closed(_)) => {}
            }
        }
        Ok(())
    }

    async fn receive(&self) -> Result<InboundFrame, InterfaceError> {
        let mut rx = self.rx_receiver.lock().await;
        let mut stop = self.shutdown.signal();
        tokio::select! {
            biased;
            frame = rx.recv() => frame.ok_or(InterfaceError::Stopped),
            _ = stop.stopped() => Err(InterfaceError::Stopped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamTimeouts;
    use crate::testing;
    use boundary_core::framing::hdlc::KEEPALIVE_FRAME;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    const WAIT: Duration = Duration::from_secs(2);

    fn config() -> StreamServerConfig {
        let addr = "127.0.0.1:0".parse().expect("addr parse failed");
        StreamServerConfig::new("test-ap", addr)
    }

    async fn started(config: StreamServerConfig) -> (StreamServerInterface, SocketAddr) {
        let server = StreamServerInterface::new(config);
        server.start().await.expect("start failed");
        let addr = server.local_addr().await.expect("no local addr");
        (server, addr)
    }

    async fn wait_for_connections(server: &StreamServerInterface, n: usize) {
        for _ in 0..100 {
            if server.connection_count() == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {n} connections, have {}", server.connection_count());
    }

    fn packet(tag: u8) -> Vec<u8> {
        let mut p = vec![0u8; 40];
        p[2] = tag;
        p
    }

    async fn read_frame(client: &mut TcpStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        tokio::time::timeout(WAIT, client.read_exact(&mut buf))
            .await
            .expect("read timed out")
            .expect("read failed");
        buf
    }

    // === Lifecycle ===

    #[tokio::test]
    async fn test_conformance() {
        let server = StreamServerInterface::new(config());
        testing::assert_pre_start_conformance(&server).await;
        testing::assert_descriptor_matches(&server);
        server.start().await.expect("start failed");
        assert!(server.is_connected());
        testing::assert_stop_conformance(&server).await;
    }

    #[tokio::test]
    async fn test_declares_fixed_stream_mtu() {
        let server = StreamServerInterface::new(config());
        let d = server.descriptor();
        assert_eq!(d.hw_mtu, Some(1064));
        assert!(d.fixed_mtu);
        assert_eq!(d.bitrate, 10_000_000);
        assert_eq!(d.mode, InterfaceMode::AccessPoint);
    }

    // === Receive ===

    #[tokio::test]
    async fn test_receive_tags_connection() {
        let (server, addr) = started(config()).await;
        let mut client = TcpStream::connect(addr).await.expect("connect failed");
        client
            .write_all(&hdlc_frame(&packet(7)))
            .await
            .expect("write failed");

        let frame = tokio::time::timeout(WAIT, server.receive())
            .await
            .expect("receive timed out")
            .expect("receive failed");
        assert_eq!(frame.data, packet(7));
        assert!(frame.connection.is_some());
        server.stop().await.expect("stop failed");
    }

    #[tokio::test]
    async fn test_oversized_frame_discarded_connection_survives() {
        let (server, addr) = started(config()).await;
        let mut client = TcpStream::connect(addr).await.expect("connect failed");
        let mut bytes = hdlc_frame(&vec![0x33; 3000]);
        bytes.extend_from_slice(&hdlc_frame(&packet(9)));
        client.write_all(&bytes).await.expect("write failed");

        let frame = tokio::time::timeout(WAIT, server.receive())
            .await
            .expect("receive timed out")
            .expect("receive failed");
        assert_eq!(frame.data, packet(9));
        assert_eq!(server.stats().oversized_discarded, 1);
        assert_eq!(server.connection_count(), 1);
        server.stop().await.expect("stop failed");
    }

    // === Multiplexing ===

    #[tokio::test]
    async fn test_broadcast_skips_originating_connection() {
        let (server, addr) = started(config()).await;
        let mut a = TcpStream::connect(addr).await.expect("connect a failed");
        let mut b = TcpStream::connect(addr).await.expect("connect b failed");
        let mut k = TcpStream::connect(addr).await.expect("connect k failed");
        wait_for_connections(&server, 3).await;

        k.write_all(&hdlc_frame(&packet(1)))
            .await
            .expect("write failed");
        let frame = tokio::time::timeout(WAIT, server.receive())
            .await
            .expect("receive timed out")
            .expect("receive failed");

        server
            .transmit(&frame.data, frame.connection)
            .await
            .expect("transmit failed");

        let expected = hdlc_frame(&packet(1));
        assert_eq!(read_frame(&mut a, expected.len()).await, expected);
        assert_eq!(read_frame(&mut b, expected.len()).await, expected);
        let mut buf = [0u8; 64];
        let echoed = tokio::time::timeout(Duration::from_millis(200), k.read(&mut buf)).await;
        assert!(echoed.is_err(), "originating connection must not get its frame back");
        server.stop().await.expect("stop failed");
    }

    #[tokio::test]
    async fn test_connection_beyond_capacity_is_reset() {
        let mut cfg = config();
        cfg.max_clients = 2;
        let (server, addr) = started(cfg).await;
        let _a = TcpStream::connect(addr).await.expect("connect a failed");
        let _b = TcpStream::connect(addr).await.expect("connect b failed");
        wait_for_connections(&server, 2).await;

        let mut extra = TcpStream::connect(addr).await.expect("connect extra failed");
        let mut buf = [0u8; 8];
        let result = tokio::time::timeout(WAIT, extra.read(&mut buf))
            .await
            .expect("rejected connection should end promptly");
        assert!(matches!(result, Ok(0) | Err(_)));
        assert_eq!(server.connection_count(), 2);
        assert_eq!(server.stats().connections_rejected, 1);
        server.stop().await.expect("stop failed");
    }

    #[tokio::test]
    async fn test_slot_freed_when_peer_leaves() {
        let mut cfg = config();
        cfg.max_clients = 1;
        let (server, addr) = started(cfg).await;
        let first = TcpStream::connect(addr).await.expect("connect failed");
        wait_for_connections(&server, 1).await;
        drop(first);
        wait_for_connections(&server, 0).await;

        let _second = TcpStream::connect(addr).await.expect("reconnect failed");
        wait_for_connections(&server, 1).await;
        assert_eq!(server.stats().connections_rejected, 0);
        server.stop().await.expect("stop failed");
    }

    // === Timers ===

    #[tokio::test]
    async fn test_silent_connection_reset_after_read_timeout() {
        let mut cfg = config();
        cfg.timeouts = StreamTimeouts {
            read: Duration::from_millis(200),
            ..StreamTimeouts::default()
        };
        let (server, addr) = started(cfg).await;
        let _idle = TcpStream::connect(addr).await.expect("connect failed");
        wait_for_connections(&server, 1).await;
        wait_for_connections(&server, 0).await;
        assert_eq!(server.stats().connections_reset, 1);
        server.stop().await.expect("stop failed");
    }

    #[tokio::test]
    async fn test_idle_connection_gets_keepalive() {
        let mut cfg = config();
        cfg.timeouts = StreamTimeouts {
            keepalive: Duration::from_millis(100),
            ..StreamTimeouts::default()
        };
        let (server, addr) = started(cfg).await;
        let mut client = TcpStream::connect(addr).await.expect("connect failed");
        assert_eq!(read_frame(&mut client, 2).await, KEEPALIVE_FRAME.to_vec());
        server.stop().await.expect("stop failed");
    }

    #[tokio::test]
    async fn test_transmit_rejects_oversized() {
        let (server, _addr) = started(config()).await;
        let err = server
            .transmit(&vec![0u8; 2000], None)
            .await
            .expect_err("oversized transmit should fail");
        assert!(matches!(err, InterfaceError::Oversized { len: 2000, mtu: 1064 }));
        server.stop().await.expect("stop failed");
    }
}
