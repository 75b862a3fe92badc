//! Dialling stream interface with backoff and a resolved-address cache.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use boundary_core::framing::hdlc::hdlc_frame;
use boundary_transport::interface::{InterfaceId, InterfaceMode};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::connection::{Connection, Outbound};
use super::{
    INBOUND_QUEUE, MAX_HOST_LEN, OUTBOUND_QUEUE, STREAM_BITRATE, StreamClientConfig,
    StreamCounters, StreamStats,
};
use crate::error::InterfaceError;
use crate::shutdown::{ShutdownToken, StopSignal};
use crate::traits::{ConnectionId, InboundFrame, Interface};

/// Exponential reconnect delay.
///
/// Each [`next_delay`](Self::next_delay) returns the current delay and
/// doubles it for the next call, up to `max`. A successful connection calls
/// [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            current: min,
        }
    }

    /// The delay the next wait will use.
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Peer address, resolved once and reused until a connect attempt that
/// used the cached value fails.
#[derive(Debug, Clone)]
pub struct ResolvedAddr {
    host: String,
    port: u16,
    cached: Option<SocketAddr>,
}

impl ResolvedAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            cached: None,
        }
    }

    pub fn cached(&self) -> Option<SocketAddr> {
        self.cached
    }

    /// The address to dial, and whether it came from the cache.
    pub async fn resolve(&mut self) -> io::Result<(SocketAddr, bool)> {
        if let Some(addr) = self.cached {
            return Ok((addr, true));
        }
        let addr = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} resolved to no addresses", self.host),
                )
            })?;
        self.cached = Some(addr);
        Ok((addr, false))
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

fn timed_out(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, what.to_string())
}

struct ClientInner {
    /// Outbound queue of the live connection, if any.
    current: StdMutex<Option<(ConnectionId, mpsc::Sender<Outbound>)>>,
    rx_sender: mpsc::Sender<InboundFrame>,
    counters: Arc<StreamCounters>,
    shutdown: ShutdownToken,
}

/// A stream interface that dials a single peer (normally the backbone) and
/// keeps reconnecting for as long as it runs.
pub struct StreamClientInterface {
    config: StreamClientConfig,
    id: InterfaceId,
    inner: Arc<ClientInner>,
    rx_receiver: Mutex<mpsc::Receiver<InboundFrame>>,
}

impl StreamClientInterface {
    pub fn new(config: StreamClientConfig) -> Result<Self, InterfaceError> {
        if config.host.is_empty() || config.host.len() > MAX_HOST_LEN {
            return Err(InterfaceError::Configuration(format!(
                "host must be 1 to {MAX_HOST_LEN} characters, got {}",
                config.host.len()
            )));
        }
        let (rx_sender, rx_receiver) = mpsc::channel(INBOUND_QUEUE);
        Ok(Self {
            id: InterfaceId::from_name(&config.name),
            config,
            inner: Arc::new(ClientInner {
                current: StdMutex::new(None),
                rx_sender,
                counters: Arc::new(StreamCounters::default()),
                shutdown: ShutdownToken::new(),
            }),
            rx_receiver: Mutex::new(rx_receiver),
        })
    }

    pub fn stats(&self) -> StreamStats {
        self.inner.counters.snapshot()
    }

    async fn dial(resolver: &mut ResolvedAddr, limit: Duration) -> io::Result<TcpStream> {
        Self::dial_with(resolver, limit, TcpStream::connect).await
    }

    /// Resolve and connect within one deadline. The cached address is
    /// dropped only when an attempt that used it fails.
    async fn dial_with<T, F, Fut>(
        resolver: &mut ResolvedAddr,
        limit: Duration,
        connect: F,
    ) -> io::Result<T>
    where
        F: FnOnce(SocketAddr) -> Fut,
        Fut: Future<Output = io::Result<T>>,
    {
        let deadline = Instant::now() + limit;
        let (addr, from_cache) = tokio::time::timeout_at(deadline, resolver.resolve())
            .await
            .map_err(|_| timed_out("address resolution timed out"))??;
        let result = tokio::time::timeout_at(deadline, connect(addr))
            .await
            .unwrap_or_else(|_| Err(timed_out("connect timed out")));
        if result.is_err() && from_cache {
            debug!(%addr, "dial with cached address failed, resolving again next time");
            resolver.invalidate();
        }
        result
    }

    async fn connect_and_run(inner: Arc<ClientInner>, config: StreamClientConfig, mut stop: StopSignal) {
        let name: Arc<str> = Arc::from(config.name.as_str());
        let mut backoff = Backoff::new(config.reconnect_min, config.reconnect_max);
        let mut resolver = ResolvedAddr::new(config.host.clone(), config.port);
        let mut next_connection = 1u64;

        loop {
            if stop.is_stopped() {
                break;
            }

            let dialled = tokio::select! {
                result = Self::dial(&mut resolver, config.timeouts.connect) => result,
                _ = stop.stopped() => break,
            };

            match dialled {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    backoff.reset();
                    let id = ConnectionId(next_connection);
                    next_connection += 1;
                    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
                    *inner.current.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some((id, outbound_tx));
                    inner.shutdown.set_online(true);
                    info!("{}: connected to {}:{}", name, config.host, config.port);

                    let connection = Connection {
                        name: Arc::clone(&name),
                        id,
                        hw_mtu: config.hw_mtu,
                        timeouts: config.timeouts,
                        inbound: inner.rx_sender.clone(),
                        counters: Arc::clone(&inner.counters),
                    };
                    let end = connection.run(stream, outbound_rx, stop.clone()).await;

                    *inner.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
                    inner.shutdown.set_online(false);
                    if stop.is_stopped() {
                        break;
                    }
                    info!(
                        "{}: disconnected ({}), reconnecting in {:?}",
                        name,
                        end,
                        backoff.current()
                    );
                }
                Err(e) => {
                    debug!(
                        "{}: connect to {}:{} failed: {}, retrying in {:?}",
                        name,
                        config.host,
                        config.port,
                        e,
                        backoff.current()
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(backoff.next_delay()) => {}
                _ = stop.stopped() => break,
            }
        }
        debug!("{}: connect loop stopped", name);
    }
}

impl Interface for StreamClientInterface {
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
        self.inner.shutdown.is_online()
    }

    async fn start(&self) -> Result<(), InterfaceError> {
        if self.inner.shutdown.is_stopped() {
            return Err(InterfaceError::Stopped);
        }
        let handle = tokio::spawn(Self::connect_and_run(
            Arc::clone(&self.inner),
            self.config.clone(),
            self.inner.shutdown.signal(),
        ));
        self.inner.shutdown.track(handle).await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), InterfaceError> {
        self.inner.shutdown.stop();
        self.inner.shutdown.join().await;
        *self.inner.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    async fn transmit(&self, data: &[u8], exclude: Option<ConnectionId>) -> Result<(), InterfaceError> {
        if data.len() > self.config.hw_mtu {
            return Err(InterfaceError::Oversized {
                len: data.len(),
                mtu: self.config.hw_mtu,
            });
        }
        let Some((id, outbound)) = self
            .inner
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        else {
            return Err(InterfaceError::NotConnected);
        };
        if exclude == Some(id) {
            return Ok(());
        }
        match outbound.try_send(Arc::from(hdlc_frame(data))) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                StreamCounters::bump(&self.inner.counters.frames_dropped);
                warn!("{}: outbound queue full, frame dropped", self.config.name);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(InterfaceError::NotConnected),
        }
    }

    async fn receive(&self) -> Result<InboundFrame, InterfaceError> {
        let mut rx = self.rx_receiver.lock().await;
        let mut stop = self.inner.shutdown.signal();
        tokio::select! {
            biased;
            frame = rx.recv() => frame.ok_or(InterfaceError::Stopped),
            _ = stop.stopped() => Err(InterfaceError::Stopped),
        }
    }
}
