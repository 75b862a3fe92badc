//! Broadcast radio interface.
//!
//! The physical layer is a [`RadioDriver`]: something that sends and
//! receives whole datagrams. [`RadioInterface`] adds the interface contract
//! on top, enforcing the radio's small hardware MTU in both directions.

pub mod channel;
pub mod udp;

pub use channel::ChannelRadioDriver;
pub use udp::UdpRadioDriver;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use boundary_core::constants::HEADER_MINSIZE;
use boundary_transport::interface::{InterfaceId, InterfaceMode};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, trace, warn};

use crate::error::InterfaceError;
use crate::shutdown::{ShutdownToken, StopSignal};
use crate::traits::{ConnectionId, InboundFrame, Interface};

pub const RADIO_HW_MTU: usize = 508;

/// Declared bitrate of the radio link (5 kbps).
pub const RADIO_BITRATE: u64 = 5_000;

const INBOUND_QUEUE: usize = 32;

/// Datagram transport beneath a [`RadioInterface`].
pub trait RadioDriver: Send + Sync + 'static {
    /// Send one datagram.
    fn send(&self, datagram: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Receive one datagram into `buf`, truncating it to `buf.len()` the way
    /// a datagram socket does. Returns the number of bytes written.
    fn recv(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;
}

#[derive(Debug, Clone)]
pub struct RadioConfig {
    pub name: String,
    /// Gateway or access point; a radio never faces the backbone.
    pub mode: InterfaceMode,
    pub hw_mtu: usize,
    pub bitrate: u64,
    pub fixed_mtu: bool,
}

impl RadioConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: InterfaceMode::Gateway,
            hw_mtu: RADIO_HW_MTU,
            bitrate: RADIO_BITRATE,
            fixed_mtu: true,
        }
    }
}

#[derive(Debug, Default)]
struct RadioCounters {
    received: AtomicU64,
    oversized_discarded: AtomicU64,
    runts_discarded: AtomicU64,
    oversized_refused: AtomicU64,
}

/// Counters of a [`RadioInterface`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RadioStats {
    pub received: u64,
    /// Inbound datagrams larger than the hardware MTU.
    pub oversized_discarded: u64,
    pub runts_discarded: u64,
    /// Outbound packets refused for exceeding the hardware MTU.
    pub oversized_refused: u64,
}

impl RadioStats {
    pub fn malformed(&self) -> u64 {
        self.oversized_discarded + self.runts_discarded
    }
}

pub struct RadioInterface<D: RadioDriver> {
    config: RadioConfig,
    id: InterfaceId,
    driver: Arc<D>,
    counters: Arc<RadioCounters>,
    rx_sender: mpsc::Sender<InboundFrame>,
    rx_receiver: Mutex<mpsc::Receiver<InboundFrame>>,
    shutdown: ShutdownToken,
}

impl<D: RadioDriver> RadioInterface<D> {
    pub fn new(config: RadioConfig, driver: D) -> Result<Self, InterfaceError> {
        if config.mode.is_boundary() {
            return Err(InterfaceError::Configuration(format!(
                "radio interface {} cannot run in boundary mode",
                config.name
            )));
        }
        if config.hw_mtu < HEADER_MINSIZE {
            return Err(InterfaceError::Configuration(format!(
                "radio hw_mtu {} is below the minimum header size",
                config.hw_mtu
            )));
        }
        let (rx_sender, rx_receiver) = mpsc::channel(INBOUND_QUEUE);
        Ok(Self {
            id: InterfaceId::from_name(&config.name),
            config,
            driver: Arc::new(driver),
            counters: Arc::new(RadioCounters::default()),
            rx_sender,
            rx_receiver: Mutex::new(rx_receiver),
            shutdown: ShutdownToken::new(),
        })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn stats(&self) -> RadioStats {
        RadioStats {
            received: self.counters.received.load(Ordering::Relaxed),
            oversized_discarded: self.counters.oversized_discarded.load(Ordering::Relaxed),
            runts_discarded: self.counters.runts_discarded.load(Ordering::Relaxed),
            oversized_refused: self.counters.oversized_refused.load(Ordering::Relaxed),
        }
    }

    async fn read_loop(
        driver: Arc<D>,
        name: String,
        hw_mtu: usize,
        counters: Arc<RadioCounters>,
        tx: mpsc::Sender<InboundFrame>,
        mut stop: StopSignal,
    ) {
        // one spare byte tells a truncated oversized datagram from a full one
        let mut buf = vec![0u8; hw_mtu + 1];
        loop {
            let n = tokio::select! {
                result = driver.recv(&mut buf) => match result {
                    Ok(n) => n,
                    Err(e) => {
                        warn!("{}: receive error: {}", name, e);
                        if stop.is_stopped() {
                            break;
                        }
                        continue;
                    }
                },
                _ = stop.stopped() => break,
            };

            if n > hw_mtu {
                counters.oversized_discarded.fetch_add(1, Ordering::Relaxed);
                warn!("{}: discarded datagram larger than MTU {}", name, hw_mtu);
                continue;
            }
            if n < HEADER_MINSIZE {
                counters.runts_discarded.fetch_add(1, Ordering::Relaxed);
                debug!("{}: discarded {}-byte runt", name, n);
                continue;
            }
            counters.received.fetch_add(1, Ordering::Relaxed);
            trace!("{}: received {} bytes", name, n);
            let frame = InboundFrame {
                data: buf[..n].to_vec(),
                connection: None,
            };
            if tx.send(frame).await.is_err() {
                break;
            }
        }
    }
}

impl<D: RadioDriver> Interface for RadioInterface<D> {
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
        self.config.bitrate
    }

    fn hw_mtu(&self) -> usize {
        self.config.hw_mtu
    }

    fn fixed_mtu(&self) -> bool {
        self.config.fixed_mtu
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
        let handle = tokio::spawn(Self::read_loop(
            Arc::clone(&self.driver),
            self.config.name.clone(),
            self.config.hw_mtu,
            Arc::clone(&self.counters),
            self.rx_sender.clone(),
            self.shutdown.signal(),
        ));
        self.shutdown.track(handle).await;
        self.shutdown.set_online(true);
        info!(
            "{}: radio up ({} bps, MTU {})",
            self.config.name, self.config.bitrate, self.config.hw_mtu
        );
        Ok(())
    }

    async fn stop(&self) -> Result<(), InterfaceError> {
        self.shutdown.stop();
        self.shutdown.join().await;
        Ok(())
    }

    async fn transmit(&self, data: &[u8], _exclude: Option<ConnectionId>) -> Result<(), InterfaceError> {
        if !self.shutdown.is_online() {
            return Err(InterfaceError::NotConnected);
        }
        if data.len() > self.config.hw_mtu {
            self.counters.oversized_refused.fetch_add(1, Ordering::Relaxed);
            warn!(
                "{}: refusing {}-byte packet over MTU {}",
                self.config.name,
                data.len(),
                self.config.hw_mtu
            );
            return Err(InterfaceError::Oversized {
                len: data.len(),
                mtu: self.config.hw_mtu,
            });
        }
        self.driver.send(data).await?;
        trace!("{}: sent {} bytes", self.config.name, data.len());
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
    use crate::testing;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn radios() -> (RadioInterface<ChannelRadioDriver>, RadioInterface<ChannelRadioDriver>) {
        let (a, b) = ChannelRadioDriver::pair(8);
        let left = RadioInterface::new(RadioConfig::new("lora-a"), a).expect("new failed");
        let right = RadioInterface::new(RadioConfig::new("lora-b"), b).expect("new failed");
        (left, right)
    }

    #[tokio::test]
    async fn test_conformance() {
        let (radio, _peer) = radios();
        testing::assert_pre_start_conformance(&radio).await;
        testing::assert_descriptor_matches(&radio);
        radio.start().await.expect("start failed");
        testing::assert_stop_conformance(&radio).await;
    }

    #[test]
    fn test_declares_narrow_fixed_mtu() {
        let (radio, _peer) = radios();
        let d = radio.descriptor();
        assert_eq!(d.mode, InterfaceMode::Gateway);
        assert_eq!(d.hw_mtu, Some(508));
        assert!(d.fixed_mtu);
        assert_eq!(d.bitrate, 5_000);
    }

    #[test]
    fn test_boundary_mode_rejected() {
        let (a, _b) = ChannelRadioDriver::pair(1);
        let mut config = RadioConfig::new("lora");
        config.mode = InterfaceMode::Boundary;
        assert!(matches!(
            RadioInterface::new(config, a),
            Err(InterfaceError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_packet_crosses_the_air() {
        let (left, right) = radios();
        left.start().await.expect("start failed");
        right.start().await.expect("start failed");

        let packet = vec![0x42; 100];
        left.transmit(&packet, None).await.expect("transmit failed");
        let frame = tokio::time::timeout(WAIT, right.receive())
            .await
            .expect("receive timed out")
            .expect("receive failed");
        assert_eq!(frame.data, packet);
        assert_eq!(frame.connection, None);
        assert_eq!(right.stats().received, 1);
    }

    #[tokio::test]
    async fn test_oversized_outbound_refused() {
        let (left, right) = radios();
        left.start().await.expect("start failed");
        right.start().await.expect("start failed");

        let err = left
            .transmit(&vec![0u8; 509], None)
            .await
            .expect_err("509 bytes exceeds the radio MTU");
        assert!(matches!(err, InterfaceError::Oversized { len: 509, mtu: 508 }));
        assert_eq!(left.stats().oversized_refused, 1);
        left.transmit(&vec![0u8; 508], None)
            .await
            .expect("MTU-sized packet should send");
    }

    #[tokio::test]
    async fn test_oversized_and_runt_inbound_discarded() {
        let (air, driver) = ChannelRadioDriver::pair(8);
        let radio = RadioInterface::new(RadioConfig::new("lora"), driver).expect("new failed");
        radio.start().await.expect("start failed");

        air.send(&[0x01; 600]).await.expect("send failed");
        air.send(&[0x02; 4]).await.expect("send failed");
        air.send(&[0x03; 40]).await.expect("send failed");

        let frame = tokio::time::timeout(WAIT, radio.receive())
            .await
            .expect("receive timed out")
            .expect("receive failed");
        assert_eq!(frame.data, vec![0x03; 40]);
        let stats = radio.stats();
        assert_eq!(stats.oversized_discarded, 1);
        assert_eq!(stats.runts_discarded, 1);
        assert_eq!(stats.malformed(), 2);
    }
}
