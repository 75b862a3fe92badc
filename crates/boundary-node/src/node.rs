//! Core Node struct and async event loop.
//!
//! Each interface runs its own I/O tasks and hands deframed packets to a
//! receive bridge, which forwards them over one bounded channel into
//! [`Node::run`]. The loop owns the [`Router`], so every table mutation
//! happens on a single task: a frame is parsed, routed and transmitted
//! before the next one is taken off the channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use boundary_interfaces::{
    ConnectionId, InboundFrame, InterfaceError, RadioInterface, StreamClientInterface,
    StreamServerInterface, UdpRadioDriver,
};
use boundary_transport::{
    CacheStore, InterfaceId, Janitor, MemoryCacheStore, Router, RouterAction,
};

use crate::cache_store::FileCacheStore;
use crate::config::{NodeConfig, parse_socket_addr};
use crate::error::NodeError;
use crate::interface_enum::AnyInterface;

/// Capacity of the bridge → loop channel.
const EVENT_QUEUE: usize = 256;

/// How often the loop wakes to step the janitor when no traffic arrives.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(1);

/// Events delivered to the central event loop from interface receive bridges.
#[derive(Debug)]
enum NodeEvent {
    Frame {
        interface_id: InterfaceId,
        frame: InboundFrame,
    },
    InterfaceDown {
        interface_id: InterfaceId,
    },
}

/// Triggers shutdown of a running [`Node`] from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// Seconds since the Unix epoch; the router's clock.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The connection to skip when a packet goes back out on the interface it
/// arrived on.
fn echo_exclusion(
    source: InterfaceId,
    target: InterfaceId,
    connection: Option<ConnectionId>,
) -> Option<ConnectionId> {
    if source == target { connection } else { None }
}

/// A boundary router node: interfaces, the router, and the event loop.
pub struct Node {
    config: NodeConfig,
    router: Router,
    janitor: Janitor,
    interfaces: HashMap<InterfaceId, Arc<AnyInterface>>,
    event_tx: mpsc::Sender<NodeEvent>,
    event_rx: mpsc::Receiver<NodeEvent>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    bridge_handles: Vec<tokio::task::JoinHandle<()>>,
    started: bool,
}

impl Node {
    /// Create a node from configuration. Fails on invalid configuration or
    /// when the announce cache directory cannot be opened.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let router_config = config.router_config()?;

        let cache: Box<dyn CacheStore> = match config.cache.path() {
            Some(dir) => {
                let store = FileCacheStore::open(
                    dir,
                    config.cache.max_bytes,
                    config.limits.cache_store_capacity,
                )?;
                info!(dir = %store.dir().display(), entries = store.len(), "announce cache opened");
                Box::new(store)
            }
            None => Box::new(MemoryCacheStore::new(
                config.cache.max_bytes,
                config.limits.cache_store_capacity,
            )),
        };

        let router = Router::new(router_config, cache);
        let janitor = Janitor::new(config.timers.janitor_interval, unix_now());
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            router,
            janitor,
            interfaces: HashMap::new(),
            event_tx,
            event_rx,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            bridge_handles: Vec::new(),
            started: false,
        })
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn interface(&self, id: InterfaceId) -> Option<&AnyInterface> {
        self.interfaces.get(&id).map(Arc::as_ref)
    }

    /// Look up a started interface by its configured name.
    pub fn interface_id(&self, name: &str) -> Option<InterfaceId> {
        self.interfaces
            .values()
            .find(|iface| iface.name() == name)
            .map(|iface| iface.id())
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Build every configured interface, register it with the router, start
    /// it, and spawn its receive bridge.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if self.started {
            return Err(NodeError::AlreadyRunning);
        }

        for iface in self.create_interfaces().await? {
            let id = self.router.register_interface(iface.descriptor())?;
            self.interfaces.insert(id, Arc::new(iface));
        }

        for (id, iface) in &self.interfaces {
            if let Err(e) = iface.start().await {
                error!(interface = %iface.name(), "failed to start interface: {e}");
                return Err(NodeError::Interface(e));
            }
            info!(interface = %iface.name(), id = id.0, mode = ?iface.mode(), "interface started");
        }

        self.spawn_receive_bridges();
        self.started = true;
        info!(
            name = %self.config.node.name,
            transport_id = %self.router.transport_id(),
            interfaces = self.interfaces.len(),
            "node started"
        );
        Ok(())
    }

    async fn create_interfaces(&self) -> Result<Vec<AnyInterface>, NodeError> {
        let mut built = Vec::new();

        for entry in &self.config.interfaces.radio {
            let bind = parse_socket_addr(&entry.bind)?;
            let target = parse_socket_addr(&entry.target)?;
            let driver = UdpRadioDriver::bind(bind, target).await?;
            let radio = RadioInterface::new(entry.radio_config()?, driver)?;
            built.push(AnyInterface::Radio(radio));
        }

        for entry in &self.config.interfaces.stream_client {
            let client = StreamClientInterface::new(entry.client_config()?)?;
            built.push(AnyInterface::StreamClient(client));
        }

        for entry in &self.config.interfaces.stream_server {
            let server = StreamServerInterface::new(entry.server_config()?);
            built.push(AnyInterface::StreamServer(server));
        }

        Ok(built)
    }

    /// Spawn per-interface receive bridge tasks.
    fn spawn_receive_bridges(&mut self) {
        for (&interface_id, iface) in &self.interfaces {
            if !iface.can_receive() {
                continue;
            }
            let iface = Arc::clone(iface);
            let event_tx = self.event_tx.clone();
            let mut shutdown_rx = self.shutdown_rx.clone();

            let handle = tokio::spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = async { let _ = shutdown_rx.wait_for(|stopped| *stopped).await; } => {
                            debug!(id = interface_id.0, "receive bridge shutting down");
                            break;
                        }
                        result = iface.receive() => {
                            let event = match result {
                                Ok(frame) => NodeEvent::Frame { interface_id, frame },
                                Err(e) => {
                                    warn!(id = interface_id.0, "receive error: {e}");
                                    let _ = event_tx.send(NodeEvent::InterfaceDown { interface_id }).await;
                                    break;
                                }
                            };
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
            self.bridge_handles.push(handle);
        }
    }

    /// Run the main event loop. Returns when shutdown is signalled.
    pub async fn run(&mut self) {
        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        housekeeping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let stats_secs = self.config.node.stats_interval;
        let stats_enabled = stats_secs > 0;
        let mut stats_interval = tokio::time::interval(Duration::from_secs(stats_secs.max(1)));

        // Don't fire immediately
        housekeeping.tick().await;
        stats_interval.tick().await;

        info!("entering event loop");

        loop {
            tokio::select! {
                biased;

                _ = async { let _ = self.shutdown_rx.wait_for(|stopped| *stopped).await; } => {
                    info!("shutdown signal received");
                    break;
                }

                event = self.event_rx.recv() => {
                    match event {
                        Some(NodeEvent::Frame { interface_id, frame }) => {
                            self.process_frame(interface_id, frame, unix_now()).await;
                        }
                        Some(NodeEvent::InterfaceDown { interface_id }) => {
                            self.interface_down(interface_id);
                        }
                        None => {
                            info!("event channel closed, exiting");
                            break;
                        }
                    }
                }

                _ = housekeeping.tick() => {}

                _ = stats_interval.tick(), if stats_enabled => {
                    self.log_stats();
                }
            }

            self.janitor.step(&mut self.router, unix_now());
        }
    }

    /// Route one inbound frame and carry out the resulting transmissions.
    /// Returns the router's actions.
    pub async fn process_frame(
        &mut self,
        interface_id: InterfaceId,
        frame: InboundFrame,
        now: u64,
    ) -> Vec<RouterAction> {
        trace!(id = interface_id.0, len = frame.data.len(), "inbound frame");
        let actions = self.router.inbound(interface_id, &frame.data, now);

        for action in &actions {
            match action {
                RouterAction::Transmit { interface, raw } => {
                    let Some(iface) = self.interfaces.get(interface) else {
                        warn!(id = interface.0, "transmit to unknown interface");
                        continue;
                    };
                    let exclude = echo_exclusion(interface_id, *interface, frame.connection);
                    match iface.transmit(raw, exclude).await {
                        Ok(()) => {}
                        Err(InterfaceError::NotConnected) => {
                            debug!(interface = %iface.name(), "not connected, packet dropped");
                        }
                        Err(e) => {
                            warn!(interface = %iface.name(), "transmit failed: {e}");
                        }
                    }
                }
                RouterAction::Drop { reason } => {
                    trace!(id = interface_id.0, ?reason, "packet dropped");
                }
            }
        }
        actions
    }

    fn interface_down(&mut self, interface_id: InterfaceId) {
        if let Some(descriptor) = self.router.deregister_interface(interface_id) {
            warn!(interface = %descriptor.name, id = interface_id.0, "interface down");
        }
    }

    fn log_stats(&self) {
        let malformed_frames: u64 = self
            .interfaces
            .values()
            .map(|iface| iface.malformed_frames())
            .sum();
        let connected = self
            .interfaces
            .values()
            .filter(|iface| iface.is_connected())
            .count();
        info!(
            paths = self.router.path_table().len(),
            links = self.router.link_table().len(),
            reverse = self.router.reverse_table().len(),
            pending = self.router.pending_requests().len(),
            cached_bytes = self.router.cache().size(),
            malformed_frames,
            connected,
            last_bridge = ?self.router.stats().last_bridge_activity,
            "stats: {}",
            self.router.stats()
        );
    }

    /// Signal the node to shut down.
    pub fn trigger_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Stop the bridges, stop every interface, and join their tasks.
    pub async fn shutdown(mut self) {
        info!("shutting down node");
        self.trigger_shutdown();
        // a bridge parked on a full queue must see the loop is gone
        self.event_rx.close();

        for handle in self.bridge_handles.drain(..) {
            let _ = handle.await;
        }

        for (id, iface) in self.interfaces.drain() {
            if let Err(e) = iface.stop().await {
                warn!(id = id.0, "error stopping interface: {e}");
            }
        }

        info!("node shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boundary_transport::DropReason;

    #[test]
    fn node_new_default() {
        let node = Node::new(NodeConfig::default()).expect("new failed");
        assert_eq!(node.router().config().path_table_capacity, 128);
        assert_eq!(node.router().config().dedup_capacity, 48);
        assert_eq!(
            *node.router().transport_id(),
            crate::config::derive_transport_id("boundary")
        );
        assert!(node.router().cache().list().expect("list failed").is_empty());
    }

    #[test]
    fn node_new_with_file_cache() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let path = dir.path().join("cache");
        let toml = format!("[cache]\npath = \"{}\"\nmax_bytes = 2048\n", path.display());
        let config = NodeConfig::parse(&toml).expect("parse failed");
        let node = Node::new(config).expect("new failed");
        assert!(path.is_dir());
        assert_eq!(node.router().cache().available(), 2048);
    }

    #[tokio::test]
    async fn node_start_empty() {
        let mut node = Node::new(NodeConfig::default()).expect("new failed");
        node.start().await.expect("start failed");
        assert!(node.interfaces.is_empty());
        assert!(node.router().registry().is_empty());
    }

    #[tokio::test]
    async fn node_start_twice_rejected() {
        let mut node = Node::new(NodeConfig::default()).expect("new failed");
        node.start().await.expect("start failed");
        assert!(matches!(node.start().await, Err(NodeError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn node_start_registers_interfaces() {
        let toml = r#"
[[interfaces.radio]]
name = "lora"
bind = "127.0.0.1:0"
target = "127.0.0.1:9"

[[interfaces.stream_server]]
name = "ap"
bind = "127.0.0.1:0"
"#;
        let mut node = Node::new(NodeConfig::parse(toml).expect("parse failed")).expect("new failed");
        node.start().await.expect("start failed");

        let lora = node.interface_id("lora").expect("radio missing");
        let ap = node.interface_id("ap").expect("server missing");
        assert_eq!(node.router().registry().len(), 2);
        let descriptor = node.router().registry().get(lora).expect("not registered");
        assert_eq!(descriptor.hw_mtu, Some(508));
        assert!(node.interface(ap).is_some_and(|i| i.is_connected()));
        node.shutdown().await;
    }

    #[tokio::test]
    async fn node_shutdown_empty() {
        let mut node = Node::new(NodeConfig::default()).expect("new failed");
        node.start().await.expect("start failed");
        node.shutdown().await;
    }

    #[tokio::test]
    async fn node_trigger_shutdown() {
        let mut node = Node::new(NodeConfig::default()).expect("new failed");
        node.start().await.expect("start failed");

        node.trigger_shutdown();

        tokio::time::timeout(Duration::from_millis(100), node.run())
            .await
            .expect("run should exit after shutdown");
    }

    #[tokio::test]
    async fn shutdown_handle_stops_run() {
        let mut node = Node::new(NodeConfig::default()).expect("new failed");
        node.start().await.expect("start failed");
        let handle = node.shutdown_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.shutdown();
        });
        tokio::time::timeout(Duration::from_secs(2), node.run())
            .await
            .expect("run should exit after handle shutdown");
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped() {
        let toml = r#"
[[interfaces.stream_server]]
name = "ap"
bind = "127.0.0.1:0"
"#;
        let mut node = Node::new(NodeConfig::parse(toml).expect("parse failed")).expect("new failed");
        node.start().await.expect("start failed");
        let ap = node.interface_id("ap").expect("server missing");

        let frame = InboundFrame {
            data: vec![0x00; 5],
            connection: None,
        };
        let actions = node.process_frame(ap, frame, 1_000).await;
        assert_eq!(
            actions,
            vec![RouterAction::Drop {
                reason: DropReason::Malformed
            }]
        );
        assert_eq!(node.router().stats().malformed_dropped, 1);
        node.shutdown().await;
    }

    #[test]
    fn echo_exclusion_only_on_the_source_interface() {
        let k = Some(ConnectionId(3));
        assert_eq!(echo_exclusion(InterfaceId(1), InterfaceId(1), k), k);
        assert_eq!(echo_exclusion(InterfaceId(1), InterfaceId(2), k), None);
        assert_eq!(echo_exclusion(InterfaceId(1), InterfaceId(1), None), None);
    }
}
