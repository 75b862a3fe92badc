//! TOML-based configuration for the boundary node.
//!
//! Every section is optional; a missing key takes the default from its
//! `default_*` helper. [`NodeConfig::parse`] validates after deserializing,
//! so a config that loads is one the node can start from.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use boundary_core::types::DestinationHash;
use boundary_interfaces::stream::{DEFAULT_MAX_CLIENTS, DEFAULT_PORT, MAX_HOST_LEN};
use boundary_interfaces::{RadioConfig, StreamClientConfig, StreamServerConfig, StreamTimeouts};
use boundary_transport::{InterfaceMode, PathError, RouterConfig};

use crate::error::NodeError;

/// Top-level node configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub limits: LimitsSection,
    #[serde(default)]
    pub timers: TimersSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub interfaces: InterfacesSection,
}

impl NodeConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s)
            .map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value the node relies on at startup.
    pub fn validate(&self) -> Result<(), NodeError> {
        self.transport_id()?;

        let limits = &self.limits;
        for (key, value) in [
            ("path_table_capacity", limits.path_table_capacity),
            ("link_table_capacity", limits.link_table_capacity),
            ("reverse_table_capacity", limits.reverse_table_capacity),
            ("pending_request_capacity", limits.pending_request_capacity),
            ("dedup_capacity", limits.dedup_capacity),
            ("cache_store_capacity", limits.cache_store_capacity),
        ] {
            require_nonzero("limits", key, value as u64)?;
        }

        let timers = &self.timers;
        for (key, value) in [
            ("janitor_interval", timers.janitor_interval),
            ("link_timeout", timers.link_timeout),
            ("link_proof_timeout_per_hop", timers.link_proof_timeout_per_hop),
            ("reverse_timeout", timers.reverse_timeout),
            ("pending_request_timeout", timers.pending_request_timeout),
        ] {
            require_nonzero("timers", key, value)?;
        }

        let mut names = HashSet::new();
        for name in self.interfaces.names() {
            if !names.insert(name) {
                return Err(NodeError::Config(format!(
                    "duplicate interface name '{name}'"
                )));
            }
        }

        for entry in &self.interfaces.radio {
            entry.radio_config()?;
            parse_socket_addr(&entry.bind)?;
            parse_socket_addr(&entry.target)?;
        }
        for entry in &self.interfaces.stream_client {
            entry.client_config()?;
        }
        for entry in &self.interfaces.stream_server {
            entry.server_config()?;
        }
        Ok(())
    }

    /// The configured transport id, or one derived from the node name.
    pub fn transport_id(&self) -> Result<DestinationHash, NodeError> {
        match &self.node.transport_id {
            Some(text) => parse_transport_id(text),
            None => Ok(derive_transport_id(&self.node.name)),
        }
    }

    /// Router tables and timers from `[limits]` and `[timers]`.
    pub fn router_config(&self) -> Result<RouterConfig, NodeError> {
        let mut config = RouterConfig::new(self.transport_id()?);
        config.path_table_capacity = self.limits.path_table_capacity;
        config.link_table_capacity = self.limits.link_table_capacity;
        config.reverse_table_capacity = self.limits.reverse_table_capacity;
        config.pending_request_capacity = self.limits.pending_request_capacity;
        config.dedup_capacity = self.limits.dedup_capacity;
        config.link_timeout = self.timers.link_timeout;
        config.proof_timeout_per_hop = self.timers.link_proof_timeout_per_hop;
        config.reverse_timeout = self.timers.reverse_timeout;
        config.pending_request_timeout = self.timers.pending_request_timeout;
        Ok(config)
    }
}

fn require_nonzero(section: &str, key: &str, value: u64) -> Result<(), NodeError> {
    if value == 0 {
        return Err(NodeError::Config(format!(
            "[{section}] {key} must be greater than zero"
        )));
    }
    Ok(())
}

/// The `[node]` section.
#[derive(Debug, Deserialize)]
pub struct NodeSection {
    #[serde(default = "default_node_name")]
    pub name: String,
    /// 32 hex characters. Derived from `name` when absent.
    pub transport_id: Option<String>,
    /// Seconds between statistics summaries. 0 disables. Default: 300.
    #[serde(default = "default_stats_interval")]
    pub stats_interval: u64,
}

fn default_node_name() -> String {
    "boundary".to_string()
}

fn default_stats_interval() -> u64 {
    300
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            name: default_node_name(),
            transport_id: None,
            stats_interval: default_stats_interval(),
        }
    }
}

/// The `[logging]` section. `RUST_LOG` overrides `level` when set.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// The `[limits]` section: capacity of every bounded table.
#[derive(Debug, Deserialize)]
pub struct LimitsSection {
    #[serde(default = "default_path_table_capacity")]
    pub path_table_capacity: usize,
    #[serde(default = "default_link_table_capacity")]
    pub link_table_capacity: usize,
    #[serde(default = "default_reverse_table_capacity")]
    pub reverse_table_capacity: usize,
    #[serde(default = "default_pending_request_capacity")]
    pub pending_request_capacity: usize,
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// Maximum number of cached announces.
    #[serde(default = "default_cache_store_capacity")]
    pub cache_store_capacity: usize,
}

fn default_path_table_capacity() -> usize {
    128
}

fn default_link_table_capacity() -> usize {
    32
}

fn default_reverse_table_capacity() -> usize {
    64
}

fn default_pending_request_capacity() -> usize {
    16
}

fn default_dedup_capacity() -> usize {
    48
}

fn default_cache_store_capacity() -> usize {
    64
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            path_table_capacity: default_path_table_capacity(),
            link_table_capacity: default_link_table_capacity(),
            reverse_table_capacity: default_reverse_table_capacity(),
            pending_request_capacity: default_pending_request_capacity(),
            dedup_capacity: default_dedup_capacity(),
            cache_store_capacity: default_cache_store_capacity(),
        }
    }
}

/// The `[timers]` section, all in seconds.
#[derive(Debug, Deserialize)]
pub struct TimersSection {
    #[serde(default = "default_janitor_interval")]
    pub janitor_interval: u64,
    #[serde(default = "default_link_timeout")]
    pub link_timeout: u64,
    #[serde(default = "default_link_proof_timeout_per_hop")]
    pub link_proof_timeout_per_hop: u64,
    #[serde(default = "default_reverse_timeout")]
    pub reverse_timeout: u64,
    #[serde(default = "default_pending_request_timeout")]
    pub pending_request_timeout: u64,
}

fn default_janitor_interval() -> u64 {
    5
}

fn default_link_timeout() -> u64 {
    900
}

fn default_link_proof_timeout_per_hop() -> u64 {
    6
}

fn default_reverse_timeout() -> u64 {
    480
}

fn default_pending_request_timeout() -> u64 {
    30
}

impl Default for TimersSection {
    fn default() -> Self {
        Self {
            janitor_interval: default_janitor_interval(),
            link_timeout: default_link_timeout(),
            link_proof_timeout_per_hop: default_link_proof_timeout_per_hop(),
            reverse_timeout: default_reverse_timeout(),
            pending_request_timeout: default_pending_request_timeout(),
        }
    }
}

/// The `[cache]` section. Announces are kept in memory unless `path` is set.
#[derive(Debug, Deserialize)]
pub struct CacheSection {
    pub path: Option<String>,
    #[serde(default = "default_cache_max_bytes")]
    pub max_bytes: usize,
}

fn default_cache_max_bytes() -> usize {
    64 * 1024
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            path: None,
            max_bytes: default_cache_max_bytes(),
        }
    }
}

impl CacheSection {
    /// The cache directory, with a leading `~/` expanded to the home directory.
    pub fn path(&self) -> Option<PathBuf> {
        let raw = self.path.as_deref()?;
        match raw.strip_prefix("~/") {
            Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
            None => Some(PathBuf::from(raw)),
        }
    }
}

/// The `[interfaces]` section containing arrays of interface configs.
#[derive(Debug, Default, Deserialize)]
pub struct InterfacesSection {
    #[serde(default)]
    pub radio: Vec<RadioEntry>,
    #[serde(default)]
    pub stream_client: Vec<StreamClientEntry>,
    #[serde(default)]
    pub stream_server: Vec<StreamServerEntry>,
}

impl InterfacesSection {
    /// Every configured interface name, in declaration order per kind.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.radio
            .iter()
            .map(|e| e.name.as_str())
            .chain(self.stream_client.iter().map(|e| e.name.as_str()))
            .chain(self.stream_server.iter().map(|e| e.name.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.radio.is_empty() && self.stream_client.is_empty() && self.stream_server.is_empty()
    }
}

/// A `[[interfaces.radio]]` entry: the narrow broadcast segment, reached
/// through a datagram modem bridge.
#[derive(Debug, Deserialize)]
pub struct RadioEntry {
    pub name: String,
    pub bind: String,
    pub target: String,
    #[serde(default = "default_radio_mode")]
    pub mode: String,
    #[serde(default = "default_radio_hw_mtu")]
    pub hw_mtu: usize,
    #[serde(default = "default_radio_bitrate")]
    pub bitrate: u64,
    #[serde(default = "default_true")]
    pub fixed_mtu: bool,
}

fn default_radio_mode() -> String {
    "gateway".to_string()
}

fn default_radio_hw_mtu() -> usize {
    boundary_interfaces::radio::RADIO_HW_MTU
}

fn default_radio_bitrate() -> u64 {
    boundary_interfaces::radio::RADIO_BITRATE
}

fn default_true() -> bool {
    true
}

impl RadioEntry {
    pub fn radio_config(&self) -> Result<RadioConfig, NodeError> {
        let mode = parse_mode(&self.mode)?;
        if mode.is_boundary() {
            return Err(NodeError::Config(format!(
                "radio '{}' cannot run in boundary mode",
                self.name
            )));
        }
        let mut config = RadioConfig::new(&self.name);
        config.mode = mode;
        config.hw_mtu = self.hw_mtu;
        config.bitrate = self.bitrate;
        config.fixed_mtu = self.fixed_mtu;
        Ok(config)
    }
}

/// A `[[interfaces.stream_client]]` entry: the backbone uplink.
#[derive(Debug, Deserialize)]
pub struct StreamClientEntry {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_client_mode")]
    pub mode: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
    #[serde(default = "default_write_timeout")]
    pub write_timeout: u64,
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u64,
    #[serde(default = "default_reconnect_min")]
    pub reconnect_min: u64,
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max: u64,
}

/// A `[[interfaces.stream_server]]` entry: the local access point.
#[derive(Debug, Deserialize)]
pub struct StreamServerEntry {
    pub name: String,
    #[serde(default = "default_server_bind")]
    pub bind: String,
    #[serde(default = "default_server_mode")]
    pub mode: String,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
    #[serde(default = "default_write_timeout")]
    pub write_timeout: u64,
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_client_mode() -> String {
    "boundary".to_string()
}

fn default_server_mode() -> String {
    "access_point".to_string()
}

fn default_server_bind() -> String {
    format!("0.0.0.0:{DEFAULT_PORT}")
}

fn default_max_clients() -> usize {
    DEFAULT_MAX_CLIENTS
}

fn default_connect_timeout() -> u64 {
    6
}

fn default_read_timeout() -> u64 {
    120
}

fn default_write_timeout() -> u64 {
    2
}

fn default_keepalive_interval() -> u64 {
    30
}

fn default_reconnect_min() -> u64 {
    10
}

fn default_reconnect_max() -> u64 {
    120
}

fn stream_timeouts(
    name: &str,
    connect: u64,
    read: u64,
    write: u64,
    keepalive: u64,
) -> Result<StreamTimeouts, NodeError> {
    for (key, value) in [
        ("connect_timeout", connect),
        ("read_timeout", read),
        ("write_timeout", write),
        ("keepalive_interval", keepalive),
    ] {
        require_nonzero(name, key, value)?;
    }
    Ok(StreamTimeouts {
        connect: Duration::from_secs(connect),
        read: Duration::from_secs(read),
        write: Duration::from_secs(write),
        keepalive: Duration::from_secs(keepalive),
    })
}

impl StreamClientEntry {
    pub fn client_config(&self) -> Result<StreamClientConfig, NodeError> {
        if self.host.is_empty() || self.host.len() > MAX_HOST_LEN {
            return Err(NodeError::Config(format!(
                "stream client '{}': host must be 1 to {MAX_HOST_LEN} characters",
                self.name
            )));
        }
        if self.port == 0 {
            return Err(NodeError::Config(format!(
                "stream client '{}': port must be nonzero",
                self.name
            )));
        }
        require_nonzero(&self.name, "reconnect_min", self.reconnect_min)?;
        if self.reconnect_max < self.reconnect_min {
            return Err(NodeError::Config(format!(
                "stream client '{}': reconnect_max is below reconnect_min",
                self.name
            )));
        }

        let mut config = StreamClientConfig::new(&self.name, &self.host, self.port);
        config.mode = parse_mode(&self.mode)?;
        config.timeouts = stream_timeouts(
            &self.name,
            self.connect_timeout,
            self.read_timeout,
            self.write_timeout,
            self.keepalive_interval,
        )?;
        config.reconnect_min = Duration::from_secs(self.reconnect_min);
        config.reconnect_max = Duration::from_secs(self.reconnect_max);
        Ok(config)
    }
}

impl StreamServerEntry {
    pub fn server_config(&self) -> Result<StreamServerConfig, NodeError> {
        if self.max_clients == 0 {
            return Err(NodeError::Config(format!(
                "stream server '{}': max_clients must be at least 1",
                self.name
            )));
        }
        let mut config = StreamServerConfig::new(&self.name, parse_socket_addr(&self.bind)?);
        config.mode = parse_mode(&self.mode)?;
        config.max_clients = self.max_clients;
        config.timeouts = stream_timeouts(
            &self.name,
            default_connect_timeout(),
            self.read_timeout,
            self.write_timeout,
            self.keepalive_interval,
        )?;
        Ok(config)
    }
}

/// Parse a mode string to an `InterfaceMode`.
pub fn parse_mode(s: &str) -> Result<InterfaceMode, NodeError> {
    s.parse().map_err(|e: PathError| NodeError::Config(e.to_string()))
}

/// Parse a socket address string like "0.0.0.0:4242".
pub fn parse_socket_addr(s: &str) -> Result<SocketAddr, NodeError> {
    s.parse()
        .map_err(|e| NodeError::Config(format!("invalid socket address '{s}': {e}")))
}

/// Parse a 32-character hex transport id.
pub fn parse_transport_id(s: &str) -> Result<DestinationHash, NodeError> {
    let bytes = hex::decode(s)
        .map_err(|e| NodeError::Config(format!("invalid transport_id '{s}': {e}")))?;
    DestinationHash::try_from(bytes.as_slice()).map_err(|_| {
        NodeError::Config(format!(
            "transport_id must be 16 bytes, got {}",
            bytes.len()
        ))
    })
}

/// A stable transport id for a node name: the first 16 bytes of its SHA-256.
pub fn derive_transport_id(name: &str) -> DestinationHash {
    let digest: [u8; 32] = Sha256::digest(name.as_bytes()).into();
    let mut id = [0u8; 16];
    id.copy_from_slice(&digest[..16]);
    DestinationHash::new(id)
}
