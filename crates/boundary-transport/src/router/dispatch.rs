//! Central packet dispatch.
//!
//! [`Router::inbound`] is the only entry point for traffic. It parses the
//! envelope, applies the dedup policy, hands the packet to the matching
//! handler and returns the resulting actions. Handlers live in the sibling
//! `discovery` (announces, path requests) and `relay` (transport, links,
//! proofs, bridging) modules.

use boundary_core::constants::PATHFINDER_M;
use boundary_core::packet::context::ContextType;
use boundary_core::packet::wire::RawPacket;
use boundary_core::types::{DestinationHash, LinkId, PacketHash};
use boundary_core::{DestinationType, PacketType};
use tracing::{debug, trace};

use super::constants::{
    ESTABLISHMENT_TIMEOUT_PER_HOP, LINK_TABLE_CAPACITY, LINK_TIMEOUT, PATH_REQUEST_TRACKER_CAPACITY,
    PATH_TABLE_CAPACITY, PENDING_REQUEST_CAPACITY, REVERSE_TABLE_CAPACITY, REVERSE_TIMEOUT,
};
use super::stats::RouterStats;
use super::tables::{LinkTable, ReverseTable};
use super::types::{DropReason, RouterAction};
use crate::cache::CacheStore;
use crate::dedup::{DEDUP_CAPACITY, PacketDedup};
use crate::error::RouterError;
use crate::interface::{InterfaceDescriptor, InterfaceId, InterfaceRegistry};
use crate::path::PathTable;
use crate::path::constants::PATH_REQUEST_TIMEOUT;
use crate::path::path_request::{PathRequestTracker, PendingRequests, path_request_destination_hash};

/// Capacities and timers for a [`Router`]. All durations are in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    pub transport_id: DestinationHash,
    pub path_table_capacity: usize,
    pub link_table_capacity: usize,
    pub reverse_table_capacity: usize,
    pub pending_request_capacity: usize,
    pub dedup_capacity: usize,
    pub link_timeout: u64,
    pub proof_timeout_per_hop: u64,
    pub reverse_timeout: u64,
    pub pending_request_timeout: u64,
}

impl RouterConfig {
    pub fn new(transport_id: DestinationHash) -> Self {
        Self {
            transport_id,
            path_table_capacity: PATH_TABLE_CAPACITY,
            link_table_capacity: LINK_TABLE_CAPACITY,
            reverse_table_capacity: REVERSE_TABLE_CAPACITY,
            pending_request_capacity: PENDING_REQUEST_CAPACITY,
            dedup_capacity: DEDUP_CAPACITY,
            link_timeout: LINK_TIMEOUT,
            proof_timeout_per_hop: ESTABLISHMENT_TIMEOUT_PER_HOP,
            reverse_timeout: REVERSE_TIMEOUT,
            pending_request_timeout: PATH_REQUEST_TIMEOUT,
        }
    }
}

/// When a packet's hash enters the dedup cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DedupPolicy {
    Immediate,
    /// Only once a forwarding direction has been confirmed.
    Deferred,
    /// Link establishment proofs are never remembered.
    Never,
}

/// One inbound frame, as seen by the handlers.
pub(super) struct Inbound<'a> {
    pub source: &'a InterfaceDescriptor,
    pub packet: &'a RawPacket,
    pub raw: &'a [u8],
    pub hash: PacketHash,
    pub now: u64,
}

impl Inbound<'_> {
    /// Hop count carried by anything forwarded from this frame.
    pub fn hops_out(&self) -> u8 {
        self.packet.hops.saturating_add(1)
    }

    pub fn is_link_request(&self) -> bool {
        self.packet.flags.packet_type == PacketType::LinkRequest
    }
}

/// Central packet router.
///
/// Owns every routing table. Takes `&mut self` for every mutation; the node
/// drives it from a single serial loop.
pub struct Router {
    pub(super) config: RouterConfig,
    pub(super) registry: InterfaceRegistry,
    pub(super) path_table: PathTable,
    pub(super) link_table: LinkTable,
    pub(super) reverse_table: ReverseTable,
    pub(super) pending: PendingRequests,
    pub(super) request_tracker: PathRequestTracker,
    pub(super) dedup: PacketDedup,
    pub(super) cache: Box<dyn CacheStore>,
    pub(super) stats: RouterStats,
}

impl Router {
    pub fn new(config: RouterConfig, cache: Box<dyn CacheStore>) -> Self {
        Self {
            registry: InterfaceRegistry::new(),
            path_table: PathTable::new(config.path_table_capacity),
            link_table: LinkTable::new(config.link_table_capacity),
            reverse_table: ReverseTable::new(config.reverse_table_capacity),
            pending: PendingRequests::new(config.pending_request_capacity),
            request_tracker: PathRequestTracker::new(PATH_REQUEST_TRACKER_CAPACITY),
            dedup: PacketDedup::new(config.dedup_capacity),
            cache,
            stats: RouterStats::default(),
            config,
        }
    }

    /// Register an interface. Fails if its identity is already taken.
    pub fn register_interface(
        &mut self,
        descriptor: InterfaceDescriptor,
    ) -> Result<InterfaceId, RouterError> {
        self.registry.register(descriptor)
    }

    pub fn deregister_interface(&mut self, id: InterfaceId) -> Option<InterfaceDescriptor> {
        self.registry.deregister(id)
    }

    pub fn transport_id(&self) -> &DestinationHash {
        &self.config.transport_id
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn registry(&self) -> &InterfaceRegistry {
        &self.registry
    }

    pub fn path_table(&self) -> &PathTable {
        &self.path_table
    }

    pub fn path_table_mut(&mut self) -> &mut PathTable {
        &mut self.path_table
    }

    pub fn link_table(&self) -> &LinkTable {
        &self.link_table
    }

    pub fn reverse_table(&self) -> &ReverseTable {
        &self.reverse_table
    }

    pub fn pending_requests(&self) -> &PendingRequests {
        &self.pending
    }

    pub fn dedup(&self) -> &PacketDedup {
        &self.dedup
    }

    pub fn cache(&self) -> &dyn CacheStore {
        self.cache.as_ref()
    }

    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Process one frame received on `interface` at time `now`.
    pub fn inbound(&mut self, interface: InterfaceId, raw: &[u8], now: u64) -> Vec<RouterAction> {
        let Some(source) = self.registry.get(interface).cloned() else {
            debug!(id = interface.0, "frame from unregistered interface");
            return vec![RouterAction::drop(DropReason::UnknownInterface)];
        };

        let packet = match RawPacket::parse(raw) {
            Ok(packet) => packet,
            Err(e) => {
                self.stats.malformed_dropped += 1;
                debug!(iface = %source.name, "dropping malformed packet: {e}");
                return vec![RouterAction::drop(DropReason::Malformed)];
            }
        };

        if packet.hops >= PATHFINDER_M {
            debug!(iface = %source.name, hops = packet.hops, "dropping packet over hop limit");
            return vec![RouterAction::drop(DropReason::MaxHops)];
        }

        let hash = packet.packet_hash();
        let policy = self.dedup_policy(&packet, now);
        if policy != DedupPolicy::Never && self.dedup.contains(&hash) {
            self.stats.duplicates_dropped += 1;
            trace!(iface = %source.name, hash = %hash, "duplicate");
            return vec![RouterAction::drop(DropReason::Duplicate)];
        }
        if policy == DedupPolicy::Immediate {
            self.dedup.insert(hash);
        }

        let rx = Inbound {
            source: &source,
            packet: &packet,
            raw,
            hash,
            now,
        };
        let actions = self.route(&rx);

        if policy == DedupPolicy::Deferred
            && actions
                .iter()
                .any(|a| matches!(a, RouterAction::Transmit { .. }))
        {
            self.dedup.insert(hash);
        }
        actions
    }

    fn dedup_policy(&self, packet: &RawPacket, now: u64) -> DedupPolicy {
        let link_id = LinkId::from(packet.destination);
        match packet.flags.packet_type {
            PacketType::Proof if packet.context == ContextType::Lrproof => DedupPolicy::Never,
            PacketType::Proof => DedupPolicy::Deferred,
            _ if packet.flags.destination_type == DestinationType::Link
                || self.link_table.is_live(&link_id, now, self.config.link_timeout) =>
            {
                DedupPolicy::Deferred
            }
            _ => DedupPolicy::Immediate,
        }
    }

    fn route(&mut self, rx: &Inbound<'_>) -> Vec<RouterAction> {
        let packet = rx.packet;
        match packet.flags.packet_type {
            PacketType::Announce => return self.handle_announce(rx),
            PacketType::Proof if packet.context == ContextType::Lrproof => {
                return self.handle_link_proof(rx);
            }
            PacketType::Data if packet.destination == path_request_destination_hash() => {
                return self.handle_path_request(rx);
            }
            _ => {}
        }

        let link_id = LinkId::from(packet.destination);
        if self
            .link_table
            .live(&link_id, rx.now, self.config.link_timeout)
            .is_some()
        {
            return self.handle_link_traffic(rx, link_id);
        }

        if let Some(transport_id) = packet.transport_id {
            if transport_id == self.config.transport_id {
                return self.handle_transport(rx);
            }
            trace!(iface = %rx.source.name, "HEADER_2 packet for another transport node");
            return vec![RouterAction::drop(DropReason::NotForUs)];
        }
        if packet.flags.packet_type == PacketType::Proof {
            return self.handle_reverse_proof(rx);
        }
        self.handle_bridge(rx)
    }

    /// A transmit-capable registered interface.
    pub(super) fn outbound(&self, id: InterfaceId) -> Option<InterfaceDescriptor> {
        self.registry.get(id).filter(|d| d.can_transmit).cloned()
    }

    /// Build a transmit action and account for boundary crossings.
    pub(super) fn forward(
        &mut self,
        from: &InterfaceDescriptor,
        to: &InterfaceDescriptor,
        raw: Vec<u8>,
        now: u64,
    ) -> RouterAction {
        match (from.mode.is_boundary(), to.mode.is_boundary()) {
            (false, true) => {
                self.stats.packets_bridged_narrow_to_boundary += 1;
                self.stats.last_bridge_activity = Some(now);
            }
            (true, false) => {
                self.stats.packets_bridged_boundary_to_narrow += 1;
                self.stats.last_bridge_activity = Some(now);
            }
            _ => {}
        }
        trace!(from = %from.name, to = %to.name, len = raw.len(), "forward");
        RouterAction::Transmit {
            interface: to.id,
            raw,
        }
    }

    pub(super) fn malformed(&mut self, rx: &Inbound<'_>, e: RouterError) -> Vec<RouterAction> {
        self.stats.malformed_dropped += 1;
        debug!(iface = %rx.source.name, "cannot rewrite packet: {e}");
        vec![RouterAction::drop(DropReason::Malformed)]
    }

    pub fn cull_paths(&mut self, now: u64) -> usize {
        let active = self.registry.ids();
        self.path_table.cull(now, &active)
    }

    pub fn cull_links(&mut self, now: u64) -> usize {
        let active = self.registry.ids();
        self.link_table.cull(now, self.config.link_timeout, &active)
    }

    pub fn cull_reverse(&mut self, now: u64) -> usize {
        let active = self.registry.ids();
        self.reverse_table
            .cull(now, self.config.reverse_timeout, &active)
    }

    pub fn cull_pending(&mut self, now: u64) -> usize {
        self.pending.cull(now, self.config.pending_request_timeout)
    }
}
