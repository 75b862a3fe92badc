//! Path table types.

use boundary_core::types::DestinationHash;

use crate::interface::{InterfaceId, InterfaceMode};

/// A single entry in the path table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    /// When the path was learned or last refreshed.
    pub timestamp: u64,
    /// Absolute time after which the path is stale.
    pub expires: u64,
    /// Interface the next hop is reachable on.
    pub next_hop_interface: InterfaceId,
    /// Transport id of the next hop, or the destination itself when the
    /// announce arrived directly.
    pub next_hop_transport_id: DestinationHash,
    pub hops: u8,
    /// Learned from a backbone announce rather than from the narrow side.
    pub is_boundary_origin: bool,
    /// Mode of the interface the path was learned on; selects the TTL.
    pub mode: InterfaceMode,
}

impl PathEntry {
    pub fn new(
        timestamp: u64,
        next_hop_interface: InterfaceId,
        next_hop_transport_id: DestinationHash,
        hops: u8,
        mode: InterfaceMode,
        is_boundary_origin: bool,
    ) -> Self {
        Self {
            timestamp,
            expires: timestamp + mode.path_ttl(),
            next_hop_interface,
            next_hop_transport_id,
            hops,
            is_boundary_origin,
            mode,
        }
    }

    /// Uses strict `>`: `now == expires` is still live.
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.expires
    }

    /// Refresh the timestamp and extend the TTL (called on forward).
    pub fn refresh_timestamp(&mut self, now: u64) {
        self.timestamp = now;
        self.expires = now + self.mode.path_ttl();
    }
}
