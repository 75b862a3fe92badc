//! Router types.

use boundary_core::types::DestinationHash;

use crate::interface::InterfaceId;

/// An entry in the reverse table (for proof routing).
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ReverseEntry {
    /// Interface the original packet was received on.
    pub receiving_interface: InterfaceId,
    /// Interface the packet was forwarded to.
    pub outbound_interface: InterfaceId,
    pub timestamp: u64,
}

impl ReverseEntry {
    /// Uses strict `>` comparison.
    #[must_use]
    pub fn is_expired(&self, now: u64, timeout: u64) -> bool {
        now > self.timestamp.saturating_add(timeout)
    }
}

/// State of one link being relayed through this node.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct LinkEntry {
    /// Last activity; refreshed in place on every forwarded frame.
    pub timestamp: u64,
    pub next_hop_transport_id: DestinationHash,
    /// Interface toward the link's destination.
    pub next_hop_interface: InterfaceId,
    pub remaining_hops: u8,
    /// Interface the link request arrived on (toward the initiator).
    pub received_interface: InterfaceId,
    pub taken_hops: u8,
    pub dest_hash: DestinationHash,
    pub validated: bool,
    /// Deadline for the link proof while unvalidated.
    pub proof_timeout: u64,
}

impl LinkEntry {
    /// Unvalidated links expire at `proof_timeout`; validated links after
    /// `link_timeout` without activity. Both use strict `>`.
    #[must_use]
    pub fn is_expired(&self, now: u64, link_timeout: u64) -> bool {
        if self.validated {
            now > self.timestamp.saturating_add(link_timeout)
        } else {
            now > self.proof_timeout
        }
    }

    /// The interface a frame arriving on `from` should leave on, if `from`
    /// is one of the link's two sides.
    #[must_use]
    pub fn direction_from(&self, from: InterfaceId) -> Option<InterfaceId> {
        if from == self.next_hop_interface {
            Some(self.received_interface)
        } else if from == self.received_interface {
            Some(self.next_hop_interface)
        } else {
            None
        }
    }
}

/// Why the router declined to forward a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    UnknownInterface,
    Malformed,
    MaxHops,
    Duplicate,
    /// No route: no path entry and no default route applies.
    NoPath,
    /// The packet does not belong to either side of its link or reverse entry.
    NoDirection,
    UnknownLink,
    /// Announce not preferred over the current path.
    NotPreferred,
    /// Backbone announce cached without a pending request to answer.
    Cached,
    /// Path request for a link id, or already outstanding.
    PathRequestSuppressed,
    /// HEADER_2 packet addressed to another transport node.
    NotForUs,
}

/// Action returned by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterAction {
    /// Transmit a packet on a specific interface.
    Transmit { interface: InterfaceId, raw: Vec<u8> },
    Drop { reason: DropReason },
}

impl RouterAction {
    pub fn drop(reason: DropReason) -> Self {
        RouterAction::Drop { reason }
    }
}
