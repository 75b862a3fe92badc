//! Transport relay, default route, link relay, proof return and bridging.

use boundary_core::DestinationType;
use boundary_core::packet::context::ContextType;
use boundary_core::types::{DestinationHash, LinkId};
use tracing::{debug, trace, warn};

use super::dispatch::{Inbound, Router};
use super::rewrite::{
    inject_transport_header, replace_transport_id, strip_transport_header, with_hops,
};
use super::types::{DropReason, LinkEntry, ReverseEntry, RouterAction};
use crate::error::RouterError;
use crate::interface::InterfaceDescriptor;
use crate::mtu::{MtuAdjustment, clamp_link_request};
use crate::path::PathEntry;

/// Rewrite `raw` for the hop toward a path entry: HEADER_2 to the next
/// transport node while more than one hop remains, HEADER_1 for the last.
fn address_toward(
    raw: &[u8],
    transported: bool,
    entry: &PathEntry,
    hops: u8,
) -> Result<Vec<u8>, RouterError> {
    match (transported, entry.hops > 1) {
        (true, true) => replace_transport_id(raw, &entry.next_hop_transport_id, hops),
        (true, false) => strip_transport_header(raw, hops),
        (false, true) => inject_transport_header(raw, &entry.next_hop_transport_id, hops),
        (false, false) => Ok(with_hops(raw, hops)),
    }
}

/// Single-hop form of `raw` with the outgoing hop count.
fn single_hop(rx: &Inbound<'_>) -> Result<Vec<u8>, RouterError> {
    if rx.packet.transport_id.is_some() {
        strip_transport_header(rx.raw, rx.hops_out())
    } else {
        Ok(with_hops(rx.raw, rx.hops_out()))
    }
}

impl Router {
    /// A HEADER_2 packet addressed to this node.
    pub(super) fn handle_transport(&mut self, rx: &Inbound<'_>) -> Vec<RouterAction> {
        let dest = rx.packet.destination;

        if let Some(entry) = self.path_table.route(&dest, rx.now).cloned() {
            let Some(out) = self.outbound(entry.next_hop_interface) else {
                return vec![RouterAction::drop(DropReason::NoPath)];
            };
            let raw = match address_toward(rx.raw, true, &entry, rx.hops_out()) {
                Ok(raw) => raw,
                Err(e) => return self.malformed(rx, e),
            };
            self.path_table
                .update(&dest, |e| e.refresh_timestamp(rx.now));
            if rx.is_link_request() {
                return self.relay_link_request(
                    rx,
                    raw,
                    &out,
                    entry.next_hop_transport_id,
                    entry.hops,
                );
            }
            return vec![self.relay_with_reverse(rx, &out, raw)];
        }

        if !rx.source.mode.is_boundary() {
            return self.default_route(rx);
        }

        if rx.packet.flags.destination_type == DestinationType::Link {
            return self.suppressed("no path request for a link destination");
        }
        debug!(dest = %dest, "transport packet from backbone for unknown destination");
        self.request_path(&dest, rx.now)
    }

    /// Narrow-side transport traffic with no path goes to the backbone as a
    /// single-hop broadcast.
    fn default_route(&mut self, rx: &Inbound<'_>) -> Vec<RouterAction> {
        let Some(out) = self.registry.default_route().cloned() else {
            debug!(dest = %rx.packet.destination, "no path and no default route");
            return vec![RouterAction::drop(DropReason::NoPath)];
        };
        let raw = match single_hop(rx) {
            Ok(raw) => raw,
            Err(e) => return self.malformed(rx, e),
        };
        debug!(dest = %rx.packet.destination, to = %out.name, "default route");
        if rx.is_link_request() {
            // remaining hops past the backbone are unknown; assume symmetry
            let remaining = rx.hops_out();
            return self.relay_link_request(rx, raw, &out, rx.packet.destination, remaining);
        }
        vec![self.relay_with_reverse(rx, &out, raw)]
    }

    /// Forward a non-link packet and remember where its proof must return.
    fn relay_with_reverse(
        &mut self,
        rx: &Inbound<'_>,
        out: &InterfaceDescriptor,
        raw: Vec<u8>,
    ) -> RouterAction {
        let evicted = self.reverse_table.insert(
            rx.hash.truncated(),
            ReverseEntry {
                receiving_interface: rx.source.id,
                outbound_interface: out.id,
                timestamp: rx.now,
            },
        );
        if evicted {
            self.stats.evictions += 1;
        }
        self.forward(rx.source, out, raw, rx.now)
    }

    /// Forward a link request, clamping its signalled MTU for this hop and
    /// opening an unvalidated link entry.
    fn relay_link_request(
        &mut self,
        rx: &Inbound<'_>,
        mut raw: Vec<u8>,
        out: &InterfaceDescriptor,
        next_hop_transport_id: DestinationHash,
        remaining_hops: u8,
    ) -> Vec<RouterAction> {
        let Some(link_id) = rx.packet.link_id() else {
            return self.malformed(
                rx,
                RouterError::InvalidTransformation("link request without link id"),
            );
        };

        let header_len = raw.len().saturating_sub(rx.packet.data.len());
        let mut data = raw.split_off(header_len);
        match clamp_link_request(&mut data, rx.source, out) {
            MtuAdjustment::Unchanged => {}
            MtuAdjustment::Clamped { from, to } => {
                debug!(link = %link_id, from, to, iface = %out.name, "clamped link MTU");
            }
            MtuAdjustment::Stripped => {
                debug!(link = %link_id, iface = %out.name, "stripped link MTU signalling");
            }
        }
        raw.extend_from_slice(&data);

        let proof_timeout = rx.now.saturating_add(
            self.config
                .proof_timeout_per_hop
                .saturating_mul(u64::from(remaining_hops.max(1))),
        );
        let entry = LinkEntry {
            timestamp: rx.now,
            next_hop_transport_id,
            next_hop_interface: out.id,
            remaining_hops,
            received_interface: rx.source.id,
            taken_hops: rx.hops_out(),
            dest_hash: rx.packet.destination,
            validated: false,
            proof_timeout,
        };
        if let Some((evicted, _)) = self.link_table.insert(link_id, entry) {
            self.stats.evictions += 1;
            warn!(link = %evicted, "link table full, evicted oldest link");
        }
        debug!(link = %link_id, dest = %rx.packet.destination, to = %out.name, "relaying link request");
        vec![self.forward(rx.source, out, raw, rx.now)]
    }

    /// A link establishment proof returning from the link's destination.
    pub(super) fn handle_link_proof(&mut self, rx: &Inbound<'_>) -> Vec<RouterAction> {
        let link_id = LinkId::from(rx.packet.destination);
        let link_timeout = self.config.link_timeout;
        let Some(entry) = self.link_table.live(&link_id, rx.now, link_timeout).cloned() else {
            trace!(link = %link_id, "proof for unknown or expired link");
            return vec![RouterAction::drop(DropReason::UnknownLink)];
        };
        if rx.source.id != entry.next_hop_interface {
            debug!(link = %link_id, iface = %rx.source.name, "link proof from wrong side");
            return vec![RouterAction::drop(DropReason::NoDirection)];
        }

        if self.link_table.validate(&link_id, rx.now) {
            self.stats.links_validated += 1;
            debug!(link = %link_id, "link validated");
        } else {
            self.link_table.touch(&link_id, rx.now);
        }

        let Some(out) = self.outbound(entry.received_interface) else {
            return vec![RouterAction::drop(DropReason::NoDirection)];
        };
        match single_hop(rx) {
            Ok(raw) => vec![self.forward(rx.source, &out, raw, rx.now)],
            Err(e) => self.malformed(rx, e),
        }
    }

    /// Traffic on an established (or establishing) link, in either direction.
    pub(super) fn handle_link_traffic(
        &mut self,
        rx: &Inbound<'_>,
        link_id: LinkId,
    ) -> Vec<RouterAction> {
        let Some(to) = self
            .link_table
            .live(&link_id, rx.now, self.config.link_timeout)
            .and_then(|entry| entry.direction_from(rx.source.id))
        else {
            trace!(link = %link_id, iface = %rx.source.name, "link frame from neither side");
            return vec![RouterAction::drop(DropReason::NoDirection)];
        };
        let Some(out) = self.outbound(to) else {
            return vec![RouterAction::drop(DropReason::NoDirection)];
        };

        let raw = match single_hop(rx) {
            Ok(raw) => raw,
            Err(e) => return self.malformed(rx, e),
        };
        self.link_table.touch(&link_id, rx.now);
        if rx.packet.context == ContextType::LinkClose {
            self.link_table.remove(&link_id);
            debug!(link = %link_id, "link closed");
        }
        vec![self.forward(rx.source, &out, raw, rx.now)]
    }

    /// A non-link proof returning along a reverse entry. The entry is consumed.
    pub(super) fn handle_reverse_proof(&mut self, rx: &Inbound<'_>) -> Vec<RouterAction> {
        let key = *rx.packet.destination;
        let Some(entry) = self.reverse_table.get(&key).cloned() else {
            trace!(dest = %rx.packet.destination, "proof without reverse entry");
            return vec![RouterAction::drop(DropReason::NoPath)];
        };
        if rx.source.id != entry.outbound_interface {
            return vec![RouterAction::drop(DropReason::NoDirection)];
        }
        self.reverse_table.take(&key);

        let Some(out) = self.outbound(entry.receiving_interface) else {
            return vec![RouterAction::drop(DropReason::NoDirection)];
        };
        vec![self.forward(rx.source, &out, with_hops(rx.raw, rx.hops_out()), rx.now)]
    }

    /// Plain HEADER_1 traffic crossing the boundary.
    pub(super) fn handle_bridge(&mut self, rx: &Inbound<'_>) -> Vec<RouterAction> {
        if rx.source.mode.is_boundary() {
            return self.bridge_to_narrow(rx);
        }

        let raw = with_hops(rx.raw, rx.hops_out());
        if rx.is_link_request() {
            let Some(out) = self.registry.default_route().cloned() else {
                return vec![RouterAction::drop(DropReason::NoPath)];
            };
            let remaining = rx.hops_out();
            return self.relay_link_request(rx, raw, &out, rx.packet.destination, remaining);
        }

        let targets: Vec<InterfaceDescriptor> = self.registry.boundary().cloned().collect();
        let Some(first) = targets.first() else {
            return vec![RouterAction::drop(DropReason::NoPath)];
        };
        let mut actions = vec![self.relay_with_reverse(rx, first, raw.clone())];
        for to in &targets[1..] {
            actions.push(self.forward(rx.source, to, raw.clone(), rx.now));
        }
        actions
    }

    /// Backbone traffic only crosses to the narrow interface its destination
    /// was heard on.
    fn bridge_to_narrow(&mut self, rx: &Inbound<'_>) -> Vec<RouterAction> {
        let dest = rx.packet.destination;
        let Some(entry) = self
            .path_table
            .route(&dest, rx.now)
            .filter(|entry| !entry.is_boundary_origin)
            .cloned()
        else {
            trace!(dest = %dest, "backbone traffic for unknown destination");
            return vec![RouterAction::drop(DropReason::NoPath)];
        };
        let Some(out) = self
            .outbound(entry.next_hop_interface)
            .filter(|d| !d.mode.is_boundary())
        else {
            return vec![RouterAction::drop(DropReason::NoPath)];
        };

        let raw = match address_toward(rx.raw, false, &entry, rx.hops_out()) {
            Ok(raw) => raw,
            Err(e) => return self.malformed(rx, e),
        };
        if rx.is_link_request() {
            return self.relay_link_request(
                rx,
                raw,
                &out,
                entry.next_hop_transport_id,
                entry.hops,
            );
        }
        vec![self.relay_with_reverse(rx, &out, raw)]
    }
}
