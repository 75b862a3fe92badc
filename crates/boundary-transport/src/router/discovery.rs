//! Announces, path requests and the announce cache.

use boundary_core::packet::context::ContextType;
use boundary_core::packet::wire::RawPacket;
use boundary_core::types::{DestinationHash, LinkId};
use tracing::{debug, warn};

use super::dispatch::{Inbound, Router};
use super::rewrite::{readdress, set_context, with_hops};
use super::types::{DropReason, RouterAction};
use crate::cache::{CachedPacket, key_for};
use crate::error::{CacheStoreError, RouterError};
use crate::interface::InterfaceDescriptor;
use crate::path::PathEntry;
use crate::path::constants::PATHFINDER_E;
use crate::path::path_request::{
    ParseResult, PendingPathRequest, build_path_request_packet, parse_path_request_data,
    random_tag,
};

impl Router {
    pub(super) fn handle_announce(&mut self, rx: &Inbound<'_>) -> Vec<RouterAction> {
        if rx.source.mode.is_boundary() {
            self.handle_backbone_announce(rx)
        } else {
            self.handle_narrow_announce(rx)
        }
    }

    /// Backbone announces go to the cache. They only reach the path table
    /// when they answer a path request a narrow interface is waiting on.
    fn handle_backbone_announce(&mut self, rx: &Inbound<'_>) -> Vec<RouterAction> {
        let dest = rx.packet.destination;
        self.cache_announce(rx);

        let timeout = self.config.pending_request_timeout;
        let Some(pending) = self.pending.take(&dest, rx.now, timeout) else {
            return vec![RouterAction::drop(DropReason::Cached)];
        };

        let hops = rx.hops_out();
        if self.prefer(&dest, rx.source, hops, rx.now) {
            let entry = PathEntry::new(
                rx.now,
                rx.source.id,
                rx.packet.transport_id.unwrap_or(dest),
                hops,
                rx.source.mode,
                true,
            );
            self.install_path(dest, entry);
        }

        let Some(requester) = self.outbound(pending.requesting_interface) else {
            debug!(dest = %dest, "path request origin is gone");
            return vec![RouterAction::drop(DropReason::NoDirection)];
        };
        match self.path_response(rx.raw, hops) {
            Ok(raw) => {
                debug!(dest = %dest, to = %requester.name, "answering pending path request");
                vec![self.forward(rx.source, &requester, raw, rx.now)]
            }
            Err(e) => self.malformed(rx, e),
        }
    }

    /// Narrow announces are recorded and rebroadcast toward the backbone
    /// only. Nothing learned elsewhere is rebroadcast onto a narrow link.
    fn handle_narrow_announce(&mut self, rx: &Inbound<'_>) -> Vec<RouterAction> {
        let dest = rx.packet.destination;
        let hops = rx.hops_out();
        if !self.prefer(&dest, rx.source, hops, rx.now) {
            debug!(dest = %dest, iface = %rx.source.name, hops, "announce not preferred");
            return vec![RouterAction::drop(DropReason::NotPreferred)];
        }

        let entry = PathEntry::new(
            rx.now,
            rx.source.id,
            rx.packet.transport_id.unwrap_or(dest),
            hops,
            rx.source.mode,
            false,
        );
        self.install_path(dest, entry);

        let raw = match readdress(rx.raw, &self.config.transport_id, hops) {
            Ok(raw) => raw,
            Err(e) => return self.malformed(rx, e),
        };
        let targets: Vec<InterfaceDescriptor> = self.registry.boundary().cloned().collect();
        if targets.is_empty() {
            return vec![RouterAction::drop(DropReason::NoPath)];
        }
        targets
            .iter()
            .map(|to| self.forward(rx.source, to, raw.clone(), rx.now))
            .collect()
    }

    /// Whether an announce heard on `source` with `hops` should replace the
    /// current path to `dest`.
    pub(super) fn prefer(
        &self,
        dest: &DestinationHash,
        source: &InterfaceDescriptor,
        hops: u8,
        now: u64,
    ) -> bool {
        let Some(current) = self.path_table.lookup(dest) else {
            return true;
        };
        if current.is_expired(now) || current.next_hop_interface == source.id {
            return true;
        }
        if hops != current.hops {
            return hops < current.hops;
        }
        let current_bitrate = self
            .registry
            .get(current.next_hop_interface)
            .map_or(0, |d| d.bitrate);
        source.bitrate >= current_bitrate
    }

    fn install_path(&mut self, dest: DestinationHash, entry: PathEntry) {
        if let Some((evicted, old)) = self.path_table.upsert(dest, entry) {
            self.stats.evictions += 1;
            if old.is_boundary_origin {
                debug!(dest = %evicted, "evicted boundary-origin path");
            } else {
                warn!(dest = %evicted, "path table full, evicted live path");
            }
        }
    }

    /// An announce re-addressed from this node, flagged as a path response.
    fn path_response(&self, raw: &[u8], hops: u8) -> Result<Vec<u8>, RouterError> {
        let mut out = readdress(raw, &self.config.transport_id, hops)?;
        set_context(&mut out, ContextType::PathResponse)?;
        Ok(out)
    }

    pub(super) fn handle_path_request(&mut self, rx: &Inbound<'_>) -> Vec<RouterAction> {
        let request = match parse_path_request_data(&rx.packet.data) {
            ParseResult::Processed(request) => request,
            ParseResult::TooShort => {
                self.stats.malformed_dropped += 1;
                return vec![RouterAction::drop(DropReason::Malformed)];
            }
            ParseResult::Tagless => return self.suppressed("tagless path request"),
        };
        let target = request.destination_hash;

        if self.link_table.is_live(&LinkId::from(target), rx.now, self.config.link_timeout) {
            return self.suppressed("path request for a link id");
        }

        if rx.source.mode.is_boundary() {
            return self.relay_backbone_path_request(rx, &target);
        }

        if let Some(cached) = self.cached_announce(&target, rx.now) {
            return self.answer_from_cache(rx, target, cached);
        }

        if self
            .pending
            .is_pending(&target, rx.now, self.config.pending_request_timeout)
        {
            return self.suppressed("path request already pending");
        }
        let evicted = self.pending.insert(
            target,
            PendingPathRequest {
                requesting_interface: rx.source.id,
                requested_at: rx.now,
            },
        );
        if evicted {
            self.stats.evictions += 1;
        }

        let targets: Vec<InterfaceDescriptor> = self.registry.boundary().cloned().collect();
        if targets.is_empty() {
            return vec![RouterAction::drop(DropReason::NoPath)];
        }
        debug!(dest = %target, iface = %rx.source.name, "forwarding path request to backbone");
        let raw = with_hops(rx.raw, rx.hops_out());
        targets
            .iter()
            .map(|to| self.forward(rx.source, to, raw.clone(), rx.now))
            .collect()
    }

    /// Backbone path requests are only passed to the narrow interface the
    /// destination was heard on.
    fn relay_backbone_path_request(
        &mut self,
        rx: &Inbound<'_>,
        target: &DestinationHash,
    ) -> Vec<RouterAction> {
        let to = self
            .path_table
            .route(target, rx.now)
            .filter(|entry| !entry.is_boundary_origin)
            .and_then(|entry| self.outbound(entry.next_hop_interface))
            .filter(|d| !d.mode.is_boundary());
        match to {
            Some(to) => {
                let raw = with_hops(rx.raw, rx.hops_out());
                vec![self.forward(rx.source, &to, raw, rx.now)]
            }
            None => vec![RouterAction::drop(DropReason::NoPath)],
        }
    }

    fn answer_from_cache(
        &mut self,
        rx: &Inbound<'_>,
        target: DestinationHash,
        cached: CachedPacket,
    ) -> Vec<RouterAction> {
        let announce = match RawPacket::parse(&cached.raw) {
            Ok(announce) => announce,
            Err(e) => {
                warn!(dest = %target, "dropping unreadable cached announce: {e}");
                self.forget_cached(&target);
                return vec![RouterAction::drop(DropReason::NoPath)];
            }
        };
        let hops = announce.hops.saturating_add(1);

        let via = self
            .outbound(cached.interface)
            .or_else(|| self.registry.default_route().cloned())
            .filter(|via| self.prefer(&target, via, hops, rx.now));
        if let Some(via) = via {
            let entry = PathEntry::new(
                rx.now,
                via.id,
                announce.transport_id.unwrap_or(target),
                hops,
                via.mode,
                true,
            );
            self.install_path(target, entry);
        }

        match self.path_response(&cached.raw, hops) {
            Ok(raw) => {
                debug!(dest = %target, to = %rx.source.name, "answering path request from cache");
                vec![RouterAction::Transmit {
                    interface: rx.source.id,
                    raw,
                }]
            }
            Err(e) => self.malformed(rx, e),
        }
    }

    /// Ask the narrow side for a path this node has been asked to reach.
    /// Rate-limited per destination; never issued for a link id.
    pub(super) fn request_path(&mut self, dest: &DestinationHash, now: u64) -> Vec<RouterAction> {
        if self.link_table.is_live(&LinkId::from(*dest), now, self.config.link_timeout) {
            return self.suppressed("path request for a link id");
        }
        if !self.request_tracker.try_request(dest, now) {
            return self.suppressed("path request rate-limited");
        }

        let raw = build_path_request_packet(dest, Some(&self.config.transport_id), &random_tag());
        debug!(dest = %dest, "requesting path on narrow interfaces");
        let mut actions: Vec<RouterAction> = self
            .registry
            .narrow()
            .map(|d| RouterAction::Transmit {
                interface: d.id,
                raw: raw.clone(),
            })
            .collect();
        actions.push(RouterAction::drop(DropReason::NoPath));
        actions
    }

    pub(super) fn suppressed(&mut self, why: &'static str) -> Vec<RouterAction> {
        self.stats.path_requests_suppressed += 1;
        debug!("{why}");
        vec![RouterAction::drop(DropReason::PathRequestSuppressed)]
    }

    fn cache_announce(&mut self, rx: &Inbound<'_>) {
        let dest = rx.packet.destination;
        let key = key_for(&dest);
        let record = CachedPacket {
            timestamp: rx.now,
            interface: rx.source.id,
            packet_hash: rx.hash,
            raw: rx.raw.to_vec(),
        }
        .encode();

        let result = match self.cache.write(&key, &record) {
            Err(CacheStoreError::Full { .. }) if self.evict_oldest_cached() => {
                self.cache.write(&key, &record)
            }
            other => other,
        };
        match result {
            Ok(()) => {
                self.stats.announces_cached += 1;
                debug!(dest = %dest, iface = %rx.source.name, "cached backbone announce");
            }
            Err(e) => warn!(dest = %dest, "cannot cache announce: {e}"),
        }
    }

    /// A cached announce for `dest`, if present and younger than the
    /// path expiry. Stale or unreadable records are removed.
    pub fn cached_announce(&mut self, dest: &DestinationHash, now: u64) -> Option<CachedPacket> {
        let key = key_for(dest);
        let bytes = match self.cache.read(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(dest = %dest, "cache read failed: {e}");
                return None;
            }
        };
        match CachedPacket::decode(&bytes) {
            Ok(record) if now > record.timestamp.saturating_add(PATHFINDER_E) => {
                debug!(dest = %dest, "cached announce expired");
                self.forget_cached(dest);
                None
            }
            Ok(record) => Some(record),
            Err(e) => {
                warn!(dest = %dest, "corrupt cache record: {e}");
                self.forget_cached(dest);
                None
            }
        }
    }

    fn forget_cached(&mut self, dest: &DestinationHash) {
        if let Err(e) = self.cache.remove(&key_for(dest)) {
            warn!(dest = %dest, "cache remove failed: {e}");
        }
    }

    /// Remove the oldest cached announce. Returns whether one was removed.
    fn evict_oldest_cached(&mut self) -> bool {
        let keys = match self.cache.list() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("cache list failed: {e}");
                return false;
            }
        };
        let oldest = keys
            .into_iter()
            .filter_map(|key| {
                let bytes = self.cache.read(&key).ok().flatten()?;
                let timestamp = CachedPacket::decode(&bytes).map_or(0, |r| r.timestamp);
                Some((timestamp, key))
            })
            .min();
        let Some((_, key)) = oldest else {
            return false;
        };
        match self.cache.remove(&key) {
            Ok(removed) => {
                if removed {
                    self.stats.evictions += 1;
                    debug!(key = %key, "announce cache full, evicted oldest record");
                }
                removed
            }
            Err(e) => {
                warn!(key = %key, "cache remove failed: {e}");
                false
            }
        }
    }
}
