//! Reverse table and link table.
//!
//! Both tables are bounded and evict their oldest entry when full. Stored
//! entries are only ever mutated in place (`update`, `get_mut`, `validate`,
//! `touch`); there is no copy-out/copy-in path that could lose a write.

use std::collections::HashMap;

use boundary_core::types::{LinkId, TruncatedHash};

use super::types::{LinkEntry, ReverseEntry};
use crate::interface::InterfaceId;

/// Reverse table for routing proofs back toward the originator.
///
/// Key: truncated packet hash of the forwarded packet; a proof for that
/// packet carries the same value as its destination.
pub struct ReverseTable {
    entries: HashMap<TruncatedHash, ReverseEntry>,
    capacity: usize,
}

impl ReverseTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Insert or replace an entry. Returns `true` if another entry was
    /// evicted to make room.
    pub fn insert(&mut self, key: TruncatedHash, entry: ReverseEntry) -> bool {
        self.entries.remove(&key);
        let evicted = self.entries.len() >= self.capacity && self.evict_oldest();
        self.entries.insert(key, entry);
        evicted
    }

    fn evict_oldest(&mut self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.timestamp)
            .map(|(k, _)| *k);
        oldest.is_some_and(|k| self.entries.remove(&k).is_some())
    }

    /// Look up and remove an entry (consumed on use).
    pub fn take(&mut self, key: &TruncatedHash) -> Option<ReverseEntry> {
        self.entries.remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &TruncatedHash) -> Option<&ReverseEntry> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &TruncatedHash) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove expired entries and entries with disappeared interfaces.
    pub fn cull(&mut self, now: u64, timeout: u64, active_interfaces: &[InterfaceId]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            !entry.is_expired(now, timeout)
                && active_interfaces.contains(&entry.receiving_interface)
                && active_interfaces.contains(&entry.outbound_interface)
        });
        before - self.entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Link table for relaying link traffic.
///
/// Key: link id.
pub struct LinkTable {
    entries: HashMap<LinkId, LinkEntry>,
    capacity: usize,
}

impl LinkTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Insert or replace an entry. Returns the entry evicted to make room.
    pub fn insert(&mut self, link_id: LinkId, entry: LinkEntry) -> Option<(LinkId, LinkEntry)> {
        self.entries.remove(&link_id);
        let mut evicted = None;
        if self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.timestamp)
                .map(|(k, _)| *k);
            if let Some(k) = oldest {
                evicted = self.entries.remove(&k).map(|e| (k, e));
            }
        }
        self.entries.insert(link_id, entry);
        evicted
    }

    #[must_use]
    pub fn get(&self, link_id: &LinkId) -> Option<&LinkEntry> {
        self.entries.get(link_id)
    }

    pub fn get_mut(&mut self, link_id: &LinkId) -> Option<&mut LinkEntry> {
        self.entries.get_mut(link_id)
    }

    /// The entry for `link_id` unless it has expired at `now`. An expired
    /// entry is removed here rather than waiting for the next cull.
    pub fn live(&mut self, link_id: &LinkId, now: u64, link_timeout: u64) -> Option<&LinkEntry> {
        if self
            .entries
            .get(link_id)
            .is_some_and(|entry| entry.is_expired(now, link_timeout))
        {
            self.entries.remove(link_id);
            return None;
        }
        self.entries.get(link_id)
    }

    #[must_use]
    pub fn is_live(&self, link_id: &LinkId, now: u64, link_timeout: u64) -> bool {
        self.entries
            .get(link_id)
            .is_some_and(|entry| !entry.is_expired(now, link_timeout))
    }

    /// Apply `f` to the stored entry. Returns `false` if there is none.
    pub fn update(&mut self, link_id: &LinkId, f: impl FnOnce(&mut LinkEntry)) -> bool {
        match self.entries.get_mut(link_id) {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }

    /// Mark a link validated and refresh its timestamp.
    ///
    /// Returns `true` only for the call that performs the transition.
    pub fn validate(&mut self, link_id: &LinkId, now: u64) -> bool {
        let mut transitioned = false;
        self.update(link_id, |entry| {
            transitioned = !entry.validated;
            entry.validated = true;
            entry.timestamp = now;
        });
        transitioned
    }

    /// Record activity on a link.
    pub fn touch(&mut self, link_id: &LinkId, now: u64) -> bool {
        self.update(link_id, |entry| entry.timestamp = now)
    }

    pub fn remove(&mut self, link_id: &LinkId) -> Option<LinkEntry> {
        self.entries.remove(link_id)
    }

    #[must_use]
    pub fn contains(&self, link_id: &LinkId) -> bool {
        self.entries.contains_key(link_id)
    }

    /// Remove expired links and links whose interfaces disappeared.
    pub fn cull(&mut self, now: u64, link_timeout: u64, active_interfaces: &[InterfaceId]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            !entry.is_expired(now, link_timeout)
                && active_interfaces.contains(&entry.received_interface)
                && active_interfaces.contains(&entry.next_hop_interface)
        });
        before - self.entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::constants::{LINK_TIMEOUT, REVERSE_TIMEOUT};
    use boundary_core::types::DestinationHash;

    fn make_trunc(seed: u8) -> TruncatedHash {
        TruncatedHash::new([seed; 16])
    }

    fn make_link_id(seed: u8) -> LinkId {
        LinkId::new([seed; 16])
    }

    fn reverse(ts: u64) -> ReverseEntry {
        ReverseEntry {
            receiving_interface: InterfaceId(1),
            outbound_interface: InterfaceId(2),
            timestamp: ts,
        }
    }

    fn link(ts: u64, proof_timeout: u64) -> LinkEntry {
        LinkEntry {
            timestamp: ts,
            next_hop_transport_id: DestinationHash::new([0xAA; 16]),
            next_hop_interface: InterfaceId(2),
            remaining_hops: 1,
            received_interface: InterfaceId(1),
            taken_hops: 1,
            dest_hash: DestinationHash::new([0xBB; 16]),
            validated: false,
            proof_timeout,
        }
    }

    #[test]
    fn test_reverse_table_cull() {
        let mut table = ReverseTable::new(8);
        let ifaces = vec![InterfaceId(1), InterfaceId(2)];
        table.insert(make_trunc(1), reverse(1000));
        table.insert(make_trunc(2), reverse(100));
        let mut gone = reverse(1000);
        gone.receiving_interface = InterfaceId(99);
        table.insert(make_trunc(3), gone);

        assert_eq!(table.cull(1000, REVERSE_TIMEOUT, &ifaces), 2);
        assert!(table.contains(&make_trunc(1)));
    }

    #[test]
    fn test_reverse_table_take_consumes() {
        let mut table = ReverseTable::new(8);
        table.insert(make_trunc(1), reverse(5));
        assert_eq!(table.take(&make_trunc(1)).unwrap().timestamp, 5);
        assert!(table.take(&make_trunc(1)).is_none());
    }

    #[test]
    fn test_reverse_table_bounded() {
        let mut table = ReverseTable::new(2);
        assert!(!table.insert(make_trunc(1), reverse(10)));
        assert!(!table.insert(make_trunc(2), reverse(5)));
        assert!(table.insert(make_trunc(3), reverse(20)));
        assert_eq!(table.len(), 2);
        assert!(!table.contains(&make_trunc(2)));
    }

    #[test]
    fn test_link_validate_once() {
        let mut table = LinkTable::new(4);
        table.insert(make_link_id(1), link(100, 106));
        assert!(table.validate(&make_link_id(1), 103));
        assert!(!table.validate(&make_link_id(1), 104));
        let entry = table.get(&make_link_id(1)).unwrap();
        assert!(entry.validated);
        assert_eq!(entry.timestamp, 104);
        assert!(!table.validate(&make_link_id(9), 104));
    }

    #[test]
    fn test_touch_persists() {
        let mut table = LinkTable::new(4);
        table.insert(make_link_id(1), link(100, 106));
        for now in 101..=120 {
            assert!(table.touch(&make_link_id(1), now));
        }
        assert_eq!(table.get(&make_link_id(1)).unwrap().timestamp, 120);
    }

    #[test]
    fn test_get_mut_persists() {
        let mut table = LinkTable::new(4);
        table.insert(make_link_id(1), link(100, 106));
        if let Some(entry) = table.get_mut(&make_link_id(1)) {
            entry.remaining_hops = 7;
        }
        assert_eq!(table.get(&make_link_id(1)).unwrap().remaining_hops, 7);
    }

    #[test]
    fn test_unvalidated_link_culled_at_proof_timeout() {
        let mut table = LinkTable::new(4);
        let active = [InterfaceId(1), InterfaceId(2)];
        table.insert(make_link_id(1), link(100, 106));
        assert_eq!(table.cull(106, LINK_TIMEOUT, &active), 0);
        assert_eq!(table.cull(107, LINK_TIMEOUT, &active), 1);
    }

    #[test]
    fn test_live_lookup_removes_expired_link() {
        let mut table = LinkTable::new(4);
        table.insert(make_link_id(1), link(100, 106));
        assert!(table.is_live(&make_link_id(1), 106, LINK_TIMEOUT));
        assert!(table.live(&make_link_id(1), 106, LINK_TIMEOUT).is_some());

        assert!(!table.is_live(&make_link_id(1), 107, LINK_TIMEOUT));
        assert!(table.contains(&make_link_id(1)));
        assert!(table.live(&make_link_id(1), 107, LINK_TIMEOUT).is_none());
        assert!(!table.contains(&make_link_id(1)));
    }

    #[test]
    fn test_validated_link_outlives_proof_timeout() {
        let mut table = LinkTable::new(4);
        let active = [InterfaceId(1), InterfaceId(2)];
        table.insert(make_link_id(1), link(100, 106));
        table.validate(&make_link_id(1), 105);

        assert_eq!(table.cull(500, LINK_TIMEOUT, &active), 0);
        assert_eq!(table.cull(105 + LINK_TIMEOUT, LINK_TIMEOUT, &active), 0);
        assert_eq!(table.cull(106 + LINK_TIMEOUT, LINK_TIMEOUT, &active), 1);
    }

    #[test]
    fn test_link_table_bounded() {
        let mut table = LinkTable::new(2);
        table.insert(make_link_id(1), link(300, 306));
        table.insert(make_link_id(2), link(100, 106));
        let (evicted, _) = table.insert(make_link_id(3), link(400, 406)).unwrap();
        assert_eq!(evicted, make_link_id(2));
        assert_eq!(table.len(), 2);
    }
}
