//! Capacity-bounded path table for destination routing.
//!
//! Overflow never fails: an insert into a full table first evicts one entry.
//! Backbone-learned (boundary-origin) entries go first, oldest first, since
//! they can be re-fetched from the announce cache; narrow-side entries are
//! only evicted when no boundary-origin entry remains.

use std::collections::HashMap;

use boundary_core::constants::PATHFINDER_M;
use boundary_core::types::DestinationHash;

use super::types::PathEntry;
use crate::error::PathError;
use crate::interface::InterfaceId;

/// Path table mapping destination hashes to path entries.
#[must_use]
pub struct PathTable {
    entries: HashMap<DestinationHash, PathEntry>,
    capacity: usize,
}

impl PathTable {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// The stored entry for a destination, expired or not.
    #[must_use]
    pub fn lookup(&self, dest: &DestinationHash) -> Option<&PathEntry> {
        self.entries.get(dest)
    }

    /// The entry for a destination if it is still live.
    #[must_use]
    pub fn route(&self, dest: &DestinationHash, now: u64) -> Option<&PathEntry> {
        self.entries.get(dest).filter(|e| !e.is_expired(now))
    }

    #[must_use]
    pub fn has_path(&self, dest: &DestinationHash, now: u64) -> bool {
        self.route(dest, now).is_some()
    }

    /// Hop count to a destination, or `PATHFINDER_M` if unknown.
    #[must_use]
    pub fn hops_to(&self, dest: &DestinationHash, now: u64) -> u8 {
        self.route(dest, now).map(|e| e.hops).unwrap_or(PATHFINDER_M)
    }

    #[must_use]
    pub fn next_hop_interface(&self, dest: &DestinationHash, now: u64) -> Option<InterfaceId> {
        self.route(dest, now).map(|e| e.next_hop_interface)
    }

    /// Insert or fully replace the entry for `dest`.
    ///
    /// Any existing entry is erased before the new one is inserted. Returns
    /// the entry evicted to make room, if one was.
    pub fn upsert(
        &mut self,
        dest: DestinationHash,
        entry: PathEntry,
    ) -> Option<(DestinationHash, PathEntry)> {
        self.entries.remove(&dest);
        let evicted = if self.entries.len() >= self.capacity {
            self.evict_one()
        } else {
            None
        };
        self.entries.insert(dest, entry);
        evicted
    }

    /// [`upsert`](Self::upsert) for a hash that has not been validated yet.
    pub fn upsert_bytes(
        &mut self,
        dest: &[u8],
        entry: PathEntry,
    ) -> Result<Option<(DestinationHash, PathEntry)>, PathError> {
        let dest = DestinationHash::try_from(dest)
            .map_err(|e| PathError::MalformedHash { len: e.actual })?;
        Ok(self.upsert(dest, entry))
    }

    /// Remove one entry: the oldest boundary-origin entry if any exist,
    /// otherwise the oldest entry overall.
    pub fn evict_one(&mut self) -> Option<(DestinationHash, PathEntry)> {
        let victim = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_boundary_origin)
            .min_by_key(|(_, e)| e.timestamp)
            .or_else(|| self.entries.iter().min_by_key(|(_, e)| e.timestamp))
            .map(|(dest, _)| *dest)?;
        self.entries.remove(&victim).map(|e| (victim, e))
    }

    /// Apply `f` to the stored entry. Returns `false` if there is none.
    pub fn update(&mut self, dest: &DestinationHash, f: impl FnOnce(&mut PathEntry)) -> bool {
        match self.entries.get_mut(dest) {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, dest: &DestinationHash) -> Option<PathEntry> {
        self.entries.remove(dest)
    }

    #[must_use]
    pub fn contains(&self, dest: &DestinationHash) -> bool {
        self.entries.contains_key(dest)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cull expired entries and entries for disappeared interfaces.
    ///
    /// Returns the number of entries removed.
    pub fn cull(&mut self, now: u64, active_interfaces: &[InterfaceId]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            !entry.is_expired(now) && active_interfaces.contains(&entry.next_hop_interface)
        });
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DestinationHash, &PathEntry)> {
        self.entries.iter()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::interface::InterfaceMode;
    use proptest::prelude::*;

    fn entry(timestamp: u64, boundary: bool) -> PathEntry {
        PathEntry::new(
            timestamp,
            InterfaceId(1),
            DestinationHash::new([0; 16]),
            1,
            InterfaceMode::Gateway,
            boundary,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn size_never_exceeds_capacity(
            capacity in 1..16usize,
            ops in proptest::collection::vec((0..40u8, 0..10_000u64, any::<bool>()), 0..200),
        ) {
            let mut table = PathTable::new(capacity);
            for (seed, ts, boundary) in ops {
                let dest = DestinationHash::new([seed; 16]);
                let had_boundary = table
                    .iter()
                    .any(|(d, e)| e.is_boundary_origin && *d != dest);
                let evicted = table.upsert(dest, entry(ts, boundary));
                prop_assert!(table.len() <= capacity);
                if let Some((_, victim)) = evicted
                    && had_boundary
                {
                    prop_assert!(victim.is_boundary_origin);
                }
            }
        }

        #[test]
        fn upsert_twice_leaves_latest(
            seed in any::<[u8; 16]>(),
            first in 0..1_000u64,
            second in 0..1_000u64,
        ) {
            let mut table = PathTable::new(8);
            let dest = DestinationHash::new(seed);
            table.upsert(dest, entry(first, false));
            table.upsert(dest, entry(second, true));
            prop_assert_eq!(table.len(), 1);
            let stored = table.lookup(&dest).unwrap();
            prop_assert_eq!(stored.timestamp, second);
            prop_assert!(stored.is_boundary_origin);
        }
    }
}
