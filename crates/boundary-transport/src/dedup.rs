//! Fixed-capacity FIFO of recently seen packet hashes.
//!
//! Sized for low-throughput links: tens of entries, not the large rotating
//! hashlist a backbone transport node would keep. When full, the oldest
//! hash is forgotten.
//!
//! `contains` and `insert` are separate so the router can defer insertion
//! for link and proof traffic until it has confirmed a forwarding direction.

use std::collections::{HashSet, VecDeque};

use boundary_core::types::PacketHash;

/// Default number of remembered hashes.
pub const DEDUP_CAPACITY: usize = 48;

pub struct PacketDedup {
    order: VecDeque<PacketHash>,
    seen: HashSet<PacketHash>,
    capacity: usize,
}

impl PacketDedup {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    pub fn contains(&self, hash: &PacketHash) -> bool {
        self.seen.contains(hash)
    }

    /// Remember a hash. Returns `true` if it was new.
    pub fn insert(&mut self, hash: PacketHash) -> bool {
        if !self.seen.insert(hash) {
            return false;
        }
        if self.order.len() >= self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        self.order.push_back(hash);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PacketDedup {
    fn default() -> Self {
        Self::new(DEDUP_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_hash(seed: u8) -> PacketHash {
        let mut bytes = [0u8; 32];
        bytes[0] = seed;
        PacketHash::new(bytes)
    }

    #[test]
    fn test_new_is_empty() {
        let dedup = PacketDedup::default();
        assert!(dedup.is_empty());
        assert_eq!(dedup.capacity(), DEDUP_CAPACITY);
    }

    #[test]
    fn test_insert_duplicate_returns_false() {
        let mut dedup = PacketDedup::new(4);
        assert!(dedup.insert(make_hash(1)));
        assert!(!dedup.insert(make_hash(1)));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_contains_does_not_insert() {
        let mut dedup = PacketDedup::new(4);
        assert!(!dedup.contains(&make_hash(1)));
        assert!(dedup.is_empty());
        dedup.insert(make_hash(1));
        assert!(dedup.contains(&make_hash(1)));
    }

    #[test]
    fn test_fifo_eviction() {
        let mut dedup = PacketDedup::new(3);
        for seed in 1..=3 {
            dedup.insert(make_hash(seed));
        }
        dedup.insert(make_hash(4));
        assert_eq!(dedup.len(), 3);
        assert!(!dedup.contains(&make_hash(1)));
        assert!(dedup.contains(&make_hash(2)));
        assert!(dedup.contains(&make_hash(4)));

        // an evicted hash is accepted again
        assert!(dedup.insert(make_hash(1)));
        assert!(!dedup.contains(&make_hash(2)));
    }

    #[test]
    fn test_duplicate_insert_does_not_refresh_position() {
        let mut dedup = PacketDedup::new(2);
        dedup.insert(make_hash(1));
        dedup.insert(make_hash(2));
        dedup.insert(make_hash(1));
        dedup.insert(make_hash(3));
        assert!(!dedup.contains(&make_hash(1)));
    }
}
