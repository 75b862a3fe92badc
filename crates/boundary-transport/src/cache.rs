//! Announce cache collaborator.
//!
//! Backbone announces are cached by destination hash so a narrow-side path
//! request can be answered without another round trip over the backbone.
//! The store is a plain bounded key→bytes interface; the router owns the
//! record format ([`CachedPacket`]) and the eviction policy on `Full`.

use std::collections::HashMap;

use boundary_core::types::{DestinationHash, PacketHash};

use crate::error::CacheStoreError;
use crate::interface::InterfaceId;

/// Bounded key→bytes storage.
pub trait CacheStore: Send {
    fn exists(&self, key: &str) -> bool;
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheStoreError>;
    /// Store `data` under `key`, replacing any previous value. Fails with
    /// [`CacheStoreError::Full`] rather than exceeding capacity.
    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), CacheStoreError>;
    fn remove(&mut self, key: &str) -> Result<bool, CacheStoreError>;
    fn list(&self) -> Result<Vec<String>, CacheStoreError>;
    /// Bytes currently stored.
    fn size(&self) -> usize;
    /// Bytes still available.
    fn available(&self) -> usize;
}

/// Cache key for a destination: its lowercase hex form.
pub fn key_for(dest: &DestinationHash) -> String {
    hex::encode(dest.as_ref())
}

/// Parse a cache key back into a destination hash.
pub fn dest_for_key(key: &str) -> Result<Vec<u8>, CacheStoreError> {
    hex::decode(key).map_err(|_| CacheStoreError::InvalidKey(key.to_string()))
}

const RECORD_HEADER: usize = 8 + 8 + 32;

/// A cached announce as stored in the [`CacheStore`].
///
/// Encoded as `timestamp(8, BE) | interface(8, BE) | packet_hash(32) | raw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPacket {
    pub timestamp: u64,
    /// Interface the announce was received on.
    pub interface: InterfaceId,
    pub packet_hash: PacketHash,
    pub raw: Vec<u8>,
}

impl CachedPacket {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_HEADER + self.raw.len());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.interface.0.to_be_bytes());
        out.extend_from_slice(self.packet_hash.as_ref());
        out.extend_from_slice(&self.raw);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CacheStoreError> {
        if bytes.len() <= RECORD_HEADER {
            return Err(CacheStoreError::Corrupt("record shorter than header"));
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[..8]);
        let timestamp = u64::from_be_bytes(word);
        word.copy_from_slice(&bytes[8..16]);
        let interface = InterfaceId(u64::from_be_bytes(word));
        let packet_hash = PacketHash::try_from(&bytes[16..RECORD_HEADER])
            .map_err(|_| CacheStoreError::Corrupt("packet hash"))?;
        Ok(Self {
            timestamp,
            interface,
            packet_hash,
            raw: bytes[RECORD_HEADER..].to_vec(),
        })
    }
}

/// In-memory store bounded by total bytes and entry count.
pub struct MemoryCacheStore {
    entries: HashMap<String, Vec<u8>>,
    max_bytes: usize,
    max_entries: usize,
    used: usize,
}

impl MemoryCacheStore {
    pub fn new(max_bytes: usize, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_bytes,
            max_entries: max_entries.max(1),
            used: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn exists(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheStoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), CacheStoreError> {
        let is_new = !self.entries.contains_key(key);
        let replaced = self.entries.get(key).map_or(0, Vec::len);
        let available = self.max_bytes - (self.used - replaced);
        if data.len() > available || (is_new && self.entries.len() >= self.max_entries) {
            return Err(CacheStoreError::Full {
                needed: data.len(),
                available,
            });
        }
        self.used = self.used - replaced + data.len();
        self.entries.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, CacheStoreError> {
        match self.entries.remove(key) {
            Some(data) => {
                self.used -= data.len();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list(&self) -> Result<Vec<String>, CacheStoreError> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn size(&self) -> usize {
        self.used
    }

    fn available(&self) -> usize {
        self.max_bytes - self.used
    }
}

/// A store that holds nothing. Every write fails as full.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCacheStore;

impl CacheStore for NoopCacheStore {
    fn exists(&self, _key: &str) -> bool {
        false
    }

    fn read(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheStoreError> {
        Ok(None)
    }

    fn write(&mut self, _key: &str, data: &[u8]) -> Result<(), CacheStoreError> {
        Err(CacheStoreError::Full {
            needed: data.len(),
            available: 0,
        })
    }

    fn remove(&mut self, _key: &str) -> Result<bool, CacheStoreError> {
        Ok(false)
    }

    fn list(&self) -> Result<Vec<String>, CacheStoreError> {
        Ok(Vec::new())
    }

    fn size(&self) -> usize {
        0
    }

    fn available(&self) -> usize {
        0
    }
}
