//! Path request construction, parsing, pending bookkeeping and rate limiting.
//!
//! Path requests are broadcast DATA packets sent to the well-known PLAIN
//! destination `rnstransport.path.request`. Their payload is
//! `target(16) [+ transport_id(16)] + tag(1..=16)`.

use std::collections::HashMap;

use boundary_core::constants::{
    DestinationType, HeaderType, PATH_REQUEST_DEST_HASH_BYTES, PacketType, TRUNCATED_HASHLENGTH,
    TransportType,
};
use boundary_core::packet::context::ContextType;
use boundary_core::packet::flags::PacketFlags;
use boundary_core::types::DestinationHash;
use rand::RngCore;

use super::constants::PATH_REQUEST_MI;
use crate::interface::InterfaceId;

pub fn path_request_destination_hash() -> DestinationHash {
    DestinationHash::new(PATH_REQUEST_DEST_HASH_BYTES)
}

/// Result of parsing path request data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    Processed(ParsedPathRequest),
    /// Data is too short to contain a destination hash.
    TooShort,
    /// Data has a destination hash but no tag; ignored.
    Tagless,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPathRequest {
    pub destination_hash: DestinationHash,
    /// Present when the requester is itself a transport node.
    pub requesting_transport_id: Option<DestinationHash>,
    pub tag_bytes: Vec<u8>,
}

/// Parse a path request payload.
///
/// Exactly 16 bytes is tagless. More than 32 bytes means a transport id
/// precedes the tag. Tags longer than 16 bytes are truncated.
#[must_use]
pub fn parse_path_request_data(data: &[u8]) -> ParseResult {
    if data.len() < TRUNCATED_HASHLENGTH {
        return ParseResult::TooShort;
    }
    let (target, remaining) = data.split_at(TRUNCATED_HASHLENGTH);
    let Ok(destination_hash) = DestinationHash::try_from(target) else {
        return ParseResult::TooShort;
    };

    let (requesting_transport_id, raw_tag) = if remaining.len() > TRUNCATED_HASHLENGTH {
        let (tid, tag) = remaining.split_at(TRUNCATED_HASHLENGTH);
        (DestinationHash::try_from(tid).ok(), tag)
    } else {
        (None, remaining)
    };

    if raw_tag.is_empty() {
        return ParseResult::Tagless;
    }

    let tag_len = raw_tag.len().min(TRUNCATED_HASHLENGTH);
    ParseResult::Processed(ParsedPathRequest {
        destination_hash,
        requesting_transport_id,
        tag_bytes: raw_tag[..tag_len].to_vec(),
    })
}

#[must_use]
pub fn build_path_request_data(
    target: &DestinationHash,
    transport_id: Option<&DestinationHash>,
    tag: &[u8; 16],
) -> Vec<u8> {
    let mut data = Vec::with_capacity(3 * TRUNCATED_HASHLENGTH);
    data.extend_from_slice(target.as_ref());
    if let Some(tid) = transport_id {
        data.extend_from_slice(tid.as_ref());
    }
    data.extend_from_slice(tag);
    data
}

/// A complete path request packet: HEADER_1 | DATA | BROADCAST | PLAIN,
/// hops 0, context None.
#[must_use]
pub fn build_path_request_packet(
    target: &DestinationHash,
    transport_id: Option<&DestinationHash>,
    tag: &[u8; 16],
) -> Vec<u8> {
    let flags = PacketFlags {
        header_type: HeaderType::Header1,
        context_flag: false,
        transport_type: TransportType::Broadcast,
        destination_type: DestinationType::Plain,
        packet_type: PacketType::Data,
    };
    let data = build_path_request_data(target, transport_id, tag);

    let mut packet = Vec::with_capacity(19 + data.len());
    packet.push(flags.to_byte());
    packet.push(0);
    packet.extend_from_slice(&PATH_REQUEST_DEST_HASH_BYTES);
    packet.push(ContextType::None.to_byte());
    packet.extend_from_slice(&data);
    packet
}

pub fn random_tag() -> [u8; 16] {
    let mut tag = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut tag);
    tag
}

/// A path request forwarded to the backbone on behalf of a narrow interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPathRequest {
    pub requesting_interface: InterfaceId,
    pub requested_at: u64,
}

impl PendingPathRequest {
    /// Still waiting for an answer at `now`. Uses strict `>` for expiry.
    #[must_use]
    pub fn is_live(&self, now: u64, timeout: u64) -> bool {
        now <= self.requested_at.saturating_add(timeout)
    }
}

/// Bounded table of outstanding path requests, one per destination.
pub struct PendingRequests {
    entries: HashMap<DestinationHash, PendingPathRequest>,
    capacity: usize,
}

impl PendingRequests {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a request, replacing any earlier one for the same destination.
    /// When full, the oldest request is dropped. Returns `true` if an entry
    /// was evicted.
    pub fn insert(&mut self, dest: DestinationHash, pending: PendingPathRequest) -> bool {
        self.entries.remove(&dest);
        let mut evicted = false;
        if self.entries.len() >= self.capacity
            && let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, p)| p.requested_at)
                .map(|(d, _)| *d)
        {
            self.entries.remove(&oldest);
            evicted = true;
        }
        self.entries.insert(dest, pending);
        evicted
    }

    #[must_use]
    pub fn get(&self, dest: &DestinationHash) -> Option<&PendingPathRequest> {
        self.entries.get(dest)
    }

    /// Remove and return the live request for `dest` (consumed when
    /// answered). An expired request is removed and not returned.
    pub fn take(
        &mut self,
        dest: &DestinationHash,
        now: u64,
        timeout: u64,
    ) -> Option<PendingPathRequest> {
        self.entries.remove(dest).filter(|p| p.is_live(now, timeout))
    }

    /// Whether a request for `dest` is still waiting at `now`.
    #[must_use]
    pub fn is_pending(&self, dest: &DestinationHash, now: u64, timeout: u64) -> bool {
        self.entries.get(dest).is_some_and(|p| p.is_live(now, timeout))
    }

    #[must_use]
    pub fn contains(&self, dest: &DestinationHash) -> bool {
        self.entries.contains_key(dest)
    }

    /// Drop requests older than `timeout`.
    pub fn cull(&mut self, now: u64, timeout: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, p| p.is_live(now, timeout));
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

/// Rate limiter for router-originated path requests.
///
/// Bounded: when full, entries older than the interval are pruned first and
/// the oldest remaining entry is dropped if that frees nothing.
pub struct PathRequestTracker {
    requests: HashMap<DestinationHash, u64>,
    capacity: usize,
}

impl PathRequestTracker {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            requests: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns `true` and records `now` if a request for `dest` is allowed.
    pub fn try_request(&mut self, dest: &DestinationHash, now: u64) -> bool {
        if let Some(&last) = self.requests.get(dest)
            && now.saturating_sub(last) < PATH_REQUEST_MI
        {
            return false;
        }
        if !self.requests.contains_key(dest) && self.requests.len() >= self.capacity {
            self.requests
                .retain(|_, last| now.saturating_sub(*last) < PATH_REQUEST_MI);
            if self.requests.len() >= self.capacity
                && let Some(oldest) = self
                    .requests
                    .iter()
                    .min_by_key(|(_, t)| **t)
                    .map(|(d, _)| *d)
            {
                self.requests.remove(&oldest);
            }
        }
        self.requests.insert(*dest, now);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
