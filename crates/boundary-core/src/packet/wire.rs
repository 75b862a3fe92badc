//! Raw packet wire format parsing and serialization.
//!
//! Handles the envelope the router inspects and the two hashes it keys its
//! tables on: the packet hash (dedup, reverse table) and the link id (link
//! table). Neither hash covers the hop count or the transport id, so relays
//! can rewrite both without changing a packet's identity.

use alloc::vec::Vec;

use sha2::{Digest, Sha256};

use crate::constants::{
    ECPUBSIZE, HEADER_1_SIZE, HEADER_2_SIZE, HeaderType, PacketType, TRUNCATED_HASHLENGTH,
};
use crate::error::PacketError;
use crate::packet::context::ContextType;
use crate::packet::flags::PacketFlags;
use crate::types::{DestinationHash, LinkId, PacketHash, TruncatedHash};

/// A parsed packet envelope with an owned copy of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub flags: PacketFlags,
    pub hops: u8,
    pub transport_id: Option<DestinationHash>,
    pub destination: DestinationHash,
    pub context: ContextType,
    pub data: Vec<u8>,
}

fn hash_at(raw: &[u8], start: usize) -> DestinationHash {
    let mut bytes = [0u8; TRUNCATED_HASHLENGTH];
    bytes.copy_from_slice(&raw[start..start + TRUNCATED_HASHLENGTH]);
    DestinationHash::new(bytes)
}

impl RawPacket {
    /// Parse a raw packet from wire bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, PacketError> {
        if raw.len() < HEADER_1_SIZE {
            return Err(PacketError::TooShort {
                min: HEADER_1_SIZE,
                actual: raw.len(),
            });
        }

        let flags = PacketFlags::from_byte(raw[0])?;
        let hops = raw[1];

        match flags.header_type {
            HeaderType::Header1 => Ok(RawPacket {
                flags,
                hops,
                transport_id: None,
                destination: hash_at(raw, 2),
                context: ContextType::from_byte(raw[18]),
                data: raw[HEADER_1_SIZE..].to_vec(),
            }),
            HeaderType::Header2 => {
                if raw.len() < HEADER_2_SIZE {
                    return Err(PacketError::TooShort {
                        min: HEADER_2_SIZE,
                        actual: raw.len(),
                    });
                }
                Ok(RawPacket {
                    flags,
                    hops,
                    transport_id: Some(hash_at(raw, 2)),
                    destination: hash_at(raw, 18),
                    context: ContextType::from_byte(raw[34]),
                    data: raw[HEADER_2_SIZE..].to_vec(),
                })
            }
        }
    }

    pub fn header_size(&self) -> usize {
        match self.flags.header_type {
            HeaderType::Header1 => HEADER_1_SIZE,
            HeaderType::Header2 => HEADER_2_SIZE,
        }
    }

    /// Serialize the packet back to wire format.
    ///
    /// A HEADER_2 packet without a transport id cannot be represented.
    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        let mut out = Vec::with_capacity(self.header_size() + self.data.len());
        out.push(self.flags.to_byte());
        out.push(self.hops);

        match (self.flags.header_type, &self.transport_id) {
            (HeaderType::Header2, Some(tid)) => out.extend_from_slice(tid.as_ref()),
            (HeaderType::Header2, None) => return Err(PacketError::MissingTransportId),
            (HeaderType::Header1, _) => {}
        }

        out.extend_from_slice(self.destination.as_ref());
        out.push(self.context.to_byte());
        out.extend_from_slice(&self.data);
        Ok(out)
    }

    /// masked_flags(1) + destination(16) + context(1) + data.
    ///
    /// Flags are masked to the low nibble so header type, transport type and
    /// context flag rewrites by relays do not affect the hash.
    pub fn hashable_part(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + TRUNCATED_HASHLENGTH + self.data.len());
        out.push(self.flags.to_byte() & 0x0F);
        out.extend_from_slice(self.destination.as_ref());
        out.push(self.context.to_byte());
        out.extend_from_slice(&self.data);
        out
    }

    /// Full 32-byte SHA-256 of the hashable part.
    pub fn packet_hash(&self) -> PacketHash {
        PacketHash::new(Sha256::digest(self.hashable_part()).into())
    }

    /// Link id for a link request.
    ///
    /// Bytes beyond the two public keys (the MTU signalling field) are
    /// excluded, so clamping the signalled MTU in transit leaves the link id
    /// unchanged. Returns `None` for other packet types.
    pub fn link_id(&self) -> Option<LinkId> {
        if self.flags.packet_type != PacketType::LinkRequest {
            return None;
        }
        let mut hashable = self.hashable_part();
        if self.data.len() > ECPUBSIZE {
            let extra = self.data.len() - ECPUBSIZE;
            hashable.truncate(hashable.len() - extra);
        }
        let digest: [u8; 32] = Sha256::digest(&hashable).into();
        let mut bytes = [0u8; TRUNCATED_HASHLENGTH];
        bytes.copy_from_slice(&digest[..TRUNCATED_HASHLENGTH]);
        Some(LinkId::from(TruncatedHash::new(bytes)))
    }
}
