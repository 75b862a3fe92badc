//! Link MTU signalling and per-hop clamping.
//!
//! A link request whose payload is exactly `ECPUBSIZE + LINK_MTU_SIZE` bytes
//! ends in three signalling bytes: a 24-bit big-endian word holding the
//! proposed MTU in the low 21 bits and a link mode in the top 3.
//!
//! Relays must never let endpoints negotiate a segment larger than the
//! smallest fixed-MTU hop on the path, so the value is clamped on forward.

use boundary_core::constants::{ECPUBSIZE, LINK_MTU_SIZE};

use crate::interface::InterfaceDescriptor;

pub const MTU_BYTEMASK: u32 = 0x1F_FFFF;
pub const MODE_BYTEMASK: u8 = 0xE0;

/// Decoded signalling field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MtuSignal {
    pub mtu: u32,
    pub mode: u8,
}

impl MtuSignal {
    pub fn decode(bytes: [u8; LINK_MTU_SIZE]) -> Self {
        let word = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
        Self {
            mtu: word & MTU_BYTEMASK,
            mode: (bytes[0] & MODE_BYTEMASK) >> 5,
        }
    }

    pub fn encode(&self) -> [u8; LINK_MTU_SIZE] {
        let word = (self.mtu & MTU_BYTEMASK) | ((((self.mode << 5) & MODE_BYTEMASK) as u32) << 16);
        let [_, a, b, c] = word.to_be_bytes();
        [a, b, c]
    }
}

/// The signalling field of a link request payload, if present.
pub fn signalled(data: &[u8]) -> Option<MtuSignal> {
    if data.len() != ECPUBSIZE + LINK_MTU_SIZE {
        return None;
    }
    let mut bytes = [0u8; LINK_MTU_SIZE];
    bytes.copy_from_slice(&data[ECPUBSIZE..]);
    Some(MtuSignal::decode(bytes))
}

/// What clamping did to a link request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtuAdjustment {
    /// No signalling bytes, or the proposed MTU already fits.
    Unchanged,
    Clamped { from: u32, to: u32 },
    /// The outbound interface cannot honour any MTU; the field was removed.
    Stripped,
}

/// Clamp the signalled MTU of a link request payload for one hop.
///
/// The bytes are stripped when the outbound interface declares no usable
/// MTU. Otherwise the value is lowered to the smallest of the proposal, the
/// inbound interface's fixed MTU and the outbound interface's fixed MTU.
/// The mode bits are preserved.
pub fn clamp_link_request(
    data: &mut Vec<u8>,
    inbound: &InterfaceDescriptor,
    outbound: &InterfaceDescriptor,
) -> MtuAdjustment {
    let Some(signal) = signalled(data) else {
        return MtuAdjustment::Unchanged;
    };

    let Some(out_mtu) = outbound.usable_mtu() else {
        data.truncate(ECPUBSIZE);
        return MtuAdjustment::Stripped;
    };

    let limit = inbound
        .usable_mtu()
        .map_or(out_mtu, |in_mtu| in_mtu.min(out_mtu));
    let limit = u32::try_from(limit).unwrap_or(MTU_BYTEMASK).min(MTU_BYTEMASK);

    if limit >= signal.mtu {
        return MtuAdjustment::Unchanged;
    }

    let clamped = MtuSignal {
        mtu: limit,
        mode: signal.mode,
    };
    data[ECPUBSIZE..].copy_from_slice(&clamped.encode());
    MtuAdjustment::Clamped {
        from: signal.mtu,
        to: limit,
    }
}
