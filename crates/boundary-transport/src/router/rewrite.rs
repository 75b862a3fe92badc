//! Transport header rewrites on raw packet bytes.
//!
//! Only the flag byte, hop count and transport id are ever changed; the
//! destination, context and payload bytes are copied through untouched.

use boundary_core::constants::{HEADER_1_SIZE, HEADER_2_SIZE, HeaderType, TRUNCATED_HASHLENGTH};
use boundary_core::packet::context::ContextType;
use boundary_core::packet::flags::PacketFlags;
use boundary_core::types::DestinationHash;

use crate::error::RouterError;

/// Convert HEADER_1 to HEADER_2 addressed to `next_hop`, with a new hop count.
pub fn inject_transport_header(
    raw: &[u8],
    next_hop: &DestinationHash,
    hops: u8,
) -> Result<Vec<u8>, RouterError> {
    if raw.len() < HEADER_1_SIZE {
        return Err(RouterError::InvalidTransformation(
            "packet too short for HEADER_1",
        ));
    }
    let flags = PacketFlags::from_byte(raw[0])?;
    if flags.header_type != HeaderType::Header1 {
        return Err(RouterError::InvalidTransformation("expected HEADER_1 packet"));
    }

    let mut out = Vec::with_capacity(raw.len() + TRUNCATED_HASHLENGTH);
    out.push(flags.as_transport().to_byte());
    out.push(hops);
    out.extend_from_slice(next_hop.as_ref());
    out.extend_from_slice(&raw[2..]);
    Ok(out)
}

/// Convert HEADER_2 to a single-hop HEADER_1 broadcast with a new hop count.
pub fn strip_transport_header(raw: &[u8], hops: u8) -> Result<Vec<u8>, RouterError> {
    if raw.len() < HEADER_2_SIZE {
        return Err(RouterError::InvalidTransformation(
            "packet too short for HEADER_2",
        ));
    }
    let flags = PacketFlags::from_byte(raw[0])?;
    if flags.header_type != HeaderType::Header2 {
        return Err(RouterError::InvalidTransformation("expected HEADER_2 packet"));
    }

    let mut out = Vec::with_capacity(raw.len() - TRUNCATED_HASHLENGTH);
    out.push(flags.as_broadcast().to_byte());
    out.push(hops);
    out.extend_from_slice(&raw[2 + TRUNCATED_HASHLENGTH..]);
    Ok(out)
}

/// Keep HEADER_2 but address it to the next transport hop.
pub fn replace_transport_id(
    raw: &[u8],
    next_hop: &DestinationHash,
    hops: u8,
) -> Result<Vec<u8>, RouterError> {
    if raw.len() < HEADER_2_SIZE {
        return Err(RouterError::InvalidTransformation(
            "packet too short for HEADER_2",
        ));
    }
    let mut out = raw.to_vec();
    out[1] = hops;
    out[2..2 + TRUNCATED_HASHLENGTH].copy_from_slice(next_hop.as_ref());
    Ok(out)
}

/// Address a packet of either header form to `next_hop` as HEADER_2.
pub fn readdress(
    raw: &[u8],
    next_hop: &DestinationHash,
    hops: u8,
) -> Result<Vec<u8>, RouterError> {
    let flags = PacketFlags::from_byte(*raw.first().ok_or(RouterError::InvalidTransformation(
        "empty packet",
    ))?)?;
    match flags.header_type {
        HeaderType::Header1 => inject_transport_header(raw, next_hop, hops),
        HeaderType::Header2 => replace_transport_id(raw, next_hop, hops),
    }
}

/// Overwrite the context byte in place.
pub fn set_context(raw: &mut [u8], context: ContextType) -> Result<(), RouterError> {
    let flags = PacketFlags::from_byte(*raw.first().ok_or(RouterError::InvalidTransformation(
        "empty packet",
    ))?)?;
    let at = match flags.header_type {
        HeaderType::Header1 => HEADER_1_SIZE - 1,
        HeaderType::Header2 => HEADER_2_SIZE - 1,
    };
    let slot = raw
        .get_mut(at)
        .ok_or(RouterError::InvalidTransformation("packet too short for context"))?;
    *slot = context.to_byte();
    Ok(())
}

/// Copy with only the hop count changed.
pub fn with_hops(raw: &[u8], hops: u8) -> Vec<u8> {
    let mut out = raw.to_vec();
    if let Some(h) = out.get_mut(1) {
        *h = hops;
    }
    out
}
