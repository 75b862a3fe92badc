//! Packet flag byte encoding and decoding.
//!
//! ```text
//! Bit 7: unused
//! Bit 6: header_type (0=HEADER_1, 1=HEADER_2)
//! Bit 5: context_flag
//! Bit 4: transport_type (0=BROADCAST, 1=TRANSPORT)
//! Bits 3-2: destination_type (0=SINGLE, 1=GROUP, 2=PLAIN, 3=LINK)
//! Bits 1-0: packet_type (0=DATA, 1=ANNOUNCE, 2=LINKREQUEST, 3=PROOF)
//! ```

use crate::constants::{DestinationType, HeaderType, PacketType, TransportType};
use crate::error::PacketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketFlags {
    pub header_type: HeaderType,
    pub context_flag: bool,
    pub transport_type: TransportType,
    pub destination_type: DestinationType,
    pub packet_type: PacketType,
}

impl PacketFlags {
    pub fn from_byte(byte: u8) -> Result<Self, PacketError> {
        Ok(PacketFlags {
            header_type: HeaderType::from_u8((byte >> 6) & 0x01)?,
            context_flag: (byte >> 5) & 0x01 != 0,
            transport_type: TransportType::from_u8((byte >> 4) & 0x01)?,
            destination_type: DestinationType::from_u8((byte >> 2) & 0x03)?,
            packet_type: PacketType::from_u8(byte & 0x03)?,
        })
    }

    pub fn to_byte(&self) -> u8 {
        ((self.header_type as u8) << 6)
            | ((self.context_flag as u8) << 5)
            | ((self.transport_type as u8) << 4)
            | ((self.destination_type as u8) << 2)
            | (self.packet_type as u8)
    }

    /// Same flags re-addressed for a transport hop (HEADER_2, TRANSPORT).
    ///
    /// The context flag is cleared, matching what relays emit when they
    /// inject a transport header.
    pub fn as_transport(&self) -> Self {
        PacketFlags {
            header_type: HeaderType::Header2,
            context_flag: false,
            transport_type: TransportType::Transport,
            ..*self
        }
    }

    /// Same flags as a single-hop broadcast (HEADER_1, BROADCAST).
    pub fn as_broadcast(&self) -> Self {
        PacketFlags {
            header_type: HeaderType::Header1,
            context_flag: false,
            transport_type: TransportType::Broadcast,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_flag_bytes() {
        // Announce, HEADER_2 transport, SINGLE
        let flags = PacketFlags::from_byte(0x51).unwrap();
        assert_eq!(flags.header_type, HeaderType::Header2);
        assert_eq!(flags.transport_type, TransportType::Transport);
        assert_eq!(flags.destination_type, DestinationType::Single);
        assert_eq!(flags.packet_type, PacketType::Announce);

        // Proof on a link
        let flags = PacketFlags::from_byte(0x0f).unwrap();
        assert_eq!(flags.header_type, HeaderType::Header1);
        assert_eq!(flags.destination_type, DestinationType::Link);
        assert_eq!(flags.packet_type, PacketType::Proof);
    }

    #[test]
    fn test_flag_roundtrip_all_valid() {
        for ht in 0..=1u8 {
            for cf in 0..=1u8 {
                for tt in 0..=1u8 {
                    for dt in 0..=3u8 {
                        for pt in 0..=3u8 {
                            let byte = (ht << 6) | (cf << 5) | (tt << 4) | (dt << 2) | pt;
                            let flags = PacketFlags::from_byte(byte).unwrap();
                            assert_eq!(flags.to_byte(), byte);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_reserved_bit_ignored() {
        for byte in 0x80..=0xFFu8 {
            assert_eq!(
                PacketFlags::from_byte(byte).unwrap(),
                PacketFlags::from_byte(byte & 0x7F).unwrap(),
                "bit 7 should not affect parsed flags for 0x{byte:02x}"
            );
        }
    }

    #[test]
    fn test_transport_and_broadcast_keep_low_nibble() {
        let flags = PacketFlags::from_byte(0x2e).unwrap();
        let t = flags.as_transport();
        assert_eq!(t.to_byte(), 0x5e);
        assert_eq!(t.to_byte() & 0x0F, flags.to_byte() & 0x0F);
        let b = t.as_broadcast();
        assert_eq!(b.to_byte(), 0x0e);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn valid_flags_byte() -> impl Strategy<Value = u8> {
        (0..=1u8, 0..=1u8, 0..=1u8, 0..=3u8, 0..=3u8)
            .prop_map(|(ht, cf, tt, dt, pt)| (ht << 6) | (cf << 5) | (tt << 4) | (dt << 2) | pt)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn readdressing_preserves_hashable_bits(byte in valid_flags_byte()) {
            let flags = PacketFlags::from_byte(byte).unwrap();
            prop_assert_eq!(flags.as_transport().to_byte() & 0x0F, byte & 0x0F);
            prop_assert_eq!(flags.as_broadcast().to_byte() & 0x0F, byte & 0x0F);
        }
    }
}
