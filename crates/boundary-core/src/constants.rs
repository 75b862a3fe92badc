//! Envelope constants and header field enumerations.

use crate::error::PacketError;

pub const MTU: usize = 500;
pub const HEADER_1_SIZE: usize = 19;
pub const HEADER_2_SIZE: usize = 35;
pub const HEADER_MINSIZE: usize = HEADER_1_SIZE;

pub const TRUNCATED_HASHLENGTH: usize = 16;

/// Size of the two ephemeral public keys carried by a link request.
pub const ECPUBSIZE: usize = 64;

/// Size of the trailing MTU signalling field on link requests and proofs.
pub const LINK_MTU_SIZE: usize = 3;

/// Maximum hop count a packet may carry before it is dropped.
pub const PATHFINDER_M: u8 = 128;

/// Well-known PLAIN destination for `rnstransport.path.request`.
pub const PATH_REQUEST_DEST_HASH_BYTES: [u8; 16] = [
    0x6b, 0x9f, 0x66, 0x01, 0x4d, 0x98, 0x53, 0xfa, 0xab, 0x22, 0x0f, 0xba, 0x47, 0xd0, 0x27,
    0x61,
];

/// A flag-byte field: a `#[repr(u8)]` enum plus a checked `from_u8`.
macro_rules! flag_field {
    ($(#[$meta:meta])* $name:ident, $err:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn from_u8(v: u8) -> Result<Self, PacketError> {
                match v {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(PacketError::$err(v)),
                }
            }
        }
    };
}

flag_field!(
    /// Bit 6: one address field, or a transport id followed by the destination.
    HeaderType, InvalidHeaderType { Header1 = 0, Header2 = 1 }
);

flag_field!(
    /// Bit 4: whether the packet is addressed to a specific transport node.
    TransportType, InvalidTransportType { Broadcast = 0, Transport = 1 }
);

flag_field!(
    DestinationType, InvalidDestinationType { Single = 0, Group = 1, Plain = 2, Link = 3 }
);

flag_field!(
    PacketType, InvalidPacketType { Data = 0, Announce = 1, LinkRequest = 2, Proof = 3 }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_sizes() {
        assert_eq!(HEADER_1_SIZE, 2 + TRUNCATED_HASHLENGTH + 1);
        assert_eq!(HEADER_2_SIZE, 2 + 2 * TRUNCATED_HASHLENGTH + 1);
    }

    #[test]
    fn test_path_request_destination() {
        let expected = hex::decode("6b9f66014d9853faab220fba47d02761").unwrap();
        assert_eq!(PATH_REQUEST_DEST_HASH_BYTES.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_enum_values() {
        assert_eq!(HeaderType::Header1 as u8, 0);
        assert_eq!(HeaderType::Header2 as u8, 1);
        assert_eq!(TransportType::Broadcast as u8, 0);
        assert_eq!(TransportType::Transport as u8, 1);
        assert_eq!(DestinationType::Single as u8, 0);
        assert_eq!(DestinationType::Group as u8, 1);
        assert_eq!(DestinationType::Plain as u8, 2);
        assert_eq!(DestinationType::Link as u8, 3);
        assert_eq!(PacketType::Data as u8, 0);
        assert_eq!(PacketType::Announce as u8, 1);
        assert_eq!(PacketType::LinkRequest as u8, 2);
        assert_eq!(PacketType::Proof as u8, 3);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert_eq!(HeaderType::from_u8(2), Err(PacketError::InvalidHeaderType(2)));
        assert_eq!(
            DestinationType::from_u8(4),
            Err(PacketError::InvalidDestinationType(4))
        );
        assert_eq!(PacketType::from_u8(9), Err(PacketError::InvalidPacketType(9)));
    }
}
