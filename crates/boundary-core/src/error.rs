//! Error types for the boundary-core crate.

use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    TooShort { min: usize, actual: usize },
    InvalidHeaderType(u8),
    InvalidTransportType(u8),
    InvalidDestinationType(u8),
    InvalidPacketType(u8),
    MissingTransportId,
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketError::TooShort { min, actual } => {
                write!(
                    f,
                    "packet too short: need at least {min} bytes, got {actual}"
                )
            }
            PacketError::InvalidHeaderType(v) => write!(f, "invalid header type: {v}"),
            PacketError::InvalidTransportType(v) => write!(f, "invalid transport type: {v}"),
            PacketError::InvalidDestinationType(v) => {
                write!(f, "invalid destination type: {v}")
            }
            PacketError::InvalidPacketType(v) => write!(f, "invalid packet type: {v}"),
            PacketError::MissingTransportId => {
                write!(f, "header type 2 packet without a transport id")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PacketError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    MissingDelimiter,
    IncompleteEscape,
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::MissingDelimiter => write!(f, "missing frame delimiter"),
            FramingError::IncompleteEscape => write!(f, "incomplete escape sequence"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FramingError {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_packet_error_display() {
        let e = PacketError::TooShort { min: 19, actual: 4 };
        assert_eq!(
            format!("{e}"),
            "packet too short: need at least 19 bytes, got 4"
        );
        assert_eq!(
            format!("{}", PacketError::InvalidPacketType(7)),
            "invalid packet type: 7"
        );
    }

    #[test]
    fn test_framing_error_display() {
        assert_eq!(
            format!("{}", FramingError::IncompleteEscape),
            "incomplete escape sequence"
        );
    }
}
