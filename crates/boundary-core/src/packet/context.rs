//! Packet context byte.
//!
//! The router acts on a handful of contexts. Every other value is opaque
//! payload metadata and is carried through as [`ContextType::Other`], so a
//! newer endpoint's contexts never make an otherwise valid packet unroutable.

/// Context values the router branches on, plus a passthrough for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextType {
    None,
    PathResponse,
    Keepalive,
    LinkClose,
    Lrproof,
    Other(u8),
}

const NONE: u8 = 0x00;
const PATH_RESPONSE: u8 = 0x0B;
const KEEPALIVE: u8 = 0xFA;
const LINK_CLOSE: u8 = 0xFC;
const LRPROOF: u8 = 0xFF;

impl From<u8> for ContextType {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl From<ContextType> for u8 {
    fn from(context: ContextType) -> Self {
        context.to_byte()
    }
}

impl ContextType {
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            NONE => Self::None,
            PATH_RESPONSE => Self::PathResponse,
            KEEPALIVE => Self::Keepalive,
            LINK_CLOSE => Self::LinkClose,
            LRPROOF => Self::Lrproof,
            other => Self::Other(other),
        }
    }

    #[must_use = "returns the encoded byte without side effects"]
    pub const fn to_byte(&self) -> u8 {
        match *self {
            Self::None => NONE,
            Self::PathResponse => PATH_RESPONSE,
            Self::Keepalive => KEEPALIVE,
            Self::LinkClose => LINK_CLOSE,
            Self::Lrproof => LRPROOF,
            Self::Other(byte) => byte,
        }
    }
}
