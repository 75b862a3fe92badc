//! Transport layer error types.

use boundary_core::error::PacketError;

use crate::interface::InterfaceId;

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("packet error: {0}")]
    PacketError(#[from] PacketError),

    #[error("interfaces {first:?} and {second:?} share identity {id:#018x}")]
    DuplicateInterface {
        first: String,
        second: String,
        id: u64,
    },

    #[error("unknown interface: {0:?}")]
    UnknownInterface(InterfaceId),

    #[error("cache store error: {0}")]
    CacheStore(#[from] CacheStoreError),

    #[error("invalid header transformation: {0}")]
    InvalidTransformation(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("malformed destination hash: {len} bytes")]
    MalformedHash { len: usize },

    #[error("invalid interface mode: {0}")]
    InvalidInterfaceMode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CacheStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache store full: need {needed} bytes, {available} available")]
    Full { needed: usize, available: usize },

    #[error("invalid cache key: {0:?}")]
    InvalidKey(String),

    #[error("corrupt cache record: {0}")]
    Corrupt(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_error_display() {
        let err = RouterError::DuplicateInterface {
            first: "radio".into(),
            second: "radio".into(),
            id: 0xab,
        };
        assert_eq!(
            err.to_string(),
            "interfaces \"radio\" and \"radio\" share identity 0x00000000000000ab"
        );
    }

    #[test]
    fn test_path_error_display() {
        let err = PathError::MalformedHash { len: 0 };
        assert_eq!(err.to_string(), "malformed destination hash: 0 bytes");
    }

    #[test]
    fn test_cache_store_error_display() {
        let err = CacheStoreError::Full {
            needed: 300,
            available: 12,
        };
        assert_eq!(
            err.to_string(),
            "cache store full: need 300 bytes, 12 available"
        );
    }

    #[test]
    fn test_router_error_from_packet_error() {
        let pe = PacketError::TooShort { min: 19, actual: 5 };
        let re: RouterError = pe.into();
        assert!(matches!(re, RouterError::PacketError(_)));
    }

    #[test]
    fn test_router_error_from_cache_error() {
        let ce = CacheStoreError::Corrupt("short header");
        let re: RouterError = ce.into();
        assert!(matches!(re, RouterError::CacheStore(_)));
    }
}
