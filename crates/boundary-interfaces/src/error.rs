//! Error types for the interfaces layer.

/// Errors surfaced by interface operations.
///
/// Connection-level failures (a reset peer, a read timeout) are handled
/// inside the interface by teardown and reconnect; only the caller-visible
/// outcomes appear here.
#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("interface not connected")]
    NotConnected,
    #[error("interface stopped")]
    Stopped,
    #[error("interface already started")]
    AlreadyStarted,
    #[error("packet of {len} bytes exceeds hardware MTU of {mtu}")]
    Oversized { len: usize, mtu: usize },
    #[error("transmit failed: {0}")]
    TransmitFailed(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_variants() {
        let io_err = InterfaceError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        assert!(io_err.to_string().contains("I/O error"));

        assert_eq!(
            InterfaceError::NotConnected.to_string(),
            "interface not connected"
        );
        assert_eq!(InterfaceError::Stopped.to_string(), "interface stopped");

        let big = InterfaceError::Oversized { len: 600, mtu: 508 };
        assert_eq!(
            big.to_string(),
            "packet of 600 bytes exceeds hardware MTU of 508"
        );

        let cfg = InterfaceError::Configuration("no host".into());
        assert!(cfg.to_string().contains("configuration error"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let iface_err: InterfaceError = io_err.into();
        assert!(matches!(iface_err, InterfaceError::Io(_)));
        assert!(iface_err.to_string().contains("timed out"));
    }
}
