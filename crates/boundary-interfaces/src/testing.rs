//! Conformance assertions shared by every [`Interface`] implementation's
//! tests.

use crate::error::InterfaceError;
use crate::traits::Interface;

/// Assert that the interface has a non-empty name.
pub fn assert_has_name(iface: &impl Interface) {
    assert!(!iface.name().is_empty(), "interface name must not be empty");
}

/// Assert that the descriptor handed to the router agrees with the
/// interface's own accessors.
pub fn assert_descriptor_matches(iface: &impl Interface) {
    let d = iface.descriptor();
    assert_eq!(d.name, iface.name());
    assert_eq!(d.id, iface.id(), "id must be derived from the name");
    assert_eq!(d.mode, iface.mode());
    assert_eq!(d.bitrate, iface.bitrate());
    assert_eq!(d.hw_mtu, Some(iface.hw_mtu()));
    assert!(iface.hw_mtu() > 0, "hw_mtu must be positive");
    assert!(iface.bitrate() > 0, "bitrate must be positive");
}

/// Assert that a fresh interface is offline and refuses to transmit.
pub async fn assert_pre_start_conformance(iface: &impl Interface) {
    assert_has_name(iface);
    assert!(
        !iface.is_connected(),
        "interface should not be connected before start()"
    );
    match iface.transmit(&[0x42; 20], None).await {
        Err(InterfaceError::NotConnected) => {}
        Err(e) => panic!("unexpected error from transmit before start: {e}"),
        Ok(()) => panic!("transmit should fail before start()"),
    }
}

/// Assert that `stop()` succeeds, leaves the interface offline, and can be
/// repeated.
pub async fn assert_stop_conformance(iface: &impl Interface) {
    let result = iface.stop().await;
    assert!(result.is_ok(), "stop() should succeed: {:?}", result.err());
    assert!(
        !iface.is_connected(),
        "is_connected() should be false after stop()"
    );
    let again = iface.stop().await;
    assert!(again.is_ok(), "second stop() should succeed: {:?}", again.err());
    assert!(
        matches!(iface.receive().await, Err(InterfaceError::Stopped)),
        "receive() after stop() should report Stopped"
    );
}
