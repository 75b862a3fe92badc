//! Interface identity, operating mode and the registry the router consults.
//!
//! The router never touches sockets. It sees each interface through an
//! [`InterfaceDescriptor`] carrying the properties its policy depends on:
//! mode, bitrate, hardware MTU and direction capabilities.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::error::{PathError, RouterError};
use crate::path::constants::{AP_PATH_TIME, PATHFINDER_E, ROAMING_PATH_TIME};

/// Lightweight interface identifier, derived from the interface name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(pub u64);

impl InterfaceId {
    /// First eight bytes (big-endian) of SHA-256 over the interface name.
    pub fn from_name(name: &str) -> Self {
        let digest = Sha256::digest(name.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        InterfaceId(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Interface operating mode.
///
/// `Gateway`, `AccessPoint`, `Full` and `Roaming` are all "narrow" from the
/// boundary policy's point of view; only `Boundary` faces the backbone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InterfaceMode {
    Full = 0,
    AccessPoint = 2,
    Roaming = 3,
    Boundary = 4,
    Gateway = 5,
}

impl InterfaceMode {
    pub fn is_boundary(&self) -> bool {
        matches!(self, InterfaceMode::Boundary)
    }

    /// Path lifetime for entries learned on an interface in this mode.
    pub fn path_ttl(&self) -> u64 {
        match self {
            InterfaceMode::AccessPoint => AP_PATH_TIME,
            InterfaceMode::Roaming => ROAMING_PATH_TIME,
            InterfaceMode::Full | InterfaceMode::Boundary | InterfaceMode::Gateway => PATHFINDER_E,
        }
    }
}

impl FromStr for InterfaceMode {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(InterfaceMode::Full),
            "access_point" | "accesspoint" | "ap" => Ok(InterfaceMode::AccessPoint),
            "roaming" => Ok(InterfaceMode::Roaming),
            "boundary" => Ok(InterfaceMode::Boundary),
            "gateway" | "gw" => Ok(InterfaceMode::Gateway),
            _ => Err(PathError::InvalidInterfaceMode(s.to_string())),
        }
    }
}

/// Static properties of one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub id: InterfaceId,
    pub mode: InterfaceMode,
    /// Bits per second; used as the tie-breaker in path preference.
    pub bitrate: u64,
    /// Hardware frame limit, if the interface declares one.
    pub hw_mtu: Option<usize>,
    /// Whether `hw_mtu` is a hard limit that link MTU negotiation must honour.
    pub fixed_mtu: bool,
    pub can_receive: bool,
    pub can_transmit: bool,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>, mode: InterfaceMode, bitrate: u64) -> Self {
        let name = name.into();
        Self {
            id: InterfaceId::from_name(&name),
            name,
            mode,
            bitrate,
            hw_mtu: None,
            fixed_mtu: false,
            can_receive: true,
            can_transmit: true,
        }
    }

    pub fn with_fixed_mtu(mut self, hw_mtu: usize) -> Self {
        self.hw_mtu = Some(hw_mtu);
        self.fixed_mtu = true;
        self
    }

    /// The MTU that link negotiation may rely on, if any.
    pub fn usable_mtu(&self) -> Option<usize> {
        self.hw_mtu.filter(|_| self.fixed_mtu)
    }
}

/// Registered interfaces, in registration order.
#[derive(Debug, Default)]
pub struct InterfaceRegistry {
    order: Vec<InterfaceId>,
    by_id: HashMap<InterfaceId, InterfaceDescriptor>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interface. Two interfaces whose names hash to the same
    /// identity are a configuration error.
    pub fn register(&mut self, descriptor: InterfaceDescriptor) -> Result<InterfaceId, RouterError> {
        let id = descriptor.id;
        if let Some(existing) = self.by_id.get(&id) {
            return Err(RouterError::DuplicateInterface {
                first: existing.name.clone(),
                second: descriptor.name,
                id: id.0,
            });
        }
        self.order.push(id);
        self.by_id.insert(id, descriptor);
        Ok(id)
    }

    pub fn deregister(&mut self, id: InterfaceId) -> Option<InterfaceDescriptor> {
        self.order.retain(|i| *i != id);
        self.by_id.remove(&id)
    }

    #[must_use]
    pub fn get(&self, id: InterfaceId) -> Option<&InterfaceDescriptor> {
        self.by_id.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InterfaceDescriptor> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    /// Transmit-capable interfaces facing the backbone.
    pub fn boundary(&self) -> impl Iterator<Item = &InterfaceDescriptor> {
        self.iter().filter(|d| d.mode.is_boundary() && d.can_transmit)
    }

    /// Transmit-capable interfaces on the narrow side.
    pub fn narrow(&self) -> impl Iterator<Item = &InterfaceDescriptor> {
        self.iter().filter(|d| !d.mode.is_boundary() && d.can_transmit)
    }

    /// The default route: the first registered boundary interface.
    pub fn default_route(&self) -> Option<&InterfaceDescriptor> {
        self.boundary().next()
    }

    pub fn ids(&self) -> Vec<InterfaceId> {
        self.order.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_stable_per_name() {
        assert_eq!(InterfaceId::from_name("lora0"), InterfaceId::from_name("lora0"));
        assert_ne!(InterfaceId::from_name("lora0"), InterfaceId::from_name("lora1"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut reg = InterfaceRegistry::new();
        reg.register(InterfaceDescriptor::new("backbone", InterfaceMode::Boundary, 10_000_000))
            .unwrap();
        let err = reg
            .register(InterfaceDescriptor::new("backbone", InterfaceMode::Gateway, 5_000))
            .unwrap_err();
        assert!(matches!(err, RouterError::DuplicateInterface { .. }));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_boundary_and_narrow_partition() {
        let mut reg = InterfaceRegistry::new();
        reg.register(InterfaceDescriptor::new("lora", InterfaceMode::Gateway, 5_000))
            .unwrap();
        reg.register(InterfaceDescriptor::new("ap", InterfaceMode::AccessPoint, 10_000_000))
            .unwrap();
        reg.register(InterfaceDescriptor::new("backbone", InterfaceMode::Boundary, 10_000_000))
            .unwrap();

        let narrow: Vec<_> = reg.narrow().map(|d| d.name.as_str()).collect();
        assert_eq!(narrow, vec!["lora", "ap"]);
        assert_eq!(reg.default_route().unwrap().name, "backbone");
    }

    #[test]
    fn test_mode_ttls() {
        assert_eq!(InterfaceMode::AccessPoint.path_ttl(), 86_400);
        assert_eq!(InterfaceMode::Roaming.path_ttl(), 21_600);
        assert_eq!(InterfaceMode::Gateway.path_ttl(), 604_800);
        assert_eq!(InterfaceMode::Boundary.path_ttl(), 604_800);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("boundary".parse::<InterfaceMode>().unwrap(), InterfaceMode::Boundary);
        assert_eq!("AP".parse::<InterfaceMode>().unwrap(), InterfaceMode::AccessPoint);
        assert!("mesh".parse::<InterfaceMode>().is_err());
    }

    #[test]
    fn test_usable_mtu_requires_fixed() {
        let mut d = InterfaceDescriptor::new("x", InterfaceMode::Full, 1);
        d.hw_mtu = Some(500);
        assert_eq!(d.usable_mtu(), None);
        assert_eq!(d.with_fixed_mtu(1064).usable_mtu(), Some(1064));
    }
}
