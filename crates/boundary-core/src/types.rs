//! Newtype wrappers for hash-valued envelope fields.
//!
//! Destination hashes, link ids and transport ids share the same 16-byte
//! representation on the wire; the newtypes keep table keys from being mixed.

use core::fmt;
use core::ops::Deref;

fn fmt_hex(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    bytes.iter().try_for_each(|b| write!(f, "{b:02x}"))
}

/// A fixed-size hash over a byte array, with hex `Display` and a `Debug`
/// form that shows only the first four bytes.
macro_rules! fixed_hash {
    ($(#[$meta:meta])* $name:ident, $len:literal $(, $extra:ident)*) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash $(, $extra)*)]
        #[must_use]
        pub struct $name(pub(crate) [u8; $len]);

        impl $name {
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub const fn to_bytes(self) -> [u8; $len] {
                self.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = InvalidLength;

            fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
                <[u8; $len]>::try_from(bytes).map(Self).map_err(|_| InvalidLength {
                    expected: $len,
                    actual: bytes.len(),
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt_hex(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($name), "("))?;
                fmt_hex(&self.0[..4], f)?;
                f.write_str("..)")
            }
        }
    };
}

fixed_hash!(
    /// The first 128 bits of a SHA-256 digest.
    TruncatedHash, 16, PartialOrd, Ord
);

fixed_hash!(
    /// A full SHA-256 digest.
    FullHash, 32
);

/// Declares a 16-byte newtype over [`TruncatedHash`] with the shared
/// conversions and a short `Debug` form.
macro_rules! truncated_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[must_use]
        pub struct $name(pub(crate) TruncatedHash);

        impl $name {
            pub const fn new(bytes: [u8; 16]) -> Self {
                Self(TruncatedHash(bytes))
            }
        }

        impl Deref for $name {
            type Target = TruncatedHash;
            fn deref(&self) -> &TruncatedHash {
                &self.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_ref()
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = InvalidLength;

            fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
                Ok(Self(TruncatedHash::try_from(bytes)?))
            }
        }

        impl From<TruncatedHash> for $name {
            fn from(hash: TruncatedHash) -> Self {
                Self(hash)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($name), "("))?;
                fmt_hex(&self.0.0[..4], f)?;
                f.write_str("..)")
            }
        }
    };
}

truncated_newtype!(
    /// A destination hash, also used for transport ids.
    DestinationHash
);

truncated_newtype!(
    /// A link id: the truncated hash of the link request that opened the link.
    LinkId
);

impl From<DestinationHash> for LinkId {
    /// Link traffic carries its link id in the destination field.
    fn from(dest: DestinationHash) -> Self {
        Self(dest.0)
    }
}

impl From<LinkId> for DestinationHash {
    fn from(link: LinkId) -> Self {
        Self(link.0)
    }
}

/// A full 32-byte packet hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct PacketHash(pub(crate) FullHash);

impl PacketHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(FullHash(bytes))
    }

    /// The truncated (16-byte) form used as a reverse-table key.
    #[must_use = "returns the truncated hash without modifying the original"]
    pub fn truncated(&self) -> TruncatedHash {
        let mut arr = [0u8; 16];
        arr.copy_from_slice(&self.0.0[..16]);
        TruncatedHash(arr)
    }
}

impl Deref for PacketHash {
    type Target = FullHash;
    fn deref(&self) -> &FullHash {
        &self.0
    }
}

impl AsRef<[u8]> for PacketHash {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl TryFrom<&[u8]> for PacketHash {
    type Error = InvalidLength;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(FullHash::try_from(bytes)?))
    }
}

impl fmt::Display for PacketHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for PacketHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PacketHash(")?;
        fmt_hex(&self.0.0[..4], f)?;
        f.write_str("..)")
    }
}

/// Error returned when a byte slice has the wrong length for a newtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLength {
    pub expected: usize,
    pub actual: usize,
}

impl fmt::Display for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid length: expected {} bytes, got {}",
            self.expected, self.actual
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InvalidLength {}
