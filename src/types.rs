//! Core type definitions for the ROHC compressor.
//!
//! Provides zero-cost newtypes to prevent field mixups at compile time.
//! All types use `#[repr(transparent)]` for guaranteed zero runtime cost.

use std::fmt;
use std::ops::{Add, AddAssign, Deref, Sub};

use serde::{Deserialize, Serialize};

/// Macro to generate ROHC newtype wrappers with common implementations
macro_rules! rohc_newtype {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty) => $prefix:literal
        $(, custom_methods: { $($custom:tt)* })?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[derive(Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Creates a new instance
            #[inline]
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Raw value
            #[inline]
            pub const fn value(self) -> $inner {
                self.0
            }

            /// Cast to u64 for arithmetic operations
            #[inline]
            pub const fn as_u64(self) -> u64 {
                self.0 as u64
            }

            /// Wrapping addition
            #[inline]
            pub const fn wrapping_add(self, rhs: $inner) -> Self {
                Self(self.0.wrapping_add(rhs))
            }

            /// Wrapping subtraction returning the inner type
            #[inline]
            pub const fn wrapping_sub(self, rhs: Self) -> $inner {
                self.0.wrapping_sub(rhs.0)
            }

            $($($custom)*)?
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl Deref for $name {
            type Target = $inner;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl PartialEq<$inner> for $name {
            #[inline]
            fn eq(&self, other: &$inner) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<$name> for $inner {
            #[inline]
            fn eq(&self, other: &$name) -> bool {
                *self == other.0
            }
        }

        impl PartialOrd<$inner> for $name {
            #[inline]
            fn partial_cmp(&self, other: &$inner) -> Option<std::cmp::Ordering> {
                self.0.partial_cmp(other)
            }
        }

        impl PartialOrd<$name> for $inner {
            #[inline]
            fn partial_cmp(&self, other: &$name) -> Option<std::cmp::Ordering> {
                self.partial_cmp(&other.0)
            }
        }

        impl Add<$inner> for $name {
            type Output = Self;

            #[inline]
            fn add(self, rhs: $inner) -> Self::Output {
                self.wrapping_add(rhs)
            }
        }

        impl AddAssign<$inner> for $name {
            #[inline]
            fn add_assign(&mut self, rhs: $inner) {
                *self = self.wrapping_add(rhs);
            }
        }

        impl Sub<Self> for $name {
            type Output = $inner;

            #[inline]
            fn sub(self, rhs: Self) -> Self::Output {
                self.wrapping_sub(rhs)
            }
        }
    };
}

rohc_newtype!(
    /// Context identifier carried on the wire to label a compressed flow.
    ContextId(u16) => "CID"
);

rohc_newtype!(
    /// 16-bit wrapping sequence number maintained per context (RFC 3095 §5.11.1).
    SequenceNumber(u16) => "SN",
    custom_methods: {
        /// Convert to big-endian bytes.
        #[inline]
        pub fn to_be_bytes(self) -> [u8; 2] {
            self.0.to_be_bytes()
        }
    }
);

rohc_newtype!(
    /// IPv4 Identification field, kept in host order inside the compressor.
    IpId(u16) => "IP_ID",
    custom_methods: {
        /// Convert to big-endian bytes.
        #[inline]
        pub fn to_be_bytes(self) -> [u8; 2] {
            self.0.to_be_bytes()
        }
    }
);

rohc_newtype!(
    /// Opaque per-flow key derived from header fields by a profile.
    ///
    /// Used as a cheap first-stage filter when searching the context store;
    /// the profile's content match confirms a candidate.
    ContextKey(u32) => "KEY"
);

impl ContextId {
    /// Maximum valid context ID when small CIDs are used
    pub const MAX_SMALL: Self = Self::new(15);
    /// Maximum valid context ID when large CIDs are used
    pub const MAX_LARGE: Self = Self::new(16383);
}

impl ContextKey {
    /// Folds a slice of bytes into the key with a simple rotating XOR.
    pub fn mix_bytes(self, bytes: &[u8]) -> Self {
        let mut k = self.0;
        for &b in bytes {
            k = k.rotate_left(5) ^ u32::from(b);
        }
        Self(k)
    }

    /// Folds a 16-bit value into the key.
    #[inline]
    pub fn mix_u16(self, value: u16) -> Self {
        self.mix_bytes(&value.to_be_bytes())
    }

    /// Folds a 32-bit value into the key.
    #[inline]
    pub fn mix_u32(self, value: u32) -> Self {
        self.mix_bytes(&value.to_be_bytes())
    }
}

/// The kind of CIDs a compressor channel was negotiated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CidType {
    /// CIDs in `[0, 15]`, transmitted with an Add-CID octet (CID 0 implicit).
    Small,
    /// CIDs in `[0, 16383]`, transmitted SDVL-encoded after the type octet.
    Large,
}

impl CidType {
    /// Largest CID value representable for this CID type.
    pub const fn max_cid(self) -> ContextId {
        match self {
            CidType::Small => ContextId::MAX_SMALL,
            CidType::Large => ContextId::MAX_LARGE,
        }
    }
}
