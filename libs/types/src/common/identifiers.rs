//! # Typed Identifiers
//!
//! Zero-cost wrappers around the 64-bit integers that travel across the host
//! boundary. Every handle in the runtime is "just a u64" on the wire, but
//! mixing a process id with a resource handle is a bug the compiler can
//! catch, so each gets its own type.
//!
//! ```rust
//! use types::{ProcessId, ResourceId};
//!
//! let process = ProcessId::new(7);
//! let socket = ResourceId::new(3);
//!
//! fn kill(target: ProcessId) { /* ... */ }
//! kill(process);
//! // kill(socket); // compile error
//! ```

use crate::common::errors::ValidationError;

/// Macro for creating typed u64 identifiers
///
/// Generates a transparent newtype with conversions, `Display` and
/// serde support that (de)serializes as the raw integer.
macro_rules! define_typed_id {
    (
        $(#[$meta:meta])*
        $name:ident, $prefix:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create a new typed ID
            #[inline(always)]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Create a new typed ID, rejecting the null value
            #[inline]
            pub fn new_validated(id: u64) -> Result<Self, ValidationError> {
                if id == 0 {
                    return Err(ValidationError::NullId);
                }
                Ok(Self(id))
            }

            /// Extract the inner u64 value
            #[inline(always)]
            pub const fn inner(&self) -> u64 {
                self.0
            }

            /// Generate next sequential ID
            #[inline(always)]
            pub fn next(&self) -> Self {
                Self(self.0.wrapping_add(1))
            }

            #[inline(always)]
            pub fn is_null(&self) -> bool {
                self.0 == 0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl From<u64> for $name {
            #[inline(always)]
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            #[inline(always)]
            fn from(id: $name) -> u64 {
                id.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                u64::deserialize(deserializer).map(Self)
            }
        }
    };
}

define_typed_id!(
    /// Node-wide process identifier, assigned at spawn
    ProcessId, "process"
);

define_typed_id!(
    /// Identifier of a node (one `Environment`) inside a cluster
    NodeId, "node"
);

define_typed_id!(
    /// Process-local handle into a resource table
    ResourceId, "resource"
);

define_typed_id!(
    /// Handle returned by `send_after`, used to cancel the timer
    TimerId, "timer"
);

/// Message tag used for selective receive.
///
/// Tag `0` means "no tag": as a filter entry it matches every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Tag(pub i64);

impl Tag {
    pub const NONE: Tag = Tag(0);

    #[inline(always)]
    pub const fn new(tag: i64) -> Self {
        Self(tag)
    }

    #[inline(always)]
    pub const fn inner(&self) -> i64 {
        self.0
    }

    /// True for the wildcard tag
    #[inline(always)]
    pub fn is_wildcard(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tag-{}", self.0)
    }
}

impl From<i64> for Tag {
    #[inline(always)]
    fn from(tag: i64) -> Self {
        Self(tag)
    }
}

impl From<Tag> for i64 {
    #[inline(always)]
    fn from(tag: Tag) -> i64 {
        tag.0
    }
}
