//! Handle types for the schema graph arena.
//!
//! Using `NonZeroU32` enables `Option<T>` niche optimization (no extra space).

use serde::{Serialize, Serializer};
use std::num::NonZeroU32;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Create from a raw index (1-based).
            #[must_use]
            pub const fn from_raw(raw: u32) -> Option<Self> {
                match NonZeroU32::new(raw) {
                    Some(n) => Some(Self(n)),
                    None => None,
                }
            }

            /// Create from a 0-based index (saturates at `u32::MAX`).
            #[must_use]
            pub fn from_index(index: usize) -> Self {
                let index = u32::try_from(index).unwrap_or(u32::MAX);
                Self(NonZeroU32::MIN.saturating_add(index))
            }

            /// Get the raw value (1-based).
            #[must_use]
            pub const fn to_raw(self) -> u32 {
                self.0.get()
            }

            /// Get the 0-based index.
            #[must_use]
            pub const fn to_index(self) -> usize {
                (self.0.get() - 1) as usize
            }

            /// Shift this handle by `offset` slots.
            #[must_use]
            pub fn offset(self, offset: usize) -> Self {
                Self::from_index(self.to_index() + offset)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u32(self.to_raw())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "#{}", self.to_raw())
            }
        }
    };
}

define_id!(
    /// Document identifier.
    DocumentId
);

define_id!(
    /// Declaration identifier (global or inline).
    DeclarationId
);

define_id!(
    /// Synthesized multiplexer identifier.
    MultiplexerId
);
