//! Identifier types for hashfleet.
//!
//! Every entity that crosses a process boundary (fleet clients, catalog
//! entries, mining contexts) is keyed by a UUID newtype. The wrappers keep
//! coin IDs from being passed where pool IDs are expected and serialize as
//! plain UUID strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(uuid::Uuid);

        impl $name {
            #[doc = concat!("Create a new `", stringify!($name), "` from a UUID.")]
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            #[doc = concat!("Generate a new random `", stringify!($name), "`.")]
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// The all-zero identifier, used for "nothing selected".
            #[must_use]
            pub const fn nil() -> Self {
                Self(uuid::Uuid::nil())
            }

            /// Returns true if this is the all-zero identifier.
            #[must_use]
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// Return the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }

            /// Return the bytes of the UUID.
            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
                Ok(Self(uuid))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }
    };
}

uuid_id! {
    /// Identity of a fleet node as seen by the studio.
    ///
    /// This is the sole correlation key between poll cycles.
    ClientId
}

uuid_id! {
    /// A coin in the server catalog.
    CoinId
}

uuid_id! {
    /// A mining pool in the server catalog.
    PoolId
}

uuid_id! {
    /// A mining kernel (miner program) in the server catalog.
    KernelId
}

uuid_id! {
    /// A binding of a kernel to a coin, carrying the coin-specific arguments.
    CoinKernelId
}

uuid_id! {
    /// A fleet-assigned work definition.
    WorkId
}

uuid_id! {
    /// A fleet group used to filter clients.
    GroupId
}

uuid_id! {
    /// One mining run on a node.
    ContextId
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,
}
