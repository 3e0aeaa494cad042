//! Core type definitions for blockrepl
//!
//! This module defines the validated identifiers used throughout the system:
//! object names (nodes, resources, storage pools, network interfaces) and the
//! bounded numbers the replication layer addresses devices with.

use derive_more::{Display, Into};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors that can occur when creating a name or a bounded number
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("{kind} name cannot be empty")]
    Empty { kind: &'static str },
    #[error("{kind} name must be at most {max} characters")]
    TooLong { kind: &'static str, max: usize },
    #[error("{kind} name must start with a letter")]
    InvalidStartChar { kind: &'static str },
    #[error("{kind} name contains invalid character: {ch:?}")]
    InvalidChar { kind: &'static str, ch: char },
    #[error("{kind} {value} is out of range {min}..={max}")]
    OutOfRange {
        kind: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Maximum length of node, resource and storage pool names
pub const MAX_OBJECT_NAME_LENGTH: usize = 48;

/// Maximum length of network interface names
pub const MAX_NET_IF_NAME_LENGTH: usize = 32;

fn validate_object_name(kind: &'static str, name: &str) -> Result<(), NameError> {
    let first = name.chars().next().ok_or(NameError::Empty { kind })?;
    if name.chars().count() > MAX_OBJECT_NAME_LENGTH {
        return Err(NameError::TooLong {
            kind,
            max: MAX_OBJECT_NAME_LENGTH,
        });
    }
    if !first.is_ascii_alphabetic() {
        return Err(NameError::InvalidStartChar { kind });
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-')
    {
        return Err(NameError::InvalidChar { kind, ch });
    }
    Ok(())
}

macro_rules! object_name {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
        #[serde(try_from = "String", into = "String")]
        #[display("{_0}")]
        pub struct $name(String);

        impl $name {
            /// Create a new name, validating the naming rules
            pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
                let name = name.into();
                validate_object_name($kind, &name)?;
                Ok(Self(name))
            }

            /// Get the name as a string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Case-insensitive comparison against a raw name
            #[must_use]
            pub fn matches_ignore_case(&self, other: &str) -> bool {
                self.0.eq_ignore_ascii_case(other)
            }
        }

        impl TryFrom<String> for $name {
            type Error = NameError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(name: $name) -> String {
                name.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }
    };
}

object_name!(
    /// Name of a cluster node
    NodeName,
    "node"
);

object_name!(
    /// Name of a resource definition (shared by all its per-node resources)
    ResourceName,
    "resource"
);

object_name!(
    /// Name of a storage pool on a node
    StorPoolName,
    "storage pool"
);

/// Name of a network interface on a node
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[serde(try_from = "String", into = "String")]
#[display("{_0}")]
pub struct NetInterfaceName(String);

impl NetInterfaceName {
    /// Name of the interface every node is expected to provide
    pub const DEFAULT: &'static str = "default";

    /// Create a new interface name
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// The well-known `default` interface name
    #[must_use]
    pub fn default_name() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    /// Get the name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> Result<(), NameError> {
        const KIND: &str = "network interface";
        if name.is_empty() {
            return Err(NameError::Empty { kind: KIND });
        }
        if name.chars().count() > MAX_NET_IF_NAME_LENGTH {
            return Err(NameError::TooLong {
                kind: KIND,
                max: MAX_NET_IF_NAME_LENGTH,
            });
        }
        if let Some(ch) = name
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '_' | '-' | '.'))
        {
            return Err(NameError::InvalidChar { kind: KIND, ch });
        }
        Ok(())
    }
}

impl TryFrom<String> for NetInterfaceName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NetInterfaceName> for String {
    fn from(name: NetInterfaceName) -> String {
        name.0
    }
}

impl fmt::Debug for NetInterfaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetInterfaceName({:?})", self.0)
    }
}

macro_rules! bounded_number {
    ($(#[$meta:meta])* $name:ident, $repr:ty, $kind:literal, $min:expr, $max:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, Into)]
        #[serde(try_from = "u64", into = "u64")]
        #[display("{_0}")]
        pub struct $name($repr);

        impl $name {
            /// Smallest valid value
            pub const MIN: $repr = $min;
            /// Largest valid value
            pub const MAX: $repr = $max;

            /// Create a new value, checking the valid range
            pub fn new(value: u64) -> Result<Self, NameError> {
                if value < u64::from(Self::MIN) || value > u64::from(Self::MAX) {
                    return Err(NameError::OutOfRange {
                        kind: $kind,
                        value,
                        min: u64::from(Self::MIN),
                        max: u64::from(Self::MAX),
                    });
                }
                // Range checked above
                #[allow(clippy::cast_possible_truncation)]
                let raw = value as $repr;
                Ok(Self(raw))
            }

            /// Get the raw value
            #[must_use]
            pub const fn value(&self) -> $repr {
                self.0
            }
        }

        impl TryFrom<u64> for $name {
            type Error = NameError;

            fn try_from(value: u64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for u64 {
            fn from(number: $name) -> u64 {
                u64::from(number.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

bounded_number!(
    /// Volume number within a resource definition (ordering key)
    VolumeNumber,
    u16,
    "volume number",
    0,
    u16::MAX
);

bounded_number!(
    /// Block device minor number used by the replication layer
    MinorNumber,
    u32,
    "minor number",
    0,
    1_048_575
);

bounded_number!(
    /// TCP port used for peer connections
    TcpPortNumber,
    u16,
    "tcp port",
    1,
    u16::MAX
);

bounded_number!(
    /// Identifies one resource instance to its peers
    DrbdNodeId,
    u8,
    "node id",
    0,
    31
);
