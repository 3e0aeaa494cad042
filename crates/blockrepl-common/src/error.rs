//! Error types for blockrepl
//!
//! This module defines the common error type used throughout the system.

use crate::types::NameError;
use thiserror::Error;

/// Common result type for blockrepl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for blockrepl
#[derive(Debug, Error)]
pub enum Error {
    // Property store errors
    #[error("invalid property key: {0}")]
    InvalidKey(String),

    #[error("invalid property value: {0}")]
    InvalidValue(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    // Topology errors
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("configuration integrity error: {0}")]
    ConfigurationIntegrity(String),

    #[error("missing resource: {0}")]
    MissingResource(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    // Ambient errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration integrity error
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::ConfigurationIntegrity(msg.into())
    }

    /// Create a missing resource error
    pub fn missing_resource(msg: impl Into<String>) -> Self {
        Self::MissingResource(msg.into())
    }

    /// Create an access denied error
    pub fn access_denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied(msg.into())
    }

    /// Create an invalid key error
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a retryable error
    ///
    /// Missing resources usually mean the storage backend has not caught up
    /// yet; everything else needs a change to the topology first.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::MissingResource(_) | Self::Io(_))
    }

    /// Check if the error aborts configuration synthesis for a resource
    #[must_use]
    pub fn is_fatal_for_synthesis(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationIntegrity(_)
                | Self::MissingResource(_)
                | Self::AccessDenied(_)
                | Self::InvalidKey(_)
                | Self::InvalidName(_)
                | Self::Internal(_)
        )
    }
}
