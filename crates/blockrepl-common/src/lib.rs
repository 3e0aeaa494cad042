//! blockrepl Common - Shared types and utilities
//!
//! This crate provides the identifier types, the error definitions and the
//! configuration model used across all blockrepl components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
