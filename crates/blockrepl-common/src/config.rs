//! Configuration types for blockrepl
//!
//! This module defines the configuration structures of the satellite: where
//! generated resource files go, where the option whitelist comes from, how
//! the replication admin tool is invoked and how logging is set up.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for a blockrepl satellite
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Satellite identity and output locations
    pub satellite: SatelliteConfig,
    /// Option whitelist sources
    pub whitelist: WhitelistConfig,
    /// Applying generated configuration
    pub apply: ApplyConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Satellite identity and output configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SatelliteConfig {
    /// Name of the node this satellite runs on
    pub node_name: Option<String>,
    /// Directory the resource files are written to
    pub config_dir: PathBuf,
    /// File name of the shared common configuration
    pub common_file: String,
    /// Suffix of generated resource files
    pub file_suffix: String,
}

impl Default for SatelliteConfig {
    fn default() -> Self {
        Self {
            node_name: None,
            config_dir: PathBuf::from("/var/lib/blockrepl.d"),
            common_file: "blockrepl_common.conf".to_string(),
            file_suffix: ".res".to_string(),
        }
    }
}

impl SatelliteConfig {
    /// Path of the resource file for a suffixed resource name
    #[must_use]
    pub fn resource_file(&self, suffixed_name: &str) -> PathBuf {
        self.config_dir
            .join(format!("{suffixed_name}{}", self.file_suffix))
    }

    /// Path of the common configuration file
    #[must_use]
    pub fn common_file_path(&self) -> PathBuf {
        self.config_dir.join(&self.common_file)
    }
}

/// Where the option whitelist is read from
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitelistConfig {
    /// Directory holding pre-captured `<command>.xml` help documents.
    /// When unset, the setup tool is invoked directly.
    pub xml_help_dir: Option<PathBuf>,
    /// Path of the replication setup tool
    pub drbdsetup_path: String,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            xml_help_dir: None,
            drbdsetup_path: "drbdsetup".to_string(),
        }
    }
}

/// How generated configuration is applied
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyConfig {
    /// Path of the replication admin tool
    pub drbdadm_path: String,
    /// Retries when the device reports busy
    pub retry_count: u32,
    /// Delay between retries (milliseconds)
    pub retry_delay_ms: u64,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            drbdadm_path: "drbdadm".to_string(),
            retry_count: 3,
            retry_delay_ms: 100,
        }
    }
}

impl ApplyConfig {
    /// Delay between retries
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
