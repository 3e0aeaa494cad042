//! Replication layer data attached to definitions, resources and volumes

use blockrepl_common::{DrbdNodeId, MinorNumber, TcpPortNumber, VolumeNumber};
use std::collections::BTreeMap;

/// Layer data of a resource definition, shared by all its resources
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrbdRscDfnData {
    /// Appended to the resource name in the generated files
    pub suffix: String,
    /// Peer authentication secret
    pub secret: String,
    /// Port all connections of the definition listen on
    pub tcp_port: TcpPortNumber,
}

impl DrbdRscDfnData {
    pub fn new(suffix: impl Into<String>, secret: impl Into<String>, tcp_port: TcpPortNumber) -> Self {
        Self {
            suffix: suffix.into(),
            secret: secret.into(),
            tcp_port,
        }
    }
}

/// Layer data of a volume definition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrbdVlmDfnData {
    pub minor: MinorNumber,
}

/// Layer data of one volume of a resource
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrbdVlmData {
    pub volume_number: VolumeNumber,
    /// Block device below the replication layer, absent for diskless volumes
    pub backing_device: Option<String>,
    /// External metadata device; absent or blank means internal metadata
    pub meta_disk: Option<String>,
}

impl DrbdVlmData {
    #[must_use]
    pub const fn new(volume_number: VolumeNumber) -> Self {
        Self {
            volume_number,
            backing_device: None,
            meta_disk: None,
        }
    }

    #[must_use]
    pub fn with_backing_device(mut self, device: impl Into<String>) -> Self {
        self.backing_device = Some(device.into());
        self
    }

    #[must_use]
    pub fn with_meta_disk(mut self, device: impl Into<String>) -> Self {
        self.meta_disk = Some(device.into());
        self
    }

    /// Backing device path if one is set and not blank
    #[must_use]
    pub fn backing_device(&self) -> Option<&str> {
        non_blank(self.backing_device.as_deref())
    }

    /// Metadata device if one is set and not blank
    #[must_use]
    pub fn meta_disk(&self) -> Option<&str> {
        non_blank(self.meta_disk.as_deref())
    }
}

/// Layer data of a resource on one node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrbdRscData {
    pub node_id: DrbdNodeId,
    pub volumes: BTreeMap<VolumeNumber, DrbdVlmData>,
}

impl DrbdRscData {
    #[must_use]
    pub const fn new(node_id: DrbdNodeId) -> Self {
        Self {
            node_id,
            volumes: BTreeMap::new(),
        }
    }

    /// Add or replace the layer data of a volume
    pub fn put_volume(&mut self, data: DrbdVlmData) {
        self.volumes.insert(data.volume_number, data);
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
