//! JSON topology snapshots
//!
//! A snapshot lists every topology object by name. Cross references (a
//! resource's node, a volume's storage pool, a connection's nodes) are
//! resolved when the snapshot is turned into a [`Topology`], and any dangling
//! reference fails the whole load.
//!
//! ```json
//! {
//!   "nodes": [{ "name": "nodeA", "net_interfaces": [{ "name": "default", "address": "10.0.0.1" }] }],
//!   "storage_pools": [{ "node": "nodeA", "name": "pool1" }],
//!   "resource_definitions": [{
//!     "name": "data1",
//!     "drbd": { "secret": "s3cr3t", "tcp_port": 7000 },
//!     "volume_definitions": [{ "number": 0, "minor": 1000 }]
//!   }],
//!   "resources": [{
//!     "name": "data1", "node": "nodeA",
//!     "volumes": [{ "number": 0, "storage_pool": "pool1" }],
//!     "drbd": { "node_id": 0, "volumes": [{ "number": 0, "backing_device": "/dev/vg/lv0" }] }
//!   }]
//! }
//! ```

use crate::connection::{NodeConnection, NodePair, ResourceConnection, ResourceConnectionFlags};
use crate::layer::{DrbdRscData, DrbdRscDfnData, DrbdVlmData, DrbdVlmDfnData};
use crate::node::{Node, StoragePool};
use crate::resource::{
    Resource, ResourceDefinition, ResourceFlags, Volume, VolumeDefinition, VolumeFlags,
};
use crate::security::{AccessContext, AccessType, ObjectProtection};
use crate::topology::{Topology, TopologyLoader};
use bitflags::Flags;
use blockrepl_common::{
    DrbdNodeId, Error, MinorNumber, NetInterfaceName, NodeName, ResourceName, Result,
    StorPoolName, TcpPortNumber, VolumeNumber,
};
use blockrepl_props::{Props, PropsMut};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::info;

type PropsMap = BTreeMap<String, String>;
type Acl = BTreeMap<String, AccessType>;

/// Serialized form of a [`Topology`]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologySnapshot {
    pub satellite_props: PropsMap,
    pub nodes: Vec<NodeSnapshot>,
    pub storage_pools: Vec<StoragePoolSnapshot>,
    pub resource_definitions: Vec<ResourceDefinitionSnapshot>,
    pub resources: Vec<ResourceSnapshot>,
    pub node_connections: Vec<NodeConnectionSnapshot>,
    pub resource_connections: Vec<ResourceConnectionSnapshot>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: NodeName,
    #[serde(default)]
    pub net_interfaces: Vec<NetInterfaceSnapshot>,
    #[serde(default)]
    pub props: PropsMap,
    #[serde(default)]
    pub acl: Acl,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetInterfaceSnapshot {
    pub name: NetInterfaceName,
    pub address: IpAddr,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoragePoolSnapshot {
    pub node: NodeName,
    pub name: StorPoolName,
    #[serde(default)]
    pub props: PropsMap,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceDefinitionSnapshot {
    pub name: ResourceName,
    #[serde(default)]
    pub props: PropsMap,
    #[serde(default)]
    pub acl: Acl,
    #[serde(default)]
    pub drbd: Option<DrbdRscDfnSnapshot>,
    #[serde(default)]
    pub volume_definitions: Vec<VolumeDefinitionSnapshot>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DrbdRscDfnSnapshot {
    #[serde(default)]
    pub suffix: String,
    pub secret: String,
    pub tcp_port: TcpPortNumber,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VolumeDefinitionSnapshot {
    pub number: VolumeNumber,
    #[serde(default)]
    pub minor: Option<MinorNumber>,
    #[serde(default)]
    pub props: PropsMap,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub name: ResourceName,
    pub node: NodeName,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub props: PropsMap,
    #[serde(default)]
    pub volumes: Vec<VolumeSnapshot>,
    #[serde(default)]
    pub drbd: Option<DrbdRscSnapshot>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VolumeSnapshot {
    pub number: VolumeNumber,
    pub storage_pool: StorPoolName,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub props: PropsMap,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DrbdRscSnapshot {
    pub node_id: DrbdNodeId,
    #[serde(default)]
    pub volumes: Vec<DrbdVlmSnapshot>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DrbdVlmSnapshot {
    pub number: VolumeNumber,
    #[serde(default)]
    pub backing_device: Option<String>,
    #[serde(default)]
    pub meta_disk: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConnectionSnapshot {
    pub nodes: [NodeName; 2],
    #[serde(default)]
    pub props: PropsMap,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConnectionSnapshot {
    pub resource: ResourceName,
    pub nodes: [NodeName; 2],
    #[serde(default)]
    pub port: Option<TcpPortNumber>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub props: PropsMap,
}

impl TopologySnapshot {
    /// Parse a snapshot from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Build the topology, checking every cross reference
    pub fn into_topology(self) -> Result<Topology> {
        let ctx = AccessContext::system();
        let mut topology = Topology::new();
        fill_props(&topology.satellite_props_mut(), self.satellite_props)?;

        for snap in self.nodes {
            let protection = ObjectProtection::with_acl(format!("node {}", snap.name), snap.acl);
            let mut node = Node::with_protection(snap.name, protection);
            for net_if in snap.net_interfaces {
                node.add_net_interface(&ctx, net_if.name, net_if.address)?;
            }
            fill_props(&node.props_mut(&ctx)?, snap.props)?;
            topology.add_node(node)?;
        }

        for snap in self.storage_pools {
            let pool = StoragePool::new(snap.node, snap.name);
            fill_props(&pool.props_mut(&ctx)?, snap.props)?;
            topology.add_storage_pool(pool)?;
        }

        for snap in self.resource_definitions {
            let protection = ObjectProtection::with_acl(
                format!("resource definition {}", snap.name),
                snap.acl,
            );
            let mut definition = ResourceDefinition::with_protection(snap.name, protection);
            fill_props(&definition.props_mut(&ctx)?, snap.props)?;
            if let Some(drbd) = snap.drbd {
                definition.set_layer_data(
                    &ctx,
                    DrbdRscDfnData::new(drbd.suffix, drbd.secret, drbd.tcp_port),
                )?;
            }
            for vlm_snap in snap.volume_definitions {
                let mut vlm_dfn = VolumeDefinition::new(vlm_snap.number);
                if let Some(minor) = vlm_snap.minor {
                    vlm_dfn.set_layer_data(DrbdVlmDfnData { minor });
                }
                fill_props(&vlm_dfn.props_mut(), vlm_snap.props)?;
                definition.add_volume_definition(&ctx, vlm_dfn)?;
            }
            topology.add_resource_definition(definition)?;
        }

        for snap in self.resources {
            let definition = topology.resource_definition(&snap.name).ok_or_else(|| {
                Error::integrity(format!(
                    "resource '{}' on node '{}' refers to an unknown resource definition",
                    snap.name, snap.node
                ))
            })?;
            let flags: ResourceFlags = parse_flags(&snap.flags, "resource")?;
            let mut resource = Resource::new(definition, snap.node);
            resource.enable_flags(&ctx, flags)?;
            fill_props(&resource.props_mut(&ctx)?, snap.props)?;
            for vlm_snap in snap.volumes {
                let flags: VolumeFlags = parse_flags(&vlm_snap.flags, "volume")?;
                let volume = Volume::new(vlm_snap.number, vlm_snap.storage_pool).with_flags(flags);
                fill_props(&volume.props_mut(), vlm_snap.props)?;
                resource.add_volume(&ctx, volume)?;
            }
            if let Some(drbd) = snap.drbd {
                let mut data = DrbdRscData::new(drbd.node_id);
                for vlm in drbd.volumes {
                    data.put_volume(DrbdVlmData {
                        volume_number: vlm.number,
                        backing_device: vlm.backing_device,
                        meta_disk: vlm.meta_disk,
                    });
                }
                resource.set_layer_data(&ctx, data)?;
            }
            topology.add_resource(&ctx, resource)?;
        }

        for snap in self.node_connections {
            let [a, b] = snap.nodes;
            let connection = NodeConnection::new(NodePair::new(a, b)?);
            fill_props(&connection.props_mut(&ctx)?, snap.props)?;
            topology.add_node_connection(connection)?;
        }

        for snap in self.resource_connections {
            let definition = topology.resource_definition(&snap.resource).ok_or_else(|| {
                Error::integrity(format!(
                    "resource connection refers to unknown resource definition '{}'",
                    snap.resource
                ))
            })?;
            let [a, b] = snap.nodes;
            let flags: ResourceConnectionFlags = parse_flags(&snap.flags, "resource connection")?;
            let mut connection =
                ResourceConnection::new(definition, NodePair::new(a, b)?).with_flags(flags);
            if let Some(port) = snap.port {
                connection = connection.with_port(port);
            }
            fill_props(&connection.props_mut(&ctx)?, snap.props)?;
            topology.add_resource_connection(connection)?;
        }

        Ok(topology)
    }
}

fn fill_props(props: &Props, entries: PropsMap) -> Result<()> {
    for (key, value) in entries {
        props.set_prop(&key, &value)?;
    }
    Ok(())
}

fn parse_flags<F: Flags>(names: &[String], kind: &str) -> Result<F> {
    names.iter().try_fold(F::empty(), |flags, name| {
        F::from_name(name)
            .map(|flag| flags.union(flag))
            .ok_or_else(|| Error::InvalidValue(format!("unknown {kind} flag '{name}'")))
    })
}

/// Loads a topology from a JSON snapshot file
#[derive(Clone, Debug)]
pub struct JsonSnapshotLoader {
    path: PathBuf,
}

impl JsonSnapshotLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TopologyLoader for JsonSnapshotLoader {
    fn load(&self) -> Result<Topology> {
        let json = std::fs::read_to_string(&self.path)?;
        let topology = TopologySnapshot::from_json(&json)?.into_topology()?;
        info!(
            path = %self.path.display(),
            version = topology.version(),
            "Loaded topology snapshot"
        );
        Ok(topology)
    }
}
