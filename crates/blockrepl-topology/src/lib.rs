//! blockrepl Topology - Cluster object model
//!
//! This crate models the objects the configuration synthesizer reads:
//! - Nodes with their network interfaces and storage pools
//! - Resource definitions, their per-node resources and volumes
//! - Node and resource connections
//! - Replication layer data (node ids, minors, backing devices)
//! - Access protection of every object
//!
//! A [`Topology`] is filled once, by a [`TopologyLoader`] such as the
//! [`JsonSnapshotLoader`], and read afterwards.

pub mod connection;
pub mod layer;
pub mod node;
pub mod resource;
pub mod security;
pub mod snapshot;
pub mod topology;

pub use connection::{NodeConnection, NodePair, ResourceConnection, ResourceConnectionFlags};
pub use layer::{DrbdRscData, DrbdRscDfnData, DrbdVlmData, DrbdVlmDfnData};
pub use node::{AddressFamily, NetInterface, Node, StoragePool};
pub use resource::{
    Resource, ResourceDefinition, ResourceFlags, Volume, VolumeDefinition, VolumeFlags,
};
pub use security::{AccessContext, AccessType, ObjectProtection, Privilege};
pub use snapshot::{JsonSnapshotLoader, TopologySnapshot};
pub use topology::{Topology, TopologyLoader};
