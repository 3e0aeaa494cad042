//! In-memory cluster topology snapshot

use crate::connection::{NodeConnection, NodePair, ResourceConnection};
use crate::node::{Node, StoragePool};
use crate::resource::{Resource, ResourceDefinition};
use crate::security::AccessContext;
use blockrepl_common::{Error, NodeName, ResourceName, Result, StorPoolName};
use blockrepl_props::{Props, ReadOnlyProps};
use std::collections::BTreeMap;
use tracing::debug;

/// Source of a topology snapshot
pub trait TopologyLoader {
    /// Load a complete, cross-checked topology
    fn load(&self) -> Result<Topology>;
}

/// All topology objects known to a satellite
///
/// Objects are added once and never removed; synthesis reads a topology
/// that no longer changes.
#[derive(Debug, Default)]
pub struct Topology {
    /// Version number (incremented on changes)
    version: u64,
    nodes: BTreeMap<NodeName, Node>,
    storage_pools: BTreeMap<(NodeName, StorPoolName), StoragePool>,
    resource_definitions: BTreeMap<ResourceName, ResourceDefinition>,
    resources: BTreeMap<ResourceName, BTreeMap<NodeName, Resource>>,
    node_connections: BTreeMap<NodePair, NodeConnection>,
    resource_connections: BTreeMap<(ResourceName, NodePair), ResourceConnection>,
    satellite_props: Props,
}

impl Topology {
    /// Create an empty topology
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(node.name()) {
            return Err(Error::AlreadyExists(format!("node '{}'", node.name())));
        }
        debug!(node = %node.name(), "Adding node");
        self.nodes.insert(node.name().clone(), node);
        self.version += 1;
        Ok(())
    }

    pub fn add_storage_pool(&mut self, pool: StoragePool) -> Result<()> {
        self.require_node(pool.node_name())?;
        let key = (pool.node_name().clone(), pool.name().clone());
        if self.storage_pools.contains_key(&key) {
            return Err(Error::AlreadyExists(format!(
                "storage pool '{}' on node '{}'",
                key.1, key.0
            )));
        }
        self.storage_pools.insert(key, pool);
        self.version += 1;
        Ok(())
    }

    pub fn add_resource_definition(&mut self, definition: ResourceDefinition) -> Result<()> {
        if self.resource_definitions.contains_key(definition.name()) {
            return Err(Error::AlreadyExists(format!(
                "resource definition '{}'",
                definition.name()
            )));
        }
        debug!(resource = %definition.name(), "Adding resource definition");
        self.resource_definitions
            .insert(definition.name().clone(), definition);
        self.version += 1;
        Ok(())
    }

    /// Add a resource after checking that everything it refers to exists
    pub fn add_resource(&mut self, ctx: &AccessContext, resource: Resource) -> Result<()> {
        self.require_node(resource.node_name())?;
        let definition = self.require_definition(resource.resource_name())?;
        for volume in resource.volumes(ctx)? {
            if definition.volume_definition(ctx, volume.number())?.is_none() {
                return Err(Error::integrity(format!(
                    "volume {} of resource '{}' on node '{}' has no volume definition",
                    volume.number(),
                    resource.resource_name(),
                    resource.node_name()
                )));
            }
            let pool_key = (resource.node_name().clone(), volume.storage_pool().clone());
            if !self.storage_pools.contains_key(&pool_key) {
                return Err(Error::integrity(format!(
                    "volume {} of resource '{}' refers to unknown storage pool '{}' on node '{}'",
                    volume.number(),
                    resource.resource_name(),
                    pool_key.1,
                    pool_key.0
                )));
            }
        }

        let per_node = self
            .resources
            .entry(resource.resource_name().clone())
            .or_default();
        if per_node.contains_key(resource.node_name()) {
            return Err(Error::AlreadyExists(format!(
                "resource '{}' on node '{}'",
                resource.resource_name(),
                resource.node_name()
            )));
        }
        debug!(
            resource = %resource.resource_name(),
            node = %resource.node_name(),
            "Adding resource"
        );
        per_node.insert(resource.node_name().clone(), resource);
        self.version += 1;
        Ok(())
    }

    pub fn add_node_connection(&mut self, connection: NodeConnection) -> Result<()> {
        let nodes = connection.nodes().clone();
        self.require_node(nodes.first())?;
        self.require_node(nodes.second())?;
        if self.node_connections.contains_key(&nodes) {
            return Err(Error::AlreadyExists(format!("node connection {nodes}")));
        }
        self.node_connections.insert(nodes, connection);
        self.version += 1;
        Ok(())
    }

    pub fn add_resource_connection(&mut self, connection: ResourceConnection) -> Result<()> {
        let nodes = connection.nodes().clone();
        let name = connection.resource_name().clone();
        self.require_definition(&name)?;
        self.require_node(nodes.first())?;
        self.require_node(nodes.second())?;
        let key = (name, nodes);
        if self.resource_connections.contains_key(&key) {
            return Err(Error::AlreadyExists(format!(
                "resource connection {} of resource '{}'",
                key.1, key.0
            )));
        }
        self.resource_connections.insert(key, connection);
        self.version += 1;
        Ok(())
    }

    #[must_use]
    pub fn node(&self, name: &NodeName) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// All nodes ordered by name
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    #[must_use]
    pub fn storage_pool(&self, node: &NodeName, pool: &StorPoolName) -> Option<&StoragePool> {
        self.storage_pools.get(&(node.clone(), pool.clone()))
    }

    #[must_use]
    pub fn resource_definition(&self, name: &ResourceName) -> Option<&ResourceDefinition> {
        self.resource_definitions.get(name)
    }

    pub fn resource_definitions(&self) -> impl Iterator<Item = &ResourceDefinition> {
        self.resource_definitions.values()
    }

    #[must_use]
    pub fn resource(&self, name: &ResourceName, node: &NodeName) -> Option<&Resource> {
        self.resources.get(name).and_then(|per_node| per_node.get(node))
    }

    /// All resources of a definition, ordered by node name
    pub fn resources_of(&self, name: &ResourceName) -> impl Iterator<Item = &Resource> {
        self.resources
            .get(name)
            .into_iter()
            .flat_map(BTreeMap::values)
    }

    /// All resources deployed on a node, ordered by resource name
    pub fn resources_on<'a>(&'a self, node: &'a NodeName) -> impl Iterator<Item = &'a Resource> {
        self.resources
            .values()
            .filter_map(move |per_node| per_node.get(node))
    }

    /// Resources of the same definition on other nodes, ordered by node name
    pub fn peers_of<'a>(&'a self, resource: &'a Resource) -> impl Iterator<Item = &'a Resource> {
        self.resources_of(resource.resource_name())
            .filter(move |peer| peer.node_name() != resource.node_name())
    }

    #[must_use]
    pub fn node_connection(&self, a: &NodeName, b: &NodeName) -> Option<&NodeConnection> {
        let nodes = NodePair::new(a.clone(), b.clone()).ok()?;
        self.node_connections.get(&nodes)
    }

    #[must_use]
    pub fn resource_connection(
        &self,
        name: &ResourceName,
        a: &NodeName,
        b: &NodeName,
    ) -> Option<&ResourceConnection> {
        let nodes = NodePair::new(a.clone(), b.clone()).ok()?;
        self.resource_connections.get(&(name.clone(), nodes))
    }

    /// Satellite-wide properties that feed the common file
    #[must_use]
    pub fn satellite_props(&self) -> ReadOnlyProps {
        self.satellite_props.read_only()
    }

    #[must_use]
    pub fn satellite_props_mut(&self) -> Props {
        self.satellite_props.clone()
    }

    fn require_node(&self, name: &NodeName) -> Result<&Node> {
        self.nodes
            .get(name)
            .ok_or_else(|| Error::integrity(format!("unknown node '{name}'")))
    }

    fn require_definition(&self, name: &ResourceName) -> Result<&ResourceDefinition> {
        self.resource_definitions
            .get(name)
            .ok_or_else(|| Error::integrity(format!("unknown resource definition '{name}'")))
    }
}
