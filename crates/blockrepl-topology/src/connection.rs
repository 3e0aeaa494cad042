//! Connections between nodes and between the resources on them

use crate::resource::ResourceDefinition;
use crate::security::{AccessContext, AccessType, ObjectProtection};
use bitflags::bitflags;
use blockrepl_common::{Error, NodeName, ResourceName, Result, TcpPortNumber};
use blockrepl_props::{Props, ReadOnlyProps};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unordered pair of distinct nodes, stored in name order
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePair {
    first: NodeName,
    second: NodeName,
}

impl NodePair {
    pub fn new(a: NodeName, b: NodeName) -> Result<Self> {
        if a == b {
            return Err(Error::integrity(format!(
                "a connection needs two distinct nodes, got '{a}' twice"
            )));
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { first, second })
    }

    #[must_use]
    pub fn first(&self) -> &NodeName {
        &self.first
    }

    #[must_use]
    pub fn second(&self) -> &NodeName {
        &self.second
    }

    #[must_use]
    pub fn contains(&self, node: &NodeName) -> bool {
        &self.first == node || &self.second == node
    }
}

impl fmt::Display for NodePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.first, self.second)
    }
}

/// Properties shared by every resource between two nodes
#[derive(Debug)]
pub struct NodeConnection {
    uuid: Uuid,
    nodes: NodePair,
    props: Props,
    protection: Arc<ObjectProtection>,
}

impl NodeConnection {
    #[must_use]
    pub fn new(nodes: NodePair) -> Self {
        let protection = ObjectProtection::new(format!("node connection {nodes}"));
        Self {
            uuid: Uuid::new_v4(),
            nodes,
            props: Props::new(),
            protection: Arc::new(protection),
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &NodePair {
        &self.nodes
    }

    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn props(&self, ctx: &AccessContext) -> Result<ReadOnlyProps> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.props.read_only())
    }

    pub fn props_mut(&self, ctx: &AccessContext) -> Result<Props> {
        self.protection.require_access(ctx, AccessType::Change)?;
        Ok(self.props.clone())
    }
}

bitflags! {
    /// State flags of a resource connection
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ResourceConnectionFlags: u32 {
        const DELETED = 1 << 0;
        /// Traffic is routed through a proxy running on the local node
        const LOCAL_DRBD_PROXY = 1 << 1;
    }
}

/// Per-resource configuration of the link between two nodes
#[derive(Debug)]
pub struct ResourceConnection {
    uuid: Uuid,
    resource_name: ResourceName,
    nodes: NodePair,
    port: Option<TcpPortNumber>,
    flags: ResourceConnectionFlags,
    props: Props,
    protection: Arc<ObjectProtection>,
}

impl ResourceConnection {
    /// Connect the resources of `definition` on the nodes of `nodes`
    #[must_use]
    pub fn new(definition: &ResourceDefinition, nodes: NodePair) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            resource_name: definition.name().clone(),
            nodes,
            port: None,
            flags: ResourceConnectionFlags::empty(),
            props: Props::new(),
            protection: Arc::new(definition.protection().clone()),
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: TcpPortNumber) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ResourceConnectionFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn resource_name(&self) -> &ResourceName {
        &self.resource_name
    }

    #[must_use]
    pub fn nodes(&self) -> &NodePair {
        &self.nodes
    }

    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Port override for this connection
    pub fn port(&self, ctx: &AccessContext) -> Result<Option<TcpPortNumber>> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.port)
    }

    pub fn flags(&self, ctx: &AccessContext) -> Result<ResourceConnectionFlags> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.flags)
    }

    pub fn props(&self, ctx: &AccessContext) -> Result<ReadOnlyProps> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.props.read_only())
    }

    pub fn props_mut(&self, ctx: &AccessContext) -> Result<Props> {
        self.protection.require_access(ctx, AccessType::Change)?;
        Ok(self.props.clone())
    }
}
