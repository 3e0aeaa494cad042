//! Nodes, their network interfaces and storage pools

use crate::security::{AccessContext, AccessType, ObjectProtection};
use blockrepl_common::{Error, NetInterfaceName, NodeName, Result, StorPoolName};
use blockrepl_props::{Props, ReadOnlyProps};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;

/// Address family of a network interface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4 => f.write_str("ipv4"),
            Self::Ipv6 => f.write_str("ipv6"),
        }
    }
}

/// Network interface of a node
#[derive(Clone, Debug)]
pub struct NetInterface {
    uuid: Uuid,
    name: NetInterfaceName,
    node_name: NodeName,
    address: IpAddr,
}

impl NetInterface {
    /// Interface name
    #[must_use]
    pub fn name(&self) -> &NetInterfaceName {
        &self.name
    }

    /// Name of the node owning the interface
    #[must_use]
    pub fn node_name(&self) -> &NodeName {
        &self.node_name
    }

    /// Interface UUID
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// IP address of the interface
    #[must_use]
    pub const fn address(&self) -> IpAddr {
        self.address
    }

    /// Address family, selects how the address is written
    #[must_use]
    pub const fn address_family(&self) -> AddressFamily {
        match self.address {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    /// Address with family tag and port, e.g. `ipv6 [fd00::1]:7000`
    #[must_use]
    pub fn tagged_address(&self, port: u16) -> String {
        match self.address {
            IpAddr::V4(addr) => format!("ipv4 {addr}:{port}"),
            IpAddr::V6(addr) => format!("ipv6 [{addr}]:{port}"),
        }
    }
}

/// Cluster node
#[derive(Debug)]
pub struct Node {
    uuid: Uuid,
    name: NodeName,
    net_interfaces: BTreeMap<NetInterfaceName, NetInterface>,
    props: Props,
    protection: Arc<ObjectProtection>,
}

impl Node {
    /// Create a node owned by the system role
    #[must_use]
    pub fn new(name: NodeName) -> Self {
        let protection = ObjectProtection::new(format!("node {name}"));
        Self::with_protection(name, protection)
    }

    /// Create a node with explicit protection
    #[must_use]
    pub fn with_protection(name: NodeName, protection: ObjectProtection) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name,
            net_interfaces: BTreeMap::new(),
            props: Props::new(),
            protection: Arc::new(protection),
        }
    }

    /// Node name
    #[must_use]
    pub fn name(&self) -> &NodeName {
        &self.name
    }

    /// Node UUID
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Protection of this node
    #[must_use]
    pub fn protection(&self) -> &ObjectProtection {
        &self.protection
    }

    /// Read-only view of the node properties
    pub fn props(&self, ctx: &AccessContext) -> Result<ReadOnlyProps> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.props.read_only())
    }

    /// Writable handle on the node properties
    pub fn props_mut(&self, ctx: &AccessContext) -> Result<Props> {
        self.protection.require_access(ctx, AccessType::Change)?;
        Ok(self.props.clone())
    }

    /// Add a network interface
    pub fn add_net_interface(
        &mut self,
        ctx: &AccessContext,
        name: NetInterfaceName,
        address: IpAddr,
    ) -> Result<&NetInterface> {
        self.protection.require_access(ctx, AccessType::Change)?;
        if self.net_interfaces.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "network interface '{name}' on node '{}'",
                self.name
            )));
        }
        let net_if = NetInterface {
            uuid: Uuid::new_v4(),
            name: name.clone(),
            node_name: self.name.clone(),
            address,
        };
        Ok(self.net_interfaces.entry(name).or_insert(net_if))
    }

    /// Look up a network interface by name
    pub fn net_interface(
        &self,
        ctx: &AccessContext,
        name: &NetInterfaceName,
    ) -> Result<Option<&NetInterface>> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.net_interfaces.get(name))
    }

    /// All network interfaces, ordered by name
    pub fn net_interfaces(
        &self,
        ctx: &AccessContext,
    ) -> Result<impl Iterator<Item = &NetInterface>> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.net_interfaces.values())
    }
}

/// Storage pool on a node
#[derive(Debug)]
pub struct StoragePool {
    uuid: Uuid,
    name: StorPoolName,
    node_name: NodeName,
    props: Props,
    protection: Arc<ObjectProtection>,
}

impl StoragePool {
    /// Create a storage pool owned by the system role
    #[must_use]
    pub fn new(node_name: NodeName, name: StorPoolName) -> Self {
        let protection = ObjectProtection::new(format!("storage pool {name} on {node_name}"));
        Self::with_protection(node_name, name, protection)
    }

    /// Create a storage pool with explicit protection
    #[must_use]
    pub fn with_protection(
        node_name: NodeName,
        name: StorPoolName,
        protection: ObjectProtection,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name,
            node_name,
            props: Props::new(),
            protection: Arc::new(protection),
        }
    }

    /// Pool name
    #[must_use]
    pub fn name(&self) -> &StorPoolName {
        &self.name
    }

    /// Node the pool lives on
    #[must_use]
    pub fn node_name(&self) -> &NodeName {
        &self.node_name
    }

    /// Pool UUID
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Read-only view of the pool properties
    pub fn props(&self, ctx: &AccessContext) -> Result<ReadOnlyProps> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.props.read_only())
    }

    /// Writable handle on the pool properties
    pub fn props_mut(&self, ctx: &AccessContext) -> Result<Props> {
        self.protection.require_access(ctx, AccessType::Change)?;
        Ok(self.props.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockrepl_props::{PropsContainer, PropsMut};

    fn node(name: &str) -> Node {
        Node::new(NodeName::new(name).unwrap())
    }

    #[test]
    fn test_tagged_address() {
        let ctx = AccessContext::system();
        let mut n = node("nodeA");
        let v4 = n
            .add_net_interface(&ctx, NetInterfaceName::new("default").unwrap(), "10.0.0.1".parse().unwrap())
            .unwrap();
        assert_eq!(v4.address_family(), AddressFamily::Ipv4);
        assert_eq!(v4.tagged_address(7000), "ipv4 10.0.0.1:7000");

        let v6 = n
            .add_net_interface(&ctx, NetInterfaceName::new("repl").unwrap(), "fd00::1".parse().unwrap())
            .unwrap();
        assert_eq!(v6.address_family(), AddressFamily::Ipv6);
        assert_eq!(v6.tagged_address(7001), "ipv6 [fd00::1]:7001");
    }

    #[test]
    fn test_duplicate_interface_rejected() {
        let ctx = AccessContext::system();
        let mut n = node("nodeA");
        let name = NetInterfaceName::new("eth0").unwrap();
        n.add_net_interface(&ctx, name.clone(), "10.0.0.1".parse().unwrap())
            .unwrap();
        let err = n
            .add_net_interface(&ctx, name, "10.0.0.2".parse().unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[test]
    fn test_interfaces_ordered_by_name() {
        let ctx = AccessContext::system();
        let mut n = node("nodeA");
        for name in ["zeta", "alpha", "mid"] {
            n.add_net_interface(&ctx, NetInterfaceName::new(name).unwrap(), "10.0.0.1".parse().unwrap())
                .unwrap();
        }
        let names: Vec<_> = n
            .net_interfaces(&ctx)
            .unwrap()
            .map(|nif| nif.name().as_str().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_props_require_access() {
        let n = node("nodeA");
        n.props_mut(&AccessContext::system())
            .unwrap()
            .set_prop("PrefNic", "eth1")
            .unwrap();

        let guest = AccessContext::new("eve", "guest");
        assert!(matches!(n.props(&guest), Err(Error::AccessDenied(_))));
        assert!(matches!(
            n.net_interface(&guest, &NetInterfaceName::default_name()),
            Err(Error::AccessDenied(_))
        ));

        let view = n.props(&AccessContext::system()).unwrap();
        assert_eq!(view.get_prop("PrefNic").unwrap().as_deref(), Some("eth1"));
    }
}
