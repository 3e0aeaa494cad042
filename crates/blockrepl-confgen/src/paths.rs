//! Network path selection between two resources
//!
//! Explicit paths come from a `Paths` namespace on the resource connection
//! or, failing that, on the node connection. Every child namespace of
//! `Paths` names one path and maps the two node names to interface names:
//!
//! ```text
//! Paths/path1/nodeA = eth1
//! Paths/path1/nodeB = eth1
//! ```
//!
//! Without explicit paths the preferred interface of each side is used.

use crate::consts::{KEY_PREF_NIC, NAMESPC_CONNECTION_PATHS};
use crate::reporter::ProblemReporter;
use blockrepl_common::{Error, NetInterfaceName, Result};
use blockrepl_props::{PATH_SEPARATOR, PriorityProps, PropsContainer, ReadOnlyProps};
use blockrepl_topology::{AccessContext, NetInterface, Node, Resource, Topology};
use tracing::debug;

/// Interfaces used for the connection between two resources
#[derive(Debug)]
pub enum ResolvedPaths<'a> {
    /// Configured paths as (local, peer) pairs, in path name order
    ///
    /// Each pair is oriented from the local node whatever the key order of
    /// its entries, so the local `host` line is always written first.
    Explicit(Vec<(&'a NetInterface, &'a NetInterface)>),
    /// Preferred interfaces of (local, peer)
    Implicit(&'a NetInterface, &'a NetInterface),
}

/// Resolves network paths over one topology snapshot
pub struct PathResolver<'a> {
    ctx: &'a AccessContext,
    topology: &'a Topology,
    reporter: &'a dyn ProblemReporter,
}

impl<'a> PathResolver<'a> {
    pub fn new(
        ctx: &'a AccessContext,
        topology: &'a Topology,
        reporter: &'a dyn ProblemReporter,
    ) -> Self {
        Self {
            ctx,
            topology,
            reporter,
        }
    }

    /// Interfaces for the connection from `local` to `peer`
    pub fn resolve(&self, local: &'a Resource, peer: &'a Resource) -> Result<ResolvedPaths<'a>> {
        let local_node = self.node_of(local)?;
        let peer_node = self.node_of(peer)?;

        match self.paths_namespace(local, peer)? {
            Some(paths) => {
                let mut pairs = Vec::new();
                for path_name in paths.iterate_namespaces() {
                    pairs.push(self.resolve_path(&paths, &path_name, local_node, peer_node)?);
                }
                debug!(
                    resource = %local.resource_name(),
                    peer = %peer.node_name(),
                    paths = pairs.len(),
                    "Using explicit network paths"
                );
                Ok(ResolvedPaths::Explicit(pairs))
            }
            None => Ok(ResolvedPaths::Implicit(
                self.preferred_net_interface(local)?,
                self.preferred_net_interface(peer)?,
            )),
        }
    }

    /// `Paths` namespace of the resource connection, else of the node connection
    pub fn paths_namespace(
        &self,
        local: &Resource,
        peer: &Resource,
    ) -> Result<Option<ReadOnlyProps>> {
        if let Some(rsc_con) = self.topology.resource_connection(
            local.resource_name(),
            local.node_name(),
            peer.node_name(),
        ) {
            let paths = rsc_con.props(self.ctx)?.get_namespace(NAMESPC_CONNECTION_PATHS)?;
            if paths.is_some() {
                return Ok(paths);
            }
        }
        match self
            .topology
            .node_connection(local.node_name(), peer.node_name())
        {
            Some(node_con) => node_con
                .props(self.ctx)?
                .get_namespace(NAMESPC_CONNECTION_PATHS),
            None => Ok(None),
        }
    }

    fn resolve_path(
        &self,
        paths: &ReadOnlyProps,
        path_name: &str,
        local_node: &'a Node,
        peer_node: &'a Node,
    ) -> Result<(&'a NetInterface, &'a NetInterface)> {
        let entries = paths
            .get_namespace(path_name)?
            .map(|path| path.map())
            .unwrap_or_default();
        if entries.len() != 2 {
            return Err(Error::integrity(format!(
                "network path '{path_name}' must name exactly two nodes, found {} entries",
                entries.len()
            )));
        }

        let mut iter = entries
            .iter()
            .map(|(key, nic)| (entry_node_name(key), nic.as_str()));
        let (Some(first), Some(second)) = (iter.next(), iter.next()) else {
            return Err(Error::internal("path entries vanished while resolving"));
        };

        let local_name = local_node.name();
        let peer_name = peer_node.name();
        let (local_nic, peer_nic) =
            if local_name.matches_ignore_case(first.0) && peer_name.matches_ignore_case(second.0) {
                (first.1, second.1)
            } else if peer_name.matches_ignore_case(first.0)
                && local_name.matches_ignore_case(second.0)
            {
                (second.1, first.1)
            } else {
                return Err(Error::integrity(format!(
                    "network path '{path_name}' names nodes '{}' and '{}', expected '{local_name}' and '{peer_name}'",
                    first.0, second.0
                )));
            };

        Ok((
            self.named_net_interface(local_node, local_nic)?,
            self.named_net_interface(peer_node, peer_nic)?,
        ))
    }

    fn named_net_interface(&self, node: &'a Node, nic: &str) -> Result<&'a NetInterface> {
        let name = NetInterfaceName::new(nic).map_err(|e| {
            Error::missing_resource(format!(
                "network interface name '{nic}' of node '{}' is not valid: {e}",
                node.name()
            ))
        })?;
        node.net_interface(self.ctx, &name)?.ok_or_else(|| {
            Error::missing_resource(format!(
                "network interface '{nic}' of node '{}' does not exist",
                node.name()
            ))
        })
    }

    /// Preferred interface of the node a resource is deployed on
    ///
    /// `PrefNic` is looked up on the resource, the storage pool of its first
    /// volume and the node, in that order. Without a usable preference the
    /// `default` interface is taken, then the first interface by name.
    pub fn preferred_net_interface(&self, resource: &Resource) -> Result<&'a NetInterface> {
        let node = self.node_of(resource)?;

        let rsc_props = resource.props(self.ctx)?;
        let pool_props = match resource.volumes(self.ctx)?.next() {
            Some(volume) => self
                .topology
                .storage_pool(resource.node_name(), volume.storage_pool())
                .map(|pool| pool.props(self.ctx))
                .transpose()?,
            None => None,
        };
        let node_props = node.props(self.ctx)?;
        let prio = PriorityProps::new([Some(&rsc_props), pool_props.as_ref(), Some(&node_props)]);

        if let Some(pref_nic) = prio.get_prop(KEY_PREF_NIC)? {
            let found = match NetInterfaceName::new(pref_nic.as_str()) {
                Ok(name) => node.net_interface(self.ctx, &name)?,
                Err(_) => None,
            };
            if let Some(net_if) = found {
                return Ok(net_if);
            }
            self.reporter.report_warning(
                &format!(
                    "Preferred network interface '{pref_nic}' not found on node '{}', fallback to default",
                    node.name()
                ),
                None,
            );
        }

        if let Some(net_if) = node.net_interface(self.ctx, &NetInterfaceName::default_name())? {
            return Ok(net_if);
        }
        node.net_interfaces(self.ctx)?.next().ok_or_else(|| {
            Error::missing_resource(format!("node '{}' has no network interface", node.name()))
        })
    }

    fn node_of(&self, resource: &Resource) -> Result<&'a Node> {
        self.topology.node(resource.node_name()).ok_or_else(|| {
            Error::integrity(format!(
                "resource '{}' is deployed on unknown node '{}'",
                resource.resource_name(),
                resource.node_name()
            ))
        })
    }
}

/// Node name of a path entry, the last segment of its key
fn entry_node_name(key: &str) -> &str {
    key.rsplit(PATH_SEPARATOR).next().unwrap_or(key)
}
