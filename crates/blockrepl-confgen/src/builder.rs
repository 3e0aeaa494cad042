//! Synthesis of replication configuration files
//!
//! [`ConfFileBuilder::build`] writes the file of one resource as seen from
//! the local node: the definition-level option blocks, one `on` block per
//! participant, one `connection` block per peer and the proxy block.
//! [`ConfFileBuilder::build_common_conf`] writes the node-wide defaults that
//! every resource file includes.
//!
//! Options are read from property namespaces and pass the whitelist before
//! they are written; rejected options are reported and left out. Structural
//! problems (missing layer data, malformed paths, a missing backing device)
//! fail the whole file.

use crate::consts::{
    COMMON_TEMPLATE_FILE, KEY_DRBD_PROXY_COMPRESSION_TYPE, NAMESPC_DRBD_DISK_OPTIONS,
    NAMESPC_DRBD_HANDLER_OPTIONS, NAMESPC_DRBD_NET_OPTIONS, NAMESPC_DRBD_PEER_DEVICE_OPTIONS,
    NAMESPC_DRBD_PROXY_COMPRESSION_OPTIONS, NAMESPC_DRBD_PROXY_OPTIONS,
    NAMESPC_DRBD_RESOURCE_OPTIONS, PEER_AUTH_ALGORITHM, PEER_DISK_PLACEHOLDER,
    PROXY_INSIDE_ADDRESS, PROXY_LISTEN_ADDRESS, RESOURCE_DEFINITION_ORIGIN,
};
use crate::paths::{PathResolver, ResolvedPaths};
use crate::reporter::ProblemReporter;
use crate::whitelist::{PropsObject, WhitelistProps};
use crate::writer::ConfWriter;
use blockrepl_common::{Error, NodeName, ResourceName, Result};
use blockrepl_props::{PATH_SEPARATOR, PropsContainer, ReadOnlyProps};
use blockrepl_topology::{
    AccessContext, DrbdRscData, DrbdRscDfnData, DrbdVlmData, NetInterface, Resource,
    ResourceConnection, ResourceConnectionFlags, ResourceDefinition, Topology,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const WHITELIST_CORRECTION: &str = "The whitelist was generated from 'drbdsetup xml-help \
    {resource,peer-device,net,disk}-options' when the satellite started.";

/// First line of every generated file
#[must_use]
pub fn header() -> String {
    format!(
        "# This file was generated by blockrepl({}), do not edit manually.",
        env!("CARGO_PKG_VERSION")
    )
}

/// Writes configuration files for resources of one topology snapshot
pub struct ConfFileBuilder<'a> {
    ctx: &'a AccessContext,
    reporter: &'a dyn ProblemReporter,
    whitelist: &'a WhitelistProps,
}

/// Everything a resource file is built from, checked up front
struct ResourceContext<'t> {
    definition: &'t ResourceDefinition,
    dfn_props: ReadOnlyProps,
    dfn_data: &'t DrbdRscDfnData,
    local: &'t Resource,
    local_data: &'t DrbdRscData,
    /// Peers not flagged for deletion, in node name order
    peers: Vec<(&'t Resource, &'t DrbdRscData)>,
}

impl<'a> ConfFileBuilder<'a> {
    pub fn new(
        ctx: &'a AccessContext,
        reporter: &'a dyn ProblemReporter,
        whitelist: &'a WhitelistProps,
    ) -> Self {
        Self {
            ctx,
            reporter,
            whitelist,
        }
    }

    /// Build the file of resource `name` on node `node`, with all its peers
    pub fn build_resource(
        &self,
        topology: &Topology,
        name: &ResourceName,
        node: &NodeName,
    ) -> Result<String> {
        let local = topology.resource(name, node).ok_or_else(|| {
            Error::missing_resource(format!("resource '{name}' is not deployed on node '{node}'"))
        })?;
        let peers: Vec<&Resource> = topology.peers_of(local).collect();
        self.build(topology, local, &peers)
    }

    /// Build the file of `local` connected to `peers`
    ///
    /// Peers are written in node name order regardless of the order given.
    pub fn build<'t>(
        &self,
        topology: &'t Topology,
        local: &'t Resource,
        peers: &[&'t Resource],
    ) -> Result<String> {
        let rc = self.resource_context(topology, local, peers)?;
        let mut w = ConfWriter::new();
        w.line(header());
        w.blank();
        {
            let mut rsc = w.section(format_args!(
                "resource \"{}{}\"",
                local.resource_name(),
                rc.dfn_data.suffix
            ));
            rsc.line(format_args!("template-file \"{COMMON_TEMPLATE_FILE}\";"));

            if rc.dfn_props.get_namespace(NAMESPC_DRBD_HANDLER_OPTIONS)?.is_some() {
                rsc.blank();
                let mut handlers = rsc.section("handlers");
                self.append_options(
                    &mut handlers,
                    &PropsObject::ResourceDefinition,
                    &rc.dfn_props,
                    NAMESPC_DRBD_HANDLER_OPTIONS,
                    true,
                )?;
            }

            if rc.dfn_props.get_namespace(NAMESPC_DRBD_RESOURCE_OPTIONS)?.is_some() {
                rsc.blank();
                let mut options = rsc.section("options");
                self.append_controller_options(&mut options, &rc.dfn_props, NAMESPC_DRBD_RESOURCE_OPTIONS)?;
            }

            rsc.blank();
            {
                let mut net = rsc.section("net");
                net.line(format_args!("cram-hmac-alg     {PEER_AUTH_ALGORITHM};"));
                net.line(format_args!("shared-secret     \"{}\";", rc.dfn_data.secret));
                self.append_controller_options(&mut net, &rc.dfn_props, NAMESPC_DRBD_NET_OPTIONS)?;
            }

            if rc.dfn_props.get_namespace(NAMESPC_DRBD_DISK_OPTIONS)?.is_some() {
                rsc.blank();
                let mut disk = rsc.section("disk");
                self.append_controller_options(&mut disk, &rc.dfn_props, NAMESPC_DRBD_DISK_OPTIONS)?;
            }

            rsc.blank();
            self.append_on_block(&mut rsc, &rc, local, rc.local_data, false)?;

            for (peer, peer_data) in &rc.peers {
                rsc.blank();
                self.append_on_block(&mut rsc, &rc, peer, peer_data, true)?;
            }

            let local_diskless = local.is_diskless(self.ctx)?;
            let resolver = PathResolver::new(self.ctx, topology, self.reporter);
            for &(peer, _) in &rc.peers {
                if local_diskless && peer.is_diskless_for_peers(self.ctx)? {
                    continue;
                }
                rsc.blank();
                self.append_connection(&mut rsc, &rc, topology, &resolver, peer)?;
            }

            self.append_proxy(&mut rsc, &rc.dfn_props)?;
        }

        debug!(
            resource = %local.resource_name(),
            node = %local.node_name(),
            peers = rc.peers.len(),
            "Generated resource configuration"
        );
        Ok(w.finish())
    }

    /// Build the node-wide file with defaults for every resource
    pub fn build_common_conf(&self, satellite_props: &ReadOnlyProps) -> Result<String> {
        let controller = PropsObject::Controller;
        let mut w = ConfWriter::new();
        w.line(header());
        w.blank();
        {
            let mut common = w.section("common");
            if satellite_props.get_namespace(NAMESPC_DRBD_DISK_OPTIONS)?.is_some()
                || satellite_props
                    .get_namespace(NAMESPC_DRBD_PEER_DEVICE_OPTIONS)?
                    .is_some()
            {
                let mut disk = common.section("disk");
                self.append_controller_options(&mut disk, satellite_props, NAMESPC_DRBD_DISK_OPTIONS)?;
                self.append_controller_options(
                    &mut disk,
                    satellite_props,
                    NAMESPC_DRBD_PEER_DEVICE_OPTIONS,
                )?;
            }

            if satellite_props.get_namespace(NAMESPC_DRBD_HANDLER_OPTIONS)?.is_some() {
                common.blank();
                let mut handlers = common.section("handlers");
                self.append_options(
                    &mut handlers,
                    &controller,
                    satellite_props,
                    NAMESPC_DRBD_HANDLER_OPTIONS,
                    true,
                )?;
            }

            if satellite_props.get_namespace(NAMESPC_DRBD_NET_OPTIONS)?.is_some() {
                let mut net = common.section("net");
                self.append_controller_options(&mut net, satellite_props, NAMESPC_DRBD_NET_OPTIONS)?;
            }

            if satellite_props.get_namespace(NAMESPC_DRBD_RESOURCE_OPTIONS)?.is_some() {
                let mut options = common.section("options");
                self.append_controller_options(
                    &mut options,
                    satellite_props,
                    NAMESPC_DRBD_RESOURCE_OPTIONS,
                )?;
            }
        }
        Ok(w.finish())
    }

    fn resource_context<'t>(
        &self,
        topology: &'t Topology,
        local: &'t Resource,
        peers: &[&'t Resource],
    ) -> Result<ResourceContext<'t>> {
        let name = local.resource_name();
        let local_data = self.layer_data_of(local)?;
        let definition = topology.resource_definition(name).ok_or_else(|| {
            Error::integrity(format!("no resource definition found for resource '{name}'"))
        })?;
        let dfn_data = definition.layer_data(self.ctx)?.ok_or_else(|| {
            Error::integrity(format!(
                "resource definition '{name}' has no replication layer data"
            ))
        })?;
        self.check_volumes(definition, local, local_data)?;

        let mut sorted: BTreeMap<&NodeName, (&Resource, &DrbdRscData)> = BTreeMap::new();
        for &peer in peers {
            if peer.resource_name() != name {
                return Err(Error::integrity(format!(
                    "peer resource '{}' on node '{}' does not belong to resource definition '{name}'",
                    peer.resource_name(),
                    peer.node_name()
                )));
            }
            if peer.node_name() == local.node_name() {
                return Err(Error::integrity(format!(
                    "peer of resource '{name}' is deployed on the local node '{}'",
                    local.node_name()
                )));
            }
            // A peer being deleted may already have lost its layer data
            if peer.is_deleted(self.ctx)? {
                continue;
            }
            let peer_data = self.layer_data_of(peer)?;
            self.check_volumes(definition, peer, peer_data)?;
            sorted.insert(peer.node_name(), (peer, peer_data));
        }

        Ok(ResourceContext {
            definition,
            dfn_props: definition.props(self.ctx)?,
            dfn_data,
            local,
            local_data,
            peers: sorted.into_values().collect(),
        })
    }

    fn layer_data_of<'t>(&self, resource: &'t Resource) -> Result<&'t DrbdRscData> {
        resource.layer_data(self.ctx)?.ok_or_else(|| {
            Error::integrity(format!(
                "resource '{}' on node '{}' has no replication layer data",
                resource.resource_name(),
                resource.node_name()
            ))
        })
    }

    /// Every layer volume needs a volume and a volume definition with a minor
    fn check_volumes(
        &self,
        definition: &ResourceDefinition,
        resource: &Resource,
        data: &DrbdRscData,
    ) -> Result<()> {
        for number in data.volumes.keys() {
            if resource.volume(self.ctx, *number)?.is_none() {
                return Err(Error::integrity(format!(
                    "layer volume {number} of resource '{}' on node '{}' has no volume",
                    resource.resource_name(),
                    resource.node_name()
                )));
            }
            let has_minor = definition
                .volume_definition(self.ctx, *number)?
                .is_some_and(|vlm_dfn| vlm_dfn.layer_data().is_some());
            if !has_minor {
                return Err(Error::integrity(format!(
                    "volume definition {number} of resource definition '{}' has no minor number",
                    definition.name()
                )));
            }
        }
        Ok(())
    }

    fn append_on_block(
        &self,
        w: &mut ConfWriter,
        rc: &ResourceContext<'_>,
        resource: &Resource,
        data: &DrbdRscData,
        is_peer: bool,
    ) -> Result<()> {
        let mut on = w.section(format_args!("on {}", resource.node_name()));
        for vlm_data in data.volumes.values() {
            self.append_volume(&mut on, rc, resource, vlm_data, is_peer)?;
        }
        on.line(format_args!("node-id    {};", data.node_id));
        Ok(())
    }

    fn append_volume(
        &self,
        w: &mut ConfWriter,
        rc: &ResourceContext<'_>,
        resource: &Resource,
        vlm_data: &DrbdVlmData,
        is_peer: bool,
    ) -> Result<()> {
        let number = vlm_data.volume_number;
        let deleted = resource
            .volume(self.ctx, number)?
            .is_none_or(|volume| volume.is_deleted());
        if deleted {
            return Ok(());
        }
        let Some(vlm_dfn) = rc.definition.volume_definition(self.ctx, number)? else {
            return Err(Error::integrity(format!(
                "volume {number} of resource '{}' has no volume definition",
                resource.resource_name()
            )));
        };
        let Some(vlm_dfn_data) = vlm_dfn.layer_data() else {
            return Err(Error::integrity(format!(
                "volume definition {number} of resource '{}' has no minor number",
                resource.resource_name()
            )));
        };

        let disk = if is_peer {
            if resource.is_diskless_for_peers(self.ctx)? {
                "none"
            } else {
                PEER_DISK_PLACEHOLDER
            }
        } else {
            let diskless = resource.is_diskless(self.ctx)?;
            match vlm_data.backing_device.as_deref() {
                None => "none",
                Some(_) if diskless => "none",
                Some(device) if device.trim().is_empty() => {
                    return Err(Error::missing_resource(format!(
                        "local volume {number} of resource '{}' has an empty backing device; \
                         the storage driver returned no device path",
                        resource.resource_name()
                    )));
                }
                Some(device) => device,
            }
        };
        let meta_disk = vlm_data.meta_disk().unwrap_or("internal");

        let mut volume = w.section(format_args!("volume {number}"));
        volume.line(format_args!("disk        {disk};"));
        let vlm_dfn_props = vlm_dfn.props();
        if vlm_dfn_props.get_namespace(NAMESPC_DRBD_DISK_OPTIONS)?.is_some() {
            let mut disk_options = volume.section("disk");
            self.append_controller_options(&mut disk_options, &vlm_dfn_props, NAMESPC_DRBD_DISK_OPTIONS)?;
        }
        volume.line(format_args!("meta-disk   {meta_disk};"));
        volume.line(format_args!("device      minor {};", vlm_dfn_data.minor));
        Ok(())
    }

    fn append_connection<'r>(
        &self,
        w: &mut ConfWriter,
        rc: &ResourceContext<'r>,
        topology: &'r Topology,
        resolver: &PathResolver<'r>,
        peer: &'r Resource,
    ) -> Result<()> {
        let local = rc.local;
        let rsc_con =
            topology.resource_connection(local.resource_name(), local.node_name(), peer.node_name());

        let mut con = w.section("connection");
        match rsc_con {
            Some(rsc_con) => {
                let con_props = rsc_con.props(self.ctx)?;
                if con_props.get_namespace(NAMESPC_DRBD_NET_OPTIONS)?.is_some() {
                    con.blank();
                    let mut net = con.section("net");
                    self.append_controller_options(&mut net, &con_props, NAMESPC_DRBD_NET_OPTIONS)?;
                }
                if con_props.get_namespace(NAMESPC_DRBD_PEER_DEVICE_OPTIONS)?.is_some() {
                    con.blank();
                    let mut disk = con.section("disk");
                    self.append_conflicting_options(
                        &mut disk,
                        &PropsObject::Controller,
                        &rc.dfn_props,
                        &con_props,
                        NAMESPC_DRBD_PEER_DEVICE_OPTIONS,
                    )?;
                }
            }
            None => {
                if rc.dfn_props.get_namespace(NAMESPC_DRBD_PEER_DEVICE_OPTIONS)?.is_some() {
                    con.blank();
                    let mut disk = con.section("disk");
                    self.append_controller_options(
                        &mut disk,
                        &rc.dfn_props,
                        NAMESPC_DRBD_PEER_DEVICE_OPTIONS,
                    )?;
                }
            }
        }

        let port = match rsc_con {
            Some(rsc_con) => rsc_con.port(self.ctx)?,
            None => None,
        }
        .unwrap_or(rc.dfn_data.tcp_port)
        .value();
        let via_proxy = self.uses_local_proxy(rsc_con)?;

        match resolver.resolve(local, peer)? {
            ResolvedPaths::Explicit(pairs) => {
                for (idx, (local_nic, peer_nic)) in pairs.iter().enumerate() {
                    if idx > 0 {
                        con.blank();
                    }
                    let mut path = con.section("path");
                    append_host(&mut path, port, via_proxy, local_nic);
                    append_host(&mut path, port, via_proxy, peer_nic);
                }
            }
            ResolvedPaths::Implicit(local_nic, peer_nic) => {
                append_host(&mut con, port, via_proxy, local_nic);
                append_host(&mut con, port, via_proxy, peer_nic);
            }
        }
        Ok(())
    }

    fn uses_local_proxy(&self, rsc_con: Option<&ResourceConnection>) -> Result<bool> {
        match rsc_con {
            Some(rsc_con) => Ok(rsc_con
                .flags(self.ctx)?
                .contains(ResourceConnectionFlags::LOCAL_DRBD_PROXY)),
            None => Ok(false),
        }
    }

    fn append_proxy(&self, w: &mut ConfWriter, dfn_props: &ReadOnlyProps) -> Result<()> {
        let compression = dfn_props.get_prop(KEY_DRBD_PROXY_COMPRESSION_TYPE)?;
        if dfn_props.get_namespace(NAMESPC_DRBD_PROXY_OPTIONS)?.is_none() && compression.is_none() {
            return Ok(());
        }

        w.blank();
        let mut proxy = w.section("proxy");
        self.append_options(
            &mut proxy,
            &PropsObject::DrbdProxy,
            dfn_props,
            NAMESPC_DRBD_PROXY_OPTIONS,
            false,
        )?;

        if let Some(compression) = compression {
            let object = PropsObject::DrbdProxyCompression(compression.clone());
            let mut terms = vec![compression];
            if let Some(ns) = dfn_props.get_namespace(NAMESPC_DRBD_PROXY_COMPRESSION_OPTIONS)? {
                for (key, value) in ns.map() {
                    if self.check_valid(&object, &key, &value) {
                        terms.push(relative_key(&ns, &key).to_string());
                        terms.push(value);
                    }
                }
            }
            let mut plugin = proxy.section("plugin");
            plugin.line(format_args!("{};", terms.join(" ")));
        }
        Ok(())
    }

    fn append_controller_options(
        &self,
        w: &mut ConfWriter,
        props: &ReadOnlyProps,
        namespace: &str,
    ) -> Result<()> {
        self.append_options(w, &PropsObject::Controller, props, namespace, false)
    }

    /// Write every whitelisted option of `namespace` in key order
    fn append_options(
        &self,
        w: &mut ConfWriter,
        object: &PropsObject,
        props: &ReadOnlyProps,
        namespace: &str,
        quote: bool,
    ) -> Result<()> {
        let Some(ns) = props.get_namespace(namespace)? else {
            return Ok(());
        };
        for (key, value) in ns.map() {
            if !self.check_valid(object, &key, &value) {
                continue;
            }
            let name = relative_key(&ns, &key);
            if quote {
                w.line(format_args!("{name} \"{value}\";"));
            } else {
                w.line(format_args!("{name} {value};"));
            }
        }
        Ok(())
    }

    /// Merge definition options with overrides of a resource connection
    ///
    /// Overridden definition values stay visible as comments.
    fn append_conflicting_options(
        &self,
        w: &mut ConfWriter,
        object: &PropsObject,
        parent: &ReadOnlyProps,
        child: &ReadOnlyProps,
        namespace: &str,
    ) -> Result<()> {
        let parent_ns = parent.get_namespace(namespace)?;
        let parent_map = parent_ns.as_ref().map(PropsContainer::map).unwrap_or_default();
        let child_ns = child.get_namespace(namespace)?;
        let child_map = child_ns.as_ref().map(PropsContainer::map).unwrap_or_default();
        let prefix_len = namespace.len() + 1;

        let mut written = BTreeSet::new();
        for (key, value) in &parent_map {
            if !self.check_valid(object, key, value) {
                continue;
            }
            let name = key.get(prefix_len..).unwrap_or(key);
            match child_map.get(key) {
                Some(child_value) if self.check_valid(object, key, child_value) => {
                    w.comment_line(format_args!(
                        "{name} {value}; # set on {RESOURCE_DEFINITION_ORIGIN}"
                    ));
                    w.line(format_args!("{name} {child_value};"));
                }
                _ => w.line(format_args!("{name} {value};")),
            }
            written.insert(key.as_str());
        }

        for (key, value) in &child_map {
            if written.contains(key.as_str()) || !self.check_valid(object, key, value) {
                continue;
            }
            let name = key.get(prefix_len..).unwrap_or(key);
            w.line(format_args!("{name} {value};"));
        }
        Ok(())
    }

    fn check_valid(&self, object: &PropsObject, key: &str, value: &str) -> bool {
        let allowed = self.whitelist.is_allowed(object, key, value);
        if !allowed {
            self.reporter.report_warning(
                &format!("Ignoring property '{key}' with value '{value}' as it is not whitelisted."),
                Some(WHITELIST_CORRECTION),
            );
        }
        allowed
    }
}

fn append_host(w: &mut ConfWriter, port: u16, via_proxy: bool, net_if: &NetInterface) {
    let host = net_if.node_name();
    let outside = net_if.tagged_address(port);
    if via_proxy {
        let mut proxy = w.section(format_args!(
            "host {host} address {PROXY_LISTEN_ADDRESS}:{port} via proxy on {host}"
        ));
        proxy.line(format_args!("inside {PROXY_INSIDE_ADDRESS}:{port};"));
        proxy.line(format_args!("outside {outside};"));
    } else {
        w.line(format_args!("host {host} address {outside};"));
    }
}

/// Key of an entry relative to the namespace view it was read from
fn relative_key<'k>(ns: &ReadOnlyProps, key: &'k str) -> &'k str {
    key.strip_prefix(ns.path())
        .and_then(|rest| rest.strip_prefix(PATH_SEPARATOR))
        .unwrap_or(key)
}
