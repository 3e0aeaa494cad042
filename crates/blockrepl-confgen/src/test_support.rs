//! Topology fixtures shared by the synthesizer tests

use crate::whitelist::{OptionRule, WhitelistProps};
use blockrepl_common::{
    DrbdNodeId, MinorNumber, NetInterfaceName, NodeName, ResourceName, StorPoolName,
    TcpPortNumber, VolumeNumber,
};
use blockrepl_props::PropsMut;
use blockrepl_topology::{
    AccessContext, DrbdRscData, DrbdRscDfnData, DrbdVlmData, DrbdVlmDfnData, NodeConnection,
    Node, NodePair, Resource, ResourceConnection, ResourceConnectionFlags, ResourceDefinition,
    ResourceFlags, StoragePool, Topology, Volume, VolumeDefinition, VolumeFlags,
};

pub const POOL: &str = "pool1";

pub fn node_name(name: &str) -> NodeName {
    NodeName::new(name).unwrap()
}

pub fn rsc_name(name: &str) -> ResourceName {
    ResourceName::new(name).unwrap()
}

pub fn vlm_nr(nr: u16) -> VolumeNumber {
    VolumeNumber::new(u64::from(nr)).unwrap()
}

/// Volume of a test resource
pub struct TestVolume {
    pub number: u16,
    pub backing_device: Option<&'static str>,
    pub meta_disk: Option<&'static str>,
    pub flags: VolumeFlags,
}

impl TestVolume {
    pub fn disk(number: u16, device: &'static str) -> Self {
        Self {
            number,
            backing_device: Some(device),
            meta_disk: None,
            flags: VolumeFlags::empty(),
        }
    }

    pub fn diskless(number: u16) -> Self {
        Self {
            number,
            backing_device: None,
            meta_disk: None,
            flags: VolumeFlags::empty(),
        }
    }

    pub fn deleted(mut self) -> Self {
        self.flags |= VolumeFlags::DELETE;
        self
    }

    pub fn meta(mut self, device: &'static str) -> Self {
        self.meta_disk = Some(device);
        self
    }
}

/// Builds small topologies with the system context
pub struct TopologyBuilder {
    ctx: AccessContext,
    topology: Topology,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self {
            ctx: AccessContext::system(),
            topology: Topology::new(),
        }
    }

    /// Node with interfaces and a storage pool named [`POOL`]
    pub fn node(mut self, name: &str, nics: &[(&str, &str)]) -> Self {
        let mut node = Node::new(node_name(name));
        for (nic, address) in nics {
            node.add_net_interface(
                &self.ctx,
                NetInterfaceName::new(*nic).unwrap(),
                address.parse().unwrap(),
            )
            .unwrap();
        }
        self.topology.add_node(node).unwrap();
        self.topology
            .add_storage_pool(StoragePool::new(
                node_name(name),
                StorPoolName::new(POOL).unwrap(),
            ))
            .unwrap();
        self
    }

    /// Definition with layer data and volumes given as (number, minor)
    pub fn definition(mut self, name: &str, suffix: &str, port: u16, volumes: &[(u16, u32)]) -> Self {
        let mut dfn = ResourceDefinition::new(rsc_name(name));
        dfn.set_layer_data(
            &self.ctx,
            DrbdRscDfnData::new(suffix, "s3cr3t", TcpPortNumber::new(u64::from(port)).unwrap()),
        )
        .unwrap();
        for (nr, minor) in volumes {
            let mut vlm_dfn = VolumeDefinition::new(vlm_nr(*nr));
            vlm_dfn.set_layer_data(DrbdVlmDfnData {
                minor: MinorNumber::new(u64::from(*minor)).unwrap(),
            });
            dfn.add_volume_definition(&self.ctx, vlm_dfn).unwrap();
        }
        self.topology.add_resource_definition(dfn).unwrap();
        self
    }

    pub fn resource(
        mut self,
        name: &str,
        node: &str,
        node_id: u8,
        flags: ResourceFlags,
        volumes: Vec<TestVolume>,
    ) -> Self {
        let dfn = self.topology.resource_definition(&rsc_name(name)).unwrap();
        let mut rsc = Resource::new(dfn, node_name(node));
        rsc.enable_flags(&self.ctx, flags).unwrap();

        let mut layer = DrbdRscData::new(DrbdNodeId::new(u64::from(node_id)).unwrap());
        for vlm in volumes {
            let volume = Volume::new(vlm_nr(vlm.number), StorPoolName::new(POOL).unwrap())
                .with_flags(vlm.flags);
            rsc.add_volume(&self.ctx, volume).unwrap();
            let mut data = DrbdVlmData::new(vlm_nr(vlm.number));
            data.backing_device = vlm.backing_device.map(str::to_string);
            data.meta_disk = vlm.meta_disk.map(str::to_string);
            layer.put_volume(data);
        }
        rsc.set_layer_data(&self.ctx, layer).unwrap();
        self.topology.add_resource(&self.ctx, rsc).unwrap();
        self
    }

    /// Resource without volumes or layer data
    pub fn bare_resource(mut self, name: &str, node: &str, flags: ResourceFlags) -> Self {
        let dfn = self.topology.resource_definition(&rsc_name(name)).unwrap();
        let mut rsc = Resource::new(dfn, node_name(node));
        rsc.enable_flags(&self.ctx, flags).unwrap();
        self.topology.add_resource(&self.ctx, rsc).unwrap();
        self
    }

    pub fn node_connection(mut self, a: &str, b: &str, props: &[(&str, &str)]) -> Self {
        let con = NodeConnection::new(NodePair::new(node_name(a), node_name(b)).unwrap());
        let con_props = con.props_mut(&self.ctx).unwrap();
        for (key, value) in props {
            con_props.set_prop(key, value).unwrap();
        }
        self.topology.add_node_connection(con).unwrap();
        self
    }

    pub fn resource_connection(
        mut self,
        name: &str,
        a: &str,
        b: &str,
        port: Option<u16>,
        flags: ResourceConnectionFlags,
        props: &[(&str, &str)],
    ) -> Self {
        let dfn = self.topology.resource_definition(&rsc_name(name)).unwrap();
        let mut con = ResourceConnection::new(dfn, NodePair::new(node_name(a), node_name(b)).unwrap())
            .with_flags(flags);
        if let Some(port) = port {
            con = con.with_port(TcpPortNumber::new(u64::from(port)).unwrap());
        }
        let con_props = con.props_mut(&self.ctx).unwrap();
        for (key, value) in props {
            con_props.set_prop(key, value).unwrap();
        }
        self.topology.add_resource_connection(con).unwrap();
        self
    }

    pub fn build(self) -> Topology {
        self.topology
    }
}

/// nodeA (local, `/dev/vg/lv0`) and nodeB sharing resource `data1` on port 7000
pub fn data1_topology(node_b_flags: ResourceFlags) -> Topology {
    TopologyBuilder::new()
        .node("nodeA", &[("default", "10.0.0.1")])
        .node("nodeB", &[("default", "10.0.0.2")])
        .definition("data1", "", 7000, &[(0, 1000)])
        .resource("data1", "nodeA", 0, ResourceFlags::empty(), vec![TestVolume::disk(0, "/dev/vg/lv0")])
        .resource("data1", "nodeB", 1, node_b_flags, vec![TestVolume::disk(0, "/dev/vg/lv0")])
        .build()
}

/// Set properties on the definition of `name`
pub fn set_dfn_props(topology: &Topology, name: &str, props: &[(&str, &str)]) {
    let ctx = AccessContext::system();
    let dfn_props = topology
        .resource_definition(&rsc_name(name))
        .unwrap()
        .props_mut(&ctx)
        .unwrap();
    for (key, value) in props {
        dfn_props.set_prop(key, value).unwrap();
    }
}

/// Whitelist with the static tables and a handful of replication options
pub fn test_whitelist() -> WhitelistProps {
    let numeric = OptionRule::Numeric { min: 0, max: 1_000_000 };
    let mut builder = WhitelistProps::builder();
    builder
        .with_static_tables()
        .add_drbd_rule(
            "DrbdOptions/Net/protocol",
            &OptionRule::Symbol(vec!["A".into(), "B".into(), "C".into()]),
        )
        .add_drbd_rule("DrbdOptions/Net/max-buffers", &numeric)
        .add_drbd_rule("DrbdOptions/Net/sndbuf-size", &numeric)
        .add_drbd_rule("DrbdOptions/Disk/al-extents", &numeric)
        .add_drbd_rule("DrbdOptions/Disk/disk-flushes", &OptionRule::Boolean)
        .add_drbd_rule("DrbdOptions/PeerDevice/c-plan-ahead", &numeric)
        .add_drbd_rule("DrbdOptions/PeerDevice/c-max-rate", &numeric)
        .add_drbd_rule("DrbdOptions/PeerDevice/resync-rate", &numeric)
        .add_drbd_rule(
            "DrbdOptions/Resource/auto-promote",
            &OptionRule::Boolean,
        );
    builder.build()
}
