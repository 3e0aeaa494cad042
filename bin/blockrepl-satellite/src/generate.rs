//! Writing the configuration files of one node

use crate::output::{remove_stale, write_atomic};
use anyhow::{Context, Result};
use blockrepl_common::config::SatelliteConfig;
use blockrepl_common::{NodeName, ResourceName};
use blockrepl_confgen::{ConfFileBuilder, ProblemReporter, WhitelistProps};
use blockrepl_topology::{AccessContext, Resource, Topology};
use std::collections::BTreeSet;
use tracing::{error, info};

/// What one generation run did
#[derive(Debug, Default)]
pub struct GenerateReport {
    pub written: Vec<ResourceName>,
    pub removed: Vec<ResourceName>,
    pub failed: Vec<ResourceName>,
}

impl GenerateReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes resource files and the common file for the local node
pub struct Generator<'a> {
    pub config: &'a SatelliteConfig,
    pub ctx: &'a AccessContext,
    pub whitelist: &'a WhitelistProps,
    pub reporter: &'a dyn ProblemReporter,
}

impl Generator<'_> {
    /// Generate for `node`, limited to `only` when it is not empty
    ///
    /// A resource that fails is logged, counted and keeps its previous file.
    pub async fn run(
        &self,
        topology: &Topology,
        node: &NodeName,
        only: &[ResourceName],
    ) -> Result<GenerateReport> {
        let builder = ConfFileBuilder::new(self.ctx, self.reporter, self.whitelist);
        let selected: BTreeSet<&ResourceName> = only.iter().collect();
        let mut report = GenerateReport::default();

        for name in &selected {
            if topology.resource(name, node).is_none() {
                error!(resource = %name, node = %node, "Resource is not deployed on this node");
                report.failed.push((*name).clone());
            }
        }

        for resource in topology.resources_on(node) {
            let name = resource.resource_name();
            if !selected.is_empty() && !selected.contains(name) {
                continue;
            }
            match self.generate_one(&builder, topology, resource).await {
                Ok(true) => report.written.push(name.clone()),
                Ok(false) => report.removed.push(name.clone()),
                Err(e) => {
                    error!(resource = %name, "Failed to generate configuration: {e:#}");
                    report.failed.push(name.clone());
                }
            }
        }

        let common = builder
            .build_common_conf(&topology.satellite_props())
            .context("Failed to generate the common configuration")?;
        write_atomic(&self.config.common_file_path(), &common).await?;

        info!(
            node = %node,
            written = report.written.len(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Generated configuration"
        );
        Ok(report)
    }

    /// Write or remove the file of one resource; `false` means removed
    async fn generate_one(
        &self,
        builder: &ConfFileBuilder<'_>,
        topology: &Topology,
        resource: &Resource,
    ) -> Result<bool> {
        let name = resource.resource_name();
        let suffix = topology
            .resource_definition(name)
            .map(|dfn| dfn.layer_data(self.ctx))
            .transpose()?
            .flatten()
            .map(|data| data.suffix.clone())
            .unwrap_or_default();
        let path = self.config.resource_file(&format!("{name}{suffix}"));

        if resource.is_deleted(self.ctx)? {
            remove_stale(&path).await?;
            return Ok(false);
        }

        let text = builder.build_resource(topology, name, resource.node_name())?;
        write_atomic(&path, &text).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockrepl_confgen::{OptionRule, TracingReporter};
    use blockrepl_topology::TopologySnapshot;
    use std::path::PathBuf;

    const SNAPSHOT: &str = r#"{
        "satellite_props": { "DrbdOptions/Net/protocol": "C" },
        "nodes": [
            { "name": "nodeA", "net_interfaces": [{ "name": "default", "address": "10.0.0.1" }] },
            { "name": "nodeB", "net_interfaces": [{ "name": "default", "address": "10.0.0.2" }] }
        ],
        "storage_pools": [
            { "node": "nodeA", "name": "pool1" },
            { "node": "nodeB", "name": "pool1" }
        ],
        "resource_definitions": [
            {
                "name": "data1",
                "drbd": { "secret": "s3cr3t", "tcp_port": 7000 },
                "volume_definitions": [{ "number": 0, "minor": 1000 }]
            },
            {
                "name": "old",
                "drbd": { "secret": "x", "tcp_port": 7001 },
                "volume_definitions": [{ "number": 0, "minor": 1001 }]
            },
            {
                "name": "broken",
                "drbd": { "secret": "y", "tcp_port": 7002 },
                "volume_definitions": [{ "number": 0, "minor": 1002 }]
            }
        ],
        "resources": [
            {
                "name": "data1", "node": "nodeA",
                "volumes": [{ "number": 0, "storage_pool": "pool1" }],
                "drbd": { "node_id": 0, "volumes": [{ "number": 0, "backing_device": "/dev/vg/lv0" }] }
            },
            {
                "name": "data1", "node": "nodeB",
                "volumes": [{ "number": 0, "storage_pool": "pool1" }],
                "drbd": { "node_id": 1, "volumes": [{ "number": 0, "backing_device": "/dev/vg/lv0" }] }
            },
            {
                "name": "old", "node": "nodeA", "flags": ["DELETE"],
                "volumes": [{ "number": 0, "storage_pool": "pool1" }],
                "drbd": { "node_id": 0, "volumes": [{ "number": 0, "backing_device": "/dev/vg/old" }] }
            },
            {
                "name": "broken", "node": "nodeA",
                "volumes": [{ "number": 0, "storage_pool": "pool1" }],
                "drbd": { "node_id": 0, "volumes": [{ "number": 0, "backing_device": "" }] }
            }
        ]
    }"#;

    fn whitelist() -> WhitelistProps {
        let mut builder = WhitelistProps::builder();
        builder.with_static_tables().add_drbd_rule(
            "DrbdOptions/Net/protocol",
            &OptionRule::Symbol(vec!["A".into(), "B".into(), "C".into()]),
        );
        builder.build()
    }

    fn config(dir: PathBuf) -> SatelliteConfig {
        SatelliteConfig {
            node_name: Some("nodeA".to_string()),
            config_dir: dir,
            ..SatelliteConfig::default()
        }
    }

    #[tokio::test]
    async fn test_generate_node() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path().to_path_buf());
        std::fs::write(dir.path().join("old.res"), "stale").unwrap();
        std::fs::write(dir.path().join("broken.res"), "previous").unwrap();

        let topology = TopologySnapshot::from_json(SNAPSHOT).unwrap().into_topology().unwrap();
        let ctx = AccessContext::system();
        let whitelist = whitelist();
        let generator = Generator {
            config: &config,
            ctx: &ctx,
            whitelist: &whitelist,
            reporter: &TracingReporter,
        };
        let node = NodeName::new("nodeA").unwrap();
        let report = generator.run(&topology, &node, &[]).await.unwrap();

        assert_eq!(report.written, vec![ResourceName::new("data1").unwrap()]);
        assert_eq!(report.removed, vec![ResourceName::new("old").unwrap()]);
        assert_eq!(report.failed, vec![ResourceName::new("broken").unwrap()]);
        assert!(!report.is_success());

        let data1 = std::fs::read_to_string(dir.path().join("data1.res")).unwrap();
        assert!(data1.contains("host nodeB address ipv4 10.0.0.2:7000;"));
        assert!(!dir.path().join("old.res").exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("broken.res")).unwrap(), "previous");

        let common = std::fs::read_to_string(dir.path().join("blockrepl_common.conf")).unwrap();
        assert!(common.contains("    net\n    {\n        protocol C;\n    }\n"));
    }

    #[tokio::test]
    async fn test_generate_selected_resources() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path().to_path_buf());
        let topology = TopologySnapshot::from_json(SNAPSHOT).unwrap().into_topology().unwrap();
        let ctx = AccessContext::system();
        let whitelist = whitelist();
        let generator = Generator {
            config: &config,
            ctx: &ctx,
            whitelist: &whitelist,
            reporter: &TracingReporter,
        };
        let node = NodeName::new("nodeA").unwrap();
        let only = [ResourceName::new("data1").unwrap(), ResourceName::new("ghost").unwrap()];
        let report = generator.run(&topology, &node, &only).await.unwrap();

        assert_eq!(report.written, vec![ResourceName::new("data1").unwrap()]);
        assert!(report.removed.is_empty());
        assert_eq!(report.failed, vec![ResourceName::new("ghost").unwrap()]);
        assert!(!dir.path().join("broken.res").exists());
    }
}
