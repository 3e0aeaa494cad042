//! blockrepl Satellite - Replication configuration agent
//!
//! This binary writes the replication configuration of the node it runs on
//! from a topology snapshot and applies resources through the admin tool.

mod apply;
mod generate;
mod output;
mod retry;
mod whitelist;

use anyhow::{Context, Result, bail};
use blockrepl_common::config::LoggingConfig;
use blockrepl_common::{Config, NodeName, ResourceName};
use blockrepl_confgen::TracingReporter;
use blockrepl_topology::{AccessContext, JsonSnapshotLoader, TopologyLoader};
use clap::{Parser, Subcommand};
use generate::Generator;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "blockrepl-satellite")]
#[command(about = "blockrepl replication configuration agent")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/blockrepl/satellite.toml")]
    config: PathBuf,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the configuration files of this node
    Generate {
        /// Topology snapshot (JSON)
        #[arg(short, long)]
        topology: PathBuf,

        /// Node to generate for (defaults to satellite.node_name)
        #[arg(short, long)]
        node: Option<String>,

        /// Only generate these resources
        #[arg(short, long)]
        resource: Vec<String>,
    },
    /// Adjust a running resource to its configuration file
    Apply {
        /// Resource name
        #[arg(short, long)]
        resource: String,
    },
    /// Show the number of whitelisted options per category
    Whitelist,
}

/// Load the configuration file layered with `BLOCKREPL__*` variables
fn load_config(path: &Path) -> Result<Config> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("BLOCKREPL").separator("__"))
        .build()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    settings
        .try_deserialize()
        .context("Invalid configuration")
}

fn init_logging(logging: &LoggingConfig, level: Option<&str>) {
    let level = level.unwrap_or(&logging.level).to_string();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    let config = load_config(&args.config)?;
    init_logging(&config.logging, args.log_level.as_deref());

    match args.command {
        Commands::Generate {
            topology,
            node,
            resource,
        } => {
            let node = match node.or_else(|| config.satellite.node_name.clone()) {
                Some(node) => NodeName::new(node)?,
                None => bail!("No node name given; use --node or set satellite.node_name"),
            };
            let only = resource
                .into_iter()
                .map(ResourceName::new)
                .collect::<std::result::Result<Vec<_>, _>>()?;

            info!("Starting blockrepl satellite for node {}", node);
            let whitelist = whitelist::load_whitelist(&config.whitelist).await?;
            let topology = JsonSnapshotLoader::new(topology).load()?;

            let ctx = AccessContext::system();
            let generator = Generator {
                config: &config.satellite,
                ctx: &ctx,
                whitelist: &whitelist,
                reporter: &TracingReporter,
            };
            let report = generator.run(&topology, &node, &only).await?;
            if !report.is_success() {
                bail!(
                    "Configuration of {} resource(s) failed: {:?}",
                    report.failed.len(),
                    report.failed
                );
            }
        }
        Commands::Apply { resource } => {
            let resource = ResourceName::new(resource)?;
            apply::adjust(&config.apply, resource.as_str()).await?;
        }
        Commands::Whitelist => {
            let whitelist = whitelist::load_whitelist(&config.whitelist).await?;
            println!("Option Whitelist");
            println!("================");
            for (category, count) in whitelist.rule_counts() {
                println!("{category:<40} {count}");
            }
            println!("{:<40} {}", "total", whitelist.len());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "blockrepl-satellite",
            "generate",
            "--topology",
            "/tmp/topology.json",
            "--resource",
            "data1",
            "--resource",
            "data2",
        ]);
        assert_eq!(args.config, PathBuf::from("/etc/blockrepl/satellite.toml"));
        match args.command {
            Commands::Generate {
                topology,
                node,
                resource,
            } => {
                assert_eq!(topology, PathBuf::from("/tmp/topology.json"));
                assert!(node.is_none());
                assert_eq!(resource, vec!["data1", "data2"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("satellite.toml");
        std::fs::write(
            &path,
            "[satellite]\nnode_name = \"nodeA\"\n\n[apply]\nretry_count = 5\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.satellite.node_name.as_deref(), Some("nodeA"));
        assert_eq!(config.apply.retry_count, 5);
        assert_eq!(config.apply.drbdadm_path, "drbdadm");
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.satellite.common_file, "blockrepl_common.conf");
    }
}
