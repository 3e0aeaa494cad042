//! Whitelist bootstrap from the setup tool's `xml-help` listings

use crate::apply::run_command;
use anyhow::{Context, Result, bail};
use blockrepl_common::config::WhitelistConfig;
use blockrepl_confgen::{WhitelistProps, XML_HELP_COMMANDS, add_xml_help};
use tracing::info;

/// Build the whitelist from every listing plus the static tables
///
/// Listings come from `<xml_help_dir>/<command>.xml` when a directory is
/// configured, else from running `<drbdsetup> xml-help <command>`.
pub async fn load_whitelist(config: &WhitelistConfig) -> Result<WhitelistProps> {
    let mut builder = WhitelistProps::builder();
    for (command, namespace) in XML_HELP_COMMANDS {
        let xml = read_listing(config, command).await?;
        add_xml_help(&mut builder, namespace, &xml)
            .with_context(|| format!("Failed to parse xml-help for {command}"))?;
    }
    let whitelist = builder.with_static_tables().build();
    info!(rules = whitelist.len(), "Built option whitelist");
    Ok(whitelist)
}

async fn read_listing(config: &WhitelistConfig, command: &str) -> Result<String> {
    if let Some(dir) = &config.xml_help_dir {
        let path = dir.join(format!("{command}.xml"));
        return tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()));
    }

    let output = run_command(&config.drbdsetup_path, &["xml-help", command])
        .await
        .with_context(|| format!("Failed to run {}", config.drbdsetup_path))?;
    if !output.success {
        bail!(
            "{} xml-help {command} failed: {}",
            config.drbdsetup_path,
            output.stderr.trim()
        );
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockrepl_confgen::PropsObject;

    fn write_listings(dir: &std::path::Path) {
        for (command, option) in [
            ("resource-options", r#"<option name="auto-promote" type="boolean"/>"#),
            ("net-options", r#"<option name="protocol" type="handler"><handler>A</handler><handler>C</handler></option>"#),
            ("disk-options", r#"<option name="al-extents" type="numeric"><min>67</min><max>65534</max></option>"#),
            ("peer-device-options", r#"<option name="c-max-rate" type="numeric"><min>250</min><max>4194304</max></option>"#),
        ] {
            let xml = format!(r#"<command name="{command}">{option}</command>"#);
            std::fs::write(dir.join(format!("{command}.xml")), xml).unwrap();
        }
    }

    #[tokio::test]
    async fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_listings(dir.path());
        let config = WhitelistConfig {
            xml_help_dir: Some(dir.path().to_path_buf()),
            ..WhitelistConfig::default()
        };

        let whitelist = load_whitelist(&config).await.unwrap();
        let ctrl = PropsObject::Controller;
        assert!(whitelist.is_allowed(&ctrl, "DrbdOptions/Resource/auto-promote", "yes"));
        assert!(whitelist.is_allowed(&ctrl, "DrbdOptions/Net/protocol", "C"));
        assert!(!whitelist.is_allowed(&ctrl, "DrbdOptions/Disk/al-extents", "10"));
        assert!(whitelist.is_allowed(&ctrl, "DrbdOptions/PeerDevice/c-max-rate", "1000"));
        assert!(whitelist.is_allowed(&ctrl, "DrbdOptions/Handlers/split-brain", "/bin/true"));
    }

    #[tokio::test]
    async fn test_missing_listing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = WhitelistConfig {
            xml_help_dir: Some(dir.path().to_path_buf()),
            ..WhitelistConfig::default()
        };
        assert!(load_whitelist(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_failing_tool() {
        let config = WhitelistConfig {
            xml_help_dir: None,
            drbdsetup_path: "false".to_string(),
        };
        let err = load_whitelist(&config).await.unwrap_err();
        assert!(err.to_string().contains("xml-help resource-options failed"));
    }
}
