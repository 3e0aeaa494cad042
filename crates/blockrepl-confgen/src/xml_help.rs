//! Parser for the `xml-help` option listings of the replication tool
//!
//! `drbdsetup xml-help <command>` describes every option a command accepts:
//!
//! ```xml
//! <command name="disk-options">
//!     <summary>Change the disk options of an attached lower-level device.</summary>
//!     <option name="al-extents" type="numeric">
//!         <min>67</min>
//!         <max>65534</max>
//!         <default>1237</default>
//!     </option>
//!     <option name="on-io-error" type="handler">
//!         <handler>pass_on</handler>
//!         <handler>detach</handler>
//!     </option>
//! </command>
//! ```

use crate::consts::{
    NAMESPC_DRBD_DISK_OPTIONS, NAMESPC_DRBD_NET_OPTIONS, NAMESPC_DRBD_PEER_DEVICE_OPTIONS,
    NAMESPC_DRBD_RESOURCE_OPTIONS,
};
use crate::whitelist::{OptionRule, WhitelistBuilder};
use blockrepl_common::{Error, Result};
use serde::Deserialize;
use tracing::{debug, warn};

/// Commands whose listings feed the whitelist, with the namespace they fill
pub const XML_HELP_COMMANDS: &[(&str, &str)] = &[
    ("resource-options", NAMESPC_DRBD_RESOURCE_OPTIONS),
    ("net-options", NAMESPC_DRBD_NET_OPTIONS),
    ("disk-options", NAMESPC_DRBD_DISK_OPTIONS),
    ("peer-device-options", NAMESPC_DRBD_PEER_DEVICE_OPTIONS),
];

/// One `<command>` document
#[derive(Debug, Deserialize)]
pub struct XmlHelpCommand {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "option", default)]
    pub options: Vec<XmlHelpOption>,
}

/// One `<option>` of a command
#[derive(Debug, Deserialize)]
pub struct XmlHelpOption {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@type")]
    pub kind: String,
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
    #[serde(rename = "handler", default)]
    pub handlers: Vec<String>,
    #[serde(rename = "symbol", default)]
    pub symbols: Vec<String>,
}

impl XmlHelpOption {
    /// Rule for this option, `None` for option types without a rule
    #[must_use]
    pub fn rule(&self) -> Option<OptionRule> {
        let min = self.min.unwrap_or(i64::MIN);
        let max = self.max.unwrap_or(i64::MAX);
        let rule = match self.kind.as_str() {
            "boolean" => OptionRule::Boolean,
            "flag" => OptionRule::Flag,
            "numeric" => OptionRule::Numeric { min, max },
            "numeric-or-symbol" => OptionRule::NumericOrSymbol {
                min,
                max,
                symbols: self.symbols.clone(),
            },
            "handler" => OptionRule::Symbol(self.handlers.clone()),
            "string" => OptionRule::String,
            _ => return None,
        };
        Some(rule)
    }
}

/// Parse one `xml-help` document
pub fn parse_xml_help(xml: &str) -> Result<XmlHelpCommand> {
    quick_xml::de::from_str(xml)
        .map_err(|e| Error::Deserialization(format!("invalid xml-help document: {e}")))
}

/// Register every option of an `xml-help` document under `namespace`
///
/// Returns the number of rules added.
pub fn add_xml_help(builder: &mut WhitelistBuilder, namespace: &str, xml: &str) -> Result<usize> {
    let command = parse_xml_help(xml)?;
    let mut added = 0;
    for option in &command.options {
        let Some(rule) = option.rule() else {
            warn!(
                command = %command.name,
                option = %option.name,
                kind = %option.kind,
                "Skipping option of unknown type"
            );
            continue;
        };
        builder.add_drbd_rule(&format!("{namespace}/{}", option.name), &rule);
        added += 1;
    }
    debug!(command = %command.name, rules = added, "Loaded xml-help listing");
    Ok(added)
}
