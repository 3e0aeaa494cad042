//! Whitelist of replication options that may be written to a file
//!
//! Options are checked per object category: the same key can be allowed on
//! the controller level and rejected for the proxy. The whitelist is built
//! once at startup (see [`crate::xml_help`]) and shared read-only.

use crate::consts::{
    NAMESPC_DRBD_HANDLER_OPTIONS, NAMESPC_DRBD_PROXY_COMPRESSION_OPTIONS,
    NAMESPC_DRBD_PROXY_OPTIONS,
};
use blockrepl_props::PATH_SEPARATOR;
use std::collections::BTreeMap;
use std::fmt;

/// Object category an option is validated for
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropsObject {
    /// Options imposed cluster-wide or on connections
    Controller,
    /// Options set on a resource definition
    ResourceDefinition,
    /// Proxy options
    DrbdProxy,
    /// Options of one proxy compression plugin
    DrbdProxyCompression(String),
}

impl fmt::Display for PropsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller => f.write_str("controller"),
            Self::ResourceDefinition => f.write_str("resource-definition"),
            Self::DrbdProxy => f.write_str("drbd-proxy"),
            Self::DrbdProxyCompression(plugin) => write!(f, "drbd-proxy-compression-{plugin}"),
        }
    }
}

/// Constraint on the value of one option
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionRule {
    Boolean,
    /// Option without argument in the tool; in files it takes a boolean
    Flag,
    Numeric {
        min: i64,
        max: i64,
    },
    NumericOrSymbol {
        min: i64,
        max: i64,
        symbols: Vec<String>,
    },
    /// One of a fixed set of tokens
    Symbol(Vec<String>),
    /// Free text on a single line
    String,
}

const BOOLEAN_VALUES: &[&str] = &["yes", "no", "true", "false"];

impl OptionRule {
    /// Whether `value` satisfies this rule
    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Self::Boolean | Self::Flag => BOOLEAN_VALUES.contains(&value),
            Self::Numeric { min, max } => in_range(value, *min, *max),
            Self::NumericOrSymbol { min, max, symbols } => {
                in_range(value, *min, *max) || symbols.iter().any(|s| s == value)
            }
            Self::Symbol(symbols) => symbols.iter().any(|s| s == value),
            Self::String => !value.contains(['\n', '\r', '"']),
        }
    }
}

fn in_range(value: &str, min: i64, max: i64) -> bool {
    value
        .parse::<i64>()
        .is_ok_and(|number| (min..=max).contains(&number))
}

/// Immutable table of permitted options
#[derive(Clone, Debug, Default)]
pub struct WhitelistProps {
    rules: BTreeMap<PropsObject, BTreeMap<String, OptionRule>>,
}

impl WhitelistProps {
    #[must_use]
    pub fn builder() -> WhitelistBuilder {
        WhitelistBuilder::default()
    }

    /// Rule for an absolute option key
    #[must_use]
    pub fn rule(&self, object: &PropsObject, key: &str) -> Option<&OptionRule> {
        self.rules.get(object)?.get(trim_key(key))
    }

    /// Whether the option may be emitted; unknown keys are rejected
    #[must_use]
    pub fn is_allowed(&self, object: &PropsObject, key: &str, value: &str) -> bool {
        self.rule(object, key).is_some_and(|rule| rule.accepts(value))
    }

    /// Number of rules per category
    #[must_use]
    pub fn rule_counts(&self) -> BTreeMap<String, usize> {
        self.rules
            .iter()
            .map(|(object, rules)| (object.to_string(), rules.len()))
            .collect()
    }

    /// Total number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn trim_key(key: &str) -> &str {
    key.strip_prefix(PATH_SEPARATOR).unwrap_or(key)
}

/// Event handlers of the replication layer
pub const HANDLER_NAMES: &[&str] = &[
    "after-resync-target",
    "before-resync-source",
    "before-resync-target",
    "disconnected",
    "fence-peer",
    "initial-split-brain",
    "local-io-error",
    "out-of-sync",
    "pri-lost",
    "pri-lost-after-sb",
    "pri-on-incon-degr",
    "quorum-lost",
    "split-brain",
    "unfence-peer",
];

/// Compression plugins of the proxy with their numeric parameters
pub const COMPRESSION_PLUGINS: &[(&str, &[(&str, i64, i64)])] = &[
    ("zlib", &[("level", 1, 9)]),
    ("lzma", &[("contexts", 1, 20)]),
    ("lz4", &[("level", 1, 16)]),
    ("zstd", &[("level", 1, 22)]),
];

/// Builder collecting rules before the whitelist is frozen
#[derive(Debug, Default)]
pub struct WhitelistBuilder {
    rules: BTreeMap<PropsObject, BTreeMap<String, OptionRule>>,
}

impl WhitelistBuilder {
    /// Register a rule, replacing an earlier one for the same key
    pub fn add_rule(&mut self, object: PropsObject, key: &str, rule: OptionRule) -> &mut Self {
        self.rules
            .entry(object)
            .or_default()
            .insert(trim_key(key).to_string(), rule);
        self
    }

    /// Register a rule for every category that configures the replication layer
    pub fn add_drbd_rule(&mut self, key: &str, rule: &OptionRule) -> &mut Self {
        self.add_rule(PropsObject::Controller, key, rule.clone());
        self.add_rule(PropsObject::ResourceDefinition, key, rule.clone())
    }

    /// Register handlers, proxy options and compression plugins
    pub fn with_static_tables(&mut self) -> &mut Self {
        for handler in HANDLER_NAMES {
            let key = format!("{NAMESPC_DRBD_HANDLER_OPTIONS}/{handler}");
            self.add_drbd_rule(&key, &OptionRule::String);
        }

        let proxy_options = [
            ("memlimit", OptionRule::String),
            ("read-loops", OptionRule::Numeric { min: 1, max: i64::from(i32::MAX) }),
            ("sndbuf-size", OptionRule::Numeric { min: 0, max: i64::from(i32::MAX) }),
            ("rcvbuf-size", OptionRule::Numeric { min: 0, max: i64::from(i32::MAX) }),
            ("ping-timeout", OptionRule::Numeric { min: 1, max: 300 }),
        ];
        for (name, rule) in proxy_options {
            let key = format!("{NAMESPC_DRBD_PROXY_OPTIONS}/{name}");
            self.add_rule(PropsObject::DrbdProxy, &key, rule);
        }

        for (plugin, params) in COMPRESSION_PLUGINS {
            for (param, min, max) in *params {
                let key = format!("{NAMESPC_DRBD_PROXY_COMPRESSION_OPTIONS}/{param}");
                self.add_rule(
                    PropsObject::DrbdProxyCompression((*plugin).to_string()),
                    &key,
                    OptionRule::Numeric { min: *min, max: *max },
                );
            }
        }
        self
    }

    #[must_use]
    pub fn build(&mut self) -> WhitelistProps {
        WhitelistProps {
            rules: std::mem::take(&mut self.rules),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitelist() -> WhitelistProps {
        let mut builder = WhitelistProps::builder();
        builder
            .with_static_tables()
            .add_drbd_rule("DrbdOptions/Net/protocol", &OptionRule::Symbol(vec![
                "A".into(),
                "B".into(),
                "C".into(),
            ]))
            .add_drbd_rule("DrbdOptions/Net/max-buffers", &OptionRule::Numeric { min: 32, max: 131_072 })
            .add_drbd_rule("DrbdOptions/Disk/disk-flushes", &OptionRule::Boolean)
            .add_drbd_rule(
                "DrbdOptions/Resource/quorum",
                &OptionRule::NumericOrSymbol {
                    min: 1,
                    max: 32,
                    symbols: vec!["off".into(), "majority".into(), "all".into()],
                },
            );
        builder.build()
    }

    #[test]
    fn test_rule_kinds() {
        let wl = whitelist();
        let ctrl = PropsObject::Controller;
        assert!(wl.is_allowed(&ctrl, "DrbdOptions/Net/protocol", "C"));
        assert!(!wl.is_allowed(&ctrl, "DrbdOptions/Net/protocol", "D"));
        assert!(wl.is_allowed(&ctrl, "DrbdOptions/Net/max-buffers", "8000"));
        assert!(!wl.is_allowed(&ctrl, "DrbdOptions/Net/max-buffers", "8"));
        assert!(!wl.is_allowed(&ctrl, "DrbdOptions/Net/max-buffers", "lots"));
        assert!(wl.is_allowed(&ctrl, "DrbdOptions/Disk/disk-flushes", "no"));
        assert!(!wl.is_allowed(&ctrl, "DrbdOptions/Disk/disk-flushes", "maybe"));
        assert!(wl.is_allowed(&ctrl, "DrbdOptions/Resource/quorum", "majority"));
        assert!(wl.is_allowed(&ctrl, "DrbdOptions/Resource/quorum", "2"));
        assert!(!wl.is_allowed(&ctrl, "DrbdOptions/Resource/quorum", "33"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let wl = whitelist();
        assert!(!wl.is_allowed(&PropsObject::Controller, "DrbdOptions/Net/unknown-opt", "1"));
        assert!(wl.rule(&PropsObject::Controller, "/DrbdOptions/Net/protocol").is_some());
    }

    #[test]
    fn test_categories_are_separate() {
        let wl = whitelist();
        assert!(wl.is_allowed(&PropsObject::DrbdProxy, "DrbdProxy/Options/memlimit", "128M"));
        assert!(!wl.is_allowed(&PropsObject::Controller, "DrbdProxy/Options/memlimit", "128M"));

        let zlib = PropsObject::DrbdProxyCompression("zlib".into());
        let zstd = PropsObject::DrbdProxyCompression("zstd".into());
        assert!(wl.is_allowed(&zlib, "DrbdProxy/Compression/level", "9"));
        assert!(!wl.is_allowed(&zlib, "DrbdProxy/Compression/level", "15"));
        assert!(wl.is_allowed(&zstd, "DrbdProxy/Compression/level", "15"));
        let unknown = PropsObject::DrbdProxyCompression("brotli".into());
        assert!(!wl.is_allowed(&unknown, "DrbdProxy/Compression/level", "1"));
    }

    #[test]
    fn test_handler_strings() {
        let wl = whitelist();
        let key = "DrbdOptions/Handlers/fence-peer";
        assert!(wl.is_allowed(&PropsObject::ResourceDefinition, key, "/usr/lib/drbd/crm-fence-peer.9.sh"));
        assert!(!wl.is_allowed(&PropsObject::ResourceDefinition, key, "evil\"; rm"));
        assert!(!wl.is_allowed(&PropsObject::ResourceDefinition, key, "two\nlines"));
    }

    #[test]
    fn test_rule_counts() {
        let wl = whitelist();
        let counts = wl.rule_counts();
        assert_eq!(counts["controller"], HANDLER_NAMES.len() + 4);
        assert_eq!(counts["drbd-proxy"], 5);
        assert_eq!(counts["drbd-proxy-compression-zlib"], 1);
        assert!(!wl.is_empty());
    }
}
