//! blockrepl Confgen - Replication configuration synthesis
//!
//! This crate turns a [`Topology`](blockrepl_topology::Topology) snapshot
//! into the text configuration of the replication layer:
//! - [`ConfFileBuilder`] writes one resource file per local resource and
//!   the node-wide common file
//! - [`PathResolver`] picks the network interfaces of every connection
//! - [`WhitelistProps`] decides which options may be written, built from
//!   the tool's `xml-help` listings ([`xml_help`])
//!
//! # Output
//!
//! ```text
//! resource "data1"
//! {
//!     template-file "blockrepl_common.conf";
//!
//!     net
//!     {
//!         cram-hmac-alg     sha1;
//!         shared-secret     "...";
//!     }
//!
//!     on nodeA
//!     {
//!         volume 0
//!         {
//!             disk        /dev/vg/lv0;
//!             meta-disk   internal;
//!             device      minor 1000;
//!         }
//!         node-id    0;
//!     }
//!     ...
//! }
//! ```

pub mod builder;
pub mod consts;
pub mod paths;
pub mod reporter;
pub mod whitelist;
pub mod writer;
pub mod xml_help;

#[cfg(test)]
mod test_support;

pub use builder::{ConfFileBuilder, header};
pub use paths::{PathResolver, ResolvedPaths};
pub use reporter::{ProblemReporter, TracingReporter};
pub use whitelist::{OptionRule, PropsObject, WhitelistBuilder, WhitelistProps};
pub use writer::ConfWriter;
pub use xml_help::{XML_HELP_COMMANDS, add_xml_help, parse_xml_help};
