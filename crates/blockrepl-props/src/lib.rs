//! blockrepl Props - hierarchical property containers
//!
//! Properties are string values stored under slash-separated keys such as
//! `DrbdOptions/Net/max-buffers`. Every object of the cluster topology owns
//! one container; the configuration synthesizer reads them through
//! read-only views and resolves overrides with [`PriorityProps`].
//!
//! # Example
//! ```
//! use blockrepl_props::{Props, PropsContainer, PropsMut};
//!
//! let props = Props::new();
//! props.set_prop("DrbdOptions/Net/max-buffers", "8000").unwrap();
//!
//! let net = props.get_namespace("DrbdOptions/Net").unwrap().unwrap();
//! assert_eq!(net.get_prop("max-buffers").unwrap().as_deref(), Some("8000"));
//! assert!(net.map().contains_key("DrbdOptions/Net/max-buffers"));
//! ```

pub mod priority;
pub mod props;
pub mod read_only;

pub use priority::PriorityProps;
pub use props::{Props, PropsContainer, PropsMut, PATH_SEPARATOR};
pub use read_only::ReadOnlyProps;
