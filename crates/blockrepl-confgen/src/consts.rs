//! Property namespaces and keys read by the synthesizer

/// Event handler scripts
pub const NAMESPC_DRBD_HANDLER_OPTIONS: &str = "DrbdOptions/Handlers";
/// Resource-wide replication options
pub const NAMESPC_DRBD_RESOURCE_OPTIONS: &str = "DrbdOptions/Resource";
/// Network options
pub const NAMESPC_DRBD_NET_OPTIONS: &str = "DrbdOptions/Net";
/// Disk options
pub const NAMESPC_DRBD_DISK_OPTIONS: &str = "DrbdOptions/Disk";
/// Options of the device towards one peer
pub const NAMESPC_DRBD_PEER_DEVICE_OPTIONS: &str = "DrbdOptions/PeerDevice";

pub const NAMESPC_DRBD_PROXY_OPTIONS: &str = "DrbdProxy/Options";
pub const NAMESPC_DRBD_PROXY_COMPRESSION_OPTIONS: &str = "DrbdProxy/Compression";
/// Selects the proxy compression plugin
pub const KEY_DRBD_PROXY_COMPRESSION_TYPE: &str = "DrbdProxy/CompressionType";

/// Explicit network paths of a connection
pub const NAMESPC_CONNECTION_PATHS: &str = "Paths";
/// Preferred network interface of a resource, storage pool or node
pub const KEY_PREF_NIC: &str = "PrefNic";

/// Template included by every resource file
pub const COMMON_TEMPLATE_FILE: &str = "blockrepl_common.conf";
/// Disk of a diskful peer; the local node never opens it
pub const PEER_DISK_PLACEHOLDER: &str = "/dev/drbd/this/is/not/used";
pub const PEER_AUTH_ALGORITHM: &str = "sha1";
/// Source named in override comments
pub const RESOURCE_DEFINITION_ORIGIN: &str = "resource-definition";

/// Proxy endpoints on the local host
pub const PROXY_INSIDE_ADDRESS: &str = "127.0.0.2";
pub const PROXY_LISTEN_ADDRESS: &str = "127.0.0.1";
