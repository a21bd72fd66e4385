//! Well-known option names shared by abilities that describe traffic
//! selectors, so that caller overrides line up across a dependency chain.

/// Source MAC address.
pub const MAC_SRC: &str = "mac_src";
/// Destination MAC address.
pub const MAC_DST: &str = "mac_dst";
/// Source IP address.
pub const IP_SRC: &str = "ip_src";
/// Destination IP address.
pub const IP_DST: &str = "ip_dst";
/// TCP/UDP source port.
pub const PORT_SRC: &str = "port_src";
/// TCP/UDP destination port.
pub const PORT_DST: &str = "port_dst";
/// Interface receiving traffic.
pub const INPUT_INTERFACE: &str = "interface";
/// Interface emitting traffic.
pub const OUTPUT_INTERFACE: &str = "outerface";
/// L4 protocol over IP.
pub const L4PROTOCOL: &str = "protocol";
/// A callback parameter.
pub const CALLBACK: &str = "callback";
/// Path read by an ability.
pub const PATH_SRC: &str = "path_src";
/// Path written by an ability.
pub const PATH_DST: &str = "path_dst";
