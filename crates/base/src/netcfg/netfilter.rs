//! ebtables/iptables drop rules for intercepted traffic.
//!
//! Rules are assembled as argument vectors and applied through the system
//! command-line tools; removal re-assembles the identical rule with `-D`.

use std::path::Path;

use tokio::process::Command;
use tracing::debug;
use weaver_ability::AbilityError;

const TOOL_DIRS: [&str; 4] = ["/sbin", "/usr/sbin", "/usr/bin", "/bin"];

fn tool_available(name: &str) -> bool {
    TOOL_DIRS.iter().any(|dir| Path::new(dir).join(name).exists())
}

/// True when the iptables command-line front-end is present.
pub fn iptables_available() -> bool {
    tool_available("iptables")
}

/// True when the ebtables command-line front-end is present.
pub fn ebtables_available() -> bool {
    tool_available("ebtables")
}

/// Frames and packets are dropped in FORWARD when they traverse a bridge
/// (an output interface is involved), in INPUT otherwise.
fn chain(oface: Option<&str>) -> &'static str {
    if oface.is_some() {
        "FORWARD"
    } else {
        "INPUT"
    }
}

/// The ebtables rule body dropping frames matching the MAC selectors.
pub fn frame_rule(
    iface: Option<&str>,
    oface: Option<&str>,
    mac_src: Option<&str>,
    mac_dst: Option<&str>,
) -> Vec<String> {
    let mut rule = Vec::new();
    if let Some(iface) = iface {
        rule.push("-i".to_string());
        rule.push(iface.to_string());
    }
    if let Some(oface) = oface {
        rule.push("-o".to_string());
        rule.push(oface.to_string());
    }
    if let Some(mac) = mac_src {
        rule.push("-s".to_string());
        rule.push(mac.to_string());
    }
    if let Some(mac) = mac_dst {
        rule.push("-d".to_string());
        rule.push(mac.to_string());
    }
    rule.push("-j".to_string());
    rule.push("DROP".to_string());
    rule
}

/// The iptables rule body dropping packets matching the IP/L4 selectors.
/// With `bridge`, interface constraints use physdev matching so the rule
/// applies to bridged traffic.
#[allow(clippy::too_many_arguments)]
pub fn packet_rule(
    iface: Option<&str>,
    oface: Option<&str>,
    ip_src: Option<&str>,
    ip_dst: Option<&str>,
    proto: Option<&str>,
    port_src: Option<u16>,
    port_dst: Option<u16>,
    bridge: bool,
) -> Vec<String> {
    let mut rule = Vec::new();
    if bridge {
        rule.push("-m".to_string());
        rule.push("physdev".to_string());
        if let Some(iface) = iface {
            rule.push("--physdev-in".to_string());
            rule.push(iface.to_string());
        }
        if let Some(oface) = oface {
            rule.push("--physdev-out".to_string());
            rule.push(oface.to_string());
        }
    } else {
        if let Some(iface) = iface {
            rule.push("-i".to_string());
            rule.push(iface.to_string());
        }
        if let Some(oface) = oface {
            rule.push("-o".to_string());
            rule.push(oface.to_string());
        }
    }
    if let Some(ip) = ip_src {
        rule.push("--src".to_string());
        rule.push(ip.to_string());
    }
    if let Some(ip) = ip_dst {
        rule.push("--dst".to_string());
        rule.push(ip.to_string());
    }
    if let Some(proto) = proto {
        rule.push("-p".to_string());
        rule.push(proto.to_string());
        if let Some(port) = port_src {
            rule.push("--sport".to_string());
            rule.push(port.to_string());
        }
        if let Some(port) = port_dst {
            rule.push("--dport".to_string());
            rule.push(port.to_string());
        }
    }
    rule.push("-j".to_string());
    rule.push("DROP".to_string());
    rule
}

async fn run(tool: &str, args: Vec<String>) -> Result<(), AbilityError> {
    debug!(target: "weaver::netcfg", tool, ?args, "firewall rule");
    let status = Command::new(tool)
        .args(&args)
        .status()
        .await
        .map_err(|e| AbilityError::FatalSystem(format!("spawning {tool}: {e}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(AbilityError::FatalSystem(format!(
            "{tool} {} exited with {status}",
            args.join(" ")
        )))
    }
}

async fn ebtables(action: &str, oface: Option<&str>, rule: Vec<String>) -> Result<(), AbilityError> {
    let mut args = vec![action.to_string(), chain(oface).to_string()];
    args.extend(rule);
    run("ebtables", args).await
}

async fn iptables(action: &str, oface: Option<&str>, rule: Vec<String>) -> Result<(), AbilityError> {
    let mut args = vec![
        "-t".to_string(),
        "filter".to_string(),
        action.to_string(),
        chain(oface).to_string(),
    ];
    args.extend(rule);
    run("iptables", args).await
}

/// Installs an ebtables rule dropping the selected frames.
pub async fn drop_frames(
    iface: Option<&str>,
    oface: Option<&str>,
    mac_src: Option<&str>,
    mac_dst: Option<&str>,
) -> Result<(), AbilityError> {
    ebtables("-A", oface, frame_rule(iface, oface, mac_src, mac_dst)).await
}

/// Removes the rule installed by [`drop_frames`].
pub async fn undrop_frames(
    iface: Option<&str>,
    oface: Option<&str>,
    mac_src: Option<&str>,
    mac_dst: Option<&str>,
) -> Result<(), AbilityError> {
    ebtables("-D", oface, frame_rule(iface, oface, mac_src, mac_dst)).await
}

/// Installs an iptables rule dropping the selected packets.
#[allow(clippy::too_many_arguments)]
pub async fn drop_packets(
    iface: Option<&str>,
    oface: Option<&str>,
    ip_src: Option<&str>,
    ip_dst: Option<&str>,
    proto: Option<&str>,
    port_src: Option<u16>,
    port_dst: Option<u16>,
    bridge: bool,
) -> Result<(), AbilityError> {
    iptables(
        "-A",
        oface,
        packet_rule(iface, oface, ip_src, ip_dst, proto, port_src, port_dst, bridge),
    )
    .await
}

/// Removes the rule installed by [`drop_packets`].
#[allow(clippy::too_many_arguments)]
pub async fn undrop_packets(
    iface: Option<&str>,
    oface: Option<&str>,
    ip_src: Option<&str>,
    ip_dst: Option<&str>,
    proto: Option<&str>,
    port_src: Option<u16>,
    port_dst: Option<u16>,
    bridge: bool,
) -> Result<(), AbilityError> {
    iptables(
        "-D",
        oface,
        packet_rule(iface, oface, ip_src, ip_dst, proto, port_src, port_dst, bridge),
    )
    .await
}
