//! Bridge introspection via sysfs and bridge management via `ip link`.

use std::path::Path;

use tokio::process::Command;
use tracing::debug;
use weaver_ability::AbilityError;

const SYS_NET: &str = "/sys/class/net";

/// Prefix of the bridges this crate creates.
pub const BRIDGE_PREFIX: &str = "pwbr";

/// Read-only view of the host's bridge layout; split out so interception
/// preflight checks can run against a stub in tests.
pub trait BridgeTopology {
    /// True when `ifname` exists and is itself a bridge.
    fn is_bridge(&self, ifname: &str) -> bool;
    /// The bridge `ifname` is enslaved to, if any.
    fn bridge_of(&self, ifname: &str) -> Option<String>;
}

/// The real sysfs-backed topology.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sysfs;

impl BridgeTopology for Sysfs {
    fn is_bridge(&self, ifname: &str) -> bool {
        Path::new(SYS_NET).join(ifname).join("bridge").is_dir()
    }

    fn bridge_of(&self, ifname: &str) -> Option<String> {
        let link = Path::new(SYS_NET).join(ifname).join("brport").join("bridge");
        std::fs::read_link(link)
            .ok()
            .and_then(|target| target.file_name().map(|n| n.to_string_lossy().into_owned()))
    }
}

/// True when the interface exists on the host.
pub fn interface_exists(ifname: &str) -> bool {
    Path::new(SYS_NET).join(ifname).exists()
}

/// The ports currently enslaved to a bridge.
pub fn bridge_ports(bridge: &str) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(Path::new(SYS_NET).join(bridge).join("brif")) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect()
}

/// The lowest-indexed unused `pwbr<N>` name.
pub fn next_bridge_name() -> String {
    (0..)
        .map(|i| format!("{BRIDGE_PREFIX}{i}"))
        .find(|name| !interface_exists(name))
        .unwrap_or_else(|| format!("{BRIDGE_PREFIX}0"))
}

async fn ip_link(args: &[&str]) -> Result<(), AbilityError> {
    debug!(target: "weaver::netcfg", ?args, "ip link");
    let status = Command::new("ip")
        .arg("link")
        .args(args)
        .status()
        .await
        .map_err(|e| AbilityError::FatalSystem(format!("spawning ip link: {e}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(AbilityError::FatalSystem(format!(
            "ip link {} exited with {status}",
            args.join(" ")
        )))
    }
}

/// Adds `ports` to `bridge` (or to a freshly created `pwbr<N>` when no name
/// is given), creating the bridge when it does not exist yet. Returns the
/// bridge name.
pub async fn bridge_iface_together(
    ports: &[&str],
    bridge: Option<&str>,
) -> Result<String, AbilityError> {
    let (name, fresh) = match bridge {
        Some(existing) if interface_exists(existing) => (existing.to_string(), false),
        Some(wanted) => (wanted.to_string(), true),
        None => (next_bridge_name(), true),
    };
    if fresh {
        ip_link(&["add", "name", &name, "type", "bridge"]).await?;
        ip_link(&["set", &name, "up"]).await?;
    }
    for port in ports {
        ip_link(&["set", port, "master", &name]).await?;
    }
    Ok(name)
}

/// Tears a bridge down: detaches implicitly by deleting the bridge, then
/// brings the former ports back up.
pub async fn unbridge(bridge: &str) -> Result<(), AbilityError> {
    let ports = bridge_ports(bridge);
    ip_link(&["set", bridge, "down"]).await?;
    ip_link(&["del", bridge]).await?;
    for port in &ports {
        ip_link(&["set", port, "up"]).await?;
    }
    Ok(())
}
