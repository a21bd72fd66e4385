//! Command-line surface of the interceptor.

use std::collections::HashMap;

use clap::{ArgAction, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use weaver_options::OptionValue;

/// L4 protocol selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Protocol {
    /// Match TCP traffic.
    Tcp,
    /// Match UDP traffic.
    Udp,
}

impl Protocol {
    fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Full format (default).
    #[default]
    Full,
    /// JSON format.
    Json,
    /// Pretty format.
    Pretty,
    /// Compact format.
    Compact,
}

/// Intercept traffic matching a selector on a NIC, optionally bridging a
/// second NIC in and injecting replacement frames.
#[derive(Debug, Parser)]
#[command(name = "weaver", version, about)]
pub struct Cli {
    /// Verbosity (-v debug, -vv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "full")]
    pub log_format: LogFormat,

    /// Sniffed interface.
    #[arg(long)]
    pub interface: Option<String>,

    /// Injection interface; enables the bridged two-interface mode.
    #[arg(long)]
    pub outerface: Option<String>,

    /// Source MAC selector.
    #[arg(long = "mac-src")]
    pub mac_src: Option<String>,

    /// Destination MAC selector.
    #[arg(long = "mac-dst")]
    pub mac_dst: Option<String>,

    /// Source IP selector.
    #[arg(long = "ip-src")]
    pub ip_src: Option<String>,

    /// Destination IP selector.
    #[arg(long = "ip-dst")]
    pub ip_dst: Option<String>,

    /// Source port selector.
    #[arg(long = "port-src")]
    pub port_src: Option<u16>,

    /// Destination port selector.
    #[arg(long = "port-dst")]
    pub port_dst: Option<u16>,

    /// L4 protocol selector.
    #[arg(long, value_enum)]
    pub protocol: Option<Protocol>,

    /// Bridge to use for sniffing; created when it does not exist.
    #[arg(long)]
    pub bridge: Option<String>,

    /// Whether injected messages carry a one-byte routing prefix.
    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    pub mux: bool,

    /// Whether to keep silent about routing errors.
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub quiet: bool,
}

impl Cli {
    /// Initializes the tracing subscriber from the verbosity flags.
    pub fn init_tracing(&self) -> anyhow::Result<()> {
        let level = match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("weaver={level},warn")));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        match self.log_format {
            LogFormat::Full => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
            LogFormat::Compact => builder.compact().try_init(),
        }
        .map_err(|e| anyhow::anyhow!("installing the tracing subscriber: {e}"))
    }

    /// The option overrides handed to the interceptor instance. Omitted
    /// selectors stay unconstrained.
    pub fn overrides(&self) -> HashMap<String, OptionValue> {
        let mut map = HashMap::new();
        let mut text = |key: &str, value: &Option<String>| {
            if let Some(value) = value {
                map.insert(key.to_string(), OptionValue::from(value.as_str()));
            }
        };
        text("interface", &self.interface);
        text("outerface", &self.outerface);
        text("mac_src", &self.mac_src);
        text("mac_dst", &self.mac_dst);
        text("ip_src", &self.ip_src);
        text("ip_dst", &self.ip_dst);
        text("bridge", &self.bridge);
        if let Some(port) = self.port_src {
            map.insert("port_src".to_string(), OptionValue::from(port));
        }
        if let Some(port) = self.port_dst {
            map.insert("port_dst".to_string(), OptionValue::from(port));
        }
        if let Some(protocol) = self.protocol {
            map.insert(
                "protocol".to_string(),
                OptionValue::from(protocol.as_str()),
            );
        }
        map.insert("mux".to_string(), OptionValue::from(self.mux));
        map.insert("quiet".to_string(), OptionValue::from(self.quiet));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_flags_become_overrides() {
        let cli = Cli::parse_from([
            "weaver",
            "--interface",
            "eth0",
            "--ip-dst",
            "192.0.2.1",
            "--protocol",
            "udp",
            "--port-dst",
            "53",
            "--mux",
            "true",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides["interface"], OptionValue::from("eth0"));
        assert_eq!(overrides["protocol"], OptionValue::from("udp"));
        assert_eq!(overrides["port_dst"], OptionValue::from(53u16));
        assert_eq!(overrides["mux"], OptionValue::from(true));
        assert!(!overrides.contains_key("mac_src"));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
