use async_trait::async_trait;
use nix::unistd::Uid;
use tracing::warn;
use weaver_ability::{
    opt, Ability, AbilityContext, AbilityError, AbilityInfo, AbilityType, Tag,
};
use weaver_options::{OptionSpec, OptionValue};

use crate::netcfg::netfilter as fw;

/// Installs ebtables and iptables rules dropping the selected traffic for
/// as long as the ability runs; the rules are removed on stop.
pub struct NetfilterConfig;

struct Selectors {
    iface: Option<String>,
    oface: Option<String>,
    mac_src: Option<String>,
    mac_dst: Option<String>,
    ip_src: Option<String>,
    ip_dst: Option<String>,
    proto: Option<String>,
    port_src: Option<u16>,
    port_dst: Option<u16>,
}

impl Selectors {
    fn read(ctx: &mut AbilityContext) -> Result<Self, AbilityError> {
        let text = |v: OptionValue| v.as_str().map(str::to_string);
        Ok(Self {
            iface: text(ctx.get_opt(opt::INPUT_INTERFACE)?),
            oface: text(ctx.get_opt(opt::OUTPUT_INTERFACE)?),
            mac_src: text(ctx.get_opt(opt::MAC_SRC)?),
            mac_dst: text(ctx.get_opt(opt::MAC_DST)?),
            ip_src: text(ctx.get_opt(opt::IP_SRC)?),
            ip_dst: text(ctx.get_opt(opt::IP_DST)?),
            proto: text(ctx.get_opt(opt::L4PROTOCOL)?),
            port_src: ctx.get_opt(opt::PORT_SRC)?.as_port(),
            port_dst: ctx.get_opt(opt::PORT_DST)?.as_port(),
        })
    }

    fn wants_frame_rule(&self) -> bool {
        self.mac_src.is_some() || self.mac_dst.is_some()
    }

    fn wants_packet_rule(&self) -> bool {
        self.ip_src.is_some()
            || self.ip_dst.is_some()
            || self.proto.is_some()
            || self.port_src.is_some()
            || self.port_dst.is_some()
    }

    async fn install(&self) -> Result<(), AbilityError> {
        if self.wants_frame_rule() {
            fw::drop_frames(
                self.iface.as_deref(),
                self.oface.as_deref(),
                self.mac_src.as_deref(),
                self.mac_dst.as_deref(),
            )
            .await?;
        }
        if self.wants_packet_rule() {
            fw::drop_packets(
                self.iface.as_deref(),
                self.oface.as_deref(),
                self.ip_src.as_deref(),
                self.ip_dst.as_deref(),
                self.proto.as_deref(),
                self.port_src,
                self.port_dst,
                true,
            )
            .await?;
        }
        Ok(())
    }

    async fn remove(&self) {
        if self.wants_frame_rule() {
            if let Err(err) = fw::undrop_frames(
                self.iface.as_deref(),
                self.oface.as_deref(),
                self.mac_src.as_deref(),
                self.mac_dst.as_deref(),
            )
            .await
            {
                warn!(target: "weaver::netfilter", %err, "removing frame rule failed");
            }
        }
        if self.wants_packet_rule() {
            if let Err(err) = fw::undrop_packets(
                self.iface.as_deref(),
                self.oface.as_deref(),
                self.ip_src.as_deref(),
                self.ip_dst.as_deref(),
                self.proto.as_deref(),
                self.port_src,
                self.port_dst,
                true,
            )
            .await
            {
                warn!(target: "weaver::netfilter", %err, "removing packet rule failed");
            }
        }
    }
}

#[async_trait]
impl Ability for NetfilterConfig {
    fn info(&self) -> AbilityInfo {
        AbilityInfo::new("Netfilter Config")
            .with_description("Configure ebtables and iptables rules to drop specified traffic")
            .with_tags(&[Tag::DataLinkLayer, Tag::NetworkLayer])
            .with_kind(AbilityType::Component)
    }

    fn option_list(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::nic(opt::INPUT_INTERFACE, OptionValue::None, "Input interface", true),
            OptionSpec::nic(opt::OUTPUT_INTERFACE, OptionValue::None, "Output interface", true),
            OptionSpec::mac(opt::MAC_SRC, OptionValue::None, "Source Mac", true),
            OptionSpec::mac(opt::MAC_DST, OptionValue::None, "Destination Mac", true),
            OptionSpec::ip(opt::IP_SRC, OptionValue::None, "Source IP", true),
            OptionSpec::ip(opt::IP_DST, OptionValue::None, "Destination IP", true),
            OptionSpec::port(opt::PORT_SRC, OptionValue::None, "Source Port", true),
            OptionSpec::port(opt::PORT_DST, OptionValue::None, "Destination Port", true),
            OptionSpec::choice(
                opt::L4PROTOCOL,
                &["tcp", "udp"],
                None,
                "L4 Protocol over IP",
                true,
            ),
        ]
    }

    fn requirements(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if !fw::iptables_available() {
            missing.push(
                "iptables CLI missing; please install iptables or proceed to an update".to_string(),
            );
        }
        if !fw::ebtables_available() {
            missing.push(
                "ebtables CLI missing; please install ebtables or proceed to an update".to_string(),
            );
        }
        if !Uid::effective().is_root() {
            missing.push("firewall configuration requires root privileges".to_string());
        }
        missing
    }

    async fn main(
        &mut self,
        ctx: &mut AbilityContext,
    ) -> Result<Option<OptionValue>, AbilityError> {
        let selectors = Selectors::read(ctx)?;
        selectors.install().await?;
        ctx.wait().await;
        selectors.remove().await;
        Ok(None)
    }
}
