use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::{error, warn};
use weaver_ability::{
    opt, pipe, Ability, AbilityContext, AbilityError, AbilityHandle, AbilityInfo, AbilityType,
    Dependency, ParamValue, Params, Tag,
};
use weaver_options::{OptionSpec, OptionValue};

use crate::netcfg::bridge::{self, BridgeTopology, Sysfs};

/// The interception orchestrator.
///
/// Sniffs the frames matching a selector and reports them on the outbound
/// pipes; frames fed into the inbound pipes are injected back on the wire.
/// When an output interface is given, both NICs are bridged together and
/// the selected traffic is dropped in the firewall so the versions the
/// caller injects are the only ones that get through.
pub struct Mitm;

#[derive(Debug, Default, Clone)]
struct Selector {
    mac_src: Option<String>,
    mac_dst: Option<String>,
    ip_src: Option<String>,
    ip_dst: Option<String>,
    proto: Option<String>,
    port_src: Option<u16>,
    port_dst: Option<u16>,
}

impl Selector {
    fn read(ctx: &mut AbilityContext) -> Result<Self, AbilityError> {
        let text = |v: OptionValue| v.as_str().map(str::to_string);
        Ok(Self {
            mac_src: text(ctx.get_opt(opt::MAC_SRC)?),
            mac_dst: text(ctx.get_opt(opt::MAC_DST)?),
            ip_src: text(ctx.get_opt(opt::IP_SRC)?),
            ip_dst: text(ctx.get_opt(opt::IP_DST)?),
            proto: text(ctx.get_opt(opt::L4PROTOCOL)?),
            port_src: ctx.get_opt(opt::PORT_SRC)?.as_port(),
            port_dst: ctx.get_opt(opt::PORT_DST)?.as_port(),
        })
    }

    /// The option overrides handed to the netfilter dependency, mirroring
    /// this orchestrator's own selector.
    fn overrides(
        &self,
        iface: &str,
        oface: Option<&str>,
    ) -> Vec<(&'static str, OptionValue)> {
        let text = |v: &Option<String>| OptionValue::from(v.as_deref());
        vec![
            (opt::INPUT_INTERFACE, OptionValue::from(iface)),
            (opt::OUTPUT_INTERFACE, OptionValue::from(oface)),
            (opt::MAC_SRC, text(&self.mac_src)),
            (opt::MAC_DST, text(&self.mac_dst)),
            (opt::IP_SRC, text(&self.ip_src)),
            (opt::IP_DST, text(&self.ip_dst)),
            (opt::L4PROTOCOL, text(&self.proto)),
            (opt::PORT_SRC, OptionValue::from(self.port_src)),
            (opt::PORT_DST, OptionValue::from(self.port_dst)),
        ]
    }
}

fn push_unique(terms: &mut Vec<String>, term: String) {
    if !terms.contains(&term) {
        terms.push(term);
    }
}

/// Synthesizes the BPF expression matching the present selectors; empty
/// selectors produce an empty filter.
fn build_bpf(sel: &Selector) -> String {
    let mut terms = Vec::new();
    if let Some(mac) = &sel.mac_src {
        push_unique(&mut terms, format!("ether src {mac}"));
    }
    if let Some(mac) = &sel.mac_dst {
        push_unique(&mut terms, format!("ether dst {mac}"));
    }
    if let Some(ip) = &sel.ip_src {
        push_unique(&mut terms, format!("src host {ip}"));
        push_unique(&mut terms, "ip or ip6".to_string());
    }
    if let Some(ip) = &sel.ip_dst {
        push_unique(&mut terms, format!("dst host {ip}"));
        push_unique(&mut terms, "ip or ip6".to_string());
    }
    if let Some(proto) = &sel.proto {
        push_unique(&mut terms, proto.clone());
    }
    if let Some(port) = sel.port_src {
        push_unique(&mut terms, format!("src port {port}"));
    }
    if let Some(port) = sel.port_dst {
        push_unique(&mut terms, format!("dst port {port}"));
    }
    if terms.is_empty() {
        String::new()
    } else {
        format!("({})", terms.join(") and ("))
    }
}

/// Verifies that the provided parameters are sensible before any system
/// state is touched. The error is a user-visible message, not an abort.
fn check_parameter_consistency(
    topology: &dyn BridgeTopology,
    iface: Option<&str>,
    oface: Option<&str>,
    bridge: Option<&str>,
    mux: bool,
    sel: &Selector,
) -> Result<(), String> {
    if (sel.port_src.is_some() || sel.port_dst.is_some()) && sel.proto.is_none() {
        return Err("if src port or dst port are defined, a protocol must be specified".into());
    }
    if oface.is_none() && mux {
        return Err(
            "messages are supposed to be prefixed, but the output interface is unspecified".into(),
        );
    }
    let Some(iface) = iface else {
        return Err("an input channel must be defined".into());
    };
    if oface == Some(iface) {
        return Err("the input interface and the output interface cannot be the same".into());
    }
    if let (Some(current), Some(wanted)) = (topology.bridge_of(iface), bridge) {
        if current != wanted {
            return Err("the input interface is already in a different bridge".into());
        }
    }
    if topology.is_bridge(iface) {
        return Err(
            "a bridge cannot be enslaved to another bridge; the input interface is a bridge".into(),
        );
    }
    if let Some(oface) = oface {
        if topology.is_bridge(oface) {
            return Err(
                "a bridge cannot be enslaved to another bridge; the output interface is a bridge"
                    .into(),
            );
        }
    }
    Ok(())
}

fn ip_tool_available() -> bool {
    ["/sbin", "/usr/sbin", "/usr/bin", "/bin"]
        .iter()
        .any(|dir| Path::new(dir).join("ip").exists())
}

impl Mitm {
    #[allow(clippy::too_many_arguments)]
    async fn run_bridged(
        ctx: &mut AbilityContext,
        sel: &Selector,
        bpf: String,
        iface: &str,
        oface: &str,
        bridge_opt: Option<&str>,
        mux: bool,
        quiet: bool,
    ) -> Result<(), AbilityError> {
        // Bridge only the output NIC for now, so the bridge exists without
        // letting traffic through the input side yet.
        let bridge_name = bridge::bridge_iface_together(&[oface], bridge_opt).await?;

        let mut firewall =
            ctx.get_dependency("netfilter", &sel.overrides(iface, Some(oface)))?;
        firewall.start().await?;

        let mut sniffer = ctx.get_dependency(
            "capture",
            &[
                ("bpf", OptionValue::from(bpf.as_str())),
                (opt::INPUT_INTERFACE, OptionValue::from(bridge_name.as_str())),
            ],
        )?;
        ctx.transfer_out(&mut sniffer);
        sniffer.start().await?;

        let was_source = ctx.is_source();
        let mut muxed: Option<(AbilityHandle, AbilityHandle, AbilityHandle)> = None;
        let mut single: Option<AbilityHandle> = None;
        if !was_source {
            if mux {
                let (input_side, reader1) = pipe();
                let mut sender_in = ctx.get_dependency(
                    "sendraw",
                    &[(opt::OUTPUT_INTERFACE, OptionValue::from(iface))],
                )?;
                sender_in.add_in_pipe(reader1);
                sender_in.start().await?;

                let (output_side, reader2) = pipe();
                let mut sender_out = ctx.get_dependency(
                    "sendraw",
                    &[(opt::OUTPUT_INTERFACE, OptionValue::from(oface))],
                )?;
                sender_out.add_in_pipe(reader2);
                sender_out.start().await?;

                let mut demux =
                    ctx.get_dependency("demux", &[("quiet", OptionValue::from(quiet))])?;
                ctx.transfer_in(&mut demux);
                let routes = HashMap::from([(0x00u8, input_side), (0xFFu8, output_side)]);
                demux
                    .start_with_params(Params::from([(
                        "demux".to_string(),
                        ParamValue::PipeMap(routes),
                    )]))
                    .await?;
                muxed = Some((demux, sender_in, sender_out));
            } else {
                let mut sender = ctx.get_dependency(
                    "sendraw",
                    &[(opt::OUTPUT_INTERFACE, OptionValue::from(oface))],
                )?;
                ctx.transfer_in(&mut sender);
                sender.start().await?;
                single = Some(sender);
            }
        }

        // Only now enslave the input NIC, once the drop rules cover the
        // intercepted traffic, so irrelevant frames are forwarded normally.
        bridge::bridge_iface_together(&[iface], Some(&bridge_name)).await?;

        ctx.wait().await;

        sniffer.stop();
        sniffer.join(None).await;
        if let Some((mut demux, mut sender_in, mut sender_out)) = muxed {
            demux.stop();
            sender_in.stop();
            sender_out.stop();
            demux.join(None).await;
            sender_in.join(None).await;
            sender_out.join(None).await;
        }
        if let Some(mut sender) = single {
            sender.stop();
            sender.join(None).await;
        }
        firewall.stop();
        firewall.join(None).await;

        bridge::unbridge(&bridge_name).await
    }

    async fn run_single(
        ctx: &mut AbilityContext,
        bpf: String,
        iface: &str,
    ) -> Result<(), AbilityError> {
        let mut sniffer = ctx.get_dependency(
            "capture",
            &[
                ("bpf", OptionValue::from(bpf.as_str())),
                (opt::INPUT_INTERFACE, OptionValue::from(iface)),
            ],
        )?;
        ctx.transfer_out(&mut sniffer);
        sniffer.start().await?;

        let was_source = ctx.is_source();
        let mut sender: Option<AbilityHandle> = None;
        if !was_source {
            let mut handle = ctx.get_dependency(
                "sendraw",
                &[(opt::OUTPUT_INTERFACE, OptionValue::from(iface))],
            )?;
            ctx.transfer_in(&mut handle);
            handle.start().await?;
            sender = Some(handle);
        }

        ctx.wait().await;

        sniffer.stop();
        sniffer.join(None).await;
        if let Some(mut handle) = sender {
            handle.stop();
            handle.join(None).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Ability for Mitm {
    fn info(&self) -> AbilityInfo {
        AbilityInfo::new("Message Interceptor")
            .with_description(
                "Sniffs selected frames and reports them on the outbound pipes. Original \
                 frames may be dropped and replacement frames injected back in. With an \
                 output interface, both NICs are bridged together and intercepted frames \
                 are dropped.",
            )
            .with_tags(&[Tag::Intrusive])
            .with_kind(AbilityType::Component)
    }

    fn option_list(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::nic(opt::INPUT_INTERFACE, OptionValue::None, "Sniffed interface", false),
            OptionSpec::nic(
                opt::OUTPUT_INTERFACE,
                OptionValue::None,
                "Injection interface",
                true,
            ),
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
            OptionSpec::string(
                "bridge",
                OptionValue::None,
                "Bridge to sniff on; created, and the two interfaces enslaved, when absent",
                true,
            ),
            OptionSpec::boolean(
                "mux",
                false,
                "Messages to send carry a one-byte prefix: 0x00 routes to the sniffing \
                 interface, 0xFF to the output interface. Without a prefix every message \
                 goes to the output interface.",
                false,
            ),
            OptionSpec::boolean("quiet", true, "Whether to log routing errors", false),
        ]
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![
            Dependency::Classic("netfilter"),
            Dependency::Classic("capture"),
            Dependency::Classic("sendraw"),
            Dependency::Classic("demux"),
        ]
    }

    fn requirements(&self) -> Vec<String> {
        if ip_tool_available() {
            Vec::new()
        } else {
            vec!["the ip(8) tool is missing; please install iproute2".to_string()]
        }
    }

    async fn main(
        &mut self,
        ctx: &mut AbilityContext,
    ) -> Result<Option<OptionValue>, AbilityError> {
        let text = |v: OptionValue| v.as_str().map(str::to_string);
        let iface = text(ctx.get_opt(opt::INPUT_INTERFACE)?);
        let oface = text(ctx.get_opt(opt::OUTPUT_INTERFACE)?);
        let bridge_opt = text(ctx.get_opt("bridge")?);
        let mux = ctx.get_opt("mux")?.as_bool().unwrap_or(false);
        let quiet = ctx.get_opt("quiet")?.as_bool().unwrap_or(true);
        let sel = Selector::read(ctx)?;

        if let Err(msg) = check_parameter_consistency(
            &Sysfs,
            iface.as_deref(),
            oface.as_deref(),
            bridge_opt.as_deref(),
            mux,
            &sel,
        ) {
            error!(target: "weaver::mitm", "{msg}");
            warn!(target: "weaver::mitm", "inconsistent parameters");
            return Ok(None);
        }
        let Some(iface) = iface else {
            return Ok(None);
        };

        let bpf = build_bpf(&sel);
        match oface {
            Some(oface) => {
                Self::run_bridged(
                    ctx,
                    &sel,
                    bpf,
                    &iface,
                    &oface,
                    bridge_opt.as_deref(),
                    mux,
                    quiet,
                )
                .await?
            }
            None => Self::run_single(ctx, bpf, &iface).await?,
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct StubTopology {
        bridges: Vec<String>,
        enslaved: HashMap<String, String>,
    }

    impl BridgeTopology for StubTopology {
        fn is_bridge(&self, ifname: &str) -> bool {
            self.bridges.iter().any(|b| b == ifname)
        }

        fn bridge_of(&self, ifname: &str) -> Option<String> {
            self.enslaved.get(ifname).cloned()
        }
    }

    fn sel() -> Selector {
        Selector::default()
    }

    #[test]
    fn bpf_from_full_selector() {
        let sel = Selector {
            mac_src: Some("00:11:22:33:44:55".into()),
            ip_dst: Some("192.0.2.1".into()),
            proto: Some("udp".into()),
            port_dst: Some(53),
            ..Selector::default()
        };
        assert_eq!(
            build_bpf(&sel),
            "(ether src 00:11:22:33:44:55) and (dst host 192.0.2.1) and (ip or ip6) and (udp) and (dst port 53)"
        );
    }

    #[test]
    fn bpf_deduplicates_the_ip_clause() {
        let sel = Selector {
            ip_src: Some("10.0.0.1".into()),
            ip_dst: Some("10.0.0.2".into()),
            ..Selector::default()
        };
        let bpf = build_bpf(&sel);
        assert_eq!(bpf.matches("ip or ip6").count(), 1);
    }

    #[test]
    fn empty_selector_produces_empty_filter() {
        assert_eq!(build_bpf(&Selector::default()), "");
    }

    #[test]
    fn ports_require_a_protocol() {
        let topology = StubTopology::default();
        let selector = Selector {
            port_dst: Some(53),
            ..sel()
        };
        let err = check_parameter_consistency(
            &topology,
            Some("eth0"),
            None,
            None,
            false,
            &selector,
        )
        .unwrap_err();
        assert!(err.contains("protocol"));
    }

    #[test]
    fn mux_requires_an_output_interface() {
        let topology = StubTopology::default();
        let err =
            check_parameter_consistency(&topology, Some("eth0"), None, None, true, &sel())
                .unwrap_err();
        assert!(err.contains("output interface"));
    }

    #[test]
    fn input_interface_is_mandatory() {
        let topology = StubTopology::default();
        assert!(check_parameter_consistency(&topology, None, None, None, false, &sel()).is_err());
    }

    #[test]
    fn input_and_output_must_differ() {
        let topology = StubTopology::default();
        let err = check_parameter_consistency(
            &topology,
            Some("eth0"),
            Some("eth0"),
            None,
            false,
            &sel(),
        )
        .unwrap_err();
        assert!(err.contains("cannot be the same"));
    }

    #[test]
    fn conflicting_bridge_membership_is_rejected() {
        let topology = StubTopology {
            bridges: vec!["br7".into()],
            enslaved: HashMap::from([("eth0".to_string(), "br7".to_string())]),
        };
        assert!(check_parameter_consistency(
            &topology,
            Some("eth0"),
            Some("eth1"),
            Some("br7"),
            false,
            &sel()
        )
        .is_ok());
        assert!(check_parameter_consistency(
            &topology,
            Some("eth0"),
            Some("eth1"),
            Some("pwbr0"),
            false,
            &sel()
        )
        .is_err());
    }

    #[test]
    fn bridges_cannot_be_enslaved() {
        let topology = StubTopology {
            bridges: vec!["br0".into()],
            enslaved: HashMap::new(),
        };
        assert!(check_parameter_consistency(
            &topology,
            Some("br0"),
            Some("eth1"),
            None,
            false,
            &sel()
        )
        .is_err());
        assert!(check_parameter_consistency(
            &topology,
            Some("eth0"),
            Some("br0"),
            None,
            false,
            &sel()
        )
        .is_err());
    }
}
