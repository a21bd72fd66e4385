use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use nix::unistd::Uid;
use tracing::{debug, warn};
use weaver_ability::{
    opt, Ability, AbilityContext, AbilityError, AbilityInfo, AbilityType, Message, PipeWriter, Tag,
};
use weaver_options::{OptionSpec, OptionValue};

/// Sniffs frames matching a BPF expression and fans them out to every
/// outbound pipe.
pub struct Capture;

fn capture_loop(
    iface: String,
    bpf: String,
    mut outs: Vec<PipeWriter>,
    stop: Arc<AtomicBool>,
) -> Result<(), AbilityError> {
    let mut cap = pcap::Capture::from_device(iface.as_str())
        .map_err(|e| AbilityError::FatalSystem(format!("capture device {iface}: {e}")))?
        .promisc(true)
        .snaplen(65535)
        .timeout(100)
        .open()
        .map_err(|e| AbilityError::FatalSystem(format!("opening capture on {iface}: {e}")))?;
    if !bpf.is_empty() {
        cap.filter(&bpf, true)
            .map_err(|e| AbilityError::FatalSystem(format!("bpf `{bpf}`: {e}")))?;
    }
    while !stop.load(Ordering::SeqCst) {
        match cap.next_packet() {
            Ok(packet) => {
                let frame = Message::copy_from_slice(packet.data);
                outs.retain(|out| out.send(frame.clone()).is_ok());
                if outs.is_empty() {
                    debug!(target: "weaver::capture", iface = %iface, "every consumer left");
                    break;
                }
            }
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => {
                return Err(AbilityError::FatalSystem(format!(
                    "capture on {iface}: {e}"
                )))
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Ability for Capture {
    fn info(&self) -> AbilityInfo {
        AbilityInfo::new("Sniff Frames")
            .with_description("Sniff frames and send them in the pipe")
            .with_tags(&[Tag::PhysicalLayer])
            .with_kind(AbilityType::Component)
    }

    fn option_list(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::string("bpf", "", "Filter to apply to received frames", false),
            OptionSpec::nic(
                opt::INPUT_INTERFACE,
                OptionValue::None,
                "NIC to sniff on",
                false,
            ),
        ]
    }

    fn requirements(&self) -> Vec<String> {
        if Uid::effective().is_root() {
            Vec::new()
        } else {
            vec!["raw frame capture requires root privileges".to_string()]
        }
    }

    async fn main(
        &mut self,
        ctx: &mut AbilityContext,
    ) -> Result<Option<OptionValue>, AbilityError> {
        let iface = ctx
            .get_opt(opt::INPUT_INTERFACE)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AbilityError::FatalSystem("no capture interface configured".into()))?;
        let bpf = ctx
            .get_opt("bpf")?
            .as_str()
            .unwrap_or_default()
            .to_string();

        let stop = Arc::new(AtomicBool::new(false));
        let writers = ctx.out_pipes().to_vec();
        let worker = {
            let stop = stop.clone();
            tokio::task::spawn_blocking(move || capture_loop(iface, bpf, writers, stop))
        };

        ctx.wait().await;

        stop.store(true, Ordering::SeqCst);
        match worker.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(target: "weaver::capture", %err, "capture worker failed"),
            Err(err) => warn!(target: "weaver::capture", %err, "capture worker panicked"),
        }
        Ok(None)
    }
}
