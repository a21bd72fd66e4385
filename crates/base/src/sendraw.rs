use std::time::Duration;

use async_trait::async_trait;
use nix::unistd::Uid;
use tracing::warn;
use weaver_ability::{
    opt, Ability, AbilityContext, AbilityError, AbilityInfo, AbilityType, Tag,
};
use weaver_options::{OptionSpec, OptionValue};

/// Reads L2 frames from the inbound pipes and writes them on the
/// configured NIC.
pub struct SendRaw;

#[async_trait]
impl Ability for SendRaw {
    fn info(&self) -> AbilityInfo {
        AbilityInfo::new("Send Raw Frames")
            .with_description("Reads L2 frames from the pipe and writes them on the specified NIC")
            .with_tags(&[Tag::PhysicalLayer])
            .with_kind(AbilityType::Component)
    }

    fn option_list(&self) -> Vec<OptionSpec> {
        vec![OptionSpec::nic(
            opt::OUTPUT_INTERFACE,
            OptionValue::None,
            "NIC to send traffic on",
            false,
        )]
    }

    fn requirements(&self) -> Vec<String> {
        if Uid::effective().is_root() {
            Vec::new()
        } else {
            vec!["raw frame injection requires root privileges".to_string()]
        }
    }

    async fn main(
        &mut self,
        ctx: &mut AbilityContext,
    ) -> Result<Option<OptionValue>, AbilityError> {
        let iface = ctx
            .get_opt(opt::OUTPUT_INTERFACE)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AbilityError::FatalSystem("no injection interface configured".into()))?;

        let mut cap = tokio::task::spawn_blocking({
            let iface = iface.clone();
            move || {
                pcap::Capture::from_device(iface.as_str())
                    .map_err(|e| AbilityError::FatalSystem(format!("device {iface}: {e}")))?
                    .open()
                    .map_err(|e| {
                        AbilityError::FatalSystem(format!("opening injection on {iface}: {e}"))
                    })
            }
        })
        .await
        .map_err(|e| AbilityError::FatalSystem(format!("injection setup: {e}")))??;

        while !ctx.is_stopped() {
            match ctx.poll(Duration::from_millis(100)).await {
                Ok(true) => match ctx.recv().await {
                    Ok(frame) => {
                        if let Err(err) = cap.sendpacket(&frame[..]) {
                            warn!(target: "weaver::sendraw", iface = %iface, %err, "injection failed");
                        }
                    }
                    Err(_) => break,
                },
                Ok(false) => {}
                Err(_) => break,
            }
        }
        Ok(None)
    }
}
