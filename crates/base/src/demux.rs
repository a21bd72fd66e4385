use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};
use weaver_ability::{
    Ability, AbilityContext, AbilityError, AbilityInfo, AbilityType, ParamValue, PipeWriter, Tag,
};
use weaver_options::{OptionSpec, OptionValue};

/// Routes messages to one of several pipes according to their one-byte
/// prefix; the prefix is stripped before forwarding.
///
/// The token-to-pipe map is wired at `start` through the `demux` param.
pub struct Demux;

#[async_trait]
impl Ability for Demux {
    fn info(&self) -> AbilityInfo {
        AbilityInfo::new("Demux")
            .with_description("Demultiplex a series of datagrams, based on a prefix")
            .with_tags(&[Tag::Example])
            .with_kind(AbilityType::Component)
    }

    fn option_list(&self) -> Vec<OptionSpec> {
        vec![OptionSpec::boolean(
            "quiet",
            true,
            "Whether to keep silent about unroutable prefixes",
            false,
        )]
    }

    async fn main(
        &mut self,
        ctx: &mut AbilityContext,
    ) -> Result<Option<OptionValue>, AbilityError> {
        let quiet = ctx.get_opt("quiet")?.as_bool().unwrap_or(true);
        let mut routes: HashMap<u8, PipeWriter> = match ctx.take_param("demux") {
            Some(ParamValue::PipeMap(map)) => map,
            _ => {
                error!(target: "weaver::demux", "no demux map wired at start");
                return Ok(None);
            }
        };

        while !ctx.is_stopped() {
            match ctx.poll(Duration::from_millis(100)).await {
                Ok(true) => match ctx.recv().await {
                    Ok(msg) => {
                        let Some((&token, rest)) = msg.split_first() else {
                            continue;
                        };
                        match routes.get(&token) {
                            Some(out) => {
                                if out.send(msg.slice_ref(rest)).is_err() {
                                    routes.remove(&token);
                                }
                            }
                            None if !quiet => {
                                warn!(target: "weaver::demux", token, "invalid prefix");
                            }
                            None => {}
                        }
                    }
                    Err(_) => break,
                },
                Ok(false) => {}
                Err(_) => break,
            }
        }

        for out in routes.values() {
            out.close();
        }
        Ok(None)
    }
}
