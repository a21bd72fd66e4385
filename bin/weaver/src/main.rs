//! Command-line entrypoint running the MITM interceptor.

use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};
use weaver_ability::AbilityHandle;
use weaver_registry::ModuleFactory;

pub mod cli;
use cli::Cli;

/// One-second windows granted to the worker on shutdown before escalating.
const SHUTDOWN_WINDOWS: u32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.init_tracing()?;

    let factory = ModuleFactory::new();
    factory.install(weaver_base::package());

    let mut interceptor = factory
        .get_ability("base", "Message Interceptor", &cli.overrides())?
        .context("the base package does not export the interceptor")?;

    let missing = interceptor.check_preconditions()?;
    if !missing.is_empty() {
        for requirement in &missing {
            error!(target: "weaver", "{requirement}");
        }
        bail!("missing preconditions; refusing to start");
    }

    interceptor.start().await?;
    info!(target: "weaver", "interceptor running; hit Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl-C")?;
    info!(target: "weaver", "stopping");
    shutdown(interceptor).await
}

/// Issues a cooperative stop and waits in bounded one-second windows;
/// escalates to process termination as a last resort.
async fn shutdown(mut interceptor: AbilityHandle) -> anyhow::Result<()> {
    interceptor.stop();
    for _ in 0..SHUTDOWN_WINDOWS {
        if interceptor.join(Some(Duration::from_secs(1))).await {
            info!(target: "weaver", "interceptor stopped");
            return Ok(());
        }
        warn!(target: "weaver", "interceptor still stopping");
    }
    error!(target: "weaver", "interceptor did not stop in time; terminating");
    std::process::exit(1);
}
