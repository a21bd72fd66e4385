use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use weaver_options::OptionValue;

use crate::{
    AbilityError, AbilityHandle, Dependency, DependencyResolver, Message, OptionSet, PipeSet,
    PipeWriter,
};

/// Runtime resources handed to an ability `start`, keyed by name.
pub type Params = HashMap<String, ParamValue>;

/// A runtime resource passed to `start` alongside the option map; used for
/// values that are wired rather than configured, such as pipe ends.
#[derive(Debug, Clone)]
pub enum ParamValue {
    /// A plain value.
    Value(OptionValue),
    /// The write end of a pipe.
    Pipe(PipeWriter),
    /// A demultiplexing token-to-pipe map.
    PipeMap(HashMap<u8, PipeWriter>),
}

/// The execution context of a running ability.
///
/// Owns the instance's option snapshot, its pipe ends and the cooperative
/// stop signal for the duration of `main`.
pub struct AbilityContext {
    name: String,
    opts: OptionSet,
    in_pipes: PipeSet,
    out_pipes: Vec<PipeWriter>,
    cancel: CancellationToken,
    resolver: Arc<dyn DependencyResolver>,
    deps: Vec<Dependency>,
    params: Params,
}

impl AbilityContext {
    pub(crate) fn new(
        name: String,
        opts: OptionSet,
        in_pipes: PipeSet,
        out_pipes: Vec<PipeWriter>,
        cancel: CancellationToken,
        resolver: Arc<dyn DependencyResolver>,
        deps: Vec<Dependency>,
        params: Params,
    ) -> Self {
        Self {
            name,
            opts,
            in_pipes,
            out_pipes,
            cancel,
            resolver,
            deps,
            params,
        }
    }

    /// The name of the running ability.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The interpreted value of an option (memoized).
    pub fn get_opt(&mut self, name: &str) -> Result<OptionValue, AbilityError> {
        Ok(self.opts.get(name, false)?)
    }

    /// The interpreted value, bypassing the cache; lazy sequences advance
    /// one step and fail with `EndOfSequence` when exhausted.
    pub fn get_opt_fresh(&mut self, name: &str) -> Result<OptionValue, AbilityError> {
        Ok(self.opts.get(name, true)?)
    }

    /// The raw stored value of an option.
    pub fn get_opt_raw(&self, name: &str) -> Result<OptionValue, AbilityError> {
        Ok(self.opts.get_raw(name)?)
    }

    /// A runtime resource passed at `start`, removed from the context.
    pub fn take_param(&mut self, name: &str) -> Option<ParamValue> {
        self.params.remove(name)
    }

    /// The outbound pipe ends, for abilities that hand them to workers.
    pub fn out_pipes(&self) -> &[PipeWriter] {
        &self.out_pipes
    }

    /// True when no inbound pipe is attached.
    pub fn is_source(&self) -> bool {
        self.in_pipes.is_empty()
    }

    /// True when no outbound pipe is attached.
    pub fn is_sink(&self) -> bool {
        self.out_pipes.is_empty()
    }

    /// Waits up to `timeout` for an inbound pipe to become readable.
    /// Fails with `NoInputPipe` for a source.
    pub async fn poll(&mut self, timeout: Duration) -> Result<bool, AbilityError> {
        self.in_pipes.poll(timeout).await
    }

    /// The next message across the inbound pipes, in readiness order.
    pub async fn recv(&mut self) -> Result<Message, AbilityError> {
        self.in_pipes.recv().await
    }

    /// Forwards a message to every outbound pipe, silently dropping closed
    /// ones. Fails with `NoOutputPipe` for a sink.
    pub fn send(&mut self, msg: Message) -> Result<(), AbilityError> {
        if self.out_pipes.is_empty() {
            return Err(AbilityError::NoOutputPipe(self.name.clone()));
        }
        self.out_pipes.retain(|w| w.send(msg.clone()).is_ok());
        Ok(())
    }

    /// Blocks until `stop` is observed.
    pub async fn wait(&self) {
        debug!(target: "weaver::ability", ability = %self.name, "waiting for stop");
        self.cancel.cancelled().await;
        debug!(target: "weaver::ability", ability = %self.name, "leave wait");
    }

    /// True once `stop` has been requested.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Moves every inbound pipe of this ability onto `other`.
    pub fn transfer_in(&mut self, other: &mut AbilityHandle) {
        let moved = self.in_pipes.take_all();
        debug!(
            target: "weaver::ability",
            ability = %self.name,
            count = moved.len(),
            to = %other.name(),
            "transferring inbound pipes"
        );
        for reader in moved {
            other.add_in_pipe(reader);
        }
    }

    /// Moves every outbound pipe of this ability onto `other`.
    pub fn transfer_out(&mut self, other: &mut AbilityHandle) {
        let moved = std::mem::take(&mut self.out_pipes);
        debug!(
            target: "weaver::ability",
            ability = %self.name,
            count = moved.len(),
            to = %other.name(),
            "transferring outbound pipes"
        );
        for writer in moved {
            other.add_out_pipe(writer);
        }
    }

    /// Copies every outbound pipe of this ability onto `other` without
    /// releasing them.
    pub fn dup_out(&self, other: &mut AbilityHandle) {
        for writer in &self.out_pipes {
            other.add_out_pipe(writer.clone());
        }
    }

    /// Resolves a declared dependency into a fresh instance, with `overrides`
    /// applied to its options.
    pub fn get_dependency(
        &self,
        alias: &str,
        overrides: &[(&str, OptionValue)],
    ) -> Result<AbilityHandle, AbilityError> {
        let dep = self
            .deps
            .iter()
            .find(|d| d.alias() == alias)
            .ok_or_else(|| AbilityError::UnknownDependency(alias.to_string()))?;
        let target = dep.target()?;
        let mut handle = self.resolver.resolve(&target.package, &target.ability)?;
        for (name, value) in overrides {
            handle.set_opt(name, value.clone())?;
        }
        Ok(handle)
    }

    /// Starts every instance, in order.
    pub async fn start_many(
        &self,
        handles: &mut [&mut AbilityHandle],
    ) -> Result<(), AbilityError> {
        for handle in handles.iter_mut() {
            debug!(target: "weaver::ability", ability = %handle.name(), "calling start");
            handle.start().await?;
        }
        Ok(())
    }

    /// Stops every instance, then joins each of them.
    pub async fn stop_many(&self, handles: &mut [&mut AbilityHandle]) {
        for handle in handles.iter() {
            debug!(target: "weaver::ability", ability = %handle.name(), "calling stop");
            handle.stop();
        }
        for handle in handles.iter_mut() {
            debug!(target: "weaver::ability", ability = %handle.name(), "joining");
            handle.join(None).await;
        }
    }

    /// Starts every instance, waits for this ability's own stop signal,
    /// then stops them all.
    pub async fn start_wait_and_stop(
        &self,
        handles: &mut [&mut AbilityHandle],
    ) -> Result<(), AbilityError> {
        self.start_many(handles).await?;
        self.wait().await;
        self.stop_many(handles).await;
        Ok(())
    }

    /// Closes every pipe still owned by the context. Sources own no inbound
    /// pipes and sinks no outbound ones, so the checks of the lifecycle
    /// contract reduce to closing whatever is left.
    pub(crate) fn teardown(&mut self) {
        self.in_pipes.close_all();
        for writer in &self.out_pipes {
            writer.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pipe, NullResolver, PipeSet};

    fn ctx_with_pipes(ins: Vec<crate::PipeReader>, outs: Vec<PipeWriter>) -> AbilityContext {
        AbilityContext::new(
            "test".to_string(),
            OptionSet::new(Vec::new()),
            PipeSet::new("test", ins),
            outs,
            CancellationToken::new(),
            Arc::new(NullResolver),
            Vec::new(),
            Params::new(),
        )
    }

    #[tokio::test]
    async fn send_to_sink_is_an_error() {
        let mut ctx = ctx_with_pipes(Vec::new(), Vec::new());
        assert!(matches!(
            ctx.send(Message::from_static(b"x")),
            Err(AbilityError::NoOutputPipe(_))
        ));
    }

    #[tokio::test]
    async fn send_fans_out_and_drops_closed() {
        let (w1, mut r1) = pipe();
        let (w2, r2) = pipe();
        let mut ctx = ctx_with_pipes(Vec::new(), vec![w1, w2]);
        r2.close();
        ctx.send(Message::from_static(b"x")).unwrap();
        assert_eq!(r1.try_take(), Some(Message::from_static(b"x")));
        assert!(!ctx.is_sink());
        assert_eq!(ctx.out_pipes.len(), 1);
    }

    #[tokio::test]
    async fn source_poll_is_an_error() {
        let mut ctx = ctx_with_pipes(Vec::new(), Vec::new());
        assert!(matches!(
            ctx.poll(Duration::from_millis(1)).await,
            Err(AbilityError::NoInputPipe(_))
        ));
    }
}
