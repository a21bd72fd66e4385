use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use weaver_options::OptionValue;

use crate::{
    Ability, AbilityContext, AbilityError, AbilityInfo, Dependency, DependencyResolver, Flavor,
    OptionSet, Params, PipeReader, PipeSet, PipeWriter,
};

/// An ability instance and its lifecycle.
///
/// A handle is created by the module factory (or directly in tests), is
/// configured through `set_opt` while in its pre-start states, runs its
/// ability exactly once, and exposes the outcome through `result` once
/// stopped. The creator of a handle owns it and is responsible for `stop`
/// and `join`.
pub struct AbilityHandle {
    info: AbilityInfo,
    opts: OptionSet,
    deps: Vec<Dependency>,
    requirements: Vec<String>,
    flavor: Flavor,
    ability: Option<Box<dyn Ability>>,
    in_pipes: Vec<PipeReader>,
    out_pipes: Vec<PipeWriter>,
    cancel: CancellationToken,
    launched: bool,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    result: Arc<Mutex<Option<OptionValue>>>,
    resolver: Arc<dyn DependencyResolver>,
}

impl std::fmt::Debug for AbilityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbilityHandle")
            .field("name", &self.info.name())
            .field("launched", &self.launched)
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

impl AbilityHandle {
    /// Wraps an ability into a fresh handle using `resolver` for its
    /// dependencies.
    pub fn new(ability: Box<dyn Ability>, resolver: Arc<dyn DependencyResolver>) -> Self {
        let info = ability.info();
        let opts = OptionSet::new(ability.option_list());
        let deps = ability.dependencies();
        let requirements = ability.requirements();
        let flavor = ability.flavor();
        Self {
            info,
            opts,
            deps,
            requirements,
            flavor,
            ability: Some(ability),
            in_pipes: Vec::new(),
            out_pipes: Vec::new(),
            cancel: CancellationToken::new(),
            launched: false,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            result: Arc::new(Mutex::new(None)),
            resolver,
        }
    }

    /// Like [`AbilityHandle::new`] with a layer of caller defaults applied
    /// on top of the descriptor defaults.
    pub fn with_defaults(
        ability: Box<dyn Ability>,
        resolver: Arc<dyn DependencyResolver>,
        defaults: &HashMap<String, OptionValue>,
    ) -> Result<Self, AbilityError> {
        let mut handle = Self::new(ability, resolver);
        handle.opts.apply_defaults(defaults)?;
        Ok(handle)
    }

    /// The ability metadata.
    pub fn info(&self) -> &AbilityInfo {
        &self.info
    }

    /// The ability name.
    pub fn name(&self) -> &str {
        self.info.name()
    }

    /// The declared dependency list.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.deps
    }

    /// Declared option names, in declaration order.
    pub fn option_names(&self) -> Vec<&str> {
        self.opts.names()
    }

    /// Sets an option; legal only before `start`.
    pub fn set_opt(
        &mut self,
        name: &str,
        value: impl Into<OptionValue>,
    ) -> Result<(), AbilityError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(AbilityError::OptionsLocked(self.name().to_string()));
        }
        Ok(self.opts.set(name, value)?)
    }

    /// Sets several options at once.
    pub fn set_opts(
        &mut self,
        values: &[(&str, OptionValue)],
    ) -> Result<(), AbilityError> {
        for (name, value) in values {
            self.set_opt(name, value.clone())?;
        }
        Ok(())
    }

    /// The interpreted value of an option (memoized).
    pub fn get_opt(&mut self, name: &str) -> Result<OptionValue, AbilityError> {
        Ok(self.opts.get(name, false)?)
    }

    /// The interpreted value, bypassing the cache.
    pub fn get_opt_fresh(&mut self, name: &str) -> Result<OptionValue, AbilityError> {
        Ok(self.opts.get(name, true)?)
    }

    /// The raw stored value of an option.
    pub fn get_opt_raw(&self, name: &str) -> Result<OptionValue, AbilityError> {
        Ok(self.opts.get_raw(name)?)
    }

    /// Restores one option to its layered default.
    pub fn clear_option(&mut self, name: &str) -> Result<(), AbilityError> {
        Ok(self.opts.clear(name)?)
    }

    /// Restores every option to its layered default.
    pub fn clear_options(&mut self) -> Result<(), AbilityError> {
        Ok(self.opts.clear_all()?)
    }

    /// Completion candidates for an option.
    pub fn completion(&self, name: &str, typed: &str, reference: Option<&Path>) -> Vec<String> {
        self.opts.completion(name, typed, reference)
    }

    /// Whether `value` would be accepted for `name`.
    pub fn is_valid_value(&self, name: &str, value: &OptionValue) -> bool {
        self.opts.is_valid_value(name, value)
    }

    /// Whether the option still holds its layered default.
    pub fn has_default_value(&self, name: &str) -> Option<bool> {
        self.opts.has_default_value(name)
    }

    /// Appends an inbound pipe, ignoring duplicates.
    pub fn add_in_pipe(&mut self, reader: PipeReader) {
        if !self.in_pipes.contains(&reader) {
            self.in_pipes.push(reader);
        }
        debug!(
            target: "weaver::ability",
            ability = %self.name(),
            count = self.in_pipes.len(),
            "inbound pipes attached"
        );
    }

    /// Appends an outbound pipe, ignoring duplicates.
    pub fn add_out_pipe(&mut self, writer: PipeWriter) {
        if !self.out_pipes.contains(&writer) {
            self.out_pipes.push(writer);
        }
        debug!(
            target: "weaver::ability",
            ability = %self.name(),
            count = self.out_pipes.len(),
            "outbound pipes attached"
        );
    }

    /// True when no inbound pipe is attached.
    pub fn is_source(&self) -> bool {
        self.in_pipes.is_empty()
    }

    /// True when no outbound pipe is attached.
    pub fn is_sink(&self) -> bool {
        self.out_pipes.is_empty()
    }

    /// Creates a new pipe from this ability's output to `other`'s input.
    pub fn pipe_into(&mut self, other: &mut AbilityHandle) {
        debug!(
            target: "weaver::ability",
            from = %self.name(),
            to = %other.name(),
            "new pipe"
        );
        let (writer, reader) = crate::pipe();
        self.add_out_pipe(writer);
        other.add_in_pipe(reader);
    }

    /// Starts the ability with no runtime params.
    pub async fn start(&mut self) -> Result<(), AbilityError> {
        self.start_with_params(Params::new()).await
    }

    /// Starts the ability, handing `params` to its context. May be called
    /// at most once per instance; re-running requires a fresh instance.
    ///
    /// For a [`Flavor::Task`] ability this spawns the worker and returns
    /// immediately; for a [`Flavor::Inline`] ability it returns once `main`
    /// has completed.
    pub async fn start_with_params(&mut self, params: Params) -> Result<(), AbilityError> {
        if self.launched {
            return Err(AbilityError::AlreadyStarted(self.name().to_string()));
        }
        let ability = self
            .ability
            .take()
            .ok_or_else(|| AbilityError::AlreadyStarted(self.name().to_string()))?;
        self.launched = true;
        self.running.store(true, Ordering::SeqCst);

        let name = self.name().to_string();
        let ctx = AbilityContext::new(
            name.clone(),
            self.opts.clone(),
            PipeSet::new(&name, std::mem::take(&mut self.in_pipes)),
            std::mem::take(&mut self.out_pipes),
            self.cancel.clone(),
            self.resolver.clone(),
            self.deps.clone(),
            params,
        );
        let running = self.running.clone();
        let result = self.result.clone();

        match self.flavor {
            Flavor::Inline => {
                run_main(ability, ctx, running, result).await;
            }
            Flavor::Task => {
                debug!(target: "weaver::ability", ability = %name, "spawning worker");
                self.worker = Some(tokio::spawn(run_main(ability, ctx, running, result)));
            }
        }
        Ok(())
    }

    /// Requests a cooperative stop; idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
        debug!(target: "weaver::ability", ability = %self.name(), "stop notified");
    }

    /// Waits for the worker to finish, up to `timeout` when one is given.
    /// Returns true once the worker has exited. Errors inside `main` are
    /// not re-raised here.
    pub async fn join(&mut self, timeout: Option<Duration>) -> bool {
        let Some(mut worker) = self.worker.take() else {
            return true;
        };
        match timeout {
            None => {
                let _ = (&mut worker).await;
                true
            }
            Some(duration) => {
                if tokio::time::timeout(duration, &mut worker).await.is_ok() {
                    true
                } else {
                    self.worker = Some(worker);
                    false
                }
            }
        }
    }

    /// True when a stop was requested or the worker is no longer alive.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || !self.running.load(Ordering::SeqCst)
    }

    /// True while the worker (or inline `main`) is executing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The value `main` returned, once the instance has stopped. Absent
    /// while running and after a failed run.
    pub fn result(&self) -> Option<OptionValue> {
        self.result
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Missing-requirement messages of this instance alone.
    pub fn requirements(&self) -> Vec<String> {
        self.requirements.clone()
    }

    /// Collects missing-requirement messages over the whole dependency
    /// closure, deduplicated. Callers must present these before `start`.
    pub fn check_preconditions(&self) -> Result<Vec<String>, AbilityError> {
        let mut messages: BTreeSet<String> = self.requirements.iter().cloned().collect();
        let mut seen: HashSet<String> = HashSet::from([self.name().to_string()]);
        let mut stack: Vec<Dependency> = self.deps.clone();
        while let Some(dep) = stack.pop() {
            let target = dep.target()?;
            if !seen.insert(target.ability.clone()) {
                continue;
            }
            let instance = self.resolver.resolve(&target.package, &target.ability)?;
            messages.extend(instance.requirements());
            stack.extend(instance.dependencies().iter().cloned());
        }
        Ok(messages.into_iter().collect())
    }
}

/// `a | b` wires a new pipe from `a` to `b` and yields `b`, so chains read
/// left to right: `&mut src | &mut filter | &mut sink`.
impl<'b> std::ops::BitOr<&'b mut AbilityHandle> for &mut AbilityHandle {
    type Output = &'b mut AbilityHandle;

    fn bitor(self, rhs: &'b mut AbilityHandle) -> &'b mut AbilityHandle {
        self.pipe_into(rhs);
        rhs
    }
}

async fn run_main(
    mut ability: Box<dyn Ability>,
    mut ctx: AbilityContext,
    running: Arc<AtomicBool>,
    result: Arc<Mutex<Option<OptionValue>>>,
) {
    let name = ctx.name().to_string();
    debug!(target: "weaver::ability", ability = %name, "starting main");
    match ability.main(&mut ctx).await {
        Ok(value) => {
            *result
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
        }
        Err(err) => {
            warn!(target: "weaver::ability", ability = %name, %err, "main exited with an error");
        }
    }
    ctx.teardown();
    running.store(false, Ordering::SeqCst);
    debug!(target: "weaver::ability", ability = %name, "end of main");
}
