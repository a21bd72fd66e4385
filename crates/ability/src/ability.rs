use async_trait::async_trait;
use weaver_options::{OptionSpec, OptionValue};

use crate::{AbilityContext, AbilityError, AbilityInfo, Dependency};

/// How an ability's `main` is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flavor {
    /// `start` runs `main` in the calling context and returns after it
    /// completes.
    Inline,
    /// `start` spawns a worker task and returns immediately.
    #[default]
    Task,
}

/// A reusable network task with typed options and metadata.
///
/// Implementations describe themselves through [`AbilityInfo`], declare
/// their parameters as [`OptionSpec`]s and their collaborators as
/// [`Dependency`] entries, and do their work in `main`. All interaction
/// with the outside world goes through the [`AbilityContext`]: option
/// access, pipe I/O, dependency resolution and the stop signal.
#[async_trait]
pub trait Ability: Send + 'static {
    /// The ability metadata.
    fn info(&self) -> AbilityInfo;

    /// The declared parameters, in display order.
    fn option_list(&self) -> Vec<OptionSpec> {
        Vec::new()
    }

    /// The declared collaborators.
    fn dependencies(&self) -> Vec<Dependency> {
        Vec::new()
    }

    /// Missing-requirement messages for this ability alone; the runtime
    /// aggregates them over the dependency closure.
    fn requirements(&self) -> Vec<String> {
        Vec::new()
    }

    /// Scheduling flavor; concurrent by default.
    fn flavor(&self) -> Flavor {
        Flavor::Task
    }

    /// The ability body. Runs at most once per instance; its return value
    /// is published through the handle once the instance has stopped.
    /// Errors are recorded as a failed run, not propagated to `join`.
    async fn main(
        &mut self,
        ctx: &mut AbilityContext,
    ) -> Result<Option<OptionValue>, AbilityError>;
}
