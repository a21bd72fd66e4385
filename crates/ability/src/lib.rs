//! Ability lifecycle and pipe composition for weaver.
//!
//! An ability is a reusable network task: typed options, metadata, and a
//! `main` routine. Abilities run as cooperative tokio tasks, talk to each
//! other over ordered point-to-point [`pipe`]s, and may start, wire and stop
//! other abilities resolved through a [`DependencyResolver`].

mod ability;
pub use ability::{Ability, Flavor};

mod context;
pub use context::{AbilityContext, ParamValue, Params};

mod dependency;
pub use dependency::{
    classic_target, Dependency, DependencyResolver, DependencyTarget, NullResolver,
};

mod error;
pub use error::AbilityError;

mod handle;
pub use handle::AbilityHandle;

mod info;
pub use info::{AbilityInfo, AbilityType, Reliability, Tag};

pub mod opt;

mod options;
pub use options::OptionSet;

mod pipe;
pub use pipe::{pipe, Message, PipeReader, PipeSet, PipeWriter};
