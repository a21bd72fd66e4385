use thiserror::Error;
use weaver_options::OptionError;

/// Errors surfaced by the ability runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AbilityError {
    /// An option name or value was rejected.
    #[error(transparent)]
    InvalidOption(#[from] OptionError),
    /// Options may only be mutated before `start`.
    #[error("options of `{0}` cannot be modified while it is running")]
    OptionsLocked(String),
    /// An instance runs at most once; re-running takes a fresh instance.
    #[error("ability `{0}` was already started")]
    AlreadyStarted(String),
    /// `recv`/`poll` on an ability without inbound pipes.
    #[error("no input pipe for this ability instance: {0}")]
    NoInputPipe(String),
    /// `send` on an ability without outbound pipes.
    #[error("no output pipe for this ability instance: {0}")]
    NoOutputPipe(String),
    /// A dependency alias is not declared by the ability.
    #[error("unknown dependency: {0}")]
    UnknownDependency(String),
    /// A package name could not be resolved.
    #[error("unknown package: {0}")]
    UnknownPackage(String),
    /// An ability name could not be resolved within its package.
    #[error("unknown ability: {0}")]
    UnknownAbility(String),
    /// A system operation (bridge, firewall, raw socket) failed.
    #[error("system operation failed: {0}")]
    FatalSystem(String),
}
