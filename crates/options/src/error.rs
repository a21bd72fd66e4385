use thiserror::Error;

/// Errors reported by the option system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    /// The value does not satisfy the option's validity rules.
    #[error("invalid value for option `{name}`: {value}")]
    InvalidValue {
        /// Name of the option being set.
        name: String,
        /// Rendering of the rejected value.
        value: String,
    },
    /// The option name is not declared by the ability.
    #[error("unknown option: {0}")]
    UnknownOption(String),
    /// A lazy option sequence has been fully consumed.
    #[error("option sequence for `{0}` is exhausted")]
    EndOfSequence(String),
    /// A generator pattern (IP or MAC) could not be parsed.
    #[error("malformed generator pattern: {0}")]
    BadPattern(String),
    /// A choice option was declared with no permitted values.
    #[error("choice option `{0}` declared with an empty choice list")]
    EmptyChoices(String),
}
