use thiserror::Error;

/// Errors reported while loading or configuring packages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The package path is unknown or its exported-ability registry is
    /// missing or empty.
    #[error("bad package: {0}")]
    BadPackage(String),
    /// Package defaults name options no exported ability declares.
    #[error("unknown options: {0}")]
    UnknownOptions(String),
}
