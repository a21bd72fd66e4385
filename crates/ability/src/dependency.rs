//! Dependency declarations and their process-wide classic-name table.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::{AbilityError, AbilityHandle};

lazy_static! {
    /// Short names for well-known `(package, ability)` pairs.
    static ref CLASSIC: HashMap<&'static str, (&'static str, &'static str)> = {
        let mut table = HashMap::new();
        table.insert("mitm", ("base", "Message Interceptor"));
        table.insert("debug", ("base", "Debug Packets"));
        table.insert("sendraw", ("base", "Send Raw Frames"));
        table.insert("capture", ("base", "Sniff Frames"));
        table.insert("netfilter", ("base", "Netfilter Config"));
        table.insert("tcpclnt", ("base", "TCP Client"));
        table.insert("tcpsrv", ("base", "TCP Server"));
        table.insert("tlsclnt", ("base", "TLS Client"));
        table.insert("tlssrv", ("base", "TLS Server"));
        table.insert("echo", ("base", "Echo Server"));
        table.insert("pcapwriter", ("base", "Save to Pcap"));
        table.insert("pcapreader", ("base", "Read from Pcap"));
        table.insert("demux", ("base", "Demux"));
        table
    };
}

/// Resolves a classic short name to its package/ability pair.
pub fn classic_target(name: &str) -> Option<DependencyTarget> {
    CLASSIC.get(name).map(|(package, ability)| DependencyTarget {
        package: package.to_string(),
        ability: ability.to_string(),
    })
}

/// A resolved dependency destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyTarget {
    /// Package exporting the ability.
    pub package: String,
    /// Name of the ability within the package.
    pub ability: String,
}

/// One entry of an ability's dependency list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// A short name resolved through the classic table.
    Classic(&'static str),
    /// An explicit alias to a `(package, ability)` pair.
    Explicit {
        /// Alias used by `get_dependency`.
        alias: &'static str,
        /// Package exporting the ability.
        package: &'static str,
        /// Name of the ability within the package.
        ability: &'static str,
    },
}

impl Dependency {
    /// The alias this dependency is requested by.
    pub fn alias(&self) -> &str {
        match self {
            Self::Classic(name) => name,
            Self::Explicit { alias, .. } => alias,
        }
    }

    /// The package/ability pair this dependency points at.
    pub fn target(&self) -> Result<DependencyTarget, AbilityError> {
        match self {
            Self::Classic(name) => classic_target(name)
                .ok_or_else(|| AbilityError::UnknownDependency(name.to_string())),
            Self::Explicit {
                package, ability, ..
            } => Ok(DependencyTarget {
                package: package.to_string(),
                ability: ability.to_string(),
            }),
        }
    }
}

/// Hands out fresh, configured ability instances by name.
///
/// The module factory implements this; abilities only see the trait so the
/// runtime does not depend on how packages are stored.
pub trait DependencyResolver: Send + Sync {
    /// Builds a fresh instance of `ability` from `package`.
    fn resolve(&self, package: &str, ability: &str) -> Result<AbilityHandle, AbilityError>;
}

/// A resolver that knows no packages; for standalone handles and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResolver;

impl DependencyResolver for NullResolver {
    fn resolve(&self, package: &str, _ability: &str) -> Result<AbilityHandle, AbilityError> {
        Err(AbilityError::UnknownPackage(package.to_string()))
    }
}
