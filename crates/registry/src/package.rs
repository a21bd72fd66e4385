use std::collections::{HashMap, HashSet};

use weaver_ability::{Ability, AbilityType};
use weaver_options::OptionValue;

use crate::RegistryError;

/// Constructs a fresh instance of one exported ability.
pub type AbilityBuilder = fn() -> Box<dyn Ability>;

/// Produces a package's exported-ability registry.
pub type PackageInit = fn() -> Vec<AbilityDecl>;

/// One exported ability of a package.
#[derive(Clone)]
pub struct AbilityDecl {
    /// The ability name, unique within the package.
    pub name: &'static str,
    /// STANDALONE or COMPONENT.
    pub kind: AbilityType,
    /// Instance constructor.
    pub build: AbilityBuilder,
}

impl std::fmt::Debug for AbilityDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbilityDecl")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A loaded ability package: its exported registry plus the caller-supplied
/// option defaults applied to every instance it hands out.
#[derive(Debug)]
pub struct Package {
    path: String,
    init: PackageInit,
    decls: Vec<AbilityDecl>,
    defaults: HashMap<String, OptionValue>,
}

impl Package {
    /// Builds the package registered under `path` by reading its exported
    /// registry once.
    pub fn new(path: &str, init: PackageInit) -> Self {
        Self {
            path: path.to_string(),
            init,
            decls: init(),
            defaults: HashMap::new(),
        }
    }

    /// The path the package is registered under.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Re-reads the exported registry.
    pub fn reload(&mut self) {
        self.decls = (self.init)();
    }

    /// Names of every exported ability.
    pub fn exported(&self) -> Vec<&'static str> {
        self.decls.iter().map(|d| d.name).collect()
    }

    /// Names of the user-runnable subset.
    pub fn standalone(&self) -> Vec<&'static str> {
        self.decls
            .iter()
            .filter(|d| d.kind == AbilityType::Standalone)
            .map(|d| d.name)
            .collect()
    }

    /// The declaration of an exported ability, if any.
    pub fn decl(&self, name: &str) -> Option<&AbilityDecl> {
        self.decls.iter().find(|d| d.name == name)
    }

    /// Option names declared by at least one exported ability.
    fn known_options(&self) -> HashSet<String> {
        self.decls
            .iter()
            .flat_map(|d| (d.build)().option_list())
            .map(|spec| spec.name().to_string())
            .collect()
    }

    /// Registers defaults applied to every instance handed out; names that
    /// no exported ability declares are rejected.
    pub fn set_default_options(
        &mut self,
        defaults: HashMap<String, OptionValue>,
    ) -> Result<(), RegistryError> {
        let known = self.known_options();
        let mut unknown: Vec<&str> = defaults
            .keys()
            .filter(|k| !known.contains(*k))
            .map(|k| k.as_str())
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(RegistryError::UnknownOptions(unknown.join(", ")));
        }
        self.defaults = defaults;
        Ok(())
    }

    /// The registered package-wide defaults.
    pub fn defaults(&self) -> &HashMap<String, OptionValue> {
        &self.defaults
    }
}
