use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;
use weaver_ability::{AbilityError, AbilityHandle, DependencyResolver};
use weaver_options::OptionValue;

use crate::{Package, RegistryError};

/// Hands out fresh ability instances from the installed packages.
///
/// The factory owns the process-wide package registry; packages are
/// installed once at startup and may be reloaded between runs.
#[derive(Debug, Default)]
pub struct ModuleFactory {
    packages: RwLock<HashMap<String, Package>>,
}

impl ModuleFactory {
    /// An empty factory.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a package under its path, replacing any previous one.
    pub fn install(&self, package: Package) {
        debug!(
            target: "weaver::registry",
            package = %package.path(),
            exported = package.exported().len(),
            "installing package"
        );
        self.packages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(package.path().to_string(), package);
    }

    /// Returns the exported ability names of the package at `path`; a
    /// missing or empty registry is a bad package.
    pub fn load(&self, path: &str) -> Result<Vec<String>, RegistryError> {
        let packages = self
            .packages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let package = packages
            .get(path)
            .ok_or_else(|| RegistryError::BadPackage(path.to_string()))?;
        let exported = package.exported();
        if exported.is_empty() {
            return Err(RegistryError::BadPackage(path.to_string()));
        }
        Ok(exported.into_iter().map(|n| n.to_string()).collect())
    }

    /// Re-reads the exported registry of the package at `path`.
    pub fn reload(&self, path: &str) -> Result<(), RegistryError> {
        let mut packages = self
            .packages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let package = packages
            .get_mut(path)
            .ok_or_else(|| RegistryError::BadPackage(path.to_string()))?;
        package.reload();
        Ok(())
    }

    /// The user-runnable ability names of a package.
    pub fn standalone_abilities(&self, path: &str) -> Result<Vec<String>, RegistryError> {
        let packages = self
            .packages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let package = packages
            .get(path)
            .ok_or_else(|| RegistryError::BadPackage(path.to_string()))?;
        Ok(package.standalone().into_iter().map(|n| n.to_string()).collect())
    }

    /// Registers package-wide option defaults.
    pub fn set_default_options(
        &self,
        path: &str,
        defaults: HashMap<String, OptionValue>,
    ) -> Result<(), RegistryError> {
        let mut packages = self
            .packages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let package = packages
            .get_mut(path)
            .ok_or_else(|| RegistryError::BadPackage(path.to_string()))?;
        package.set_default_options(defaults)
    }

    /// Builds a configured instance of `name` from `package`. Unknown
    /// ability names return `None`; overrides are filtered down to the
    /// subset matching the ability's declared options.
    pub fn get_ability(
        self: &Arc<Self>,
        package: &str,
        name: &str,
        overrides: &HashMap<String, OptionValue>,
    ) -> Result<Option<AbilityHandle>, AbilityError> {
        let (ability, defaults) = {
            let packages = self
                .packages
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let pkg = packages
                .get(package)
                .ok_or_else(|| AbilityError::UnknownPackage(package.to_string()))?;
            let Some(decl) = pkg.decl(name) else {
                return Ok(None);
            };
            ((decl.build)(), pkg.defaults().clone())
        };

        let declared: Vec<String> = ability
            .option_list()
            .iter()
            .map(|spec| spec.name().to_string())
            .collect();
        let matching = |map: &HashMap<String, OptionValue>| {
            map.iter()
                .filter(|(k, _)| declared.iter().any(|d| d == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<HashMap<_, _>>()
        };

        let resolver: Arc<dyn DependencyResolver> = Arc::new(FactoryResolver(self.clone()));
        let mut handle = AbilityHandle::with_defaults(ability, resolver, &matching(&defaults))?;
        for (key, value) in matching(overrides) {
            handle.set_opt(&key, value)?;
        }
        Ok(Some(handle))
    }
}

struct FactoryResolver(Arc<ModuleFactory>);

impl DependencyResolver for FactoryResolver {
    fn resolve(&self, package: &str, ability: &str) -> Result<AbilityHandle, AbilityError> {
        self.0
            .get_ability(package, ability, &HashMap::new())?
            .ok_or_else(|| AbilityError::UnknownAbility(ability.to_string()))
    }
}
