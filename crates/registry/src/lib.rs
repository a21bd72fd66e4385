//! Ability package registry and module factory.
//!
//! A package is a named set of exported ability constructors, registered at
//! process start through [`ModuleFactory::install`]. The factory resolves
//! `(package, ability)` pairs into fresh, configured [`AbilityHandle`]s and
//! implements [`DependencyResolver`] so running abilities can obtain their
//! collaborators the same way the front-end does.

mod error;
pub use error::RegistryError;

mod factory;
pub use factory::ModuleFactory;

mod package;
pub use package::{AbilityBuilder, AbilityDecl, Package, PackageInit};
