//! # Module registry.
//!
//! The [`Registry`] is built once at wiring time and then handed to the
//! orchestrator behind an `Arc`. It holds:
//! - module descriptors (name → factory, visibility), in registration order;
//! - the static dependency table (`module → [dependency, ...]`);
//! - conditional-module rules (`module` gated by a feature flag).
//!
//! ## Rules
//! - Registration never fails; duplicate names are recorded and rejected at `init`.
//! - `add_dependency` rejects self-dependency immediately; every other check
//!   (unknown names, cycles) runs lazily during target resolution.
//! - Duplicate edges are ignored.

use std::collections::HashMap;
use std::fmt;

use crate::error::{ConfigError, UnitError};
use crate::units::UnitRef;

/// Constructor of a module's unit. Invoked at most once per `init`.
pub type Factory = Box<dyn Fn() -> Result<UnitRef, UnitError> + Send + Sync>;

/// Whether a module may be requested as a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Can be requested directly.
    #[default]
    Public,
    /// Only reachable as a dependency of another module.
    Invisible,
}

/// A registered module.
pub struct ModuleDescriptor {
    name: String,
    factory: Factory,
    visibility: Visibility,
}

impl ModuleDescriptor {
    /// Module name (unique key).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module visibility.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Invokes the factory.
    pub(crate) fn build(&self) -> Result<UnitRef, UnitError> {
        (self.factory)()
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .finish_non_exhaustive()
    }
}

/// Module gated by a feature flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalModule {
    /// Gated module.
    pub module: String,
    /// Flag that must be enabled for the module to run.
    pub flag: String,
}

/// Registry of modules and their dependency table.
///
/// # Example
/// ```
/// use modvisor::{IdleUnit, Registry};
///
/// let mut reg = Registry::new();
/// reg.register_module("server", || Ok(IdleUnit::arc()))
///     .register_invisible_module("store", || Ok(IdleUnit::arc()));
/// reg.add_dependency("server", ["store"]).unwrap();
///
/// assert_eq!(reg.dependencies_for("server"), ["store".to_string()]);
/// assert_eq!(reg.visible_module_names(), vec!["server"]);
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    modules: Vec<ModuleDescriptor>,
    index: HashMap<String, usize>,
    duplicates: Vec<String>,
    deps: HashMap<String, Vec<String>>,
    conditionals: Vec<ConditionalModule>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a public module.
    pub fn register_module<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Result<UnitRef, UnitError> + Send + Sync + 'static,
    {
        self.insert(name.into(), Box::new(factory), Visibility::Public)
    }

    /// Registers an invisible module.
    ///
    /// Invisible modules are not visible to the user and are intended to be used as dependencies.
    pub fn register_invisible_module<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Result<UnitRef, UnitError> + Send + Sync + 'static,
    {
        self.insert(name.into(), Box::new(factory), Visibility::Invisible)
    }

    fn insert(&mut self, name: String, factory: Factory, visibility: Visibility) -> &mut Self {
        if self.index.contains_key(&name) {
            if !self.duplicates.contains(&name) {
                self.duplicates.push(name);
            }
            return self;
        }
        self.index.insert(name.clone(), self.modules.len());
        self.modules.push(ModuleDescriptor {
            name,
            factory,
            visibility,
        });
        self
    }

    /// Declares that `module` depends on every name in `deps`.
    ///
    /// Edges accumulate across calls; repeated edges are ignored. Fails without
    /// recording anything if `module` lists itself.
    pub fn add_dependency<I, S>(
        &mut self,
        module: impl Into<String>,
        deps: I,
    ) -> Result<&mut Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let module = module.into();
        let deps: Vec<String> = deps.into_iter().map(Into::into).collect();
        if deps.iter().any(|d| *d == module) {
            return Err(ConfigError::SelfDependency { module });
        }

        let edges = self.deps.entry(module).or_default();
        for dep in deps {
            if !edges.contains(&dep) {
                edges.push(dep);
            }
        }
        Ok(self)
    }

    /// Gates `module` behind feature `flag`.
    ///
    /// When the flag is enabled the module is added to the targets; when it is
    /// disabled, requesting the module (directly or through a dependency) fails `init`.
    pub fn add_conditional(&mut self, module: impl Into<String>, flag: impl Into<String>) -> &mut Self {
        self.conditionals.push(ConditionalModule {
            module: module.into(),
            flag: flag.into(),
        });
        self
    }

    /// Returns true if `name` is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns the descriptor for `name`.
    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.index.get(name).map(|&i| &self.modules[i])
    }

    /// Returns the visibility of `name`, if registered.
    pub fn visibility(&self, name: &str) -> Option<Visibility> {
        self.get(name).map(ModuleDescriptor::visibility)
    }

    /// Declared direct dependencies of `name` (empty if none).
    pub fn dependencies_for(&self, name: &str) -> &[String] {
        self.deps.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All module names in registration order.
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Public module names in registration order.
    pub fn visible_module_names(&self) -> Vec<&str> {
        self.modules
            .iter()
            .filter(|m| m.visibility == Visibility::Public)
            .map(|m| m.name())
            .collect()
    }

    /// Conditional-module rules in declaration order.
    pub fn conditionals(&self) -> &[ConditionalModule] {
        &self.conditionals
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True if no module is registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Modules with declared dependencies, sorted by name.
    pub(crate) fn edge_sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self.deps.keys().map(String::as_str).collect();
        sources.sort_unstable();
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::IdleUnit;

    fn idle() -> Result<UnitRef, UnitError> {
        Ok(IdleUnit::arc())
    }

    #[test]
    fn test_registration_order_is_kept() {
        let mut reg = Registry::new();
        reg.register_module("c", idle)
            .register_module("a", idle)
            .register_invisible_module("b", idle);

        assert_eq!(reg.module_names(), vec!["c", "a", "b"]);
        assert_eq!(reg.visible_module_names(), vec!["c", "a"]);
        assert_eq!(reg.visibility("b"), Some(Visibility::Invisible));
        assert_eq!(reg.visibility("zzz"), None);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_duplicate_registration_is_recorded() {
        let mut reg = Registry::new();
        reg.register_module("a", idle)
            .register_module("a", idle)
            .register_invisible_module("a", idle);

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.duplicates(), ["a".to_string()]);
        assert_eq!(reg.visibility("a"), Some(Visibility::Public));
    }

    #[test]
    fn test_duplicate_edges_are_ignored() {
        let mut reg = Registry::new();
        reg.add_dependency("b", ["a"]).unwrap();
        reg.add_dependency("b", ["a", "c"]).unwrap();

        assert_eq!(reg.dependencies_for("b"), ["a".to_string(), "c".to_string()]);
        assert!(reg.dependencies_for("a").is_empty());
    }

    #[test]
    fn test_self_dependency_is_rejected() {
        let mut reg = Registry::new();
        let err = reg.add_dependency("a", ["b", "a"]).unwrap_err();

        assert_eq!(err, ConfigError::SelfDependency { module: "a".into() });
        assert!(reg.dependencies_for("a").is_empty());
    }

    #[test]
    fn test_edge_sources_sorted() {
        let mut reg = Registry::new();
        reg.add_dependency("z", ["a"]).unwrap();
        reg.add_dependency("m", ["a"]).unwrap();
        assert_eq!(reg.edge_sources(), vec!["m", "z"]);
    }
}
