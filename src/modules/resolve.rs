//! # Target resolution and instantiation.
//!
//! Turns the requested target names into an ordered list of units.
//!
//! ```text
//! requested ──► validate registry   (duplicates, unknown edges, cycles)
//!           ──► validate targets    (unknown, invisible)
//!           ──► conditional rules   (flag on → add module; flag off → reject direct or transitive use)
//!           ──► closure + order     (dependencies first, ties by registration order)
//!           ──► instantiate         (factories called once each, strictly in order)
//! ```
//!
//! Every check runs before the first factory is invoked, so a configuration
//! error has no side effects.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ConfigError, RuntimeError};
use crate::modules::{
    graph::DependencyGraph,
    registry::{Registry, Visibility},
    toggles::FeatureToggles,
};
use crate::units::UnitRef;

/// Outcome of resolution: the adjusted target set and the activation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Requested targets after conditional inclusion (deduplicated, request order).
    pub targets: Vec<String>,
    /// Transitive closure of `targets`, dependencies first.
    pub order: Vec<String>,
}

/// Resolves targets against a registry.
pub(crate) struct TargetResolver<'a> {
    registry: &'a Registry,
    toggles: &'a dyn FeatureToggles,
}

impl<'a> TargetResolver<'a> {
    pub(crate) fn new(registry: &'a Registry, toggles: &'a dyn FeatureToggles) -> Self {
        Self { registry, toggles }
    }

    /// Validates wiring and computes the activation order. Calls no factory.
    pub(crate) fn resolve(&self, requested: &[String]) -> Result<Resolution, ConfigError> {
        if let Some(module) = self.registry.duplicates().first() {
            return Err(ConfigError::DuplicateModule {
                module: module.clone(),
            });
        }
        let graph = DependencyGraph::build(self.registry)?;

        let mut targets: Vec<String> = Vec::with_capacity(requested.len());
        for name in requested {
            match self.registry.visibility(name) {
                None => {
                    return Err(ConfigError::UnknownTarget {
                        module: name.clone(),
                    });
                }
                Some(Visibility::Invisible) => {
                    return Err(ConfigError::InvisibleTarget {
                        module: name.clone(),
                    });
                }
                Some(Visibility::Public) => {}
            }
            if !targets.contains(name) {
                targets.push(name.clone());
            }
        }

        self.apply_conditionals(&graph, &mut targets)?;

        let order = graph
            .activation_order(&targets)
            .into_iter()
            .map(str::to_string)
            .collect();
        Ok(Resolution { targets, order })
    }

    fn apply_conditionals(
        &self,
        graph: &DependencyGraph<'_>,
        targets: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        let (enabled, disabled): (Vec<_>, Vec<_>) = self
            .registry
            .conditionals()
            .iter()
            .partition(|rule| self.toggles.is_enabled(&rule.flag));

        for rule in enabled {
            if !self.registry.is_registered(&rule.module) {
                return Err(ConfigError::UnknownTarget {
                    module: rule.module.clone(),
                });
            }
            if !targets.contains(&rule.module) {
                debug!(module = %rule.module, flag = %rule.flag, "adding gated module to targets");
                targets.push(rule.module.clone());
            }
        }

        // checked against the complete target set, gated additions included
        for rule in disabled {
            if targets.contains(&rule.module) {
                return Err(ConfigError::ConditionalDisabled {
                    flag: rule.flag.clone(),
                    module: rule.module.clone(),
                });
            }
            if let Some(target) = targets.iter().find(|t| graph.reaches(t, &rule.module)) {
                return Err(ConfigError::ConditionalDependency {
                    flag: rule.flag.clone(),
                    target: target.clone(),
                    module: rule.module.clone(),
                });
            }
        }
        Ok(())
    }

    /// Invokes each factory once, in activation order.
    ///
    /// The first factory error (or cancellation of `ctx`) aborts; units built so
    /// far are dropped without being started.
    pub(crate) fn instantiate(
        &self,
        resolution: &Resolution,
        ctx: &CancellationToken,
    ) -> Result<Vec<(String, UnitRef)>, RuntimeError> {
        let mut units = Vec::with_capacity(resolution.order.len());
        for name in &resolution.order {
            if ctx.is_cancelled() {
                return Err(RuntimeError::Canceled);
            }
            let descriptor = self
                .registry
                .get(name)
                .ok_or_else(|| ConfigError::UnknownTarget {
                    module: name.clone(),
                })?;
            let unit = descriptor.build().map_err(|cause| RuntimeError::Factory {
                module: name.clone(),
                cause,
            })?;
            debug!(module = %name, "module instantiated");
            units.push((name.clone(), unit));
        }
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::UnitError;
    use crate::modules::toggles::StaticToggles;
    use crate::units::IdleUnit;

    type Calls = Arc<Mutex<Vec<String>>>;

    fn recorded(reg: &mut Registry, calls: &Calls, name: &str) {
        let calls = Arc::clone(calls);
        let owned = name.to_string();
        reg.register_module(name, move || {
            calls.lock().unwrap().push(owned.clone());
            Ok(IdleUnit::arc())
        });
    }

    fn abc(calls: &Calls) -> Registry {
        let mut reg = Registry::new();
        recorded(&mut reg, calls, "A");
        recorded(&mut reg, calls, "B");
        recorded(&mut reg, calls, "C");
        reg.add_dependency("B", ["A"]).unwrap();
        reg.add_dependency("C", ["B"]).unwrap();
        reg
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_instantiates_closure_in_order() {
        let calls = Calls::default();
        let reg = abc(&calls);
        let toggles = StaticToggles::default();
        let resolver = TargetResolver::new(&reg, &toggles);

        let res = resolver.resolve(&names(&["C"])).unwrap();
        assert_eq!(res.targets, names(&["C"]));
        assert_eq!(res.order, names(&["A", "B", "C"]));

        let units = resolver.instantiate(&res, &CancellationToken::new()).unwrap();
        let built: Vec<&str> = units.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(built, vec!["A", "B", "C"]);
        assert_eq!(*calls.lock().unwrap(), names(&["A", "B", "C"]));
    }

    #[test]
    fn test_empty_request_is_empty_resolution() {
        let calls = Calls::default();
        let reg = abc(&calls);
        let toggles = StaticToggles::default();
        let resolver = TargetResolver::new(&reg, &toggles);

        let res = resolver.resolve(&[]).unwrap();
        assert_eq!(res, Resolution::default());
        assert!(resolver.instantiate(&res, &CancellationToken::new()).unwrap().is_empty());
    }

    #[test]
    fn test_cycle_fails_before_any_factory() {
        let calls = Calls::default();
        let mut reg = abc(&calls);
        reg.add_dependency("A", ["C"]).unwrap();
        let toggles = StaticToggles::default();

        let err = TargetResolver::new(&reg, &toggles)
            .resolve(&names(&["A"]))
            .unwrap_err();
        assert_eq!(err.as_label(), "config_cycle");
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invisible_and_unknown_targets() {
        let mut reg = Registry::new();
        reg.register_module("api", || Ok(IdleUnit::arc()))
            .register_invisible_module("store", || Ok(IdleUnit::arc()));
        reg.add_dependency("api", ["store"]).unwrap();
        let toggles = StaticToggles::default();
        let resolver = TargetResolver::new(&reg, &toggles);

        assert_eq!(
            resolver.resolve(&names(&["store"])).unwrap_err(),
            ConfigError::InvisibleTarget { module: "store".into() }
        );
        assert_eq!(
            resolver.resolve(&names(&["nope"])).unwrap_err(),
            ConfigError::UnknownTarget { module: "nope".into() }
        );
        assert_eq!(
            resolver.resolve(&names(&["api"])).unwrap().order,
            names(&["store", "api"])
        );
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let calls = Calls::default();
        let mut reg = abc(&calls);
        recorded(&mut reg, &calls, "B");
        let toggles = StaticToggles::default();

        assert_eq!(
            TargetResolver::new(&reg, &toggles)
                .resolve(&names(&["A"]))
                .unwrap_err(),
            ConfigError::DuplicateModule { module: "B".into() }
        );
    }

    #[test]
    fn test_gated_module_disabled() {
        let calls = Calls::default();
        let mut reg = abc(&calls);
        reg.add_conditional("A", "flagA");
        let toggles = StaticToggles::default();
        let resolver = TargetResolver::new(&reg, &toggles);

        assert_eq!(
            resolver.resolve(&names(&["A"])).unwrap_err(),
            ConfigError::ConditionalDisabled {
                flag: "flagA".into(),
                module: "A".into()
            }
        );
        assert_eq!(
            resolver.resolve(&names(&["C"])).unwrap_err(),
            ConfigError::ConditionalDependency {
                flag: "flagA".into(),
                target: "C".into(),
                module: "A".into()
            }
        );
        assert!(resolver.resolve(&[]).unwrap().order.is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_gated_module_enabled_is_added() {
        let calls = Calls::default();
        let mut reg = abc(&calls);
        reg.add_conditional("C", "flagC");
        let toggles = StaticToggles::new(["flagC"]);

        let res = TargetResolver::new(&reg, &toggles)
            .resolve(&names(&["A"]))
            .unwrap();
        assert_eq!(res.targets, names(&["A", "C"]));
        assert_eq!(res.order, names(&["A", "B", "C"]));
    }

    #[test]
    fn test_disabled_rule_sees_later_gated_additions() {
        let mut reg = Registry::new();
        reg.register_module("legacy", || Ok(IdleUnit::arc()))
            .register_module("api", || Ok(IdleUnit::arc()));
        reg.add_dependency("api", ["legacy"]).unwrap();
        reg.add_conditional("legacy", "legacyFlag");
        reg.add_conditional("api", "apiFlag");
        let toggles = StaticToggles::new(["apiFlag"]);

        assert_eq!(
            TargetResolver::new(&reg, &toggles).resolve(&[]).unwrap_err(),
            ConfigError::ConditionalDependency {
                flag: "legacyFlag".into(),
                target: "api".into(),
                module: "legacy".into()
            }
        );
    }

    #[test]
    fn test_factory_error_aborts() {
        let calls = Calls::default();
        let mut reg = Registry::new();
        recorded(&mut reg, &calls, "A");
        reg.register_module("B", || Err(UnitError::fail("no config")));
        recorded(&mut reg, &calls, "C");
        reg.add_dependency("C", ["B", "A"]).unwrap();
        let toggles = StaticToggles::default();
        let resolver = TargetResolver::new(&reg, &toggles);

        let res = resolver.resolve(&names(&["C"])).unwrap();
        let err = resolver
            .instantiate(&res, &CancellationToken::new())
            .err()
            .unwrap();

        assert_eq!(
            err,
            RuntimeError::Factory {
                module: "B".into(),
                cause: UnitError::fail("no config")
            }
        );
        assert_eq!(*calls.lock().unwrap(), names(&["A"]));
    }

    #[test]
    fn test_cancelled_context_stops_instantiation() {
        let calls = Calls::default();
        let reg = abc(&calls);
        let toggles = StaticToggles::default();
        let resolver = TargetResolver::new(&reg, &toggles);
        let ctx = CancellationToken::new();
        ctx.cancel();

        let res = resolver.resolve(&names(&["C"])).unwrap();
        assert_eq!(
            resolver.instantiate(&res, &ctx).err(),
            Some(RuntimeError::Canceled)
        );
        assert!(calls.lock().unwrap().is_empty());
    }
}
