//! # Dependency graph over registered modules.
//!
//! Built from a [`Registry`] during target resolution. Nodes are indexed by
//! registration order, which is also the tie-breaker for topological ordering.
//!
//! ```text
//! Registry ──► DependencyGraph::build()
//!                ├─► every edge source/target registered?  (UnknownModule / UnknownDependency)
//!                └─► acyclic?                              (Cycle)
//!
//! closure(roots)          → every module reachable from roots
//! activation_order(roots) → closure, dependencies first, ties by registration order
//! ```

use std::collections::BTreeSet;

use crate::error::ConfigError;
use crate::modules::registry::Registry;

/// Validated DAG over module names.
#[derive(Debug)]
pub(crate) struct DependencyGraph<'a> {
    names: Vec<&'a str>,
    /// node → direct dependencies
    deps: Vec<Vec<usize>>,
    /// node → direct dependents
    dependents: Vec<Vec<usize>>,
}

impl<'a> DependencyGraph<'a> {
    /// Builds and validates the graph.
    pub(crate) fn build(registry: &'a Registry) -> Result<Self, ConfigError> {
        let names = registry.module_names();
        let mut deps = vec![Vec::new(); names.len()];
        let mut dependents = vec![Vec::new(); names.len()];

        for source in registry.edge_sources() {
            let from = registry
                .position(source)
                .ok_or_else(|| ConfigError::UnknownModule {
                    module: source.to_string(),
                })?;
            for dep in registry.dependencies_for(source) {
                let to = registry
                    .position(dep)
                    .ok_or_else(|| ConfigError::UnknownDependency {
                        module: source.to_string(),
                        dependency: dep.clone(),
                    })?;
                deps[from].push(to);
                dependents[to].push(from);
            }
        }

        let graph = Self {
            names,
            deps,
            dependents,
        };
        if let Some(path) = graph.find_cycle() {
            return Err(ConfigError::Cycle {
                path: path.into_iter().map(|i| graph.names[i].to_string()).collect(),
            });
        }
        Ok(graph)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| *n == name)
    }

    /// Depth-first search for a back edge; returns the cycle with its first node repeated at the end.
    fn find_cycle(&self) -> Option<Vec<usize>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            OnPath,
            Done,
        }

        let mut marks = vec![Mark::New; self.names.len()];
        for root in 0..self.names.len() {
            if marks[root] != Mark::New {
                continue;
            }
            // (node, next edge to visit)
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            marks[root] = Mark::OnPath;

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                if let Some(&next) = self.deps[node].get(top.1) {
                    top.1 += 1;
                    match marks[next] {
                        Mark::New => {
                            marks[next] = Mark::OnPath;
                            stack.push((next, 0));
                        }
                        Mark::OnPath => {
                            let start = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                            let mut path: Vec<usize> = stack[start..].iter().map(|(n, _)| *n).collect();
                            path.push(next);
                            return Some(path);
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
        None
    }

    /// Nodes reachable from `roots` (roots included).
    fn reachable(&self, roots: impl IntoIterator<Item = usize>) -> Vec<bool> {
        let mut seen = vec![false; self.names.len()];
        let mut stack: Vec<usize> = roots.into_iter().collect();
        while let Some(node) = stack.pop() {
            if std::mem::replace(&mut seen[node], true) {
                continue;
            }
            stack.extend(self.deps[node].iter().copied().filter(|d| !seen[*d]));
        }
        seen
    }

    /// True if `to` is reachable from `from` through at least one edge or is `from` itself.
    pub(crate) fn reaches(&self, from: &str, to: &str) -> bool {
        match (self.index_of(from), self.index_of(to)) {
            (Some(f), Some(t)) => self.reachable([f])[t],
            _ => false,
        }
    }

    /// Transitive closure of `roots`, ordered so that dependencies precede
    /// dependents; ties are broken by registration order.
    ///
    /// Unknown root names are ignored (targets are validated before this call).
    pub(crate) fn activation_order(&self, roots: &[String]) -> Vec<&'a str> {
        let members = self.reachable(roots.iter().filter_map(|r| self.index_of(r)));

        let mut pending: Vec<usize> = (0..self.names.len())
            .map(|n| self.deps[n].iter().filter(|d| members[**d]).count())
            .collect();
        let mut ready: BTreeSet<usize> = (0..self.names.len())
            .filter(|n| members[*n] && pending[*n] == 0)
            .collect();

        let mut order = Vec::with_capacity(members.iter().filter(|m| **m).count());
        while let Some(node) = ready.pop_first() {
            order.push(self.names[node]);
            for &dependent in &self.dependents[node] {
                if !members[dependent] {
                    continue;
                }
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnitError;
    use crate::units::{IdleUnit, UnitRef};

    fn idle() -> Result<UnitRef, UnitError> {
        Ok(IdleUnit::arc())
    }

    fn registry(names: &[&str], edges: &[(&str, &[&str])]) -> Registry {
        let mut reg = Registry::new();
        for name in names {
            reg.register_module(*name, idle);
        }
        for (module, deps) in edges {
            reg.add_dependency(*module, deps.iter().copied()).unwrap();
        }
        reg
    }

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_chain_order() {
        let reg = registry(&["A", "B", "C"], &[("B", &["A"]), ("C", &["B"])]);
        let graph = DependencyGraph::build(&reg).unwrap();

        assert_eq!(graph.activation_order(&targets(&["C"])), vec!["A", "B", "C"]);
        assert_eq!(graph.activation_order(&targets(&["B"])), vec!["A", "B"]);
        assert!(graph.activation_order(&[]).is_empty());
    }

    #[test]
    fn test_ties_follow_registration_order() {
        // x is registered after top, so it is still the last leaf
        let reg = registry(
            &["z", "y", "top", "x"],
            &[("top", &["x", "y", "z"])],
        );
        let graph = DependencyGraph::build(&reg).unwrap();

        assert_eq!(
            graph.activation_order(&targets(&["top"])),
            vec!["z", "y", "x", "top"]
        );
    }

    #[test]
    fn test_diamond_each_module_once() {
        let reg = registry(
            &["base", "left", "right", "app"],
            &[("left", &["base"]), ("right", &["base"]), ("app", &["left", "right"])],
        );
        let graph = DependencyGraph::build(&reg).unwrap();

        assert_eq!(
            graph.activation_order(&targets(&["app", "left"])),
            vec!["base", "left", "right", "app"]
        );
    }

    #[test]
    fn test_cycle_is_reported_with_path() {
        let reg = registry(
            &["a", "b", "c"],
            &[("a", &["b"]), ("b", &["c"]), ("c", &["a"])],
        );
        let err = DependencyGraph::build(&reg).unwrap_err();

        match err {
            ConfigError::Cycle { path } => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_dependency() {
        let reg = registry(&["a"], &[("a", &["ghost"])]);
        let err = DependencyGraph::build(&reg).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownDependency {
                module: "a".into(),
                dependency: "ghost".into()
            }
        );
    }

    #[test]
    fn test_edges_on_unregistered_module() {
        let reg = registry(&["a"], &[("ghost", &["a"])]);
        let err = DependencyGraph::build(&reg).unwrap_err();
        assert_eq!(err, ConfigError::UnknownModule { module: "ghost".into() });
    }

    #[test]
    fn test_reaches_is_transitive() {
        let reg = registry(&["A", "B", "C"], &[("B", &["A"]), ("C", &["B"])]);
        let graph = DependencyGraph::build(&reg).unwrap();

        assert!(graph.reaches("C", "A"));
        assert!(graph.reaches("C", "C"));
        assert!(!graph.reaches("A", "C"));
        assert!(!graph.reaches("A", "nope"));
    }
}
