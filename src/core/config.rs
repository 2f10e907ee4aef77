//! # Global runtime configuration.
//!
//! Provides [`OrchestratorConfig`], centralized settings for the orchestrator.
//!
//! ## Sentinel values
//! - `grace = 0s` → shutdown waits without a time limit (still bounded by its context)
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

/// What happens to the other units when one unit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Failures are only detected at the next barrier (health wait or final
    /// scan); siblings keep running until the caller shuts down.
    #[default]
    Isolate,
    /// The orchestrator requests a stop of every unit as soon as any unit fails.
    StopAll,
}

/// Global configuration for the orchestrator.
///
/// ## Field semantics
/// - `targets`: modules requested for this run (before conditional adjustment)
/// - `grace`: Maximum wait for units to stop during shutdown (`0s` = no limit)
/// - `bus_capacity`: Event bus ring buffer size (min 1)
/// - `failure_policy`: blast radius of a single unit failure
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Requested module names.
    pub targets: Vec<String>,

    /// Maximum time `shutdown` waits for every unit to reach a terminal state.
    ///
    /// When exceeded, `shutdown` returns `RuntimeError::GraceExceeded` with the
    /// names of the stuck units. Units are never killed.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Subscribers that lag behind more than `bus_capacity` events skip older items.
    pub bus_capacity: usize,

    /// Failure containment policy.
    pub failure_policy: FailurePolicy,
}

impl OrchestratorConfig {
    /// Replaces the requested targets.
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the shutdown grace as an `Option`.
    ///
    /// - `None` → no limit
    /// - `Some(d)` → `shutdown` gives up after `d`
    #[inline]
    pub fn grace_limit(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

/// Splits a target list such as `"all, api-server  store"` into names.
///
/// Commas and whitespace both separate names; empty items are skipped.
pub fn parse_targets(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Default for OrchestratorConfig {
    /// Default configuration:
    ///
    /// - `targets = []` (idle run)
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    /// - `failure_policy = FailurePolicy::Isolate`
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
            failure_policy: FailurePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        assert_eq!(parse_targets("a, b  c,,d"), vec!["a", "b", "c", "d"]);
        assert!(parse_targets(" , ").is_empty());
    }

    #[test]
    fn test_sentinels() {
        let mut cfg = OrchestratorConfig::default();
        assert_eq!(cfg.grace_limit(), Some(Duration::from_secs(60)));
        cfg.grace = Duration::ZERO;
        cfg.bus_capacity = 0;
        assert_eq!(cfg.grace_limit(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn test_with_targets() {
        let cfg = OrchestratorConfig::default().with_targets(["a", "b"]);
        assert_eq!(cfg.targets, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cfg.failure_policy, FailurePolicy::Isolate);
    }
}
