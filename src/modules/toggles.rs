//! # Feature-flag predicate consumed by target resolution.
//!
//! The orchestrator never evaluates flags itself; it asks a [`FeatureToggles`]
//! implementation, and only for flags named by conditional-module rules.

use std::collections::HashSet;

/// Boolean feature-flag predicate.
pub trait FeatureToggles: Send + Sync + 'static {
    /// Returns true if `flag` is enabled.
    fn is_enabled(&self, flag: &str) -> bool;
}

impl<F> FeatureToggles for F
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    fn is_enabled(&self, flag: &str) -> bool {
        self(flag)
    }
}

/// Fixed set of enabled flags. The default value has every flag disabled.
///
/// # Example
/// ```
/// use modvisor::{FeatureToggles, StaticToggles};
///
/// let toggles = StaticToggles::new(["apiServer"]);
/// assert!(toggles.is_enabled("apiServer"));
/// assert!(!toggles.is_enabled("other"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticToggles {
    enabled: HashSet<String>,
}

impl StaticToggles {
    /// Creates a set with the given flags enabled.
    pub fn new<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: flags.into_iter().map(Into::into).collect(),
        }
    }

    /// Enables `flag`.
    pub fn enable(mut self, flag: impl Into<String>) -> Self {
        self.enabled.insert(flag.into());
        self
    }
}

impl FeatureToggles for StaticToggles {
    fn is_enabled(&self, flag: &str) -> bool {
        self.enabled.contains(flag)
    }
}
