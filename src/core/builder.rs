use std::sync::Arc;

use crate::{
    core::{NoopNotifier, OrchestratorConfig, ReadyNotifier},
    events::Bus,
    modules::{FeatureToggles, Registry, StaticToggles},
    subscribers::{Subscribe, SubscriberSet},
};
use super::orchestrator::Orchestrator;

/// Builder for constructing an [`Orchestrator`] with optional collaborators.
pub struct OrchestratorBuilder {
    cfg: OrchestratorConfig,
    registry: Arc<Registry>,
    toggles: Arc<dyn FeatureToggles>,
    notifier: Arc<dyn ReadyNotifier>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration and registry.
    ///
    /// Defaults: every feature flag disabled, no readiness notification, no subscribers.
    pub fn new(cfg: OrchestratorConfig, registry: Arc<Registry>) -> Self {
        Self {
            cfg,
            registry,
            toggles: Arc::new(StaticToggles::default()),
            notifier: Arc::new(NoopNotifier),
            subscribers: Vec::new(),
        }
    }

    /// Sets the feature-flag source consulted for gated modules.
    pub fn with_toggles(mut self, toggles: impl FeatureToggles) -> Self {
        self.toggles = Arc::new(toggles);
        self
    }

    /// Sets the readiness notifier called once all modules are healthy.
    pub fn with_notifier(mut self, notifier: impl ReadyNotifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (transitions, health, shutdown)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds and returns the Orchestrator instance.
    ///
    /// Spawns the subscriber workers, so it must be called from within a tokio runtime.
    pub fn build(self) -> Arc<Orchestrator> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));

        Arc::new(Orchestrator::new_internal(
            self.cfg,
            bus,
            subs,
            self.registry,
            self.toggles,
            self.notifier,
        ))
    }
}
