//! Error types used by the modvisor runtime, the module registry and units.
//!
//! This module defines three error enums:
//!
//! - [`ConfigError`] - invalid wiring detected while resolving targets (before any factory runs).
//! - [`UnitError`] - errors raised by a unit's factory or its start/run/stop phases.
//! - [`RuntimeError`] - the single aggregate error returned by `init`, `run` and `shutdown`.
//!
//! All types provide `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

use crate::units::Phase;

/// # Wiring errors raised during target resolution.
///
/// These are always detected during `init`, before the first factory executes,
/// and are fatal to startup.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The same module name was registered more than once.
    #[error("module {module:?} registered more than once")]
    DuplicateModule {
        /// Offending module name.
        module: String,
    },

    /// A module was declared as its own dependency.
    #[error("module {module:?} cannot depend on itself")]
    SelfDependency {
        /// Offending module name.
        module: String,
    },

    /// A dependency edge references a module that was never registered.
    #[error("module {module:?} depends on unregistered module {dependency:?}")]
    UnknownDependency {
        /// Module declaring the edge.
        module: String,
        /// Missing dependency name.
        dependency: String,
    },

    /// A dependency was declared for a module that was never registered.
    #[error("dependencies declared for unregistered module {module:?}")]
    UnknownModule {
        /// Unregistered module name.
        module: String,
    },

    /// A requested target is not a registered module.
    #[error("unrecognised module name {module:?}")]
    UnknownTarget {
        /// Requested name.
        module: String,
    },

    /// A requested target is registered as invisible and can only be pulled in as a dependency.
    #[error("module {module:?} is invisible and cannot be requested as a target")]
    InvisibleTarget {
        /// Requested name.
        module: String,
    },

    /// The dependency table contains a cycle.
    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle {
        /// Module names along the cycle; the first name is repeated at the end.
        path: Vec<String>,
    },

    /// A gated module was requested while its feature flag is disabled.
    #[error("feature flag {flag} is disabled, but target {module} is still enabled")]
    ConditionalDisabled {
        /// Feature flag guarding the module.
        flag: String,
        /// Gated module.
        module: String,
    },

    /// A requested target depends (transitively) on a gated module whose flag is disabled.
    #[error("feature flag {flag} is disabled, but target {target} is enabled with dependency on {module}")]
    ConditionalDependency {
        /// Feature flag guarding the module.
        flag: String,
        /// Requested target that pulls the gated module in.
        target: String,
        /// Gated module.
        module: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::DuplicateModule { .. } => "config_duplicate_module",
            ConfigError::SelfDependency { .. } => "config_self_dependency",
            ConfigError::UnknownDependency { .. } => "config_unknown_dependency",
            ConfigError::UnknownModule { .. } => "config_unknown_module",
            ConfigError::UnknownTarget { .. } => "config_unknown_target",
            ConfigError::InvisibleTarget { .. } => "config_invisible_target",
            ConfigError::Cycle { .. } => "config_cycle",
            ConfigError::ConditionalDisabled { .. } => "config_conditional_disabled",
            ConfigError::ConditionalDependency { .. } => "config_conditional_dependency",
        }
    }
}

/// # Errors produced by units.
///
/// Returned from module factories and from the `start`/`run`/`stop` phases of a
/// [`Unit`](crate::Unit). [`UnitError::StopProcess`] is the intentional-stop
/// sentinel: a unit returning it reaches `Failed`, but the failure is not
/// reported as an error by [`Orchestrator::run`](crate::Orchestrator::run).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    /// Deliberate request to stop the process; not a fault.
    #[error("stop process requested")]
    StopProcess,

    /// The unit observed cancellation of its context.
    #[error("context cancelled")]
    Canceled,

    /// Genuine failure.
    #[error("{error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },
}

impl UnitError {
    /// Shorthand for [`UnitError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        UnitError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use modvisor::UnitError;
    ///
    /// assert_eq!(UnitError::StopProcess.as_label(), "unit_stop_process");
    /// assert_eq!(UnitError::fail("boom").as_label(), "unit_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            UnitError::StopProcess => "unit_stop_process",
            UnitError::Canceled => "unit_canceled",
            UnitError::Fail { .. } => "unit_failed",
        }
    }

    /// True for the intentional-stop sentinel.
    pub fn is_stop_process(&self) -> bool {
        matches!(self, UnitError::StopProcess)
    }
}

/// # Errors produced by the orchestrator.
///
/// Every phase (`init`, `run`, `shutdown`) returns at most one of these.
/// Variants that concern a single module expose its name via [`RuntimeError::module`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Invalid wiring detected during `init`.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A module factory failed; no unit was started.
    #[error("failed to initialise module {module}: {cause}")]
    Factory {
        /// Module whose factory failed.
        module: String,
        /// Factory error.
        cause: UnitError,
    },

    /// A unit failed while starting.
    #[error("module {module} failed to start: {cause}")]
    Startup {
        /// Failed module.
        module: String,
        /// Failure cause.
        cause: UnitError,
    },

    /// A unit failed after reaching `Running`.
    #[error("module {module} failed: {cause}")]
    ModuleFailed {
        /// Failed module.
        module: String,
        /// Failure cause.
        cause: UnitError,
    },

    /// A unit failed to stop cleanly.
    #[error("module {module} failed to stop: {cause}")]
    Stop {
        /// Failed module.
        module: String,
        /// Failure cause.
        cause: UnitError,
    },

    /// A unit terminated before every unit became healthy.
    #[error("module {module} terminated before all modules became healthy")]
    NotHealthy {
        /// Terminated module.
        module: String,
    },

    /// Shutdown grace period was exceeded; some units did not reach a terminal state.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Units that did not stop in time.
        stuck: Vec<String>,
    },

    /// The supplied context was cancelled before the phase completed.
    #[error("context cancelled")]
    Canceled,

    /// `run` or `shutdown` called before `init`.
    #[error("orchestrator is not initialised")]
    NotInitialized,

    /// `init` called twice.
    #[error("orchestrator is already initialised")]
    AlreadyInitialized,

    /// `run` called twice.
    #[error("orchestrator is already running")]
    AlreadyRunning,

    /// OS signal handlers could not be installed.
    #[error("signal handler registration failed: {error}")]
    Signal {
        /// The underlying I/O error message.
        error: String,
    },
}

impl RuntimeError {
    /// Builds the error matching the lifecycle phase a unit failed in.
    pub(crate) fn from_failure(module: &str, phase: Phase, cause: UnitError) -> Self {
        let module = module.to_string();
        match phase {
            Phase::Starting => RuntimeError::Startup { module, cause },
            Phase::Running => RuntimeError::ModuleFailed { module, cause },
            Phase::Stopping => RuntimeError::Stop { module, cause },
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use modvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Config(e) => e.as_label(),
            RuntimeError::Factory { .. } => "runtime_factory_failed",
            RuntimeError::Startup { .. } => "runtime_startup_failed",
            RuntimeError::ModuleFailed { .. } => "runtime_module_failed",
            RuntimeError::Stop { .. } => "runtime_stop_failed",
            RuntimeError::NotHealthy { .. } => "runtime_not_healthy",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Canceled => "runtime_canceled",
            RuntimeError::NotInitialized => "runtime_not_initialized",
            RuntimeError::AlreadyInitialized => "runtime_already_initialized",
            RuntimeError::AlreadyRunning => "runtime_already_running",
            RuntimeError::Signal { .. } => "runtime_signal",
        }
    }

    /// Name of the offending module, if the error concerns one.
    pub fn module(&self) -> Option<&str> {
        match self {
            RuntimeError::Factory { module, .. }
            | RuntimeError::Startup { module, .. }
            | RuntimeError::ModuleFailed { module, .. }
            | RuntimeError::Stop { module, .. }
            | RuntimeError::NotHealthy { module } => Some(module),
            RuntimeError::Config(
                ConfigError::DuplicateModule { module }
                | ConfigError::SelfDependency { module }
                | ConfigError::UnknownDependency { module, .. }
                | ConfigError::UnknownModule { module }
                | ConfigError::UnknownTarget { module }
                | ConfigError::InvisibleTarget { module }
                | ConfigError::ConditionalDisabled { module, .. }
                | ConfigError::ConditionalDependency { module, .. },
            ) => Some(module),
            _ => None,
        }
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
