//! Runtime core: orchestration and lifecycle.
//!
//! The public API from this module is [`Orchestrator`] (with its builder and
//! configuration) and the readiness notifiers.
//!
//! Internal modules:
//! - [`orchestrator`]: init/run/shutdown, barriers, signal-driven `serve`;
//! - [`actor`]: drives a single unit through start, run and stop;
//! - [`listener`]: records transitions and backs the health/termination barriers;
//! - [`notify`]: readiness notification towards a process supervisor;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod actor;
mod builder;
mod config;
mod listener;
mod notify;
mod orchestrator;
mod shutdown;

pub use builder::OrchestratorBuilder;
pub use config::{FailurePolicy, OrchestratorConfig, parse_targets};
pub use listener::FailureRecord;
pub use notify::{NoopNotifier, ReadyNotifier, SystemdNotifier};
pub use orchestrator::Orchestrator;
