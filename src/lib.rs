//! # modvisor
//!
//! **Modvisor** is a module registry and lifecycle orchestrator for long-running
//! Rust services.
//!
//! A process registers its modules (named unit factories) together with their
//! dependencies, picks the targets to run, and lets the orchestrator build the
//! dependency closure, start every unit, wait until all are healthy and stop
//! them again on shutdown.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   register   │   │add_dependency│   │     add      │
//!     │   _module    │   │   (B → A)    │   │ _conditional │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Registry (descriptors, edges, conditional rules)                 │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼  init(ctx)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - TargetResolver (validate, closure, order, instantiate)         │
//! │  - Listener (health / termination barriers)                       │
//! │  - Bus + SubscriberSet (diagnostics)                              │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼        run(ctx)
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  UnitActor   │   │  UnitActor   │   │  UnitActor   │
//!     │ start/run/   │   │ start/run/   │   │ start/run/   │
//!     │ stop         │   │ stop         │   │ stop         │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ transitions      │                  │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Listener ──► Bus (broadcast) ──► forwarder ──► SubscriberSet     │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! init(ctx)      resolve targets ─► closure in dependency order ─► call factories
//! run(ctx)       spawn actors ─► await all Running ─► notify_ready() ─► await all terminal
//! shutdown(ctx)  cancel stop tokens ─► await all terminal (bounded by ctx and grace)
//!
//! Unit states:
//!   Created ─► Starting ─► Running ─► Stopping ─► Terminated
//!                  │           │           │
//!                  └───────────┴───────────┴────► Failed
//! ```
//!
//! ## Features
//! | Area              | Description                                                        | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------------|---------------------------------------------|
//! | **Modules**       | Register factories, dependencies, visibility and gated modules.    | [`Registry`], [`FeatureToggles`]            |
//! | **Orchestration** | Resolve, start, health-check and stop the activated units.         | [`Orchestrator`], [`OrchestratorBuilder`]   |
//! | **Units**         | The start/run/stop contract and ready-made implementations.        | [`Unit`], [`UnitFn`], [`IdleUnit`]          |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom subscribers). | [`Subscribe`]                               |
//! | **Errors**        | Typed errors for wiring, units and the runtime.                    | [`ConfigError`], [`UnitError`], [`RuntimeError`] |
//! | **Configuration** | Targets, shutdown grace, bus capacity and failure policy.          | [`OrchestratorConfig`]                      |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber, which
//!   forwards events to `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio::sync::Notify;
//! use tokio_util::sync::CancellationToken;
//! use modvisor::{IdleUnit, Orchestrator, OrchestratorConfig, Registry, UnitError, UnitFn, UnitRef};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = Registry::new();
//!     registry
//!         .register_invisible_module("store", || Ok(IdleUnit::arc()))
//!         .register_module("api", || {
//!             let unit: UnitRef = UnitFn::arc(|ctx: CancellationToken| async move {
//!                 ctx.cancelled().await;
//!                 Ok::<_, UnitError>(())
//!             });
//!             Ok(unit)
//!         });
//!     registry.add_dependency("api", ["store"])?;
//!
//!     let ready = Arc::new(Notify::new());
//!     let cfg = OrchestratorConfig::default().with_targets(["api"]);
//!     let orch = Orchestrator::builder(cfg, registry)
//!         .with_notifier({
//!             let ready = Arc::clone(&ready);
//!             move || ready.notify_one()
//!         })
//!         .build();
//!
//!     orch.init(CancellationToken::new()).await?;
//!     assert_eq!(orch.active_modules(), vec!["store", "api"]);
//!
//!     let runner = {
//!         let orch = Arc::clone(&orch);
//!         tokio::spawn(async move { orch.run(CancellationToken::new()).await })
//!     };
//!     ready.notified().await;
//!
//!     // a service would call `orch.serve()` instead, which waits for SIGINT/SIGTERM
//!     orch.shutdown(CancellationToken::new()).await?;
//!     runner.await??;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod modules;
mod subscribers;
mod units;

// ---- Public re-exports ----

pub use crate::core::{
    FailurePolicy, FailureRecord, NoopNotifier, Orchestrator, OrchestratorBuilder,
    OrchestratorConfig, ReadyNotifier, SystemdNotifier, parse_targets,
};
pub use error::{ConfigError, RuntimeError, UnitError};
pub use events::{Bus, Event, EventKind};
pub use modules::{
    ConditionalModule, Factory, FeatureToggles, ModuleDescriptor, Registry, Resolution,
    StaticToggles, Visibility,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use units::{IdleUnit, Phase, Unit, UnitFn, UnitRef, UnitState};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
