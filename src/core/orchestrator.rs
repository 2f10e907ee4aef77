//! # Orchestrator: resolves modules, drives their lifecycle and shuts them down.
//!
//! The [`Orchestrator`] owns the event bus, a [`SubscriberSet`], the module
//! [`Registry`] and, after `init`, the activation: one unit per module of the
//! target closure, in dependency order.
//!
//! ## Key responsibilities
//! - resolve targets and instantiate units once (`init`)
//! - start every unit concurrently and wait on the health and termination barriers (`run`)
//! - request a stop of every unit and wait for them, bounded by [`OrchestratorConfig::grace`] (`shutdown`)
//! - turn OS termination signals into a graceful shutdown (`serve`)
//!
//! ## High-level architecture
//! ```text
//! init(ctx):
//!   Registry ──► TargetResolver::resolve(targets)   (no factory runs on a wiring error)
//!            ──► TargetResolver::instantiate()      (factories in activation order)
//!            ──► Activation { targets, slots[UnitActor], Listener }   (OnceLock)
//!
//! run(ctx):
//!   attach forwarder: Bus ──► SubscriberSet::emit(&Event)
//!   spawn UnitActor::run() per slot
//!        │ transitions
//!        ▼
//!   Listener ──► await_healthy()     ─► ReadyNotifier::notify_ready()
//!            ──► await_terminated()  ─► first fault sorted by name (StopProcess ignored)
//!
//! shutdown(ctx):
//!   cancel every slot's stop token ─► launch never-started slots (Created → Terminated)
//!   select! { await_terminated | ctx.cancelled | sleep(grace) }
//!        ├─ terminated     → first stop-phase fault sorted by name, or Ok
//!        ├─ ctx cancelled  → Canceled
//!        └─ grace exceeded → GraceExceeded { grace, stuck }  (units are never killed)
//! ```
//!
//! ## Rules
//! - `init` runs once; `run` runs once per activation; `shutdown` is idempotent.
//! - `run` does not stop anything by itself: after a startup failure the caller
//!   is expected to call `shutdown` (unless [`FailurePolicy::StopAll`] is set).
//! - Start order among units is not enforced; only construction order is.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{
    actor::UnitActor,
    builder::OrchestratorBuilder,
    config::{FailurePolicy, OrchestratorConfig},
    listener::{FailureRecord, Listener},
    notify::ReadyNotifier,
    shutdown,
};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::modules::{FeatureToggles, Registry, TargetResolver};
use crate::subscribers::SubscriberSet;
use crate::units::{Phase, UnitState};

/// One instantiated unit, launched at most once.
struct Slot {
    name: Arc<str>,
    stop: CancellationToken,
    actor: Mutex<Option<UnitActor>>,
}

/// Result of a successful `init`.
struct Activation {
    /// Adjusted target set.
    targets: Vec<String>,
    /// In activation order.
    units: Vec<Slot>,
    listener: Arc<Listener>,
    /// Cancelled when shutdown stops waiting for `stop` calls.
    deadline: CancellationToken,
}

impl Activation {
    /// Spawns the slot's actor unless it was already launched.
    fn launch(&self, slot: &Slot) {
        let actor = slot
            .actor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(actor) = actor {
            tokio::spawn(actor.run());
        }
    }

    fn signal_stop(&self) {
        for slot in &self.units {
            slot.stop.cancel();
        }
    }
}

/// Module lifecycle orchestrator.
pub struct Orchestrator {
    /// Runtime configuration.
    pub cfg: OrchestratorConfig,
    /// Event bus shared with the unit actors.
    pub bus: Bus,
    /// Fan-out set for subscribers.
    pub subs: Arc<SubscriberSet>,

    registry: Arc<Registry>,
    toggles: Arc<dyn FeatureToggles>,
    notifier: Arc<dyn ReadyNotifier>,

    activation: OnceLock<Arc<Activation>>,
    init_started: AtomicBool,
    running: AtomicBool,
    forwarding: AtomicBool,
    /// Ends the forwarder once shutdown has seen every unit terminate.
    forward_stop: CancellationToken,
}

impl Orchestrator {
    /// Returns a builder for an orchestrator over `registry`.
    pub fn builder(cfg: OrchestratorConfig, registry: impl Into<Arc<Registry>>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg, registry.into())
    }

    pub(crate) fn new_internal(
        cfg: OrchestratorConfig,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        registry: Arc<Registry>,
        toggles: Arc<dyn FeatureToggles>,
        notifier: Arc<dyn ReadyNotifier>,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            registry,
            toggles,
            notifier,
            activation: OnceLock::new(),
            init_started: AtomicBool::new(false),
            running: AtomicBool::new(false),
            forwarding: AtomicBool::new(false),
            forward_stop: CancellationToken::new(),
        }
    }

    /// Resolves the configured targets and instantiates one unit per module of
    /// their dependency closure, dependencies first.
    ///
    /// Wiring errors are reported before any factory runs. A factory error
    /// aborts instantiation; units built so far are discarded unstarted.
    /// Only the first call does any work; later calls fail with
    /// [`RuntimeError::AlreadyInitialized`].
    pub async fn init(&self, ctx: CancellationToken) -> Result<(), RuntimeError> {
        if self.init_started.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyInitialized);
        }
        if ctx.is_cancelled() {
            return Err(RuntimeError::Canceled);
        }
        debug!(targets = ?self.cfg.targets, "resolving modules");

        let resolver = TargetResolver::new(&self.registry, self.toggles.as_ref());
        let resolution = resolver.resolve(&self.cfg.targets)?;
        let units = resolver.instantiate(&resolution, &ctx)?;

        let names: Vec<Arc<str>> = units.iter().map(|(name, _)| Arc::from(name.as_str())).collect();
        let listener = Arc::new(Listener::new(&names, self.bus.clone()));
        let deadline = CancellationToken::new();
        let slots = names
            .into_iter()
            .zip(units)
            .map(|(name, (_, unit))| {
                let stop = CancellationToken::new();
                let actor = UnitActor::new(
                    Arc::clone(&name),
                    unit,
                    Arc::clone(&listener),
                    stop.clone(),
                    deadline.clone(),
                );
                Slot {
                    name,
                    stop,
                    actor: Mutex::new(Some(actor)),
                }
            })
            .collect();

        info!(
            targets = ?resolution.targets,
            modules = ?resolution.order,
            "modules initialised"
        );
        let activation = Arc::new(Activation {
            targets: resolution.targets,
            units: slots,
            listener,
            deadline,
        });
        // init_started guarantees a single writer
        let _ = self.activation.set(activation);
        Ok(())
    }

    /// Starts every unit and waits until they have all terminated.
    ///
    /// - No units: blocks until `ctx` is cancelled, then returns `Ok`.
    /// - A unit fails (or terminates) before every unit is running: returns
    ///   that failure immediately; other units keep running until `shutdown`.
    /// - `ctx` cancelled before every unit has terminated: [`RuntimeError::Canceled`];
    ///   units keep running until `shutdown`.
    /// - Otherwise notifies readiness, waits for every unit to reach a terminal
    ///   state (normally triggered by `shutdown`) and returns the first genuine
    ///   failure by module name. [`UnitError::StopProcess`](crate::UnitError::StopProcess)
    ///   is not a failure.
    pub async fn run(&self, ctx: CancellationToken) -> Result<(), RuntimeError> {
        let act = self.activation.get().ok_or(RuntimeError::NotInitialized)?;
        if act.units.is_empty() {
            warn!("No modules registered, waiting for cancellation");
            ctx.cancelled().await;
            return Ok(());
        }
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyRunning);
        }

        self.attach_forwarder();
        info!(modules = act.units.len(), "starting modules");
        for slot in &act.units {
            act.launch(slot);
        }
        if self.cfg.failure_policy == FailurePolicy::StopAll {
            Self::stop_all_on_failure(Arc::clone(act));
        }

        tokio::select! {
            biased;
            res = act.listener.await_healthy() => res?,
            _ = ctx.cancelled() => return Err(RuntimeError::Canceled),
        }
        debug!("all modules healthy");
        self.notifier.notify_ready();

        tokio::select! {
            biased;
            _ = act.listener.await_terminated() => {}
            _ = ctx.cancelled() => return Err(RuntimeError::Canceled),
        }
        match first_fault(act.listener.failures(), |_| true) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    /// Requests a stop of every unit and waits until all are terminal.
    ///
    /// Units that were never launched go straight to `Terminated`. The wait is
    /// bounded by `ctx` ([`RuntimeError::Canceled`]) and by the configured grace
    /// ([`RuntimeError::GraceExceeded`] listing the stuck units); in both cases
    /// pending `stop` calls see their context cancelled. Returns the first
    /// stop-phase failure by module name. Safe to call more than once.
    pub async fn shutdown(&self, ctx: CancellationToken) -> Result<(), RuntimeError> {
        let Some(act) = self.activation.get().filter(|a| !a.units.is_empty()) else {
            debug!("no modules to stop");
            return Ok(());
        };

        self.attach_forwarder();
        act.signal_stop();
        for slot in &act.units {
            act.launch(slot);
        }
        info!("awaiting modules to be stopped");

        let grace = self.cfg.grace_limit();
        let waited = tokio::select! {
            biased;
            _ = act.listener.await_terminated() => Ok(()),
            _ = ctx.cancelled() => Err(RuntimeError::Canceled),
            _ = async {
                match grace {
                    Some(d) => tokio::time::sleep(d).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                let stuck = act.listener.stuck();
                warn!(grace = ?self.cfg.grace, ?stuck, "shutdown grace exceeded");
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_grace(self.cfg.grace)
                        .with_reason(stuck.join(", ")),
                );
                Err(RuntimeError::GraceExceeded { grace: self.cfg.grace, stuck })
            }
        };
        if let Err(e) = waited {
            act.deadline.cancel();
            return Err(e);
        }

        debug!("all modules stopped");
        self.forward_stop.cancel();
        match first_fault(act.listener.failures(), |f| f.phase == Phase::Stopping) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    /// Runs the modules until they end or the process receives a termination
    /// signal, then shuts down.
    ///
    /// Requires a prior `init`. Returns the first error of `run` and
    /// `shutdown`; a run cancelled by the signal counts as success.
    pub async fn serve(&self) -> Result<(), RuntimeError> {
        let ctx = CancellationToken::new();
        let run = self.run(ctx.clone());
        tokio::pin!(run);

        tokio::select! {
            res = &mut run => {
                let stopped = self.shutdown(CancellationToken::new()).await;
                res.and(stopped)
            }
            sig = shutdown::wait_for_shutdown_signal() => {
                if let Err(err) = &sig {
                    warn!(%err, "failed to install signal handlers; shutting down");
                } else {
                    self.bus.publish(Event::new(EventKind::ShutdownRequested));
                }
                ctx.cancel();
                let stopped = self.shutdown(CancellationToken::new()).await;
                let res = match run.await {
                    Err(RuntimeError::Canceled) => Ok(()),
                    other => other,
                };
                sig.map_err(|e| RuntimeError::Signal { error: e.to_string() })
                    .and(res)
                    .and(stopped)
            }
        }
    }

    /// True if `name` is in the adjusted target set (requested targets plus
    /// enabled gated modules). Dependencies pulled in transitively are not
    /// targets; see [`is_module_active`](Self::is_module_active).
    pub fn is_module_enabled(&self, name: &str) -> bool {
        self.activation
            .get()
            .is_some_and(|a| a.targets.iter().any(|t| t == name))
    }

    /// True if `name` was instantiated (member of the target closure).
    pub fn is_module_active(&self, name: &str) -> bool {
        self.activation
            .get()
            .is_some_and(|a| a.units.iter().any(|s| &*s.name == name))
    }

    /// Instantiated module names in activation order.
    pub fn active_modules(&self) -> Vec<String> {
        self.activation
            .get()
            .map(|a| a.units.iter().map(|s| s.name.to_string()).collect())
            .unwrap_or_default()
    }

    /// Current lifecycle state of an instantiated module.
    pub fn unit_state(&self, name: &str) -> Option<UnitState> {
        self.activation.get()?.listener.state(name)
    }

    /// Failure records of every failed unit, sorted by module name.
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.activation
            .get()
            .map(|a| a.listener.failures())
            .unwrap_or_default()
    }

    /// The module registry this orchestrator resolves against.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Subscribes to the bus and forwards events to the subscriber set.
    ///
    /// Attached once, on the first `run` or `shutdown`. Exits after a completed
    /// `shutdown`, once the events already on the bus are forwarded.
    fn attach_forwarder(&self) {
        if self.forwarding.swap(true, Ordering::AcqRel) || self.subs.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        let stop = self.forward_stop.clone();
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    biased;
                    res = rx.recv() => res,
                    _ = stop.cancelled() => break,
                };
                match received {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event forwarder lagged behind the bus");
                        set.emit(&Event::subscriber_overflow("forwarder", "bus lagged"));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("event forwarder stopped");
        });
    }

    fn stop_all_on_failure(act: Arc<Activation>) {
        tokio::spawn(async move {
            if act.listener.await_failure().await {
                warn!("module failed; stopping all modules");
                act.signal_stop();
            }
        });
    }
}

/// First genuine failure (not the stop sentinel) matching `filter`; input is sorted by name.
fn first_fault(
    failures: Vec<FailureRecord>,
    filter: impl Fn(&FailureRecord) -> bool,
) -> Option<FailureRecord> {
    failures.into_iter().find(|f| f.is_fault() && filter(f))
}
