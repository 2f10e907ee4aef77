//! # Transition listener and lifecycle barriers.
//!
//! Every unit actor reports its transitions here. The listener keeps the
//! authoritative view the orchestrator's barriers wait on, then republishes each
//! transition on the [`Bus`] for diagnostics.
//!
//! ## Architecture
//! ```text
//! UnitActor ──► Listener::record(Transition)
//!                  ├─► Mutex<Barriers>   (states, verdict, terminal count, failures)
//!                  ├─► watch::Sender     (wakes await_healthy / await_terminated)
//!                  └─► Bus.publish       (UnitTransition, ModulesHealthy, ModulesStopped)
//! ```
//!
//! ## Rules
//! - The listener never drives a unit; it only observes.
//! - The health verdict is latched by the first decisive transition: every unit
//!   reached `Running` (healthy), a unit failed, or a unit terminated first.
//! - Waiters subscribe to the watch channel before checking the condition, so a
//!   transition can never slip between check and wait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::error::{RuntimeError, UnitError};
use crate::events::{Bus, Event, EventKind};
use crate::units::{Phase, UnitState};

/// One state change reported by a unit actor.
#[derive(Debug, Clone)]
pub(crate) struct Transition {
    pub(crate) unit: Arc<str>,
    pub(crate) from: UnitState,
    pub(crate) to: UnitState,
    pub(crate) cause: Option<UnitError>,
}

/// Terminal failure of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// Module name.
    pub unit: String,
    /// Failure cause; [`UnitError::StopProcess`] marks a deliberate stop.
    pub cause: UnitError,
    /// Lifecycle phase the unit failed in.
    pub phase: Phase,
}

impl FailureRecord {
    /// True unless the cause is the intentional-stop sentinel.
    pub fn is_fault(&self) -> bool {
        !self.cause.is_stop_process()
    }

    pub(crate) fn to_error(&self) -> RuntimeError {
        RuntimeError::from_failure(&self.unit, self.phase, self.cause.clone())
    }
}

#[derive(Debug, Clone)]
enum Verdict {
    Pending,
    Healthy,
    Failed(FailureRecord),
    TerminatedEarly(String),
}

#[derive(Debug)]
struct Barriers {
    states: HashMap<Arc<str>, UnitState>,
    reached_running: usize,
    terminal: usize,
    verdict: Verdict,
    /// In arrival order.
    failures: Vec<FailureRecord>,
}

/// Thread-safe observer of unit transitions.
pub(crate) struct Listener {
    barriers: Mutex<Barriers>,
    changed: watch::Sender<u64>,
    bus: Bus,
}

impl Listener {
    /// Creates a listener tracking `units`, all in `Created`.
    pub(crate) fn new<'a>(units: impl IntoIterator<Item = &'a Arc<str>>, bus: Bus) -> Self {
        let states: HashMap<Arc<str>, UnitState> = units
            .into_iter()
            .map(|u| (Arc::clone(u), UnitState::Created))
            .collect();
        let (changed, _rx) = watch::channel(0);
        Self {
            barriers: Mutex::new(Barriers {
                states,
                reached_running: 0,
                terminal: 0,
                verdict: Verdict::Pending,
                failures: Vec::new(),
            }),
            changed,
            bus,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Barriers> {
        self.barriers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies one transition, wakes waiters and publishes diagnostics.
    pub(crate) fn record(&self, t: Transition) {
        let mut ev = Event::transition(Arc::clone(&t.unit), t.from, t.to);
        if let Some(cause) = &t.cause {
            ev = ev.with_cause(cause);
        }

        let (became_healthy, all_stopped) = {
            let mut b = self.lock();
            b.states.insert(Arc::clone(&t.unit), t.to);
            let was_pending = matches!(b.verdict, Verdict::Pending);

            if t.to == UnitState::Running {
                b.reached_running += 1;
            }
            if t.to.is_terminal() {
                b.terminal += 1;
            }
            if t.to == UnitState::Failed {
                let record = FailureRecord {
                    unit: t.unit.to_string(),
                    cause: t.cause.clone().unwrap_or_else(|| UnitError::fail("unknown failure")),
                    phase: t.from.phase().unwrap_or(Phase::Starting),
                };
                if was_pending {
                    b.verdict = Verdict::Failed(record.clone());
                }
                b.failures.push(record);
            } else if was_pending && t.to == UnitState::Terminated {
                b.verdict = Verdict::TerminatedEarly(t.unit.to_string());
            } else if was_pending && b.reached_running == b.states.len() {
                b.verdict = Verdict::Healthy;
            }

            let became_healthy = was_pending && matches!(b.verdict, Verdict::Healthy);
            let all_stopped = t.to.is_terminal() && b.terminal == b.states.len();
            (became_healthy, all_stopped)
        };

        self.bus.publish(ev);
        if became_healthy {
            self.bus.publish(Event::new(EventKind::ModulesHealthy));
        }
        if all_stopped {
            self.bus.publish(Event::new(EventKind::ModulesStopped));
        }
        // waiters wake only after the events above are on the bus
        self.changed.send_modify(|v| *v += 1);
    }

    /// Waits until `check` yields a value.
    async fn wait_for<T>(&self, mut check: impl FnMut(&Barriers) -> Option<T>) -> T {
        let mut rx = self.changed.subscribe();
        loop {
            let ready = check(&self.lock());
            if let Some(v) = ready {
                return v;
            }
            // the sender lives as long as `self`, so this only returns on a change
            let _ = rx.changed().await;
        }
    }

    /// Health barrier: every unit reached `Running`, or the first unit that
    /// failed (or terminated) before that.
    pub(crate) async fn await_healthy(&self) -> Result<(), RuntimeError> {
        self.wait_for(|b| match &b.verdict {
            Verdict::Pending => None,
            Verdict::Healthy => Some(Ok(())),
            Verdict::Failed(record) => Some(Err(record.to_error())),
            Verdict::TerminatedEarly(unit) => Some(Err(RuntimeError::NotHealthy {
                module: unit.clone(),
            })),
        })
        .await
    }

    /// Termination barrier: every unit is `Terminated` or `Failed`.
    pub(crate) async fn await_terminated(&self) {
        self.wait_for(|b| (b.terminal == b.states.len()).then_some(()))
            .await
    }

    /// Resolves to `true` on the first failure, or `false` once every unit
    /// terminated without one.
    pub(crate) async fn await_failure(&self) -> bool {
        self.wait_for(|b| {
            if !b.failures.is_empty() {
                Some(true)
            } else if b.terminal == b.states.len() {
                Some(false)
            } else {
                None
            }
        })
        .await
    }

    /// Current state of `unit`.
    pub(crate) fn state(&self, unit: &str) -> Option<UnitState> {
        self.lock().states.get(unit).copied()
    }

    /// Failure records sorted by unit name.
    pub(crate) fn failures(&self) -> Vec<FailureRecord> {
        let mut failures = self.lock().failures.clone();
        failures.sort_by(|a, b| a.unit.cmp(&b.unit));
        failures
    }

    /// Sorted names of units not yet in a terminal state.
    pub(crate) fn stuck(&self) -> Vec<String> {
        let b = self.lock();
        let mut stuck: Vec<String> = b
            .states
            .iter()
            .filter(|(_, s)| !s.is_terminal())
            .map(|(name, _)| name.to_string())
            .collect();
        stuck.sort_unstable();
        stuck
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use UnitState::*;

    fn listener(names: &[&str]) -> (Listener, Vec<Arc<str>>) {
        let names: Vec<Arc<str>> = names.iter().map(|n| Arc::from(*n)).collect();
        (Listener::new(&names, Bus::new(64)), names)
    }

    fn step(l: &Listener, unit: &Arc<str>, from: UnitState, to: UnitState, cause: Option<UnitError>) {
        l.record(Transition {
            unit: Arc::clone(unit),
            from,
            to,
            cause,
        });
    }

    fn run_up(l: &Listener, unit: &Arc<str>) {
        step(l, unit, Created, Starting, None);
        step(l, unit, Starting, Running, None);
    }

    #[tokio::test]
    async fn test_healthy_once_all_running() {
        let (l, u) = listener(&["a", "b"]);
        run_up(&l, &u[0]);
        assert!(
            tokio::time::timeout(Duration::from_millis(20), l.await_healthy())
                .await
                .is_err()
        );

        run_up(&l, &u[1]);
        assert_eq!(l.await_healthy().await, Ok(()));
        assert_eq!(l.state("a"), Some(Running));
    }

    #[tokio::test]
    async fn test_first_failure_decides_health() {
        let (l, u) = listener(&["a", "b", "c"]);
        run_up(&l, &u[0]);
        step(&l, &u[1], Created, Starting, None);
        step(&l, &u[1], Starting, Failed, Some(UnitError::fail("port in use")));
        run_up(&l, &u[2]);
        step(&l, &u[2], Running, Failed, Some(UnitError::fail("later")));

        assert_eq!(
            l.await_healthy().await,
            Err(RuntimeError::Startup {
                module: "b".into(),
                cause: UnitError::fail("port in use")
            })
        );
        let failures = l.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].unit, "b");
        assert_eq!(failures[1].phase, Phase::Running);
    }

    #[tokio::test]
    async fn test_failure_after_healthy_keeps_verdict() {
        let (l, u) = listener(&["a"]);
        run_up(&l, &u[0]);
        step(&l, &u[0], Running, Failed, Some(UnitError::StopProcess));

        assert_eq!(l.await_healthy().await, Ok(()));
        assert!(!l.failures()[0].is_fault());
    }

    #[tokio::test]
    async fn test_termination_before_health() {
        let (l, u) = listener(&["a", "b"]);
        run_up(&l, &u[0]);
        step(&l, &u[1], Created, Terminated, None);

        assert_eq!(
            l.await_healthy().await,
            Err(RuntimeError::NotHealthy { module: "b".into() })
        );
    }

    #[tokio::test]
    async fn test_terminated_barrier_wakes_waiter() {
        let (l, u) = listener(&["a", "b"]);
        let l = Arc::new(l);
        run_up(&l, &u[0]);
        run_up(&l, &u[1]);
        assert_eq!(l.stuck(), vec!["a".to_string(), "b".to_string()]);

        let waiter = {
            let l = Arc::clone(&l);
            tokio::spawn(async move { l.await_terminated().await })
        };
        for unit in &u {
            step(&l, unit, Running, Stopping, None);
            step(&l, unit, Stopping, Terminated, None);
        }

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(l.stuck().is_empty());
        assert!(!l.await_failure().await);
    }

    #[tokio::test]
    async fn test_transitions_are_published() {
        let names: Vec<Arc<str>> = vec![Arc::from("a")];
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let l = Listener::new(&names, bus);
        run_up(&l, &names[0]);

        let first = rx.recv().await.unwrap();
        assert_eq!((first.from, first.to), (Some(Created), Some(Starting)));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.to, Some(Running));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ModulesHealthy);
    }
}
