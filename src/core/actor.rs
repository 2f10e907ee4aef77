//! # UnitActor: drives one unit through its lifecycle.
//!
//! One actor per unit, spawned by the orchestrator when the unit is started
//! (or when shutdown reaches a unit that was never started).
//!
//! ## Flow
//! ```text
//! stop already requested? ── yes ──► Created → Terminated
//!        │ no
//!        ▼
//! Created → Starting ── start(ctx) ──┬─ Ok ───────────────► Running
//!                                    ├─ Ok|Canceled + stop ► Stopping → stop()
//!                                    └─ Err ──────────────► Failed
//!
//! Running ── run(ctx) ──┬─ Ok / Canceled ──► Stopping ── stop() ──┬─ Ok  ─► Terminated
//!                       │                                         └─ Err ─► Failed
//!                       └─ Err ──► stop() (cleanup) ──► Failed
//! ```
//!
//! ## Rules
//! - `ctx` passed to `start` and `run` is a child of the unit's stop token.
//! - `stop` gets a child of the shutdown deadline token; it is cancelled when
//!   `shutdown` gives up waiting.
//! - A panic inside any unit phase is caught and treated as a failure of that phase.
//! - Each transition goes through [`UnitState::can_transition_to`] and is
//!   reported to the [`Listener`] exactly once.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::listener::{Listener, Transition};
use crate::error::{UnitError, panic_message};
use crate::units::{UnitRef, UnitState};

/// Lifecycle driver for a single unit.
pub(crate) struct UnitActor {
    name: Arc<str>,
    unit: UnitRef,
    state: UnitState,
    listener: Arc<Listener>,
    /// Cancelled when a stop is requested.
    stop: CancellationToken,
    /// Cancelled when shutdown stops waiting.
    deadline: CancellationToken,
}

impl UnitActor {
    pub(crate) fn new(
        name: Arc<str>,
        unit: UnitRef,
        listener: Arc<Listener>,
        stop: CancellationToken,
        deadline: CancellationToken,
    ) -> Self {
        Self {
            name,
            unit,
            state: UnitState::Created,
            listener,
            stop,
            deadline,
        }
    }

    /// Runs the unit until it reaches a terminal state.
    pub(crate) async fn run(mut self) {
        if self.stop.is_cancelled() {
            self.transition(UnitState::Terminated, None);
            return;
        }

        self.transition(UnitState::Starting, None);
        let started = guarded(self.unit.start(self.stop.child_token())).await;
        match started {
            Ok(()) | Err(UnitError::Canceled) if self.stop.is_cancelled() => {
                self.stop_cleanly().await;
                return;
            }
            Ok(()) => {}
            Err(e) => {
                self.transition(UnitState::Failed, Some(e));
                return;
            }
        }

        self.transition(UnitState::Running, None);
        let ran = guarded(self.unit.run(self.stop.child_token())).await;
        match ran {
            Ok(()) | Err(UnitError::Canceled) => self.stop_cleanly().await,
            Err(e) => {
                if let Err(stop_err) = guarded(self.unit.stop(self.deadline.child_token())).await {
                    warn!(module = %self.name, err = %stop_err, "cleanup after failure did not stop cleanly");
                }
                self.transition(UnitState::Failed, Some(e));
            }
        }
    }

    async fn stop_cleanly(&mut self) {
        self.transition(UnitState::Stopping, None);
        match guarded(self.unit.stop(self.deadline.child_token())).await {
            Ok(()) => self.transition(UnitState::Terminated, None),
            Err(e) => self.transition(UnitState::Failed, Some(e)),
        }
    }

    fn transition(&mut self, to: UnitState, cause: Option<UnitError>) {
        if !self.state.can_transition_to(to) {
            warn!(module = %self.name, from = %self.state, to = %to, "invalid transition ignored");
            return;
        }
        let from = std::mem::replace(&mut self.state, to);
        debug!(module = %self.name, %from, %to, "transition");
        self.listener.record(Transition {
            unit: Arc::clone(&self.name),
            from,
            to,
            cause,
        });
    }
}

/// Runs one unit phase, converting a panic into [`UnitError::Fail`].
async fn guarded<F>(fut: F) -> Result<(), UnitError>
where
    F: Future<Output = Result<(), UnitError>>,
{
    match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => Err(UnitError::fail(format!(
            "panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::events::{Bus, EventKind};
    use crate::units::IdleUnit;

    /// Scripted unit: each phase returns the configured result.
    struct Scripted {
        start: Result<(), UnitError>,
        run: Option<Result<(), UnitError>>,
        stop: Result<(), UnitError>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl Scripted {
        fn new(
            start: Result<(), UnitError>,
            run: Option<Result<(), UnitError>>,
            stop: Result<(), UnitError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                start,
                run,
                stop,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl crate::units::Unit for Scripted {
        async fn start(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
            self.calls.lock().unwrap().push("start");
            self.start.clone()
        }

        async fn run(&self, ctx: CancellationToken) -> Result<(), UnitError> {
            self.calls.lock().unwrap().push("run");
            match &self.run {
                Some(res) => res.clone(),
                None => {
                    ctx.cancelled().await;
                    Ok(())
                }
            }
        }

        async fn stop(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
            self.calls.lock().unwrap().push("stop");
            self.stop.clone()
        }
    }

    struct Harness {
        listener: Arc<Listener>,
        rx: tokio::sync::broadcast::Receiver<crate::events::Event>,
        stop: CancellationToken,
    }

    impl Harness {
        fn new() -> Self {
            let bus = Bus::new(64);
            let rx = bus.subscribe();
            let names: Vec<Arc<str>> = vec![Arc::from("u")];
            Self {
                listener: Arc::new(Listener::new(&names, bus)),
                rx,
                stop: CancellationToken::new(),
            }
        }

        fn actor(&self, unit: UnitRef) -> UnitActor {
            UnitActor::new(
                Arc::from("u"),
                unit,
                Arc::clone(&self.listener),
                self.stop.clone(),
                CancellationToken::new(),
            )
        }

        fn transitions(&mut self) -> Vec<(UnitState, UnitState)> {
            let mut out = Vec::new();
            while let Ok(ev) = self.rx.try_recv() {
                if ev.kind == EventKind::UnitTransition {
                    out.push((ev.from.unwrap(), ev.to.unwrap()));
                }
            }
            out
        }
    }

    use UnitState::*;

    #[tokio::test]
    async fn test_clean_lifecycle() {
        let mut h = Harness::new();
        let unit = Scripted::new(Ok(()), None, Ok(()));
        let handle = tokio::spawn(h.actor(unit.clone()).run());

        h.listener.await_healthy().await.unwrap();
        h.stop.cancel();
        handle.await.unwrap();

        assert_eq!(
            h.transitions(),
            vec![
                (Created, Starting),
                (Starting, Running),
                (Running, Stopping),
                (Stopping, Terminated)
            ]
        );
        assert_eq!(*unit.calls.lock().unwrap(), vec!["start", "run", "stop"]);
    }

    #[tokio::test]
    async fn test_start_failure_skips_run_and_stop() {
        let mut h = Harness::new();
        let unit = Scripted::new(Err(UnitError::fail("bind")), None, Ok(()));
        h.actor(unit.clone()).run().await;

        assert_eq!(h.transitions(), vec![(Created, Starting), (Starting, Failed)]);
        assert_eq!(*unit.calls.lock().unwrap(), vec!["start"]);
        assert_eq!(h.listener.failures()[0].cause, UnitError::fail("bind"));
    }

    #[tokio::test]
    async fn test_run_failure_still_cleans_up() {
        let mut h = Harness::new();
        let unit = Scripted::new(Ok(()), Some(Err(UnitError::StopProcess)), Ok(()));
        h.actor(unit.clone()).run().await;

        assert_eq!(
            h.transitions(),
            vec![(Created, Starting), (Starting, Running), (Running, Failed)]
        );
        assert_eq!(*unit.calls.lock().unwrap(), vec!["start", "run", "stop"]);
        assert!(!h.listener.failures()[0].is_fault());
    }

    #[tokio::test]
    async fn test_stop_failure() {
        let mut h = Harness::new();
        let unit = Scripted::new(Ok(()), Some(Ok(())), Err(UnitError::fail("flush")));
        h.actor(unit).run().await;

        assert_eq!(h.transitions().last(), Some(&(Stopping, Failed)));
        let failure = &h.listener.failures()[0];
        assert_eq!(failure.phase, crate::units::Phase::Stopping);
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let mut h = Harness::new();
        h.stop.cancel();
        let unit = Scripted::new(Ok(()), None, Ok(()));
        h.actor(unit.clone()).run().await;

        assert_eq!(h.transitions(), vec![(Created, Terminated)]);
        assert!(unit.calls.lock().unwrap().is_empty());
    }

    struct SlowStart;

    #[async_trait]
    impl crate::units::Unit for SlowStart {
        async fn start(&self, ctx: CancellationToken) -> Result<(), UnitError> {
            ctx.cancelled().await;
            Err(UnitError::Canceled)
        }

        async fn stop(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stop_during_start() {
        let mut h = Harness::new();
        let handle = tokio::spawn(h.actor(Arc::new(SlowStart)).run());
        while h.listener.state("u") != Some(Starting) {
            tokio::task::yield_now().await;
        }
        h.stop.cancel();
        handle.await.unwrap();

        assert_eq!(
            h.transitions(),
            vec![(Created, Starting), (Starting, Stopping), (Stopping, Terminated)]
        );
        assert!(h.listener.failures().is_empty());
    }

    struct Panicky;

    #[async_trait]
    impl crate::units::Unit for Panicky {
        async fn start(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
            panic!("bad state");
        }

        async fn stop(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_panic_is_a_start_failure() {
        let h = Harness::new();
        h.actor(Arc::new(Panicky)).run().await;

        assert_eq!(
            h.listener.failures()[0].cause,
            UnitError::fail("panicked: bad state")
        );
    }

    #[tokio::test]
    async fn test_idle_unit_runs_until_stopped() {
        let mut h = Harness::new();
        let handle = tokio::spawn(h.actor(IdleUnit::arc()).run());
        h.listener.await_healthy().await.unwrap();
        h.stop.cancel();
        handle.await.unwrap();

        assert_eq!(h.transitions().len(), 4);
        assert_eq!(h.listener.state("u"), Some(Terminated));
    }
}
