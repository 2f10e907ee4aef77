//! # Runtime events emitted by the orchestrator and unit actors.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Unit events**: one event per lifecycle transition of a unit
//! - **Orchestrator events**: barrier outcomes and shutdown progress
//! - **Subscriber events**: delivery problems inside the subscriber set
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Transitions of a single unit are published in order by its actor; events of
//! different units may interleave.
//!
//! ## Example
//! ```rust
//! use modvisor::{Event, EventKind, UnitState};
//!
//! let ev = Event::transition("db", UnitState::Running, UnitState::Failed)
//!     .with_reason("connection reset");
//!
//! assert_eq!(ev.kind, EventKind::UnitTransition);
//! assert_eq!(ev.unit.as_deref(), Some("db"));
//! assert_eq!(ev.to, Some(UnitState::Failed));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::error::UnitError;
use crate::units::UnitState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Unit events ===
    /// A unit changed state.
    ///
    /// Sets:
    /// - `unit`: module name
    /// - `from` / `to`: previous and new state
    /// - `reason`: failure cause (only when `to == Failed`)
    /// - `stop_process`: cause is the intentional-stop sentinel
    UnitTransition,

    // === Orchestrator events ===
    /// Every unit reached `Running`.
    ModulesHealthy,

    /// Every unit reached a terminal state.
    ModulesStopped,

    /// Shutdown requested (OS signal observed by `serve`).
    ShutdownRequested,

    /// Grace period exceeded; some units did not stop in time.
    ///
    /// Sets:
    /// - `reason`: stuck unit names
    /// - `grace_ms`: configured grace (ms)
    GraceExceeded,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `unit`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// The event forwarder lagged behind the bus and skipped events.
    ///
    /// Delivered to subscribers directly, not published on the bus. A single
    /// subscriber dropping events from a full or closed queue is only logged.
    ///
    /// Sets:
    /// - `unit`: `"forwarder"`
    /// - `reason`: reason string (e.g., "bus lagged")
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Module (or subscriber) name, if applicable.
    pub unit: Option<Arc<str>>,
    /// State before a transition.
    pub from: Option<UnitState>,
    /// State after a transition.
    pub to: Option<UnitState>,
    /// Human-readable reason (failure cause, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// True when a failure cause is the intentional-stop sentinel.
    pub stop_process: bool,
    /// Shutdown grace in milliseconds (compact).
    pub grace_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            unit: None,
            from: None,
            to: None,
            reason: None,
            stop_process: false,
            grace_ms: None,
        }
    }

    /// Creates a [`EventKind::UnitTransition`] event.
    pub fn transition(unit: impl Into<Arc<str>>, from: UnitState, to: UnitState) -> Self {
        let mut ev = Event::new(EventKind::UnitTransition).with_unit(unit);
        ev.from = Some(from);
        ev.to = Some(to);
        ev
    }

    /// Attaches a module name.
    #[inline]
    pub fn with_unit(mut self, unit: impl Into<Arc<str>>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a failure cause (sets `reason` and `stop_process`).
    #[inline]
    pub fn with_cause(mut self, cause: &UnitError) -> Self {
        self.stop_process = cause.is_stop_process();
        self.with_reason(cause.to_string())
    }

    /// Attaches the shutdown grace (stored as milliseconds).
    #[inline]
    pub fn with_grace(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.grace_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_unit(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_unit(subscriber)
            .with_reason(info)
    }

    /// True if this is a transition into `Failed`.
    #[inline]
    pub fn is_failure(&self) -> bool {
        self.kind == EventKind::UnitTransition && self.to == Some(UnitState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::ModulesHealthy);
        let b = Event::new(EventKind::ModulesStopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_cause_marks_sentinel() {
        let ev = Event::transition("m", UnitState::Running, UnitState::Failed)
            .with_cause(&UnitError::StopProcess);
        assert!(ev.is_failure());
        assert!(ev.stop_process);
        assert_eq!(ev.reason.as_deref(), Some("stop process requested"));

        let ev = Event::transition("m", UnitState::Running, UnitState::Failed)
            .with_cause(&UnitError::fail("boom"));
        assert!(!ev.stop_process);
    }

    #[test]
    fn test_grace_is_clamped() {
        let ev = Event::new(EventKind::GraceExceeded).with_grace(Duration::from_secs(u64::MAX));
        assert_eq!(ev.grace_ms, Some(u32::MAX));
    }
}
