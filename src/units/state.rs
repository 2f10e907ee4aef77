//! # Unit lifecycle states.
//!
//! ```text
//!   Created ──► Starting ──► Running ──► Stopping ──► Terminated
//!      │           │            │            │
//!      │           ├──► Failed ◄┴────────────┘
//!      │           │
//!      │           └──► Stopping   (stop requested while start was in flight)
//!      └──► Terminated             (stop requested before start)
//! ```
//!
//! `Terminated` and `Failed` are terminal: no transition leaves them.

use std::fmt;

/// Current lifecycle state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    /// Instantiated by its factory, not started yet.
    Created,
    /// `start` is in flight.
    Starting,
    /// `start` succeeded; the run phase is active.
    Running,
    /// `stop` is in flight.
    Stopping,
    /// Stopped cleanly.
    Terminated,
    /// Ended with an error (possibly the intentional-stop sentinel).
    Failed,
}

impl UnitState {
    /// True for `Terminated` and `Failed`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitState::Terminated | UnitState::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: UnitState) -> bool {
        use UnitState::*;
        matches!(
            (self, next),
            (Created, Starting)
                | (Created, Terminated)
                | (Starting, Running)
                | (Starting, Stopping)
                | (Starting, Failed)
                | (Running, Stopping)
                | (Running, Failed)
                | (Stopping, Terminated)
                | (Stopping, Failed)
        )
    }

    /// Lifecycle phase a failure from this state is attributed to.
    ///
    /// Returns `None` for states a unit cannot fail from.
    pub fn phase(self) -> Option<Phase> {
        match self {
            UnitState::Starting => Some(Phase::Starting),
            UnitState::Running => Some(Phase::Running),
            UnitState::Stopping => Some(Phase::Stopping),
            _ => None,
        }
    }

    /// Short lowercase label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            UnitState::Created => "created",
            UnitState::Starting => "starting",
            UnitState::Running => "running",
            UnitState::Stopping => "stopping",
            UnitState::Terminated => "terminated",
            UnitState::Failed => "failed",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of the lifecycle a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// While `start` was in flight.
    Starting,
    /// After reaching `Running`.
    Running,
    /// While `stop` was in flight.
    Stopping,
}
