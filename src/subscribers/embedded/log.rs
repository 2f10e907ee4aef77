//! # LogWriter: diagnostic sink on top of `tracing`
//!
//! A subscriber that turns incoming [`Event`]s into `tracing` records. The host
//! process decides where they end up by installing a `tracing` subscriber.
//!
//! ## Levels
//! ```text
//! transition → failed (genuine)         error  "module failed"
//! transition → failed (stop sentinel)   info   "received stop signal via return error"
//! transition (other)                    debug  "module state changed"
//! modules healthy / stopped             info
//! shutdown requested                    info
//! grace exceeded                        warn
//! subscriber overflow / panicked        warn
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use crate::units::UnitState;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let unit = e.unit.as_deref().unwrap_or("unknown");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::UnitTransition => {
                let from = e.from.map(UnitState::as_str).unwrap_or("?");
                let to = e.to.map(UnitState::as_str).unwrap_or("?");
                if !e.is_failure() {
                    debug!(module = unit, from, to, "module state changed");
                } else if e.stop_process {
                    info!(module = unit, err = reason, "received stop signal via return error");
                } else {
                    error!(module = unit, from, err = reason, "module failed");
                }
            }
            EventKind::ModulesHealthy => info!("all modules healthy"),
            EventKind::ModulesStopped => info!("all modules stopped"),
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::GraceExceeded => {
                warn!(grace_ms = e.grace_ms, stuck = reason, "modules did not stop within grace");
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = unit, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                warn!(subscriber = unit, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
