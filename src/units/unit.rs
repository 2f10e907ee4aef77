//! # Unit abstraction.
//!
//! A [`Unit`] is the runtime instance produced by a module factory. The
//! orchestrator only ever holds units as [`UnitRef`] (`Arc<dyn Unit>`) and drives
//! them through three phases:
//!
//! ```text
//! start(ctx) ──Ok──► run(ctx) ──returns / ctx cancelled──► stop(ctx)
//! ```
//!
//! - `ctx` passed to `start` and `run` is cancelled when a stop is requested;
//!   `start` must return promptly when it observes cancellation.
//! - `stop` must be safe to call on a unit whose `start` never completed.
//! - Returning [`UnitError::StopProcess`] from `run` marks a deliberate stop.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::UnitError;

/// Shared handle to a unit.
pub type UnitRef = Arc<dyn Unit>;

/// # Uniform start/stop contract implemented by every module.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use modvisor::{Unit, UnitError};
///
/// struct Cache;
///
/// #[async_trait]
/// impl Unit for Cache {
///     async fn start(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
///         // warm up...
///         Ok(())
///     }
///
///     async fn stop(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
///         // flush...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Unit: Send + Sync + 'static {
    /// Brings the unit up. Success moves it to `Running`.
    async fn start(&self, ctx: CancellationToken) -> Result<(), UnitError>;

    /// Body of the running phase.
    ///
    /// The default waits for `ctx` to be cancelled. Returning `Ok(())` or
    /// `Err(UnitError::Canceled)` ends the unit cleanly; any other error marks it
    /// `Failed` (after `stop` has been given a chance to clean up).
    async fn run(&self, ctx: CancellationToken) -> Result<(), UnitError> {
        ctx.cancelled().await;
        Ok(())
    }

    /// Tears the unit down.
    async fn stop(&self, ctx: CancellationToken) -> Result<(), UnitError>;
}
