//! # Function-backed unit (`UnitFn`)
//!
//! [`UnitFn`] wraps a closure `F: Fn(CancellationToken) -> Fut` used as the unit's
//! run phase. `start` and `stop` succeed immediately, which makes it a good fit
//! for background loops that own no resources outside the closure.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use modvisor::{UnitError, UnitFn, UnitRef};
//!
//! let u: UnitRef = UnitFn::arc(|ctx: CancellationToken| async move {
//!     ctx.cancelled().await;
//!     Ok::<_, UnitError>(())
//! });
//! # let _ = u;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::UnitError;
use crate::units::unit::{Unit, UnitRef};

/// Function-backed unit implementation.
#[derive(Debug)]
pub struct UnitFn<F> {
    f: F,
}

impl<F> UnitFn<F> {
    /// Creates a new function-backed unit.
    ///
    /// Prefer [`UnitFn::arc`] when you immediately need a [`UnitRef`](crate::UnitRef).
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the unit and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Unit for UnitFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), UnitError>> + Send + 'static,
{
    async fn start(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
        Ok(())
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), UnitError> {
        (self.f)(ctx).await
    }

    async fn stop(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
        Ok(())
    }
}

/// Unit with no behaviour: starts, waits for stop, stops.
///
/// Useful for grouping modules that exist only to pull in dependencies.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleUnit;

impl IdleUnit {
    /// Shared handle to an idle unit.
    pub fn arc() -> UnitRef {
        Arc::new(Self)
    }
}

#[async_trait]
impl Unit for IdleUnit {
    async fn start(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
        Ok(())
    }

    async fn stop(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
        Ok(())
    }
}
