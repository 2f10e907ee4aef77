//! # Unit abstractions.
//!
//! This module provides the runtime-side types of a module:
//! - [`Unit`] - trait implemented by every module instance (start/run/stop)
//! - [`UnitRef`] - shared reference to a unit (`Arc<dyn Unit>`)
//! - [`UnitFn`], [`IdleUnit`] - ready-made implementations
//! - [`UnitState`], [`Phase`] - lifecycle state machine

mod state;
mod unit;
mod unit_fn;

pub use state::{Phase, UnitState};
pub use unit::{Unit, UnitRef};
pub use unit_fn::{IdleUnit, UnitFn};
