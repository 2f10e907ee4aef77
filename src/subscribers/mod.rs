//! # Event subscribers for the modvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and built-in implementations.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   UnitActor ── publish(Event) ──► Bus ──► forwarder ──► SubscriberSet::emit(&Event)
//!                                                           │
//!                                                  ┌────────┼─────────┐
//!                                                  ▼        ▼         ▼
//!                                              LogWriter  Metrics   Custom
//! ```
//!
//! Barrier bookkeeping is not a subscriber: the orchestrator's listener receives
//! transitions directly from the unit actors and never drops one.

#[cfg(feature = "logging")]
mod embedded;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
