//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: unit actors (one event per transition), `Orchestrator`
//!   (healthy/stopped/shutdown/grace), `SubscriberSet` workers (panic).
//! - **Consumers**: the orchestrator's forwarder, which fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
