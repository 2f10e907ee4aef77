//! # Built-in subscribers
//!
//! - [`LogWriter`]: forwards events to `tracing`.

mod log;

pub use log::LogWriter;
