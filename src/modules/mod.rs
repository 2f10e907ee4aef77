//! # Module registration and target resolution.
//!
//! - [`Registry`] - module descriptors, dependency table, conditional rules
//! - [`FeatureToggles`], [`StaticToggles`] - flag predicate for gated modules
//! - [`Resolution`] - adjusted targets plus activation order
//!
//! The dependency graph and the resolver are internal; the orchestrator drives
//! them during `init`.

mod graph;
mod registry;
mod resolve;
mod toggles;

pub use registry::{ConditionalModule, Factory, ModuleDescriptor, Registry, Visibility};
pub use resolve::Resolution;
pub use toggles::{FeatureToggles, StaticToggles};

pub(crate) use resolve::TargetResolver;
