//! Diagnostic plugins
//!
//! The plugin contract, the kind registry and the built-in probes.

pub mod contract;
pub mod kinds;
pub mod probe;
pub mod registry;

pub use contract::{PluginContext, PluginOutcome, TestKind, TestPlugin};
pub use registry::{PluginFactory, PluginRegistry, PluginRegistryBuilder};
