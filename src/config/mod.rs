//! Configuration and validation
//!
//! Error taxonomy, worker settings, and task-request validation.

pub mod settings;
pub mod types;
pub mod validator;

pub use settings::WorkerSettings;
