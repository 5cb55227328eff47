//! Sandboxed execution
//!
//! Direct (shell-free) process spawning under resource ceilings, a
//! wall-clock budget and an output cap.

pub mod limits;
pub mod runner;

pub use limits::ResourceCeilings;
pub use runner::{CommandResult, CommandRunner, Invocation};
