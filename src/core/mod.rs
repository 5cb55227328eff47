//! Task execution core.
//!
//! Task payloads, the orchestrator that runs one task end to end, and the
//! queue job entrypoint that feeds it.

pub mod job;
pub mod orchestrator;
pub mod types;

pub use job::{JobDispatcher, JobEnvelope, EXECUTE_TASK_JOB};
pub use orchestrator::Orchestrator;
pub use types::{KindReport, TaskRequest, TaskResponse};
