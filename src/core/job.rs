use crate::config::types::{ProbeError, Result};
use crate::core::orchestrator::Orchestrator;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Queue job name the submission tier publishes tasks under
pub const EXECUTE_TASK_JOB: &str = "vproxysuite.execute_task";

/// One queued job as it arrives from the transport
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job: String,
    pub payload: Value,
}

/// Routes named jobs to the orchestrator.
#[derive(Clone, Debug)]
pub struct JobDispatcher {
    orchestrator: Orchestrator,
}

impl JobDispatcher {
    pub fn new(orchestrator: Orchestrator) -> Self {
        JobDispatcher { orchestrator }
    }

    pub fn jobs(&self) -> &'static [&'static str] {
        &[EXECUTE_TASK_JOB]
    }

    /// Run one job and return its JSON result.
    pub async fn dispatch(&self, job: &str, payload: &Value) -> Result<Value> {
        match job {
            EXECUTE_TASK_JOB => {
                let response = self.orchestrator.execute_payload(payload).await;
                Ok(serde_json::to_value(response)?)
            }
            other => Err(ProbeError::NotFound(format!("unknown job: {}", other))),
        }
    }

    pub async fn dispatch_envelope(&self, envelope: &JobEnvelope) -> Result<Value> {
        self.dispatch(&envelope.job, &envelope.payload).await
    }
}
