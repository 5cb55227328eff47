use crate::plugins::contract::PluginOutcome;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Task payload produced by the submission tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_id: Uuid,
    pub user_telegram_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub config_raw: String,
    /// Requested kinds in request order; repeats allowed
    pub tests: Vec<String>,
    #[serde(default)]
    pub consent_required: bool,
    #[serde(default)]
    pub consent_granted: bool,
}

/// Per-kind entry of [`TaskResponse::results`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KindReport {
    pub ok: bool,
    pub metrics: Map<String, Value>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl From<PluginOutcome> for KindReport {
    fn from(outcome: PluginOutcome) -> Self {
        KindReport {
            ok: outcome.ok,
            metrics: outcome.metrics,
            warnings: outcome.warnings,
            error: outcome.error,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_id: Uuid,
    /// True iff at least one kind passed
    pub ok: bool,
    pub results: BTreeMap<String, KindReport>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Task-fatal errors only; non-empty means nothing ran
    #[serde(default)]
    pub errors: Vec<String>,
}

impl TaskResponse {
    /// Response for a task that never reached plugin dispatch.
    pub fn rejected(task_id: Uuid, warnings: Vec<String>, error: impl Into<String>) -> Self {
        TaskResponse {
            task_id,
            ok: false,
            results: BTreeMap::new(),
            warnings,
            errors: vec![error.into()],
        }
    }

    pub fn ran(&self) -> bool {
        self.errors.is_empty()
    }
}
