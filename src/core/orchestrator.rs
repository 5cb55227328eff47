/// Task execution orchestrator
///
/// One call runs one task end to end: validate → parse → gate → fan out →
/// aggregate. Every failure path is encoded in the returned
/// [`TaskResponse`]; nothing here returns an error to the caller.
use crate::config::settings::WorkerSettings;
use crate::config::validator::validate_task_request;
use crate::core::types::{KindReport, TaskRequest, TaskResponse};
use crate::observability::events::{self, RejectReason, SkipReason};
use crate::parser::parse_config;
use crate::plugins::contract::{PluginContext, PluginOutcome, TestKind};
use crate::plugins::registry::PluginRegistry;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

pub const CONSENT_SKIPPED_WARNING: &str =
    "advanced security tests skipped (consent disabled or not granted).";
pub const NO_EFFECTIVE_TESTS: &str = "no effective tests to run";
pub const PLUGIN_TIMEOUT_ERROR: &str = "timeout";

#[derive(Clone, Debug)]
pub struct Orchestrator {
    settings: Arc<WorkerSettings>,
    registry: Arc<PluginRegistry>,
}

impl Orchestrator {
    pub fn new(settings: Arc<WorkerSettings>, registry: PluginRegistry) -> Self {
        Orchestrator {
            settings,
            registry: Arc::new(registry),
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Run a task from its raw JSON payload. A payload that does not
    /// deserialize is a validation failure.
    pub async fn execute_payload(&self, payload: &Value) -> TaskResponse {
        match serde_json::from_value::<TaskRequest>(payload.clone()) {
            Ok(request) => self.execute(request).await,
            Err(e) => {
                let task_id = payload
                    .get("task_id")
                    .and_then(Value::as_str)
                    .and_then(|raw| Uuid::parse_str(raw).ok())
                    .unwrap_or_else(Uuid::nil);
                let error = format!("validation error: {}", e);
                events::task_rejected(task_id, RejectReason::Validation, &error);
                TaskResponse::rejected(task_id, Vec::new(), error)
            }
        }
    }

    pub async fn execute(&self, request: TaskRequest) -> TaskResponse {
        let task_id = request.task_id;
        events::task_received(task_id, request.user_telegram_id, request.tests.len());

        let validation = validate_task_request(&request);
        if !validation.is_valid() {
            let error = format!("validation error: {}", validation.summary());
            events::task_rejected(task_id, RejectReason::Validation, &error);
            return TaskResponse::rejected(task_id, Vec::new(), error);
        }

        let parsed = match parse_config(&request.config_raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                let error = format!("config parse error: {}", e);
                events::task_rejected(task_id, RejectReason::Parse, &error);
                return TaskResponse::rejected(task_id, Vec::new(), error);
            }
        };
        let mut warnings = parsed.warnings;

        let effective = self.select_kinds(&request, &mut warnings);
        if effective.is_empty() {
            events::task_rejected(task_id, RejectReason::NothingToRun, NO_EFFECTIVE_TESTS);
            return TaskResponse::rejected(task_id, warnings, NO_EFFECTIVE_TESTS);
        }

        let config = match parsed.config.to_attribute_map() {
            Ok(config) => config,
            Err(e) => {
                let error = format!("config parse error: {}", e);
                events::task_rejected(task_id, RejectReason::Parse, &error);
                return TaskResponse::rejected(task_id, warnings, error);
            }
        };

        let mut log_extra = Map::new();
        log_extra.insert("telegram_id".to_string(), Value::from(request.user_telegram_id));
        log_extra.insert(
            "username".to_string(),
            request.username.clone().map_or(Value::Null, Value::from),
        );

        let ctx = Arc::new(PluginContext {
            request_id: task_id.to_string(),
            config,
            log_extra,
            timeout: self.settings.task_timeout,
            settings: Arc::clone(&self.settings),
        });

        let results = self.fan_out(task_id, ctx, effective).await;
        let ok = results.values().any(|report| report.ok);
        events::task_finished(task_id, ok, results.len(), warnings.len());

        TaskResponse {
            task_id,
            ok,
            results,
            warnings,
            errors: Vec::new(),
        }
    }

    /// Dedup (first occurrence wins), then the consent gate, then the
    /// registry check. Warnings are appended in that order.
    fn select_kinds(&self, request: &TaskRequest, warnings: &mut Vec<String>) -> Vec<String> {
        let consent_ok = self.settings.enable_security_advanced
            && request.consent_required
            && request.consent_granted;

        let mut seen = HashSet::new();
        let mut gated = Vec::new();
        for kind in &request.tests {
            if !seen.insert(kind.as_str()) {
                continue;
            }
            let sensitive = kind
                .parse::<TestKind>()
                .map_or(false, |k| k.is_sensitive());
            if sensitive && !consent_ok {
                warnings.push(CONSENT_SKIPPED_WARNING.to_string());
                events::kind_skipped(request.task_id, kind, SkipReason::Consent);
                continue;
            }
            gated.push(kind.clone());
        }

        let (effective, unknown): (Vec<String>, Vec<String>) = gated
            .into_iter()
            .partition(|kind| self.registry.contains(kind));
        if !unknown.is_empty() {
            for kind in &unknown {
                events::kind_skipped(request.task_id, kind, SkipReason::Unknown);
            }
            let listed: Vec<String> = unknown.iter().map(|k| format!("'{}'", k)).collect();
            warnings.push(format!(
                "unknown/unsupported test kinds skipped: [{}]",
                listed.join(", ")
            ));
        }
        effective
    }

    async fn fan_out(
        &self,
        task_id: Uuid,
        ctx: Arc<PluginContext>,
        kinds: Vec<String>,
    ) -> BTreeMap<String, KindReport> {
        let pool = Arc::new(Semaphore::new(self.settings.max_parallel_plugins.max(1)));
        let mut running = RunningKinds(Vec::with_capacity(kinds.len()));

        for kind in kinds {
            let pool = Arc::clone(&pool);
            let ctx = Arc::clone(&ctx);
            let registry = Arc::clone(&self.registry);
            let spawned_kind = kind.clone();
            let handle = tokio::spawn(async move {
                run_guarded(task_id, &registry, &pool, &ctx, &spawned_kind).await
            });
            running.0.push((kind, handle));
        }

        let mut results = BTreeMap::new();
        for (kind, handle) in running.0.iter_mut() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let error = join_failure(e);
                    events::kind_finished(
                        task_id,
                        kind,
                        false,
                        Default::default(),
                        Some(error.as_str()),
                    );
                    PluginOutcome::failed(kind.clone(), error)
                }
            };
            results.insert(kind.clone(), KindReport::from(outcome));
        }
        results
    }
}

/// Spawned kinds; aborted if the task future is dropped mid-flight.
struct RunningKinds(Vec<(String, JoinHandle<PluginOutcome>)>);

impl Drop for RunningKinds {
    fn drop(&mut self) {
        for (_, handle) in &self.0 {
            handle.abort();
        }
    }
}

async fn run_guarded(
    task_id: Uuid,
    registry: &PluginRegistry,
    pool: &Semaphore,
    ctx: &PluginContext,
    kind: &str,
) -> PluginOutcome {
    // Waits, never rejects, when every slot is taken.
    let _permit = match pool.acquire().await {
        Ok(permit) => permit,
        Err(_) => return PluginOutcome::failed(kind, "plugin pool closed"),
    };

    let started = Instant::now();
    let outcome = match registry.make_plugin(kind) {
        Err(e) => PluginOutcome::failed(kind, e.to_string()),
        Ok(plugin) => match tokio::time::timeout(ctx.timeout, plugin.run(ctx)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => PluginOutcome::failed(kind, e.to_string()),
            Err(_) => PluginOutcome::failed(kind, PLUGIN_TIMEOUT_ERROR),
        },
    };

    events::kind_finished(
        task_id,
        kind,
        outcome.ok,
        started.elapsed(),
        outcome.error.as_deref(),
    );
    outcome
}

fn join_failure(err: JoinError) -> String {
    if !err.is_panic() {
        return "plugin task cancelled".to_string();
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("plugin panicked: {}", message)
}
