/// Structured lifecycle events for the probe worker
///
/// Every event is a single `key=value` line under the `vproxy_probe::audit`
/// target so operators can filter them with `RUST_LOG=vproxy_probe::audit=info`.
/// The task id is the correlation id threaded through every task event.
use log::{info, warn};
use std::time::Duration;
use uuid::Uuid;

pub const AUDIT_TARGET: &str = "vproxy_probe::audit";

/// Why a task never reached plugin dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Validation,
    Parse,
    NothingToRun,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Validation => "validation",
            RejectReason::Parse => "parse",
            RejectReason::NothingToRun => "nothing_to_run",
        }
    }
}

/// Why a requested kind was dropped before dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Consent,
    Unknown,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Consent => "consent",
            SkipReason::Unknown => "unknown",
        }
    }
}

pub fn task_received(task_id: Uuid, telegram_id: i64, requested: usize) {
    info!(
        target: AUDIT_TARGET,
        "event=task_received task_id={} telegram_id={} requested={}",
        task_id, telegram_id, requested
    );
}

pub fn task_rejected(task_id: Uuid, reason: RejectReason, detail: &str) {
    warn!(
        target: AUDIT_TARGET,
        "event=task_rejected task_id={} reason={} detail={:?}",
        task_id,
        reason.as_str(),
        detail
    );
}

pub fn kind_skipped(task_id: Uuid, kind: &str, reason: SkipReason) {
    info!(
        target: AUDIT_TARGET,
        "event=kind_skipped task_id={} kind={} reason={}",
        task_id,
        kind,
        reason.as_str()
    );
}

pub fn kind_finished(task_id: Uuid, kind: &str, ok: bool, elapsed: Duration, error: Option<&str>) {
    info!(
        target: AUDIT_TARGET,
        "event=kind_finished task_id={} kind={} ok={} elapsed_ms={} error={:?}",
        task_id,
        kind,
        ok,
        elapsed.as_millis(),
        error.unwrap_or("")
    );
}

pub fn task_finished(task_id: Uuid, ok: bool, kinds: usize, warnings: usize) {
    info!(
        target: AUDIT_TARGET,
        "event=task_finished task_id={} ok={} kinds={} warnings={}",
        task_id, ok, kinds, warnings
    );
}

pub fn ceilings_unavailable(unavailable: &[&str]) {
    warn!(
        target: AUDIT_TARGET,
        "event=resource_ceilings_unavailable limits={} action=proceed_without",
        unavailable.join(",")
    );
}

pub fn subprocess_timeout(program: &str, pid: Option<u32>, budget: Duration) {
    warn!(
        target: AUDIT_TARGET,
        "event=subprocess_timeout program={} pid={} budget_ms={} action=sigkill",
        program,
        pid.map_or_else(|| "-".to_string(), |p| p.to_string()),
        budget.as_millis()
    );
}
