use crate::config::types::Result;
use crate::plugins::contract::{PluginContext, PluginOutcome, TestKind, TestPlugin};
use crate::plugins::probe::{connect_once, latency_summary, metric, millis, resolve};
use serde_json::Map;
use std::time::Duration;

const SAMPLES: usize = 3;
const CONNECT_BUDGET: Duration = Duration::from_secs(5);

/// DNS resolve time plus TCP connect latency to the endpoint.
pub struct PerformancePlugin;

#[async_trait::async_trait]
impl TestPlugin for PerformancePlugin {
    fn kind(&self) -> &str {
        TestKind::Performance.as_str()
    }

    async fn run(&self, ctx: &PluginContext) -> Result<PluginOutcome> {
        let (host, port) = ctx.endpoint()?;
        let (addr, resolve_time) = resolve(&host, port, ctx.settings.dns_resolve_timeout).await?;

        let mut samples = Vec::with_capacity(SAMPLES);
        let mut failures = Vec::new();
        for _ in 0..SAMPLES {
            match connect_once(addr, CONNECT_BUDGET).await {
                Ok(elapsed) => samples.push(elapsed),
                Err(e) => failures.push(e.to_string()),
            }
        }
        log::debug!(
            "[{}] performance {}: {} ok, {} failed",
            ctx.request_id,
            addr,
            samples.len(),
            failures.len()
        );

        let mut metrics = Map::new();
        metric(&mut metrics, "resolve_ms", millis(resolve_time));
        metric(&mut metrics, "samples", samples.len() as u64);
        metric(&mut metrics, "failures", failures.len() as u64);
        if let Some((min, avg, max)) = latency_summary(&samples) {
            metric(&mut metrics, "connect_ms_min", min);
            metric(&mut metrics, "connect_ms_avg", avg);
            metric(&mut metrics, "connect_ms_max", max);
        }

        let mut outcome = PluginOutcome::passed(self.kind(), metrics).with_ok(!samples.is_empty());
        if let Some(last) = failures.last() {
            if samples.is_empty() {
                outcome = outcome.with_error(last.clone());
            } else {
                outcome = outcome.with_warnings(vec![format!(
                    "{} of {} connects failed",
                    failures.len(),
                    SAMPLES
                )]);
            }
        }
        Ok(outcome)
    }
}
