use crate::config::types::Result;
use crate::plugins::contract::{PluginContext, PluginOutcome, TestKind, TestPlugin};
use crate::plugins::probe::{connect_once, jitter, metric, resolve};
use serde_json::Map;
use std::time::Duration;

const ATTEMPTS: usize = 5;
const SPACING: Duration = Duration::from_millis(200);
const CONNECT_BUDGET: Duration = Duration::from_secs(3);
const MIN_SUCCESS_RATIO: f64 = 0.8;

/// Repeated spaced connects; passes when most of them succeed.
pub struct StabilityPlugin;

#[async_trait::async_trait]
impl TestPlugin for StabilityPlugin {
    fn kind(&self) -> &str {
        TestKind::Stability.as_str()
    }

    async fn run(&self, ctx: &PluginContext) -> Result<PluginOutcome> {
        let (host, port) = ctx.endpoint()?;
        let (addr, _) = resolve(&host, port, ctx.settings.dns_resolve_timeout).await?;

        let mut samples = Vec::with_capacity(ATTEMPTS);
        for attempt in 0..ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(SPACING).await;
            }
            if let Ok(elapsed) = connect_once(addr, CONNECT_BUDGET).await {
                samples.push(elapsed);
            }
        }

        let ratio = samples.len() as f64 / ATTEMPTS as f64;
        let mut metrics = Map::new();
        metric(&mut metrics, "attempts", ATTEMPTS as u64);
        metric(&mut metrics, "successes", samples.len() as u64);
        metric(&mut metrics, "success_ratio", ratio);
        metric(&mut metrics, "jitter_ms", jitter(&samples));

        let ok = ratio >= MIN_SUCCESS_RATIO;
        let mut outcome = PluginOutcome::passed(self.kind(), metrics).with_ok(ok);
        if !ok {
            outcome = outcome.with_error(format!(
                "only {}/{} connects succeeded",
                samples.len(),
                ATTEMPTS
            ));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::WorkerSettings;
    use crate::parser::parse_config;
    use std::sync::Arc;

    const ID: &str = "5a1f2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d";

    fn context_for(port: u16) -> PluginContext {
        let parsed = parse_config(&format!("vless://{ID}@127.0.0.1:{port}?security=tls")).unwrap();
        PluginContext {
            request_id: "kind-test".to_string(),
            config: parsed.config.to_attribute_map().unwrap(),
            log_extra: Map::new(),
            timeout: Duration::from_secs(10),
            settings: Arc::new(WorkerSettings::default()),
        }
    }

    /// A port that was just released, so connects are refused.
    async fn closed_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn steady_endpoint_passes() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let outcome = StabilityPlugin.run(&context_for(port)).await.unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.metrics["attempts"], 5);
        assert_eq!(outcome.metrics["successes"], 5);
        assert_eq!(outcome.metrics["success_ratio"], 1.0);
        assert!(outcome.metrics.contains_key("jitter_ms"));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn refused_endpoint_fails_below_ratio() {
        let outcome = StabilityPlugin.run(&context_for(closed_port().await)).await.unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.metrics["successes"], 0);
        assert_eq!(outcome.error.as_deref(), Some("only 0/5 connects succeeded"));
    }
}
