use crate::config::types::Result;
use crate::parser::NormalizedConfig;
use crate::plugins::contract::{PluginContext, PluginOutcome, TestKind, TestPlugin};
use crate::plugins::probe::metric;
use serde_json::{Map, Value};

const KNOWN_NETWORKS: [&str; 10] = [
    "tcp",
    "ws",
    "grpc",
    "http",
    "h2",
    "quic",
    "kcp",
    "httpupgrade",
    "splithttp",
    "xhttp",
];
const KNOWN_SECURITY: [&str; 4] = ["none", "tls", "reality", "xtls"];
const KNOWN_FLOWS: [&str; 2] = ["xtls-rprx-vision", "xtls-rprx-vision-udp443"];

/// Static protocol checks on the descriptor; no network access.
pub struct CompliancePlugin;

#[derive(Debug, Default, PartialEq)]
pub struct ComplianceReport {
    pub checks: usize,
    pub failed: Vec<String>,
    pub warnings: Vec<String>,
}

impl ComplianceReport {
    fn check(&mut self, passed: bool, failure: impl FnOnce() -> String) {
        self.checks += 1;
        if !passed {
            self.failed.push(failure());
        }
    }
}

pub fn evaluate(config: &NormalizedConfig) -> ComplianceReport {
    let mut report = ComplianceReport::default();

    if let Some(network) = config.network() {
        report.check(KNOWN_NETWORKS.contains(&network.to_ascii_lowercase().as_str()), || {
            format!("unknown transport network: {}", network)
        });
    }
    if let Some(security) = config.security_mode() {
        report.check(KNOWN_SECURITY.contains(&security.to_ascii_lowercase().as_str()), || {
            format!("unknown security mode: {}", security)
        });
    }

    match config {
        NormalizedConfig::Vless(d) => {
            if let Some(flow) = d.flow.as_deref() {
                report.check(KNOWN_FLOWS.contains(&flow), || format!("unknown vless flow: {}", flow));
                report.check(!config.is_plaintext(), || {
                    "vless flow requires tls or reality".to_string()
                });
            }
            if d.security.as_deref() == Some("reality") {
                report.check(d.params.contains_key("pbk"), || {
                    "reality requires a public key (pbk)".to_string()
                });
                report.check(d.sni.is_some(), || "reality requires sni".to_string());
            }
            if d.network.as_deref() == Some("grpc") && !d.params.contains_key("serviceName") {
                report
                    .warnings
                    .push("grpc transport without serviceName".to_string());
            }
        }
        NormalizedConfig::Vmess(d) => {
            if let Some(version) = d.raw.get("v") {
                report.check(version.as_text() == "2", || {
                    format!("unsupported vmess link version: {}", version.as_text())
                });
            }
        }
    }

    if config.network() == Some("ws") {
        report.check(config.path().is_some(), || "websocket transport needs a path".to_string());
    }

    report
}

#[async_trait::async_trait]
impl TestPlugin for CompliancePlugin {
    fn kind(&self) -> &str {
        TestKind::Compliance.as_str()
    }

    async fn run(&self, ctx: &PluginContext) -> Result<PluginOutcome> {
        let report = evaluate(&ctx.descriptor()?);

        let mut metrics = Map::new();
        metric(&mut metrics, "checks", report.checks as u64);
        metric(
            &mut metrics,
            "failed",
            report.failed.iter().cloned().map(Value::from).collect::<Vec<_>>(),
        );

        let ok = report.failed.is_empty();
        let mut outcome = PluginOutcome::passed(self.kind(), metrics)
            .with_ok(ok)
            .with_warnings(report.warnings);
        if !ok {
            outcome = outcome.with_error(report.failed.join("; "));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_config;

    const ID: &str = "5a1f2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d";

    #[test]
    fn clean_tls_websocket_passes() {
        let parsed = parse_config(&format!("vless://{ID}@example.com:443?security=tls&type=ws&path=/ws")).unwrap();
        let report = evaluate(&parsed.config);
        assert!(report.failed.is_empty());
        assert_eq!(report.checks, 3);
    }

    #[test]
    fn reality_without_key_fails() {
        let parsed = parse_config(&format!(
            "vless://{ID}@example.com:443?security=reality&flow=xtls-rprx-vision"
        ))
        .unwrap();
        let report = evaluate(&parsed.config);
        assert_eq!(
            report.failed,
            vec![
                "reality requires a public key (pbk)".to_string(),
                "reality requires sni".to_string()
            ]
        );
    }

    #[test]
    fn flow_over_plaintext_fails() {
        let parsed = parse_config(&format!("vless://{ID}@example.com:80?flow=xtls-rprx-vision")).unwrap();
        let report = evaluate(&parsed.config);
        assert!(report
            .failed
            .contains(&"vless flow requires tls or reality".to_string()));
    }

    #[test]
    fn unknown_transport_fails() {
        let parsed = parse_config(&format!("vless://{ID}@example.com:443?security=tls&type=carrier-pigeon")).unwrap();
        let report = evaluate(&parsed.config);
        assert_eq!(report.failed.len(), 1);
    }
}
