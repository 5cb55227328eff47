use crate::config::types::Result;
use crate::parser::{AttrValue, NormalizedConfig};
use crate::plugins::contract::{PluginContext, PluginOutcome, TestKind, TestPlugin};
use crate::plugins::probe::metric;
use serde_json::{Map, Value};

const PASSING_SCORE: u32 = 60;

/// Static hygiene checks scored out of 100.
pub struct SecurityBasicPlugin;

#[derive(Debug, PartialEq, Eq)]
pub struct HygieneScore {
    pub score: u32,
    pub findings: Vec<String>,
}

pub fn score(config: &NormalizedConfig) -> HygieneScore {
    let mut score: u32 = 100;
    let mut findings = Vec::new();
    let mut deduct = |points: u32, finding: &str| {
        score = score.saturating_sub(points);
        findings.push(finding.to_string());
    };

    if config.is_plaintext() {
        deduct(40, "no transport security");
    } else if config.sni().is_none() {
        deduct(15, "tls without sni");
    }

    let insecure_flag = ["allowInsecure", "allow_insecure", "insecure"]
        .iter()
        .filter_map(|key| config.extra().get(*key))
        .any(is_truthy);
    if insecure_flag {
        deduct(30, "certificate verification disabled");
    }

    if let NormalizedConfig::Vmess(d) = config {
        if d.aid.map_or(false, |aid| aid > 0) {
            deduct(15, "legacy vmess alter-id authentication");
        }
    }

    HygieneScore { score, findings }
}

fn is_truthy(value: &AttrValue) -> bool {
    match value {
        AttrValue::Bool(b) => *b,
        AttrValue::Int(i) => *i != 0,
        other => matches!(other.as_text().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
    }
}

#[async_trait::async_trait]
impl TestPlugin for SecurityBasicPlugin {
    fn kind(&self) -> &str {
        TestKind::SecurityBasic.as_str()
    }

    async fn run(&self, ctx: &PluginContext) -> Result<PluginOutcome> {
        let HygieneScore { score, findings } = score(&ctx.descriptor()?);

        let mut metrics = Map::new();
        metric(&mut metrics, "score", score);
        metric(
            &mut metrics,
            "findings",
            findings.iter().cloned().map(Value::from).collect::<Vec<_>>(),
        );

        let ok = score >= PASSING_SCORE;
        let mut outcome = PluginOutcome::passed(self.kind(), metrics).with_ok(ok);
        if !ok {
            outcome = outcome.with_error(format!("hygiene score {} below {}", score, PASSING_SCORE));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_config;

    const ID: &str = "0e5b8d3c-7a2f-4b1e-9c6d-3f4a5b6c7d8e";

    #[test]
    fn tls_with_sni_is_clean() {
        let parsed = parse_config(&format!("vless://{ID}@example.com:443?security=tls&sni=example.com")).unwrap();
        assert_eq!(
            score(&parsed.config),
            HygieneScore {
                score: 100,
                findings: vec![]
            }
        );
    }

    #[test]
    fn plaintext_with_insecure_flag_fails() {
        let parsed = parse_config(&format!("vless://{ID}@example.com:80?allowInsecure=1")).unwrap();
        let result = score(&parsed.config);
        assert_eq!(result.score, 30);
        assert_eq!(result.findings.len(), 2);
    }

    #[test]
    fn tls_without_sni_is_a_finding() {
        let parsed = parse_config(&format!("vless://{ID}@example.com:443?security=tls")).unwrap();
        let result = score(&parsed.config);
        assert_eq!(result.score, 85);
        assert_eq!(result.findings, vec!["tls without sni".to_string()]);
    }
}
