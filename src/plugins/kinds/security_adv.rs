use crate::config::types::Result;
use crate::exec::runner::{CommandResult, CommandRunner, Invocation};
use crate::plugins::contract::{PluginContext, PluginOutcome, TestKind, TestPlugin};
use crate::plugins::probe::metric;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Active TLS handshake probe through `openssl s_client`.
///
/// Gated by the orchestrator: runs only with the global toggle on and
/// recorded user consent.
pub struct SecurityAdvancedPlugin;

fn protocol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Protocol(?: version)?\s*:\s*(TLSv[0-9.]+|SSLv[0-9.]+)")
            .expect("static protocol pattern")
    })
}

pub fn s_client_argv(host: &str, port: u16, sni: Option<&str>) -> Vec<String> {
    let target = if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    };
    let mut argv = vec![
        "openssl".to_string(),
        "s_client".to_string(),
        "-connect".to_string(),
        target,
        "-brief".to_string(),
    ];
    if let Some(sni) = sni {
        argv.push("-servername".to_string());
        argv.push(sni.to_string());
    }
    argv
}

/// Negotiated protocol from s_client output, if any.
pub fn negotiated_version(result: &CommandResult) -> Option<String> {
    [&result.stderr, &result.stdout].into_iter().find_map(|stream| {
        protocol_pattern()
            .captures(&String::from_utf8_lossy(stream))
            .map(|caps| caps[1].to_string())
    })
}

#[async_trait::async_trait]
impl TestPlugin for SecurityAdvancedPlugin {
    fn kind(&self) -> &str {
        TestKind::SecurityAdv.as_str()
    }

    async fn run(&self, ctx: &PluginContext) -> Result<PluginOutcome> {
        let descriptor = ctx.descriptor()?;
        let sni = descriptor.sni().or(Some(descriptor.host()));
        let argv = s_client_argv(descriptor.host(), descriptor.port(), sni);

        let runner = CommandRunner::new(&ctx.settings);
        let result = runner.run(Invocation::new(argv)).await?;
        let tls_version = negotiated_version(&result);
        let handshake_ok = result.success() && tls_version.is_some();

        let mut metrics = Map::new();
        metric(&mut metrics, "exit_code", result.exit_code);
        metric(&mut metrics, "handshake_ok", handshake_ok);
        metric(
            &mut metrics,
            "tls_version",
            tls_version.clone().map_or(Value::Null, Value::from),
        );
        metric(&mut metrics, "timed_out", result.timed_out);

        let mut outcome = PluginOutcome::passed(self.kind(), metrics).with_ok(handshake_ok);
        if descriptor.is_plaintext() {
            outcome = outcome.with_warnings(vec![
                "endpoint is configured without tls; handshake probe is informational".to_string(),
            ]);
        }
        if !handshake_ok {
            let error = if result.timed_out {
                "tls handshake probe timed out".to_string()
            } else {
                format!("tls handshake failed (exit {})", result.exit_code)
            };
            outcome = outcome.with_error(error);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::output::OutputIntegrity;

    fn result_with_stderr(stderr: &str, exit_code: i32) -> CommandResult {
        CommandResult {
            exit_code,
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
            timed_out: false,
            stdout_integrity: OutputIntegrity::Complete,
            stderr_integrity: OutputIntegrity::Complete,
            wall_time_ms: 12,
        }
    }

    #[test]
    fn argv_brackets_ipv6_and_sets_sni() {
        assert_eq!(
            s_client_argv("2001:db8::1", 443, Some("example.com")),
            vec![
                "openssl",
                "s_client",
                "-connect",
                "[2001:db8::1]:443",
                "-brief",
                "-servername",
                "example.com"
            ]
        );
    }

    #[test]
    fn version_is_read_from_brief_output() {
        let result = result_with_stderr(
            "CONNECTION ESTABLISHED\nProtocol version: TLSv1.3\nCiphersuite: TLS_AES_256_GCM_SHA384\n",
            0,
        );
        assert_eq!(negotiated_version(&result).as_deref(), Some("TLSv1.3"));
        assert_eq!(negotiated_version(&result_with_stderr("connect: refused", 1)), None);
    }
}
