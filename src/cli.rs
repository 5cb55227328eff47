use crate::config::settings::WorkerSettings;
use crate::core::job::{JobDispatcher, JobEnvelope};
use crate::core::orchestrator::Orchestrator;
use crate::parser::parse_config;
use crate::plugins::registry::PluginRegistry;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about = "Proxy config diagnostics worker", long_about = None)]
struct Cli {
    /// JSON settings file (environment variables still override it)
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one task payload and print the response
    Execute {
        /// Task payload file (stdin when omitted)
        #[arg(long, value_name = "FILE")]
        payload: Option<PathBuf>,
    },
    /// Consume newline-delimited job envelopes from stdin
    Consume,
    /// Parse a vless:// or vmess:// link and print the descriptor
    Parse {
        /// Raw config link
        raw: String,
    },
    /// List registered test kinds
    Kinds,
}

pub fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = load_settings(cli.settings.as_deref())?;
    settings.validate()?;
    log::info!(
        "{} starting (max_parallel_plugins={}, security_advanced={})",
        settings.service_name,
        settings.max_parallel_plugins,
        settings.enable_security_advanced
    );

    let registry = PluginRegistry::builtin()?;

    match cli.command {
        Commands::Kinds => {
            for kind in registry.available_kinds() {
                println!("{}", kind);
            }
        }
        Commands::Parse { raw } => {
            let outcome = parse_config(&raw).map_err(|e| anyhow::anyhow!("config parse error: {}", e))?;
            let value = json!({
                "config": outcome.config,
                "warnings": outcome.warnings,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Execute { payload } => {
            let payload = read_payload(payload.as_deref())?;
            let orchestrator = Orchestrator::new(Arc::new(settings), registry);
            let runtime = build_runtime()?;
            let response = runtime.block_on(orchestrator.execute_payload(&payload));
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Consume => {
            let orchestrator = Orchestrator::new(Arc::new(settings), registry);
            let dispatcher = JobDispatcher::new(orchestrator);
            let runtime = build_runtime()?;
            consume(&runtime, &dispatcher)?;
        }
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<WorkerSettings> {
    let base = match path {
        Some(path) => WorkerSettings::load_from_file(path)?,
        None => WorkerSettings::default(),
    };
    Ok(base.with_overrides(|key| std::env::var(key).ok())?)
}

/// One logical thread per worker process.
fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")
}

fn read_payload(path: Option<&Path>) -> Result<Value> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read payload {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read payload from stdin")?;
            text
        }
    };
    serde_json::from_str(&text).context("payload is not valid JSON")
}

fn consume(runtime: &tokio::runtime::Runtime, dispatcher: &JobDispatcher) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context("failed to read job from stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<JobEnvelope>(&line) {
            Ok(envelope) => match runtime.block_on(dispatcher.dispatch_envelope(&envelope)) {
                Ok(result) => json!({"job": envelope.job, "result": result}),
                Err(e) => {
                    log::error!("job {} failed: {}", envelope.job, e);
                    json!({"job": envelope.job, "error": e.to_string()})
                }
            },
            Err(e) => {
                log::error!("malformed job envelope: {}", e);
                json!({"error": format!("malformed job envelope: {}", e)})
            }
        };

        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }

    Ok(())
}
