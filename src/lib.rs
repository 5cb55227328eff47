//! vproxy-probe: diagnostics worker for VLESS/VMESS proxy configs
//!
//! A task carries a raw proxy link and a list of test kinds. The worker
//! normalizes the link, gates and dispatches the requested kinds with
//! bounded concurrency, and returns one pass/fail report per kind.
//!
//! # Architecture
//!
//! ## Config Parser ([`parser`])
//! - [`parser::host`]: Hostname and port validation
//! - [`parser::vless`]: `vless://` URI decoding
//! - [`parser::vmess`]: `vmess://` base64 JSON decoding
//! - [`parser::types`]: Normalized descriptors and the open attribute bag
//!
//! ## Plugins ([`plugins`])
//! - [`plugins::contract`]: Test kinds, plugin context and outcome
//! - [`plugins::registry`]: Kind to factory table
//! - [`plugins::kinds`]: Built-in probes
//!
//! ## Execution Core ([`core`])
//! - [`core::orchestrator`]: Validate, parse, gate, fan out, aggregate
//! - [`core::job`]: Queue job entrypoint
//!
//! ## Sandboxed Execution ([`exec`])
//! - [`exec::runner`]: Shell-free command runner with timeout and output cap
//! - [`exec::limits`]: Resource ceilings applied before exec
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Error taxonomy
//! - [`config::settings`]: Worker settings (defaults, file, environment)
//! - [`config::validator`]: Task request validation
//!
//! ## Observability ([`observability`])
//! - [`observability::events`]: Structured lifecycle events
//!
//! # Design Principles
//!
//! 1. **Tasks never raise** - every failure is encoded in the response
//! 2. **Kinds are isolated** - a timeout or panic stays inside its kind
//! 3. **No shell, ever** - commands are explicit argument vectors
//! 4. **Ceilings are best effort** - callers never depend on them

// Configuration & Errors
pub mod config;

// Config Parser
pub mod parser;

// Sandboxed Execution
pub mod exec;

// Plugins
pub mod plugins;

// Execution Core
pub mod core;

// Observability
pub mod observability;

// Utilities
pub mod utils;

// CLI entrypoint wiring for the probe-worker binary.
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::{ParseError, ProbeError, Result};
pub use config::WorkerSettings;
pub use crate::core::{Orchestrator, TaskRequest, TaskResponse};
pub use parser::{parse_config, NormalizedConfig, ParseOutcome};
