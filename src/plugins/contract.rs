/// Plugin capability contract
///
/// A plugin is one diagnostic probe category. The orchestrator hands every
/// plugin of a task the same read-only [`PluginContext`] and expects back a
/// [`PluginOutcome`]; an `Err` from `run` becomes a failed outcome carrying
/// the error's message.
use crate::config::settings::WorkerSettings;
use crate::config::types::{ProbeError, Result};
use crate::parser::NormalizedConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Closed set of test kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Performance,
    Stability,
    Compliance,
    SecurityBasic,
    SecurityAdv,
}

impl TestKind {
    pub const ALL: [TestKind; 5] = [
        TestKind::Performance,
        TestKind::Stability,
        TestKind::Compliance,
        TestKind::SecurityBasic,
        TestKind::SecurityAdv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::Performance => "performance",
            TestKind::Stability => "stability",
            TestKind::Compliance => "compliance",
            TestKind::SecurityBasic => "security_basic",
            TestKind::SecurityAdv => "security_adv",
        }
    }

    /// Kinds that need the global toggle plus recorded user consent
    pub fn is_sensitive(&self) -> bool {
        matches!(self, TestKind::SecurityAdv)
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestKind {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        TestKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProbeError::NotFound(format!("unknown test kind: {}", s)))
    }
}

/// Read-only environment shared by all plugins of one task
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Task id, used as correlation id in logs
    pub request_id: String,
    /// Normalized config as an untyped attribute map
    pub config: Map<String, Value>,
    pub log_extra: Map<String, Value>,
    /// Per-kind budget enforced by the orchestrator
    pub timeout: Duration,
    pub settings: Arc<WorkerSettings>,
}

impl PluginContext {
    /// Typed view of `config`.
    pub fn descriptor(&self) -> Result<NormalizedConfig> {
        NormalizedConfig::from_attribute_map(&self.config)
    }

    /// `host:port` of the endpoint under test.
    pub fn endpoint(&self) -> Result<(String, u16)> {
        let descriptor = self.descriptor()?;
        Ok((descriptor.host().to_string(), descriptor.port()))
    }
}

/// What one plugin run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginOutcome {
    pub ok: bool,
    pub kind: String,
    #[serde(default)]
    pub metrics: Map<String, Value>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PluginOutcome {
    pub fn passed(kind: impl Into<String>, metrics: Map<String, Value>) -> Self {
        PluginOutcome {
            ok: true,
            kind: kind.into(),
            metrics,
            warnings: Vec::new(),
            error: None,
        }
    }

    /// Failed outcome with no metrics.
    pub fn failed(kind: impl Into<String>, error: impl Into<String>) -> Self {
        PluginOutcome {
            ok: false,
            kind: kind.into(),
            metrics: Map::new(),
            warnings: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn with_ok(mut self, ok: bool) -> Self {
        self.ok = ok;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[async_trait::async_trait]
pub trait TestPlugin: Send + Sync {
    fn kind(&self) -> &str;

    async fn run(&self, ctx: &PluginContext) -> Result<PluginOutcome>;
}
