/// Worker settings loading
///
/// Settings are resolved once at process start: built-in defaults, then an
/// optional JSON settings file, then environment overrides. The resulting
/// value is immutable and handed around behind an `Arc`.
use crate::config::types::{ProbeError, Result};
use crate::config::validator::ValidationResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_TASK_TIMEOUT: &str = "DEFAULT_TASK_TIMEOUT_SEC";
pub const ENV_SUBPROCESS_TIMEOUT: &str = "DEFAULT_SUBPROCESS_TIMEOUT_SEC";
pub const ENV_SUBPROCESS_MAX_OUTPUT: &str = "DEFAULT_SUBPROCESS_MAX_OUTPUT_BYTES";
pub const ENV_ENABLE_SECURITY_ADVANCED: &str = "ENABLE_SECURITY_ADVANCED";
pub const ENV_MAX_PARALLEL_PLUGINS: &str = "MAX_PARALLEL_PLUGINS";
pub const ENV_DNS_RESOLVE_TIMEOUT: &str = "DNS_RESOLVE_TIMEOUT_SEC";
pub const ENV_SERVICE_NAME: &str = "SERVICE_NAME";

/// Runtime limits and toggles shared by the orchestrator, the command
/// runner and the plugins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Per-kind plugin budget
    #[serde(with = "duration_secs")]
    pub task_timeout: Duration,
    /// Wall-clock budget for one sandboxed command
    #[serde(with = "duration_secs")]
    pub subprocess_timeout: Duration,
    /// Per-stream capture cap for sandboxed commands (bytes)
    pub subprocess_max_output_bytes: usize,
    /// Global switch for the `security_adv` kind
    pub enable_security_advanced: bool,
    /// Concurrent plugin slots per task
    pub max_parallel_plugins: usize,
    /// Name resolution budget used by network probes
    #[serde(with = "duration_secs")]
    pub dns_resolve_timeout: Duration,
    pub service_name: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(75),
            subprocess_timeout: Duration::from_secs(30),
            subprocess_max_output_bytes: 1_000_000,
            enable_security_advanced: false,
            max_parallel_plugins: 4,
            dns_resolve_timeout: Duration::from_secs(5),
            service_name: "VProxySuite Worker".to_string(),
        }
    }
}

impl WorkerSettings {
    /// Load settings from a JSON file; missing keys keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ProbeError::Config(format!(
                "Failed to read settings file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| ProbeError::Config(format!("Failed to parse settings JSON: {}", e)))
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secs) = read_u64(&lookup, ENV_TASK_TIMEOUT)? {
            self.task_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = read_u64(&lookup, ENV_SUBPROCESS_TIMEOUT)? {
            self.subprocess_timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = read_u64(&lookup, ENV_SUBPROCESS_MAX_OUTPUT)? {
            self.subprocess_max_output_bytes = bytes as usize;
        }
        if let Some(raw) = lookup(ENV_ENABLE_SECURITY_ADVANCED) {
            self.enable_security_advanced = parse_bool(ENV_ENABLE_SECURITY_ADVANCED, &raw)?;
        }
        if let Some(slots) = read_u64(&lookup, ENV_MAX_PARALLEL_PLUGINS)? {
            self.max_parallel_plugins = slots as usize;
        }
        if let Some(secs) = read_u64(&lookup, ENV_DNS_RESOLVE_TIMEOUT)? {
            self.dns_resolve_timeout = Duration::from_secs(secs);
        }
        if let Some(name) = lookup(ENV_SERVICE_NAME) {
            if !name.trim().is_empty() {
                self.service_name = name.trim().to_string();
            }
        }
        Ok(self)
    }

    /// Startup validation; errors are fatal, warnings are logged.
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut result = ValidationResult::new();

        if self.task_timeout.is_zero() {
            result.add_error("task_timeout cannot be zero".to_string());
        }
        if self.subprocess_timeout.is_zero() {
            result.add_error("subprocess_timeout cannot be zero".to_string());
        }
        if self.subprocess_max_output_bytes == 0 {
            result.add_error("subprocess_max_output_bytes cannot be zero".to_string());
        }
        if self.max_parallel_plugins == 0 {
            result.add_error("max_parallel_plugins must be at least 1".to_string());
        } else if self.max_parallel_plugins > 64 {
            result.add_warning(format!(
                "max_parallel_plugins {} is unusually high for a single task",
                self.max_parallel_plugins
            ));
        }
        if self.subprocess_timeout > self.task_timeout {
            result.add_warning(format!(
                "subprocess_timeout {:?} exceeds task_timeout {:?}; commands will be cut by the plugin budget",
                self.subprocess_timeout, self.task_timeout
            ));
        }

        if !result.is_valid() {
            return Err(ProbeError::Config(format!(
                "Settings validation failed:\n{}",
                result.errors.join("\n")
            )));
        }

        for warning in &result.warnings {
            log::warn!("{}", warning);
        }

        Ok(result)
    }
}

fn read_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ProbeError::Config(format!("{} must be a non-negative integer: {}", key, e))),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ProbeError::Config(format!(
            "{} must be a boolean, got {:?}",
            key, other
        ))),
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_worker_contract() {
        let settings = WorkerSettings::default();
        assert_eq!(settings.task_timeout, Duration::from_secs(75));
        assert_eq!(settings.subprocess_timeout, Duration::from_secs(30));
        assert_eq!(settings.subprocess_max_output_bytes, 1_000_000);
        assert!(!settings.enable_security_advanced);
        assert_eq!(settings.max_parallel_plugins, 4);
        assert_eq!(settings.dns_resolve_timeout, Duration::from_secs(5));
    }

    #[test]
    fn overrides_are_applied() {
        let settings = WorkerSettings::default()
            .with_overrides(lookup_from(&[
                (ENV_TASK_TIMEOUT, "10"),
                (ENV_ENABLE_SECURITY_ADVANCED, "TRUE"),
                (ENV_MAX_PARALLEL_PLUGINS, " 2 "),
                (ENV_SUBPROCESS_MAX_OUTPUT, "4096"),
            ]))
            .unwrap();
        assert_eq!(settings.task_timeout, Duration::from_secs(10));
        assert!(settings.enable_security_advanced);
        assert_eq!(settings.max_parallel_plugins, 2);
        assert_eq!(settings.subprocess_max_output_bytes, 4096);
        assert_eq!(settings.subprocess_timeout, Duration::from_secs(30));
    }

    #[test]
    fn malformed_override_is_config_error() {
        let err = WorkerSettings::default()
            .with_overrides(lookup_from(&[(ENV_MAX_PARALLEL_PLUGINS, "many")]))
            .unwrap_err();
        assert!(matches!(err, ProbeError::Config(_)));

        let err = WorkerSettings::default()
            .with_overrides(lookup_from(&[(ENV_ENABLE_SECURITY_ADVANCED, "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_ENABLE_SECURITY_ADVANCED));
    }

    #[test]
    fn validation_rejects_zero_parallelism() {
        let settings = WorkerSettings {
            max_parallel_plugins: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        assert!(WorkerSettings::default().validate().unwrap().is_valid());
    }

    #[test]
    fn settings_file_keeps_defaults_for_missing_keys() {
        let dir = std::env::temp_dir().join(format!("vproxy-settings-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        std::fs::write(&path, r#"{"task_timeout": 12, "enable_security_advanced": true}"#).unwrap();

        let settings = WorkerSettings::load_from_file(&path).unwrap();
        assert_eq!(settings.task_timeout, Duration::from_secs(12));
        assert!(settings.enable_security_advanced);
        assert_eq!(settings.max_parallel_plugins, 4);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
