use crate::config::types::{ProbeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A value from the open attribute bag.
///
/// Scalars keep their JSON kind; anything else (null, arrays, objects) is
/// kept as its JSON text so unknown fields survive a round trip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Raw { raw: String },
}

impl AttrValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(b) => AttrValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttrValue::Int(i),
                None => match n.as_f64() {
                    Some(f) => AttrValue::Float(f),
                    None => AttrValue::Raw { raw: n.to_string() },
                },
            },
            Value::String(s) => AttrValue::Text(s.clone()),
            other => AttrValue::Raw {
                raw: other.to_string(),
            },
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::Bool(b) => Value::Bool(*b),
            AttrValue::Int(i) => Value::from(*i),
            AttrValue::Float(f) => Value::from(*f),
            AttrValue::Text(s) => Value::String(s.clone()),
            AttrValue::Raw { raw } => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
            }
        }
    }

    /// Text form used when the value is rendered into a link.
    pub fn as_text(&self) -> String {
        match self {
            AttrValue::Bool(b) => b.to_string(),
            AttrValue::Int(i) => i.to_string(),
            AttrValue::Float(f) => f.to_string(),
            AttrValue::Text(s) => s.clone(),
            AttrValue::Raw { raw } => raw.clone(),
        }
    }
}

/// Unrecognized attributes, ordered by key.
pub type AttrMap = BTreeMap<String, AttrValue>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VlessDescriptor {
    pub id: Uuid,
    pub host: String,
    pub port: u16,
    pub sni: Option<String>,
    /// e.g. `tls`, `reality`, `none`
    pub security: Option<String>,
    /// e.g. `tcp`, `ws`, `grpc`
    pub network: Option<String>,
    pub path: Option<String>,
    pub alpn: Option<String>,
    pub flow: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub params: AttrMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VmessDescriptor {
    pub id: Uuid,
    pub host: String,
    pub port: u16,
    /// Legacy alter-id
    pub aid: Option<i64>,
    pub net: Option<String>,
    /// Header obfuscation type (`type` in the link payload)
    pub type_field: Option<String>,
    pub tls: Option<String>,
    pub sni: Option<String>,
    pub host_header: Option<String>,
    pub path: Option<String>,
    pub name: Option<String>,
    /// Every decoded payload key, extracted or not
    #[serde(default)]
    pub raw: AttrMap,
}

/// Normalized proxy endpoint descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NormalizedConfig {
    Vless(VlessDescriptor),
    Vmess(VmessDescriptor),
}

impl NormalizedConfig {
    pub fn scheme(&self) -> &'static str {
        match self {
            NormalizedConfig::Vless(_) => "vless",
            NormalizedConfig::Vmess(_) => "vmess",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            NormalizedConfig::Vless(d) => d.id,
            NormalizedConfig::Vmess(d) => d.id,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            NormalizedConfig::Vless(d) => &d.host,
            NormalizedConfig::Vmess(d) => &d.host,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            NormalizedConfig::Vless(d) => d.port,
            NormalizedConfig::Vmess(d) => d.port,
        }
    }

    /// `security` for VLESS, `tls` for VMESS.
    pub fn security_mode(&self) -> Option<&str> {
        match self {
            NormalizedConfig::Vless(d) => d.security.as_deref(),
            NormalizedConfig::Vmess(d) => d.tls.as_deref(),
        }
    }

    pub fn network(&self) -> Option<&str> {
        match self {
            NormalizedConfig::Vless(d) => d.network.as_deref(),
            NormalizedConfig::Vmess(d) => d.net.as_deref(),
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            NormalizedConfig::Vless(d) => d.path.as_deref(),
            NormalizedConfig::Vmess(d) => d.path.as_deref(),
        }
    }

    pub fn sni(&self) -> Option<&str> {
        match self {
            NormalizedConfig::Vless(d) => d.sni.as_deref(),
            NormalizedConfig::Vmess(d) => d.sni.as_deref(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            NormalizedConfig::Vless(d) => d.name.as_deref(),
            NormalizedConfig::Vmess(d) => d.name.as_deref(),
        }
    }

    /// Open attribute bag (`params` for VLESS, `raw` for VMESS).
    pub fn extra(&self) -> &AttrMap {
        match self {
            NormalizedConfig::Vless(d) => &d.params,
            NormalizedConfig::Vmess(d) => &d.raw,
        }
    }

    /// True when no transport security is configured.
    pub fn is_plaintext(&self) -> bool {
        is_insecure_mode(self.security_mode())
    }

    /// Reassemble a link of the same scheme.
    pub fn to_link(&self) -> String {
        match self {
            NormalizedConfig::Vless(d) => d.to_link(),
            NormalizedConfig::Vmess(d) => d.to_link(),
        }
    }

    /// Untyped view handed to plugins, tagged with `type`.
    pub fn to_attribute_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(ProbeError::Config(format!(
                "normalized config serialized to non-object: {}",
                other
            ))),
        }
    }

    pub fn from_attribute_map(map: &Map<String, Value>) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(map.clone()))?)
    }
}

/// `None`, empty, `none` and `insecure` all mean no transport security.
pub(crate) fn is_insecure_mode(mode: Option<&str>) -> bool {
    matches!(
        mode.unwrap_or("").to_ascii_lowercase().as_str(),
        "" | "none" | "insecure"
    )
}

/// Parser output: descriptor plus advisory warnings.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseOutcome {
    pub config: NormalizedConfig,
    pub warnings: Vec<String>,
}
