//! VMESS link decoding.
//!
//! `vmess://<base64(JSON)>` with the usual v2rayN keys:
//! `v, ps, add, port, id, aid, net, type, host, path, tls, sni`.

use crate::config::types::ParseError;
use crate::parser::host::{validate_hostname, validate_port_number, validate_port_text};
use crate::parser::types::{
    is_insecure_mode, AttrMap, AttrValue, NormalizedConfig, ParseOutcome, VmessDescriptor,
};
use crate::parser::WS_EMPTY_PATH_WARNING;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde_json::{Map, Value};
use uuid::Uuid;

pub const SCHEME_PREFIX: &str = "vmess://";
pub const VMESS_PLAINTEXT_WARNING: &str = "VMESS without TLS; traffic may be observable.";
pub const VMESS_AID_WARNING: &str = "vmess 'aid' is not numeric; ignored.";

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_allow_trailing_bits(true)
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

pub fn parse_vmess(uri: &str) -> Result<ParseOutcome, ParseError> {
    let payload = strip_scheme(uri).ok_or(ParseError::UnsupportedScheme)?;
    let data = decode_payload(payload)?;
    let mut warnings = Vec::new();

    let id = text_field(&data, "id").unwrap_or_default();
    let id = Uuid::parse_str(&id).map_err(|_| ParseError::InvalidUuid { scheme: "vmess" })?;

    let host = validate_hostname(&text_field(&data, "add").unwrap_or_default())?;
    let port = match data.get("port") {
        None => validate_port_number(0)?,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(port) => validate_port_number(port)?,
            None => return Err(ParseError::PortNotNumeric),
        },
        Some(Value::String(s)) => validate_port_text(s)?,
        Some(_) => return Err(ParseError::PortNotNumeric),
    };

    let aid = match data.get("aid").map(loose_text) {
        Some(raw) if !raw.is_empty() => match raw.parse::<i64>() {
            Ok(aid) => Some(aid),
            Err(_) => {
                warnings.push(VMESS_AID_WARNING.to_string());
                None
            }
        },
        _ => None,
    };

    let net = text_field(&data, "net");
    let type_field = text_field(&data, "type");
    let tls = text_field(&data, "tls");
    let sni = text_field(&data, "sni");
    let host_header = text_field(&data, "host");
    let path = text_field(&data, "path");
    let name = text_field(&data, "ps");

    let raw: AttrMap = data
        .iter()
        .map(|(key, value)| (key.clone(), AttrValue::from_json(value)))
        .collect();

    if is_insecure_mode(tls.as_deref()) {
        warnings.push(VMESS_PLAINTEXT_WARNING.to_string());
    }
    if net.as_deref() == Some("ws") && path.is_none() {
        warnings.push(WS_EMPTY_PATH_WARNING.to_string());
    }

    Ok(ParseOutcome {
        config: NormalizedConfig::Vmess(VmessDescriptor {
            id,
            host,
            port,
            aid,
            net,
            type_field,
            tls,
            sni,
            host_header,
            path,
            name,
            raw,
        }),
        warnings,
    })
}

impl VmessDescriptor {
    /// Re-encode as `vmess://` with extracted fields written over the
    /// preserved payload keys.
    pub fn to_link(&self) -> String {
        let mut data: Map<String, Value> = self
            .raw
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect();

        data.insert("id".to_string(), Value::from(self.id.hyphenated().to_string()));
        data.insert("add".to_string(), Value::from(self.host.clone()));
        data.insert("port".to_string(), Value::from(self.port));
        if let Some(aid) = self.aid {
            data.insert("aid".to_string(), Value::from(aid));
        }
        let optional = [
            ("net", &self.net),
            ("type", &self.type_field),
            ("tls", &self.tls),
            ("sni", &self.sni),
            ("host", &self.host_header),
            ("path", &self.path),
            ("ps", &self.name),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                data.insert(key.to_string(), Value::from(value.clone()));
            }
        }

        let json = Value::Object(data).to_string();
        format!("{}{}", SCHEME_PREFIX, URL_SAFE_NO_PAD.encode(json.as_bytes()))
    }
}

fn strip_scheme(uri: &str) -> Option<&str> {
    let prefix = uri.get(..SCHEME_PREFIX.len())?;
    if prefix.eq_ignore_ascii_case(SCHEME_PREFIX) {
        Some(&uri[SCHEME_PREFIX.len()..])
    } else {
        None
    }
}

/// Pad, base64-decode (URL-safe first, standard as fallback) and parse a
/// JSON object.
fn decode_payload(payload: &str) -> Result<Map<String, Value>, ParseError> {
    let mut compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let pad = (4 - compact.len() % 4) % 4;
    compact.extend(std::iter::repeat('=').take(pad));

    let bytes = URL_SAFE_LENIENT
        .decode(compact.as_bytes())
        .or_else(|_| STANDARD_LENIENT.decode(compact.as_bytes()))
        .map_err(|_| ParseError::InvalidVmessPayload)?;

    let text = String::from_utf8_lossy(&bytes);
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ParseError::InvalidVmessPayload),
    }
}

/// Scalar field as trimmed text; null, missing and empty are absent.
fn text_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match data.get(key)? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Text form of any value, null included (`"None"` never parses as a number).
fn loose_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ID: &str = "2f0d6d2e-8b1c-4a7e-b5a3-6c9d0e1f2a3b";

    fn link(payload: Value) -> String {
        format!("vmess://{}", URL_SAFE_NO_PAD.encode(payload.to_string()))
    }

    fn vmess(outcome: &ParseOutcome) -> &VmessDescriptor {
        match &outcome.config {
            NormalizedConfig::Vmess(d) => d,
            other => panic!("expected vmess, got {other:?}"),
        }
    }

    #[test]
    fn typical_payload() {
        let uri = link(json!({
            "v": "2", "ps": "hk-01", "add": "hk.example.com", "port": "443",
            "id": ID, "aid": "0", "net": "ws", "type": "none",
            "host": "cdn.example.com", "path": "/ray", "tls": "tls", "sni": "hk.example.com"
        }));
        let outcome = parse_vmess(&uri).unwrap();
        let d = vmess(&outcome);
        assert_eq!(d.port, 443);
        assert_eq!(d.aid, Some(0));
        assert_eq!(d.net.as_deref(), Some("ws"));
        assert_eq!(d.type_field.as_deref(), Some("none"));
        assert_eq!(d.host_header.as_deref(), Some("cdn.example.com"));
        assert_eq!(d.name.as_deref(), Some("hk-01"));
        assert_eq!(d.raw.len(), 12);
        assert_eq!(d.raw.get("v"), Some(&AttrValue::Text("2".to_string())));
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn non_numeric_aid_is_a_warning() {
        let uri = link(json!({"id": ID, "add": "1.2.3.4", "port": 443, "aid": "abc", "tls": "tls"}));
        let outcome = parse_vmess(&uri).unwrap();
        assert_eq!(vmess(&outcome).aid, None);
        assert_eq!(outcome.warnings, vec![VMESS_AID_WARNING.to_string()]);
        assert_eq!(
            vmess(&outcome).raw.get("aid"),
            Some(&AttrValue::Text("abc".to_string()))
        );
    }

    #[test]
    fn missing_tls_and_ws_path_warn_in_order() {
        let uri = link(json!({"id": ID, "add": "example.com", "port": 80, "net": "ws"}));
        let outcome = parse_vmess(&uri).unwrap();
        assert_eq!(
            outcome.warnings,
            vec![
                VMESS_PLAINTEXT_WARNING.to_string(),
                WS_EMPTY_PATH_WARNING.to_string()
            ]
        );
    }

    #[test]
    fn padded_standard_alphabet_is_accepted() {
        let payload = json!({"id": ID, "add": "example.com", "port": 443, "tls": "tls"});
        let encoded = base64::engine::general_purpose::STANDARD.encode(payload.to_string());
        assert!(parse_vmess(&format!("VMESS://{encoded}")).is_ok());
    }

    #[test]
    fn payload_failures() {
        assert_eq!(parse_vmess("vmess://%%%"), Err(ParseError::InvalidVmessPayload));
        assert_eq!(
            parse_vmess(&format!("vmess://{}", URL_SAFE_NO_PAD.encode("[1,2]"))),
            Err(ParseError::InvalidVmessPayload)
        );
        assert_eq!(
            parse_vmess(&link(json!({"id": "nope", "add": "example.com", "port": 443}))),
            Err(ParseError::InvalidUuid { scheme: "vmess" })
        );
        assert_eq!(
            parse_vmess(&link(json!({"id": ID, "add": "example.com"}))),
            Err(ParseError::PortOutOfRange)
        );
        assert_eq!(
            parse_vmess(&link(json!({"id": ID, "add": "example.com", "port": "x"}))),
            Err(ParseError::PortNotNumeric)
        );
        assert!(matches!(
            parse_vmess(&link(json!({"id": ID, "add": "", "port": 443}))),
            Err(ParseError::InvalidHost(_))
        ));
    }

    #[test]
    fn relinked_payload_parses_to_same_descriptor() {
        let uri = link(json!({
            "v": "2", "ps": "node", "add": "example.com", "port": 8443, "id": ID,
            "aid": 0, "net": "grpc", "tls": "tls", "extra": {"k": [1, 2]}
        }));
        let first = parse_vmess(&uri).unwrap();
        let second = parse_vmess(&first.config.to_link()).unwrap();
        assert_eq!(first.config, second.config);
    }
}
