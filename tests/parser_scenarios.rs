//! Integration tests for the config parser
//!
//! Scenario links, determinism and link round trips across both schemes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::json;
use vproxy_probe::parser::vless::VLESS_PLAINTEXT_WARNING;
use vproxy_probe::parser::vmess::VMESS_PLAINTEXT_WARNING;
use vproxy_probe::parser::{parse_config, NormalizedConfig, WS_EMPTY_PATH_WARNING};
use vproxy_probe::ParseError;

const ID: &str = "3e4f5a6b-7c8d-4e9f-a0b1-c2d3e4f5a6b7";

fn vmess_link(payload: serde_json::Value) -> String {
    format!("vmess://{}", URL_SAFE_NO_PAD.encode(payload.to_string()))
}

#[test]
fn test_vless_tls_websocket_link() {
    let outcome = parse_config(&format!(
        "vless://{ID}@example.com:443?security=tls&type=ws&path=/ws#MyNode"
    ))
    .unwrap();

    let NormalizedConfig::Vless(d) = &outcome.config else {
        panic!("expected vless descriptor");
    };
    assert_eq!(d.id.to_string(), ID);
    assert_eq!(d.host, "example.com");
    assert_eq!(d.port, 443);
    assert_eq!(d.security.as_deref(), Some("tls"));
    assert_eq!(d.network.as_deref(), Some("ws"));
    assert_eq!(d.path.as_deref(), Some("/ws"));
    assert_eq!(d.name.as_deref(), Some("MyNode"));
    assert!(!outcome.warnings.iter().any(|w| w.contains("TLS")));
}

#[test]
fn test_vless_without_security_warns() {
    let outcome = parse_config(&format!("vless://{ID}@example.com:443")).unwrap();
    assert_eq!(outcome.warnings, vec![VLESS_PLAINTEXT_WARNING.to_string()]);
    assert!(outcome.warnings[0].contains("without TLS/REALITY"));
}

#[test]
fn test_vmess_plaintext_websocket_warnings() {
    let outcome = parse_config(&vmess_link(json!({
        "v": "2", "add": "198.51.100.7", "port": 8080, "id": ID, "net": "ws", "tls": "none"
    })))
    .unwrap();
    assert_eq!(outcome.config.host(), "198.51.100.7");
    assert_eq!(
        outcome.warnings,
        vec![
            VMESS_PLAINTEXT_WARNING.to_string(),
            WS_EMPTY_PATH_WARNING.to_string()
        ]
    );
}

#[test]
fn test_single_label_and_idn_hosts_are_accepted() {
    let outcome = parse_config(&format!("vless://{ID}@localhost:443?security=tls")).unwrap();
    assert_eq!(outcome.config.host(), "localhost");

    let outcome = parse_config(&vmess_link(json!({
        "add": "пример.рф", "port": 443, "id": ID, "tls": "tls"
    })))
    .unwrap();
    assert_eq!(outcome.config.host(), "пример.рф");
}

#[test]
fn test_failures_carry_user_facing_messages() {
    let cases = [
        ("   ".to_string(), "empty config"),
        (
            "ss://abc@example.com:1".to_string(),
            "unsupported config type (expect vless:// or vmess://)",
        ),
        (format!("vless://nope@example.com:443"), "invalid vless uuid"),
        (format!("vless://{ID}@example.com:99999"), "port out of range"),
        ("vmess://!!!notbase64".to_string(), "invalid vmess base64/json"),
    ];
    for (raw, message) in cases {
        let err = parse_config(&raw).unwrap_err();
        assert_eq!(err.to_string(), message, "input {raw:?}");
    }

    assert!(matches!(
        parse_config(&vmess_link(json!({"add": "bad..host", "port": 443, "id": ID}))),
        Err(ParseError::InvalidHost(_))
    ));
    assert!(matches!(
        parse_config(&vmess_link(json!({"add": "evil host/x", "port": 443, "id": ID}))),
        Err(ParseError::InvalidHost(_))
    ));
}

#[test]
fn test_parse_is_deterministic() {
    let links = [
        format!("vless://{ID}@example.com:443?security=reality&sni=a.example&pbk=k&sid=1#n"),
        vmess_link(json!({"add": "example.com", "port": "443", "id": ID, "aid": "x"})),
    ];
    for link in links {
        assert_eq!(parse_config(&link), parse_config(&link));
    }
}

#[test]
fn test_round_trip_preserves_descriptor() {
    let links = [
        format!("vless://{ID}@example.com:443?security=tls&type=ws&path=%2Fws&sni=cdn.example&fp=chrome#Edge%20Node"),
        format!("vless://{ID}@[2001:db8::2]:8443?security=reality&flow=xtls-rprx-vision&pbk=abc"),
        vmess_link(json!({
            "v": "2", "ps": "node", "add": "example.com", "port": "443", "id": ID,
            "aid": "0", "net": "ws", "type": "none", "host": "cdn.example", "path": "/ray", "tls": "tls"
        })),
    ];

    for link in links {
        let first = parse_config(&link).unwrap();
        let relinked = first.config.to_link();
        let second = parse_config(&relinked).unwrap();

        assert_eq!(first.config.scheme(), second.config.scheme());
        assert_eq!(first.config.id(), second.config.id());
        assert_eq!(first.config.host(), second.config.host());
        assert_eq!(first.config.port(), second.config.port());
        assert_eq!(first.config.security_mode(), second.config.security_mode());
        assert_eq!(first.config.network(), second.config.network());
        assert_eq!(first.config.path(), second.config.path());
        assert_eq!(first.config.name(), second.config.name());
        assert_eq!(first.warnings, second.warnings);
    }
}

#[test]
fn test_attribute_map_is_tagged_and_reversible() {
    let outcome = parse_config(&format!("vless://{ID}@example.com:443?security=tls&x=1")).unwrap();
    let map = outcome.config.to_attribute_map().unwrap();
    assert_eq!(map["type"], json!("vless"));
    assert_eq!(map["port"], json!(443));
    assert_eq!(map["params"]["x"], json!("1"));
    assert_eq!(NormalizedConfig::from_attribute_map(&map).unwrap(), outcome.config);
}
