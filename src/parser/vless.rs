//! VLESS link decoding.
//!
//! `vless://<uuid>@host:port?security=tls&type=ws&path=/ws#name`

use crate::config::types::ParseError;
use crate::parser::host::{validate_hostname, validate_port_number};
use crate::parser::types::{
    is_insecure_mode, AttrMap, AttrValue, NormalizedConfig, ParseOutcome, VlessDescriptor,
};
use crate::parser::WS_EMPTY_PATH_WARNING;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::BTreeMap;
use url::{Host, Url};
use uuid::Uuid;

pub const VLESS_PLAINTEXT_WARNING: &str = "VLESS without TLS/REALITY; may leak metadata.";

/// Query keys lifted into named descriptor fields.
const NAMED_KEYS: [&str; 8] = [
    "sni",
    "serverName",
    "security",
    "type",
    "network",
    "path",
    "alpn",
    "flow",
];

const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'`');

pub fn parse_vless(uri: &str) -> Result<ParseOutcome, ParseError> {
    let url = Url::parse(uri).map_err(|e| map_url_error(uri, e))?;
    if !url.scheme().eq_ignore_ascii_case("vless") {
        return Err(ParseError::UnsupportedScheme);
    }

    let user = percent_decode_str(url.username()).decode_utf8_lossy();
    let id = Uuid::parse_str(user.trim()).map_err(|_| ParseError::InvalidUuid { scheme: "vless" })?;

    let host = match url.host() {
        Some(Host::Domain(domain)) => percent_decode_str(domain).decode_utf8_lossy().into_owned(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => String::new(),
    };
    let host = validate_hostname(&host)?;
    let port = match url.port() {
        Some(port) => validate_port_number(i64::from(port))?,
        None => return Err(ParseError::PortMissing),
    };

    // First occurrence wins for repeated keys.
    let mut query: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in url.query_pairs() {
        query
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    let named = |key: &str| query.get(key).filter(|v| !v.is_empty()).cloned();

    let sni = named("sni").or_else(|| named("serverName"));
    let security = named("security");
    let network = named("type").or_else(|| named("network"));
    let path = named("path");
    let alpn = named("alpn");
    let flow = named("flow");
    let name = url
        .fragment()
        .map(|f| percent_decode_str(f).decode_utf8_lossy().into_owned())
        .filter(|f| !f.is_empty());

    let params: AttrMap = query
        .iter()
        .filter(|(key, _)| !NAMED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), AttrValue::Text(value.clone())))
        .collect();

    let mut warnings = Vec::new();
    if is_insecure_mode(security.as_deref()) {
        warnings.push(VLESS_PLAINTEXT_WARNING.to_string());
    }
    if network.as_deref() == Some("ws") && path.is_none() {
        warnings.push(WS_EMPTY_PATH_WARNING.to_string());
    }

    Ok(ParseOutcome {
        config: NormalizedConfig::Vless(VlessDescriptor {
            id,
            host,
            port,
            sni,
            security,
            network,
            path,
            alpn,
            flow,
            name,
            params,
        }),
        warnings,
    })
}

impl VlessDescriptor {
    pub fn to_link(&self) -> String {
        let authority_host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let mut link = format!("vless://{}@{}:{}", self.id.hyphenated(), authority_host, self.port);

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        let named = [
            ("security", &self.security),
            ("type", &self.network),
            ("sni", &self.sni),
            ("path", &self.path),
            ("alpn", &self.alpn),
            ("flow", &self.flow),
        ];
        for (key, value) in named {
            if let Some(value) = value {
                query.append_pair(key, value);
            }
        }
        for (key, value) in &self.params {
            query.append_pair(key, &value.as_text());
        }
        let query = query.finish();
        if !query.is_empty() {
            link.push('?');
            link.push_str(&query);
        }

        if let Some(name) = &self.name {
            link.push('#');
            link.push_str(&utf8_percent_encode(name, FRAGMENT).to_string());
        }
        link
    }
}

fn map_url_error(uri: &str, err: url::ParseError) -> ParseError {
    match err {
        url::ParseError::EmptyHost => ParseError::InvalidHost(String::new()),
        url::ParseError::InvalidPort => match authority_port(uri) {
            Some(port) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                ParseError::PortOutOfRange
            }
            _ => ParseError::PortNotNumeric,
        },
        url::ParseError::InvalidIpv6Address
        | url::ParseError::InvalidIpv4Address
        | url::ParseError::InvalidDomainCharacter
        | url::ParseError::IdnaError => ParseError::InvalidHost(authority_host(uri).to_string()),
        other => ParseError::MalformedUri(other.to_string()),
    }
}

fn authority(uri: &str) -> &str {
    let rest = uri.split_once("://").map_or(uri, |(_, rest)| rest);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    authority.rsplit_once('@').map_or(authority, |(_, host_port)| host_port)
}

fn authority_host(uri: &str) -> &str {
    let host_port = authority(uri);
    if host_port.starts_with('[') {
        return host_port.split_once(']').map_or(host_port, |(h, _)| &h[1..]);
    }
    host_port.rsplit_once(':').map_or(host_port, |(host, _)| host)
}

fn authority_port(uri: &str) -> Option<&str> {
    let host_port = authority(uri);
    let after_host = match host_port.split_once(']') {
        Some((_, tail)) => tail,
        None => host_port,
    };
    after_host.rsplit_once(':').map(|(_, port)| port)
}
