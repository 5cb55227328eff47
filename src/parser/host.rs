/// Hostname and port validation for config links
///
/// Hostname checks are best-effort: literal addresses pass on shape alone,
/// everything else must survive IDNA (UTS-46) conversion with STD3 ASCII
/// rules. Single-label names are accepted.
use crate::config::types::ParseError;
use idna::uts46::{AsciiDenyList, DnsLength, Hyphens, Uts46};
use regex::Regex;
use std::sync::OnceLock;

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

fn ipv4_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(25[0-5]|2[0-4]\d|1?\d?\d)(\.(25[0-5]|2[0-4]\d|1?\d?\d)){3}$")
            .expect("static IPv4 pattern")
    })
}

fn ipv6_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[?[0-9a-fA-F:]+\]?$").expect("static IPv6 pattern"))
}

/// Validate a host and return its trimmed form.
pub fn validate_hostname(host: &str) -> Result<String, ParseError> {
    let host = host.trim();
    if ipv4_re().is_match(host) || ipv6_re().is_match(host) {
        return Ok(host.to_string());
    }

    let invalid = || ParseError::InvalidHost(host.to_string());

    // STD3 rejects spaces, '_', '*', '/' and the rest of the non-LDH ASCII.
    let ascii = Uts46::new()
        .to_ascii(
            host.as_bytes(),
            AsciiDenyList::STD3,
            Hyphens::Allow,
            DnsLength::Ignore,
        )
        .map_err(|_| invalid())?;
    let ascii = ascii.strip_suffix('.').unwrap_or(&ascii);
    if ascii.is_empty() || ascii.len() > MAX_DOMAIN_LEN {
        return Err(invalid());
    }
    for label in ascii.split('.') {
        if label.is_empty()
            || label.len() > MAX_LABEL_LEN
            || label.starts_with('-')
            || label.ends_with('-')
        {
            return Err(invalid());
        }
    }

    Ok(host.to_string())
}

/// Port given as text (link authority, JSON string).
pub fn validate_port_text(raw: &str) -> Result<u16, ParseError> {
    let port = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| ParseError::PortNotNumeric)?;
    validate_port_number(port)
}

pub fn validate_port_number(port: i64) -> Result<u16, ParseError> {
    if (1..=65535).contains(&port) {
        Ok(port as u16)
    } else {
        Err(ParseError::PortOutOfRange)
    }
}
