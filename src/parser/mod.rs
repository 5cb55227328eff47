//! Config parser
//!
//! Decodes a raw `vless://` or `vmess://` link into a validated
//! [`NormalizedConfig`] plus advisory warnings. Parsing is pure and
//! deterministic.

pub mod host;
pub mod types;
pub mod vless;
pub mod vmess;

pub use host::{validate_hostname, validate_port_number, validate_port_text};
pub use types::{AttrMap, AttrValue, NormalizedConfig, ParseOutcome, VlessDescriptor, VmessDescriptor};
pub use vless::parse_vless;
pub use vmess::parse_vmess;

use crate::config::types::ParseError;

pub const WS_EMPTY_PATH_WARNING: &str = "WebSocket selected but path is empty.";

/// Unified entry: dispatch on the (case-insensitive) scheme prefix.
pub fn parse_config(raw: &str) -> Result<ParseOutcome, ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }
    if has_prefix(raw, "vless://") {
        return parse_vless(raw);
    }
    if has_prefix(raw, "vmess://") {
        return parse_vmess(raw);
    }
    Err(ParseError::UnsupportedScheme)
}

fn has_prefix(raw: &str, prefix: &str) -> bool {
    raw.get(..prefix.len())
        .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
}
