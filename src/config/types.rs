/// Shared error types for the probe worker
use thiserror::Error;

/// Errors raised while decoding a raw VLESS/VMESS link.
///
/// Display strings are user facing: they end up verbatim in the task
/// response as `config parse error: <message>`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty config")]
    Empty,

    #[error("unsupported config type (expect vless:// or vmess://)")]
    UnsupportedScheme,

    #[error("malformed vless uri: {0}")]
    MalformedUri(String),

    #[error("invalid {scheme} uuid")]
    InvalidUuid { scheme: &'static str },

    #[error("invalid hostname: {0}")]
    InvalidHost(String),

    #[error("port is required")]
    PortMissing,

    #[error("port must be int")]
    PortNotNumeric,

    #[error("port out of range")]
    PortOutOfRange,

    #[error("invalid vmess base64/json")]
    InvalidVmessPayload,
}

/// Custom error types for the probe worker
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("plugin kind already registered: {0}")]
    DuplicateKind(String),

    #[error("{0}")]
    Plugin(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProbeError {
    /// Shorthand used by plugin bodies to fail with a plain message.
    pub fn plugin(message: impl Into<String>) -> Self {
        ProbeError::Plugin(message.into())
    }
}

/// Result type alias for probe worker operations
pub type Result<T> = std::result::Result<T, ProbeError>;
