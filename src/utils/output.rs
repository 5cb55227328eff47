/// Bounded capture of child process output
///
/// A stream is always read to EOF so the child never blocks on a full
/// pipe, but only the first `limit` bytes are kept.
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Whether a captured stream holds everything the child wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputIntegrity {
    Complete,
    TruncatedByLimit,
}

impl fmt::Display for OutputIntegrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputIntegrity::Complete => write!(f, "complete"),
            OutputIntegrity::TruncatedByLimit => write!(f, "truncated_by_limit"),
        }
    }
}

/// One captured stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedStream {
    /// At most `limit` bytes
    pub data: Vec<u8>,
    pub integrity: OutputIntegrity,
    /// Bytes the child actually wrote
    pub total_bytes: usize,
}

impl CapturedStream {
    pub fn empty() -> Self {
        CapturedStream {
            data: Vec::new(),
            integrity: OutputIntegrity::Complete,
            total_bytes: 0,
        }
    }
}

/// Read `stream` to EOF keeping the first `limit` bytes.
///
/// A read error ends collection early and keeps what was read so far.
pub async fn collect_stream<R>(mut stream: R, limit: usize) -> CapturedStream
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(limit.min(64 * 1024));
    let mut chunk = [0u8; 8192];
    let mut total_bytes = 0usize;

    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                total_bytes += n;
                let room = limit.saturating_sub(buffer.len());
                if room > 0 {
                    buffer.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("output stream closed with error: {}", e);
                break;
            }
        }
    }

    let integrity = if total_bytes > limit {
        OutputIntegrity::TruncatedByLimit
    } else {
        OutputIntegrity::Complete
    };

    CapturedStream {
        data: buffer,
        integrity,
        total_bytes,
    }
}

/// Same as [`collect_stream`] for a pipe that may not have been opened.
pub async fn collect_optional<R>(stream: Option<R>, limit: usize) -> CapturedStream
where
    R: AsyncRead + Unpin,
{
    match stream {
        Some(stream) => collect_stream(stream, limit).await,
        None => CapturedStream::empty(),
    }
}
