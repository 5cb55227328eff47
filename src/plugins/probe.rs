/// TCP reachability helpers shared by the network plugins
use crate::config::types::{ProbeError, Result};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{lookup_host, TcpStream};

/// Resolve `host:port`, returning the first address and the time it took.
pub async fn resolve(host: &str, port: u16, budget: Duration) -> Result<(SocketAddr, Duration)> {
    let started = Instant::now();
    let lookup = tokio::time::timeout(budget, lookup_host((host, port)))
        .await
        .map_err(|_| ProbeError::plugin(format!("dns resolve timed out for {}", host)))?
        .map_err(|e| ProbeError::plugin(format!("dns resolve failed for {}: {}", host, e)))?;

    let addr = lookup
        .into_iter()
        .next()
        .ok_or_else(|| ProbeError::plugin(format!("no addresses for {}", host)))?;
    Ok((addr, started.elapsed()))
}

/// One TCP connect; the stream is dropped right away.
pub async fn connect_once(addr: SocketAddr, budget: Duration) -> Result<Duration> {
    let started = Instant::now();
    match tokio::time::timeout(budget, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => Ok(started.elapsed()),
        Ok(Err(e)) => Err(ProbeError::plugin(format!("connect {} failed: {}", addr, e))),
        Err(_) => Err(ProbeError::plugin(format!("connect {} timed out", addr))),
    }
}

pub fn millis(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

/// min / avg / max of a non-empty sample set, in milliseconds
pub fn latency_summary(samples: &[Duration]) -> Option<(f64, f64, f64)> {
    if samples.is_empty() {
        return None;
    }
    let ms: Vec<f64> = samples.iter().copied().map(millis).collect();
    let min = ms.iter().copied().fold(f64::INFINITY, f64::min);
    let max = ms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let avg = ms.iter().sum::<f64>() / ms.len() as f64;
    Some((min, (avg * 100.0).round() / 100.0, max))
}

/// Mean absolute difference between consecutive samples (ms).
pub fn jitter(samples: &[Duration]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let ms: Vec<f64> = samples.iter().copied().map(millis).collect();
    let total: f64 = ms.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    (total / (ms.len() - 1) as f64 * 100.0).round() / 100.0
}

pub fn metric(metrics: &mut Map<String, Value>, key: &str, value: impl Into<Value>) {
    metrics.insert(key.to_string(), value.into());
}
