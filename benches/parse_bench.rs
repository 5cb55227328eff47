// Parser latency benchmark
// Measures parse_config for typical VLESS and VMESS links
// Target: p95 < 50us per link on a warm process

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::hint::black_box;
use std::time::{Duration, Instant};
use vproxy_probe::parse_config;

/// Benchmark configuration
const ITERATIONS: usize = 10_000;
const WARMUP_ITERATIONS: usize = 500;
const P95_TARGET: Duration = Duration::from_micros(50);

/// Latency percentiles
struct LatencyStats {
    p50: Duration,
    p95: Duration,
    p99: Duration,
    min: Duration,
    max: Duration,
    mean: Duration,
}

impl LatencyStats {
    fn from_samples(mut samples: Vec<Duration>) -> Self {
        samples.sort();
        let len = samples.len();
        let at = |q: f64| samples[((len as f64 * q) as usize).min(len - 1)];
        let sum: Duration = samples.iter().sum();

        Self {
            p50: at(0.50),
            p95: at(0.95),
            p99: at(0.99),
            min: samples[0],
            max: samples[len - 1],
            mean: sum / len as u32,
        }
    }

    fn print(&self, label: &str) {
        println!("\n=== {} ===", label);
        println!("  p50: {:?}", self.p50);
        println!("  p95: {:?}", self.p95);
        println!("  p99: {:?}", self.p99);
        println!("  min: {:?}", self.min);
        println!("  max: {:?}", self.max);
        println!("  mean: {:?}", self.mean);
        if self.p95 <= P95_TARGET {
            println!("  PASS (p95 <= {:?})", P95_TARGET);
        } else {
            println!("  SLOW (p95 > {:?})", P95_TARGET);
        }
    }
}

fn measure(raw: &str) -> LatencyStats {
    for _ in 0..WARMUP_ITERATIONS {
        let _ = black_box(parse_config(black_box(raw)));
    }

    let mut samples = Vec::with_capacity(ITERATIONS);
    for _ in 0..ITERATIONS {
        let start = Instant::now();
        let outcome = parse_config(black_box(raw));
        samples.push(start.elapsed());
        assert!(outcome.is_ok(), "bench input must parse: {raw}");
    }
    LatencyStats::from_samples(samples)
}

fn main() {
    let vless = "vless://c0ffee00-1234-4abc-9def-0123456789ab@edge.example.com:443\
                 ?security=reality&sni=www.example.com&type=grpc&serviceName=gun\
                 &flow=xtls-rprx-vision&fp=chrome&pbk=Z84J2IelR9ch3k8VtlVhhs5ycBUlXA7wHBWcBrjqnAw#Edge%20Node";
    let vmess_payload = r#"{"v":"2","ps":"hk-01","add":"hk.example.com","port":"443","id":"c0ffee00-1234-4abc-9def-0123456789ab","aid":"0","net":"ws","type":"none","host":"cdn.example.com","path":"/ray","tls":"tls","sni":"hk.example.com"}"#;
    let vmess = format!("vmess://{}", URL_SAFE_NO_PAD.encode(vmess_payload));

    println!("parse_config latency ({} iterations)", ITERATIONS);
    measure(vless).print("vless reality+grpc");
    measure(&vmess).print("vmess ws+tls");
}
