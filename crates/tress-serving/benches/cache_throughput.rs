//! Cache hot-path benchmarks
//!
//! Measures fingerprinting and cache get/put round-trips against the
//! in-memory store. Run with: `cargo bench -p tress-serving`

use std::sync::Arc;
use std::time::Instant;
use tress_inference::{AnalysisReport, Device};
use tress_serving::{CacheConfig, MemoryStore, ResultCache, fingerprint};

fn sample_report() -> AnalysisReport {
    AnalysisReport {
        primary_label: "wavy".into(),
        confidence: 0.91,
        findings: vec![],
        device_used: Device::Cpu,
        duration_ms: 40,
    }
}

fn bench_fingerprint(rounds: usize) {
    // One 224x224x3 f32 frame worth of bytes
    let frame = vec![0x5au8; 224 * 224 * 3 * 4];

    let start = Instant::now();
    let mut last = String::new();
    for _ in 0..rounds {
        last = fingerprint(&frame);
    }
    let elapsed = start.elapsed();

    println!(
        "fingerprint | rounds={} bytes_per_round={} elapsed={:.2}ms throughput={:.1} MB/s (digest {})",
        rounds,
        frame.len(),
        elapsed.as_secs_f64() * 1000.0,
        (rounds * frame.len()) as f64 / 1_000_000.0 / elapsed.as_secs_f64().max(0.001),
        &last[..8],
    );
}

fn bench_cache_roundtrip(rounds: usize) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store: Arc<MemoryStore> = MemoryStore::shared();
    let cache = ResultCache::new(store, "bench", CacheConfig::default());
    let report = sample_report();

    let start = Instant::now();
    let mut hits = 0usize;
    rt.block_on(async {
        for i in 0..rounds {
            let digest = fingerprint(&i.to_le_bytes());
            cache.put_report(&digest, &report).await;
            if cache.get_report(&digest).await.is_some() {
                hits += 1;
            }
        }
    });
    let elapsed = start.elapsed();

    println!(
        "cache put+get | rounds={} hits={} elapsed={:.2}ms ops/s={:.0}",
        rounds,
        hits,
        elapsed.as_secs_f64() * 1000.0,
        (rounds * 2) as f64 / elapsed.as_secs_f64().max(0.001),
    );
}

fn main() {
    println!("=== tress-serving cache throughput benchmark ===");
    bench_fingerprint(1_000);
    bench_cache_roundtrip(10_000);
}
