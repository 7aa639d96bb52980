//! Load Testing
//!
//! Drives a cache from several threads with a deterministic mix of
//! reads, writes and increments.

use std::panic;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::cache::{LocMemCache, Timeout};
use crate::error::{CacheError, CacheResult};

/// Key incremented by the load generator
pub const COUNTER_KEY: &str = "loadtest:counter";

#[derive(Debug, Clone)]
pub struct LoadTestConfig {
    /// Worker threads (0 = one per CPU)
    pub threads: usize,
    pub ops_per_thread: u64,
    /// Distinct keys touched by reads and writes
    pub key_space: usize,
    /// Share of operations that are writes, 0-100
    pub write_percent: u8,
    /// Share of operations that increment the shared counter, 0-100
    pub incr_percent: u8,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            ops_per_thread: 10_000,
            key_space: 1_000,
            write_percent: 20,
            incr_percent: 5,
        }
    }
}

impl LoadTestConfig {
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadTestStats {
    pub completed: u64,
    /// Operations that found what they looked for (get hits, set, live incr)
    pub success: u64,
    pub duration: Duration,
    pub avg_latency: Duration,
    pub p99_latency: Duration,
    pub rps: f64,
}

impl LoadTestStats {
    pub fn from_latencies(latencies: &[Duration], success: u64, duration: Duration) -> Self {
        if latencies.is_empty() {
            return Self {
                completed: 0,
                success: 0,
                duration,
                avg_latency: Duration::ZERO,
                p99_latency: Duration::ZERO,
                rps: 0.0,
            };
        }
        let mut sorted = latencies.to_vec();
        sorted.sort();
        let sum: Duration = latencies.iter().sum();
        let avg = sum / latencies.len() as u32;
        let p99_idx = (latencies.len() as f64 * 0.99) as usize;
        Self {
            completed: latencies.len() as u64,
            success,
            duration,
            avg_latency: avg,
            p99_latency: sorted[p99_idx.min(sorted.len() - 1)],
            rps: latencies.len() as f64 / duration.as_secs_f64().max(f64::EPSILON),
        }
    }

    pub fn report(&self) -> String {
        format!(
            "Completed: {}, Success: {}, RPS: {:.0}, Avg: {:.3}ms, P99: {:.3}ms",
            self.completed,
            self.success,
            self.rps,
            self.avg_latency.as_secs_f64() * 1000.0,
            self.p99_latency.as_secs_f64() * 1000.0
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Get,
    Set,
    Incr,
}

fn pick_op(config: &LoadTestConfig, thread: usize, i: u64) -> (Op, usize) {
    let mixed = i
        .wrapping_mul(2_654_435_761)
        .wrapping_add(thread as u64 * 40_503);
    let slot = (mixed % 100) as u8;
    let key = (mixed / 100) as usize % config.key_space.max(1);

    let op = if slot < config.write_percent {
        Op::Set
    } else if slot < config.write_percent.saturating_add(config.incr_percent) {
        Op::Incr
    } else {
        Op::Get
    };
    (op, key)
}

fn worker(
    cache: &LocMemCache,
    config: &LoadTestConfig,
    thread: usize,
) -> CacheResult<(Vec<Duration>, u64)> {
    let mut latencies = Vec::with_capacity(config.ops_per_thread as usize);
    let mut success = 0;

    for i in 0..config.ops_per_thread {
        let (op, key) = pick_op(config, thread, i);
        let key = format!("loadtest:{}", key);
        let t = Instant::now();

        let ok = match op {
            Op::Get => cache.get(key)?.is_some(),
            Op::Set => {
                cache.set(key, i as i64, Timeout::Default)?;
                true
            }
            Op::Incr => match cache.incr(COUNTER_KEY, 1) {
                Ok(_) => true,
                // Culling may have taken the counter
                Err(CacheError::KeyNotFound(_)) => false,
                Err(e) => return Err(e),
            },
        };

        latencies.push(t.elapsed());
        if ok {
            success += 1;
        }
    }
    Ok((latencies, success))
}

/// Run the load test against `cache`
pub fn run_load(cache: &LocMemCache, config: &LoadTestConfig) -> CacheResult<LoadTestStats> {
    let threads = config.effective_threads();
    info!(
        threads,
        ops_per_thread = config.ops_per_thread,
        key_space = config.key_space,
        "Starting load test on store {:?}",
        cache.name()
    );

    cache.set(COUNTER_KEY, 0, Timeout::Never)?;
    let start = Instant::now();

    let results = crossbeam::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|t| s.spawn(move |_| worker(cache, config, t)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| panic::resume_unwind(e)))
            .collect::<Vec<_>>()
    })
    .unwrap_or_else(|e| panic::resume_unwind(e));

    let duration = start.elapsed();
    let mut latencies = Vec::new();
    let mut success = 0;
    for result in results {
        let (l, s) = result?;
        latencies.extend(l);
        success += s;
    }

    let stats = LoadTestStats::from_latencies(&latencies, success, duration);
    debug!(report = %stats.report(), "Load test finished");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::codec::Value;
    use crate::storage::CacheRegistry;

    #[test]
    fn test_stats_from_latencies() {
        let latencies: Vec<_> = (1..=100).map(Duration::from_micros).collect();
        let stats = LoadTestStats::from_latencies(&latencies, 90, Duration::from_secs(1));

        assert_eq!(stats.completed, 100);
        assert_eq!(stats.success, 90);
        assert_eq!(stats.p99_latency, Duration::from_micros(100));
        assert!((stats.rps - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_empty_stats() {
        let stats = LoadTestStats::from_latencies(&[], 0, Duration::from_secs(1));
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.rps, 0.0);
    }

    #[test]
    fn test_op_mix() {
        let config = LoadTestConfig {
            write_percent: 0,
            incr_percent: 0,
            ..Default::default()
        };
        assert!((0..1000).all(|i| pick_op(&config, 0, i).0 == Op::Get));

        let config = LoadTestConfig {
            write_percent: 100,
            ..Default::default()
        };
        assert!((0..1000).all(|i| pick_op(&config, 3, i).0 == Op::Set));
    }

    #[test]
    fn test_run_load_counts_every_increment() {
        let registry = CacheRegistry::new();
        let cache = LocMemCache::new(
            &registry,
            CacheConfig::default()
                .with_location("loadtest")
                .with_max_entries(100_000),
        );
        let config = LoadTestConfig {
            threads: 4,
            ops_per_thread: 500,
            key_space: 50,
            write_percent: 30,
            incr_percent: 20,
        };

        let stats = run_load(&cache, &config).unwrap();
        assert_eq!(stats.completed, 2_000);

        let incrs: u64 = (0..4)
            .map(|t| {
                (0..500)
                    .filter(|&i| pick_op(&config, t, i).0 == Op::Incr)
                    .count() as u64
            })
            .sum();
        assert_eq!(
            cache.get(COUNTER_KEY).unwrap(),
            Some(Value::Int(incrs as i64))
        );
    }
}
