//! Cache Metrics
//!
//! Operation counters, latency tracking and hit/miss accounting per store.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics collector
#[derive(Debug)]
pub struct Metrics {
    /// Total operations count
    total_ops: AtomicU64,

    /// Operations per command type
    ops_by_command: RwLock<HashMap<&'static str, u64>>,

    /// Latency tracking (simplified)
    latency_sum_us: AtomicU64,
    latency_count: AtomicU64,
    latency_min_us: AtomicU64,
    latency_max_us: AtomicU64,

    hits: AtomicU64,
    misses: AtomicU64,

    /// Entries removed lazily because they were found expired
    expired: AtomicU64,

    /// Cull passes and the entries they removed
    culls: AtomicU64,
    culled: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub total_ops: u64,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub culls: u64,
    pub culled: u64,
}

impl MetricsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }
        self.hits as f64 / lookups as f64
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            total_ops: AtomicU64::new(0),
            ops_by_command: RwLock::new(HashMap::new()),
            latency_sum_us: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
            latency_min_us: AtomicU64::new(u64::MAX),
            latency_max_us: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            culls: AtomicU64::new(0),
            culled: AtomicU64::new(0),
        }
    }

    /// Record an operation
    pub fn record_operation(&self, command: &'static str, latency: Duration) {
        self.total_ops.fetch_add(1, Ordering::Relaxed);

        *self.ops_by_command.write().entry(command).or_insert(0) += 1;

        let latency_us = latency.as_micros() as u64;
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
        self.latency_min_us.fetch_min(latency_us, Ordering::Relaxed);
        self.latency_max_us.fetch_max(latency_us, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_lookup(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cull(&self, removed: usize) {
        self.culls.fetch_add(1, Ordering::Relaxed);
        self.culled.fetch_add(removed as u64, Ordering::Relaxed);
    }

    /// Get total operations count
    pub fn total_ops(&self) -> u64 {
        self.total_ops.load(Ordering::Relaxed)
    }

    /// Get operations by command
    pub fn ops_by_command(&self) -> HashMap<&'static str, u64> {
        self.ops_by_command.read().clone()
    }

    /// Get average latency in microseconds
    pub fn avg_latency_us(&self) -> f64 {
        let count = self.latency_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        sum as f64 / count as f64
    }

    /// Get min latency in microseconds
    pub fn min_latency_us(&self) -> u64 {
        let min = self.latency_min_us.load(Ordering::Relaxed);
        if min == u64::MAX {
            0
        } else {
            min
        }
    }

    /// Get max latency in microseconds
    pub fn max_latency_us(&self) -> u64 {
        self.latency_max_us.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_ops: self.total_ops(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            culls: self.culls.load(Ordering::Relaxed),
            culled: self.culled.load(Ordering::Relaxed),
        }
    }

    /// Get a summary of metrics
    pub fn summary(&self) -> String {
        let snap = self.snapshot();
        format!(
            "Operations: {} | Hit rate: {:.1}% | Expired: {} | Culled: {} in {} passes | Latency (µs): avg={:.1}, min={}, max={}",
            snap.total_ops,
            snap.hit_rate() * 100.0,
            snap.expired,
            snap.culled,
            snap.culls,
            self.avg_latency_us(),
            self.min_latency_us(),
            self.max_latency_us()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.record_operation("get", Duration::from_micros(100));
        metrics.record_operation("get", Duration::from_micros(200));
        metrics.record_operation("set", Duration::from_micros(150));

        assert_eq!(metrics.total_ops(), 3);
        assert_eq!(metrics.min_latency_us(), 100);
        assert_eq!(metrics.max_latency_us(), 200);
        assert!((metrics.avg_latency_us() - 150.0).abs() < 0.1);

        let by_cmd = metrics.ops_by_command();
        assert_eq!(by_cmd.get("get"), Some(&2));
        assert_eq!(by_cmd.get("set"), Some(&1));
    }

    #[test]
    fn test_hit_rate() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().hit_rate(), 0.0);

        metrics.record_lookup(true);
        metrics.record_lookup(true);
        metrics.record_lookup(true);
        metrics.record_lookup(false);
        metrics.record_cull(10);

        let snap = metrics.snapshot();
        assert_eq!(snap.hits, 3);
        assert_eq!(snap.misses, 1);
        assert!((snap.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(snap.culls, 1);
        assert_eq!(snap.culled, 10);
    }
}
