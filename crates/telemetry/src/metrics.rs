//! Internal metrics collection.
//!
//! Collects metrics in-memory; the batch job flushes a snapshot to the
//! store when it finishes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the rollup engine.
#[derive(Debug, Default)]
pub struct Metrics {
    // Ingestion metrics
    pub events_inserted: Counter,
    pub insert_errors: Counter,

    // Rollup builder metrics
    pub rollup_runs: Counter,
    pub rollup_run_errors: Counter,
    pub rollup_rows_written: Counter,
    pub rollup_events_scanned: Counter,
    pub rollup_native_runs: Counter,

    // Retention sweeper metrics
    pub prune_runs: Counter,
    pub prune_errors: Counter,
    pub raw_events_pruned: Counter,
    pub rollups_pruned: Counter,

    // Query router metrics
    pub offender_queries: Counter,
    pub selector_queries: Counter,
    pub query_errors: Counter,

    // Latency histograms
    pub insert_latency_ms: Histogram,
    pub rollup_build_latency_ms: Histogram,
    pub query_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub events_inserted: u64,
    pub insert_errors: u64,
    pub rollup_runs: u64,
    pub rollup_run_errors: u64,
    pub rollup_rows_written: u64,
    pub rollup_events_scanned: u64,
    pub rollup_native_runs: u64,
    pub prune_runs: u64,
    pub prune_errors: u64,
    pub raw_events_pruned: u64,
    pub rollups_pruned: u64,
    pub offender_queries: u64,
    pub selector_queries: u64,
    pub query_errors: u64,
    pub insert_latency_mean_ms: f64,
    pub rollup_build_latency_mean_ms: f64,
    pub query_latency_mean_ms: f64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            events_inserted: self.events_inserted.get(),
            insert_errors: self.insert_errors.get(),
            rollup_runs: self.rollup_runs.get(),
            rollup_run_errors: self.rollup_run_errors.get(),
            rollup_rows_written: self.rollup_rows_written.get(),
            rollup_events_scanned: self.rollup_events_scanned.get(),
            rollup_native_runs: self.rollup_native_runs.get(),
            prune_runs: self.prune_runs.get(),
            prune_errors: self.prune_errors.get(),
            raw_events_pruned: self.raw_events_pruned.get(),
            rollups_pruned: self.rollups_pruned.get(),
            offender_queries: self.offender_queries.get(),
            selector_queries: self.selector_queries.get(),
            query_errors: self.query_errors.get(),
            insert_latency_mean_ms: self.insert_latency_ms.mean(),
            rollup_build_latency_mean_ms: self.rollup_build_latency_ms.mean(),
            query_latency_mean_ms: self.query_latency_ms.mean(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
