//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::SinkResult;
use serde::Serialize;

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Batches handled
    batch_count: AtomicU64,
    /// Records written
    records_ok: AtomicU64,
    /// Records failed
    records_failed: AtomicU64,
    /// Batches that ended in a panic
    panic_count: AtomicU64,
    /// Latency of the most recent batch (µs)
    last_latency_us: AtomicU64,
    /// Accumulated batch latency (µs)
    total_latency_us: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one finished batch
    pub fn record(&self, result: &SinkResult, elapsed: Duration) {
        let micros = elapsed.as_micros().min(u64::MAX as u128) as u64;
        self.batch_count.fetch_add(1, Ordering::Relaxed);
        self.records_ok
            .fetch_add(result.successful_records as u64, Ordering::Relaxed);
        self.records_failed
            .fetch_add(result.failed_records as u64, Ordering::Relaxed);
        self.last_latency_us.store(micros, Ordering::Relaxed);
        self.total_latency_us.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn inc_panic_count(&self) {
        self.panic_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_count(&self) -> u64 {
        self.batch_count.load(Ordering::Relaxed)
    }

    pub fn records_ok(&self) -> u64 {
        self.records_ok.load(Ordering::Relaxed)
    }

    pub fn records_failed(&self) -> u64 {
        self.records_failed.load(Ordering::Relaxed)
    }

    pub fn panic_count(&self) -> u64 {
        self.panic_count.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let batches = self.batch_count();
        let total = self.total_latency_us.load(Ordering::Relaxed);
        MetricsSnapshot {
            batch_count: batches,
            records_ok: self.records_ok(),
            records_failed: self.records_failed(),
            panic_count: self.panic_count(),
            last_latency_us: self.last_latency_us.load(Ordering::Relaxed),
            avg_latency_us: if batches == 0 { 0 } else { total / batches },
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub batch_count: u64,
    pub records_ok: u64,
    pub records_failed: u64,
    pub panic_count: u64,
    pub last_latency_us: u64,
    pub avg_latency_us: u64,
}
