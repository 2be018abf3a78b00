//! Pipeline 指标收集模块
//!
//! 把编排器事件记录为 Prometheus 指标，并在内存中统计每个 sink 的批次延迟。

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use contracts::{PipelineObserver, RunReport, RunState, SinkResult};
use metrics::{counter, gauge, histogram};

/// 记录批次分发
pub fn record_batch_dispatched(batch_index: u64, records: usize) {
    counter!("athena_etl_batches_total").increment(1);
    counter!("athena_etl_records_pulled_total").increment(records as u64);
    gauge!("athena_etl_current_batch").set(batch_index as f64);
    histogram!("athena_etl_batch_size").record(records as f64);
}

/// 记录单个 sink 对单个批次的结果
pub fn record_sink_result(sink: &str, result: &SinkResult, elapsed: Duration) {
    counter!(
        "athena_etl_sink_records_total",
        "sink" => sink.to_string(),
        "status" => "success"
    )
    .increment(result.successful_records as u64);

    if result.failed_records > 0 {
        counter!(
            "athena_etl_sink_records_total",
            "sink" => sink.to_string(),
            "status" => "failure"
        )
        .increment(result.failed_records as u64);
        counter!("athena_etl_sink_failed_batches_total", "sink" => sink.to_string()).increment(1);
    }

    histogram!("athena_etl_sink_batch_latency_ms", "sink" => sink.to_string())
        .record(elapsed.as_secs_f64() * 1000.0);
}

/// 记录状态迁移
pub fn record_state(state: RunState) {
    let code = match state {
        RunState::Pending => 0.0,
        RunState::Fetching => 1.0,
        RunState::Dispatching { .. } => 2.0,
        RunState::Aggregated => 3.0,
        RunState::Closed => 4.0,
    };
    gauge!("athena_etl_run_state").set(code);
}

/// 记录关闭失败
pub fn record_close_failure(resource: &str) {
    counter!("athena_etl_close_failures_total", "resource" => resource.to_string()).increment(1);
}

/// 记录运行完成
pub fn record_run_completed(report: &RunReport, elapsed: Duration) {
    let status = if report.cancelled { "cancelled" } else { "completed" };
    counter!("athena_etl_runs_total", "status" => status).increment(1);
    histogram!("athena_etl_run_duration_seconds").record(elapsed.as_secs_f64());

    for (sink, totals) in &report.sinks {
        gauge!("athena_etl_sink_success_rate", "sink" => sink.clone()).set(totals.success_rate());
    }
}

/// 记录运行失败
pub fn record_run_failed(elapsed: Duration) {
    counter!("athena_etl_runs_total", "status" => "failed").increment(1);
    histogram!("athena_etl_run_duration_seconds").record(elapsed.as_secs_f64());
}

/// 基于指标的 PipelineObserver
///
/// 除了写入 `metrics` 外，还在内存中保留每个 sink 的延迟统计，便于运行结束后输出摘要。
#[derive(Debug, Default)]
pub struct MetricsObserver {
    latency: Mutex<BTreeMap<String, RunningStats>>,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 各 sink 的批次延迟摘要 (毫秒)
    pub fn summary(&self) -> LatencySummary {
        let sinks = match self.latency.lock() {
            Ok(latency) => latency
                .iter()
                .map(|(sink, stats)| (sink.clone(), StatsSummary::from(stats)))
                .collect(),
            Err(_) => BTreeMap::new(),
        };
        LatencySummary { sinks }
    }
}

impl PipelineObserver for MetricsObserver {
    fn on_state_change(&self, _from: RunState, to: RunState) {
        record_state(to);
    }

    fn on_batch_dispatched(&self, batch_index: u64, records: usize, _sinks: usize) {
        record_batch_dispatched(batch_index, records);
    }

    fn on_sink_result(&self, sink: &str, _batch_index: u64, result: &SinkResult, elapsed: Duration) {
        record_sink_result(sink, result, elapsed);
        if let Ok(mut latency) = self.latency.lock() {
            latency
                .entry(sink.to_string())
                .or_default()
                .push(elapsed.as_secs_f64() * 1000.0);
        }
    }

    fn on_close_failed(&self, resource: &str, _error: &str) {
        record_close_failure(resource);
    }

    fn on_run_completed(&self, report: &RunReport, elapsed: Duration) {
        record_run_completed(report, elapsed);
    }

    fn on_run_failed(&self, _error: &str, elapsed: Duration) {
        record_run_failed(elapsed);
    }
}

/// 各 sink 的延迟摘要
#[derive(Debug, Clone, Default)]
pub struct LatencySummary {
    pub sinks: BTreeMap<String, StatsSummary>,
}

impl std::fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Sink Latency (ms) ===")?;
        if self.sinks.is_empty() {
            return writeln!(f, "  no batches dispatched");
        }
        for (sink, stats) in &self.sinks {
            writeln!(f, "  {sink}: {stats}")?;
        }
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_observer_tracks_latency_per_sink() {
        // no recorder installed: metric macros are no-ops
        let observer = MetricsObserver::new();
        observer.on_sink_result("kv", 0, &SinkResult::success(2), Duration::from_millis(10));
        observer.on_sink_result("kv", 1, &SinkResult::success(2), Duration::from_millis(30));
        observer.on_sink_result("search", 0, &SinkResult::total_failure(2, "down"), Duration::from_millis(5));

        let summary = observer.summary();
        assert_eq!(summary.sinks["kv"].count, 2);
        assert!((summary.sinks["kv"].mean - 20.0).abs() < 1e-6);
        assert_eq!(summary.sinks["search"].count, 1);

        let printed = summary.to_string();
        assert!(printed.contains("kv: min=10.000"));
    }

    #[test]
    fn test_empty_summary_display() {
        let printed = LatencySummary::default().to_string();
        assert!(printed.contains("no batches dispatched"));
    }
}
