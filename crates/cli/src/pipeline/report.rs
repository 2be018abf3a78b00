//! Run report presentation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::RunReport;
use serde::Serialize;
use tracing::{info, warn};

/// Per-sink totals as printed
#[derive(Debug, Serialize, PartialEq)]
pub struct SinkSummary {
    pub total_records: u64,
    pub successful_records: u64,
    pub failed_records: u64,
    /// Percent, two decimals
    pub success_rate: f64,
    pub error_count: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub error_samples: Vec<String>,
}

/// JSON shape of a finished run
#[derive(Debug, Serialize)]
pub struct ReportView {
    pub total_batches: u64,
    pub cancelled: bool,
    pub sinks: BTreeMap<String, SinkSummary>,
}

impl From<&RunReport> for ReportView {
    fn from(report: &RunReport) -> Self {
        let sinks = report
            .sinks
            .iter()
            .map(|(name, totals)| {
                (
                    name.clone(),
                    SinkSummary {
                        total_records: totals.total_records,
                        successful_records: totals.successful_records,
                        failed_records: totals.failed_records,
                        success_rate: round2(totals.success_rate()),
                        error_count: totals.error_count,
                        error_samples: totals.error_samples.clone(),
                    },
                )
            })
            .collect();

        Self {
            total_batches: report.total_batches,
            cancelled: report.cancelled,
            sinks,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Log the per-sink totals
pub fn log_report(report: &RunReport) {
    let view = ReportView::from(report);

    info!("=== Pipeline Execution Results ===");
    info!(total_batches = view.total_batches, "Total batches processed");
    for (sink, summary) in &view.sinks {
        info!(
            sink = %sink,
            total = summary.total_records,
            successful = summary.successful_records,
            failed = summary.failed_records,
            success_rate = summary.success_rate,
            errors = summary.error_count,
            "Sink results"
        );
        for sample in &summary.error_samples {
            warn!(sink = %sink, error = %sample, "Sink error sample");
        }
    }
    if view.cancelled {
        warn!("Run was cancelled before the source was exhausted");
    }
}

/// Print the report as pretty JSON on stdout
pub fn print_json(report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(&ReportView::from(report))
        .context("Failed to serialize run report")?;
    println!("{json}");
    Ok(())
}
