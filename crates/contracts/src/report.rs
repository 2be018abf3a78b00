//! RunReport - whole-run aggregated outcome across sinks and batches

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::SinkResult;

/// Error messages retained per sink for diagnostics; the count is always exact.
pub const MAX_ERROR_SAMPLES: usize = 10;

/// Running totals for one sink
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkTotals {
    pub total_records: u64,
    pub successful_records: u64,
    pub failed_records: u64,
    pub error_count: u64,
    /// First few error messages, at most `MAX_ERROR_SAMPLES`
    #[serde(default)]
    pub error_samples: Vec<String>,
}

impl SinkTotals {
    /// Fold one batch result into the totals
    pub fn fold(&mut self, result: &SinkResult) {
        self.total_records += result.total_records as u64;
        self.successful_records += result.successful_records as u64;
        self.failed_records += result.failed_records as u64;
        self.error_count += result.errors.len() as u64;
        self.keep_samples(result.errors.iter());
    }

    /// Combine two partial totals for the same sink
    pub fn merge(&mut self, other: &SinkTotals) {
        self.total_records += other.total_records;
        self.successful_records += other.successful_records;
        self.failed_records += other.failed_records;
        self.error_count += other.error_count;
        self.keep_samples(other.error_samples.iter());
    }

    /// Success percentage recomputed from the running totals
    pub fn success_rate(&self) -> f64 {
        if self.total_records == 0 {
            0.0
        } else {
            self.successful_records as f64 / self.total_records as f64 * 100.0
        }
    }

    fn keep_samples<'a>(&mut self, errors: impl Iterator<Item = &'a String>) {
        let room = MAX_ERROR_SAMPLES.saturating_sub(self.error_samples.len());
        self.error_samples.extend(errors.take(room).cloned());
    }
}

/// Terminal value of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Batches pulled from the source and dispatched
    pub total_batches: u64,

    /// Sink name -> aggregated totals
    pub sinks: BTreeMap<String, SinkTotals>,

    /// Run stopped early on a cancellation request
    #[serde(default)]
    pub cancelled: bool,
}

impl RunReport {
    /// Empty report with an entry for every sink
    pub fn with_sinks<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            total_batches: 0,
            sinks: names
                .into_iter()
                .map(|n| (n.into(), SinkTotals::default()))
                .collect(),
            cancelled: false,
        }
    }

    /// Totals for a sink
    pub fn sink(&self, name: &str) -> Option<&SinkTotals> {
        self.sinks.get(name)
    }

    /// Whether every sink wrote every record
    pub fn is_clean(&self) -> bool {
        self.sinks.values().all(|t| t.failed_records == 0)
    }

    /// Records that failed across all sinks
    pub fn total_failed(&self) -> u64 {
        self.sinks.values().map(|t| t.failed_records).sum()
    }
}
