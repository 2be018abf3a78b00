//! SinkResult - outcome of writing one batch to one sink

use serde::{Deserialize, Serialize};

/// Per (batch, sink) outcome summary.
///
/// Invariant: `total_records == successful_records + failed_records`, and
/// `total_records` equals the length of the batch handed to the sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkResult {
    pub total_records: usize,
    pub successful_records: usize,
    pub failed_records: usize,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl SinkResult {
    /// Every record written
    pub fn success(total: usize) -> Self {
        Self {
            total_records: total,
            successful_records: total,
            failed_records: 0,
            errors: Vec::new(),
        }
    }

    /// Underlying storage call failed as a whole
    pub fn total_failure(total: usize, error: impl Into<String>) -> Self {
        Self {
            total_records: total,
            successful_records: 0,
            failed_records: total,
            errors: vec![error.into()],
        }
    }

    /// Some records failed; `failed` is clamped to `total`
    pub fn partial(total: usize, failed: usize, errors: Vec<String>) -> Self {
        let failed = failed.min(total);
        Self {
            total_records: total,
            successful_records: total - failed,
            failed_records: failed,
            errors,
        }
    }

    /// Percentage of successful records, `0.0` for an empty result
    pub fn success_rate(&self) -> f64 {
        if self.total_records == 0 {
            0.0
        } else {
            self.successful_records as f64 / self.total_records as f64 * 100.0
        }
    }

    /// Whether the counters add up
    pub fn is_consistent(&self) -> bool {
        self.successful_records + self.failed_records == self.total_records
    }

    /// Bring a sink-reported result in line with the batch it was given.
    ///
    /// Records the sink did not account for are counted as failed, and an
    /// over-reported success count is cut back to the batch size.
    pub fn reconcile(mut self, batch_len: usize, sink_name: &str) -> Self {
        if self.is_consistent() && self.total_records == batch_len {
            return self;
        }

        let successful = self.successful_records.min(batch_len);
        let failed = batch_len - successful;
        self.errors.push(format!(
            "sink '{sink_name}' reported {}/{}/{} (total/ok/failed) for a batch of {batch_len}",
            self.total_records, self.successful_records, self.failed_records
        ));
        self.total_records = batch_len;
        self.successful_records = successful;
        self.failed_records = failed;
        self
    }
}
