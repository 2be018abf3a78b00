//! Aggregator - the single point where results enter the run report

use contracts::{RunReport, SinkTotals};
use dispatcher::SinkOutcome;

/// Folds every batch's sink outcomes into a `RunReport`.
///
/// Owned by the orchestrator task; dispatch workers never touch it.
#[derive(Debug, Default)]
pub struct Aggregator {
    report: RunReport,
}

impl Aggregator {
    /// Start with a zeroed entry for every sink
    pub fn new<I, S>(sink_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            report: RunReport::with_sinks(sink_names),
        }
    }

    /// Fold the outcomes of one fully dispatched batch
    pub fn record_batch(&mut self, outcomes: &[SinkOutcome]) {
        self.report.total_batches += 1;
        for outcome in outcomes {
            self.report
                .sinks
                .entry(outcome.sink.clone())
                .or_insert_with(SinkTotals::default)
                .fold(&outcome.result);
        }
    }

    pub fn mark_cancelled(&mut self) {
        self.report.cancelled = true;
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn finish(self) -> RunReport {
        self.report
    }
}
