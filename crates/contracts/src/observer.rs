//! PipelineObserver - injected structured event hooks
//!
//! The engine reports its progress through this trait instead of touching
//! process-wide state. Implementations must be cheap; they run inline on the
//! orchestrator task.

use std::fmt;
use std::time::Duration;

use crate::{RunReport, SinkResult};

/// Orchestrator run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Fetching,
    Dispatching { batch_index: u64 },
    Aggregated,
    Closed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Fetching => f.write_str("fetching"),
            Self::Dispatching { batch_index } => write!(f, "dispatching({batch_index})"),
            Self::Aggregated => f.write_str("aggregated"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Pipeline event hooks, all no-ops by default
pub trait PipelineObserver: Send + Sync {
    /// State machine transition
    fn on_state_change(&self, _from: RunState, _to: RunState) {}

    /// A batch is about to be fanned out
    fn on_batch_dispatched(&self, _batch_index: u64, _records: usize, _sinks: usize) {}

    /// One sink finished one batch
    fn on_sink_result(
        &self,
        _sink: &str,
        _batch_index: u64,
        _result: &SinkResult,
        _elapsed: Duration,
    ) {
    }

    /// Closing the source or a sink failed
    fn on_close_failed(&self, _resource: &str, _error: &str) {}

    /// Run returned a report
    fn on_run_completed(&self, _report: &RunReport, _elapsed: Duration) {}

    /// Run aborted with a fatal error
    fn on_run_failed(&self, _error: &str, _elapsed: Duration) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}
