//! Run state machine
//!
//! `Pending → Fetching → Dispatching(0..n) → Aggregated → Closed`. Any state
//! may jump to `Closed` when the run aborts.

use std::sync::Arc;

use contracts::{PipelineObserver, RunState};
use tracing::{debug, error};

pub struct RunStateMachine {
    state: RunState,
    observer: Arc<dyn PipelineObserver>,
}

impl RunStateMachine {
    pub fn new(observer: Arc<dyn PipelineObserver>) -> Self {
        Self {
            state: RunState::Pending,
            observer,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Whether `from → to` is a legal step
    pub fn is_allowed(from: RunState, to: RunState) -> bool {
        use RunState::*;

        match (from, to) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Pending, Fetching) => true,
            (Fetching, Dispatching { batch_index: 0 }) => true,
            (Dispatching { batch_index: a }, Dispatching { batch_index: b }) => b == a + 1,
            (Fetching | Dispatching { .. }, Aggregated) => true,
            _ => false,
        }
    }

    /// Move to `to` and notify the observer.
    ///
    /// An illegal step is logged and applied anyway; the run must still reach
    /// cleanup.
    pub fn transition(&mut self, to: RunState) {
        let from = self.state;
        if from == to {
            return;
        }
        if Self::is_allowed(from, to) {
            debug!(%from, %to, "Run state transition");
        } else {
            error!(%from, %to, "Unexpected run state transition");
        }
        self.state = to;
        self.observer.on_state_change(from, to);
    }
}
