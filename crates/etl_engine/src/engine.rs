//! Pipeline - pulls batches from the source and fans each out to every sink

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use contracts::{BatchConfig, DataSource, NoopObserver, PipelineObserver, RunReport, RunState};
use dispatcher::Dispatcher;
use futures::FutureExt;
use ingestion::Batcher;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::aggregator::Aggregator;
use crate::error::PipelineError;
use crate::guard::ResourceGuard;
use crate::state::RunStateMachine;

/// One configured run: a source, a set of sinks, and batching settings
pub struct Pipeline<S: DataSource> {
    source: S,
    dispatcher: Dispatcher,
    batch: BatchConfig,
    observer: Arc<dyn PipelineObserver>,
    cancel: CancellationToken,
}

impl<S: DataSource> Pipeline<S> {
    /// Check the settings and assemble the pipeline; no I/O happens here
    pub fn new(source: S, dispatcher: Dispatcher, batch: BatchConfig) -> Result<Self, PipelineError> {
        if batch.batch_size == 0 {
            return Err(PipelineError::Configuration(
                "batch.batch_size must be >= 1".to_string(),
            ));
        }
        if dispatcher.sink_count() == 0 {
            return Err(PipelineError::Configuration(
                "no sinks configured".to_string(),
            ));
        }

        Ok(Self {
            source,
            dispatcher,
            batch,
            observer: Arc::new(NoopObserver),
            cancel: CancellationToken::new(),
        })
    }

    /// Receive run events
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run between batches
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `query` to completion.
    ///
    /// Returns the report even when sinks failed; only source, batching,
    /// and internal faults are errors. The source and every sink are closed
    /// exactly once before this returns, whatever the outcome.
    #[instrument(
        name = "pipeline_execute",
        skip(self, query),
        fields(
            source = %self.source.name(),
            sinks = self.dispatcher.sink_count(),
            batch_size = self.batch.batch_size
        )
    )]
    pub async fn execute(self, query: &str) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let Pipeline {
            source,
            dispatcher,
            batch,
            observer,
            cancel,
        } = self;

        let mut machine = RunStateMachine::new(Arc::clone(&observer));
        let mut guard = ResourceGuard::new(source, dispatcher, Arc::clone(&observer));

        let outcome = match guard.resources() {
            Some((source, dispatcher)) => {
                let run = run(
                    source,
                    dispatcher,
                    batch.batch_size,
                    query,
                    &cancel,
                    &mut machine,
                    observer.as_ref(),
                );
                AssertUnwindSafe(run)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let message = panic_message(panic.as_ref());
                        error!(panic = %message, "Pipeline run panicked");
                        Err(PipelineError::Internal(format!("run panicked: {message}")))
                    })
            }
            None => Err(PipelineError::Internal(
                "resources were released before the run".to_string(),
            )),
        };

        guard.release().await;
        machine.transition(RunState::Closed);

        let elapsed = started.elapsed();
        match &outcome {
            Ok(report) => {
                info!(
                    batches = report.total_batches,
                    failed = report.total_failed(),
                    cancelled = report.cancelled,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Pipeline run completed"
                );
                observer.on_run_completed(report, elapsed);
            }
            Err(e) => {
                error!(kind = e.kind(), error = %e, "Pipeline run failed");
                observer.on_run_failed(&e.to_string(), elapsed);
            }
        }
        outcome
    }
}

/// The fetch → batch → dispatch loop, without cleanup
async fn run<S: DataSource>(
    source: &mut S,
    dispatcher: &Dispatcher,
    batch_size: usize,
    query: &str,
    cancel: &CancellationToken,
    machine: &mut RunStateMachine,
    observer: &dyn PipelineObserver,
) -> Result<RunReport, PipelineError> {
    let mut aggregator = Aggregator::new(dispatcher.sink_names());

    machine.transition(RunState::Fetching);
    let stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!("Cancelled before the query finished");
            aggregator.mark_cancelled();
            machine.transition(RunState::Aggregated);
            return Ok(aggregator.finish());
        }
        fetched = source.fetch(query) => fetched.map_err(PipelineError::Source)?,
    };

    let mut batcher = Batcher::new(stream, batch_size)?;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(
                    batches = aggregator.report().total_batches,
                    "Cancelled, skipping remaining batches"
                );
                aggregator.mark_cancelled();
                break;
            }
            next = batcher.next_batch() => next,
        };
        let Some(batch) = next else {
            break;
        };

        let batch = Arc::new(batch?);
        let batch_index = batch.index();
        machine.transition(RunState::Dispatching { batch_index });
        observer.on_batch_dispatched(batch_index, batch.len(), dispatcher.sink_count());

        // barrier: every sink answers before the next pull
        let outcomes = dispatcher.dispatch(Arc::clone(&batch)).await;
        for outcome in &outcomes {
            observer.on_sink_result(&outcome.sink, outcome.batch_index, &outcome.result, outcome.elapsed);
        }
        aggregator.record_batch(&outcomes);

        info!(
            batch = batch_index,
            records = batch.len(),
            failed = outcomes.iter().map(|o| o.result.failed_records).sum::<usize>(),
            "Batch dispatched"
        );
    }

    machine.transition(RunState::Aggregated);
    Ok(aggregator.finish())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
