//! SinkHandle - owns one sink inside its own worker task
//!
//! The worker is the only place the sink is touched, so each sink keeps its
//! connection state to itself. Batches arrive one request at a time and every
//! request is answered with a `SinkOutcome`, even when the sink panics.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{Batch, ContractError, DataSink, SinkResult};
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::metrics::SinkMetrics;

/// Result of one sink writing one batch
#[derive(Debug, Clone)]
pub struct SinkOutcome {
    pub sink: String,
    pub batch_index: u64,
    pub result: SinkResult,
    pub elapsed: Duration,
}

struct UpsertRequest {
    batch: Arc<Batch>,
    permit: Option<OwnedSemaphorePermit>,
    reply: oneshot::Sender<SinkOutcome>,
}

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send batches to worker
    tx: mpsc::Sender<UpsertRequest>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle; resolves to the sink's close result
    worker_handle: JoinHandle<Result<(), ContractError>>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S: DataSink + Send + 'static>(sink: S) -> Self {
        let name = sink.name().to_string();
        // one batch in flight per sink
        let (tx, rx) = mpsc::channel(1);
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle =
            tokio::spawn(async move { sink_worker(sink, rx, worker_metrics, worker_name).await });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Write a batch and wait for the outcome
    pub async fn upsert(&self, batch: Arc<Batch>) -> SinkOutcome {
        self.upsert_with_permit(batch, None).await
    }

    /// Write a batch while holding a worker-pool slot.
    ///
    /// The permit is released by the worker as soon as the sink returns.
    pub(crate) async fn upsert_with_permit(
        &self,
        batch: Arc<Batch>,
        permit: Option<OwnedSemaphorePermit>,
    ) -> SinkOutcome {
        let batch_index = batch.index();
        let batch_len = batch.len();
        let (reply, reply_rx) = oneshot::channel();

        let request = UpsertRequest {
            batch,
            permit,
            reply,
        };
        if self.tx.send(request).await.is_err() {
            error!(sink = %self.name, batch = batch_index, "Sink worker stopped unexpectedly");
            return self.synthesized(batch_index, batch_len, "worker is not running");
        }

        match reply_rx.await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(sink = %self.name, batch = batch_index, "Sink worker dropped the batch");
                self.synthesized(batch_index, batch_len, "worker dropped the batch")
            }
        }
    }

    fn synthesized(&self, batch_index: u64, batch_len: usize, reason: &str) -> SinkOutcome {
        let result = SinkResult::total_failure(batch_len, format!("sink '{}': {reason}", self.name));
        self.metrics.record(&result, Duration::ZERO);
        SinkOutcome {
            sink: self.name.clone(),
            batch_index,
            result,
            elapsed: Duration::ZERO,
        }
    }

    /// Stop the worker and close the sink.
    ///
    /// Returns the sink's close error, if any. Close runs exactly once, inside
    /// the worker, after the last batch.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) -> Result<(), ContractError> {
        // Drop sender to signal worker to stop
        drop(self.tx);
        let result = match self.worker_handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(sink = %self.name, error = ?e, "Worker task panicked");
                Err(ContractError::Other(format!(
                    "sink '{}' worker panicked during close",
                    self.name
                )))
            }
        };
        debug!(sink = %self.name, "SinkHandle shutdown complete");
        result
    }
}

/// Worker task that consumes batches and writes to sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<UpsertRequest>,
    metrics: Arc<SinkMetrics>,
    name: String,
) -> Result<(), ContractError> {
    debug!(sink = %name, "Sink worker started");

    while let Some(UpsertRequest {
        batch,
        permit,
        reply,
    }) = rx.recv().await
    {
        let started = Instant::now();
        let outcome = AssertUnwindSafe(sink.upsert_batch(&batch))
            .catch_unwind()
            .await;
        drop(permit);
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok(result) => result.reconcile(batch.len(), &name),
            Err(panic) => {
                metrics.inc_panic_count();
                let message = panic_message(panic.as_ref());
                error!(
                    sink = %name,
                    batch = batch.index(),
                    panic = %message,
                    "Sink panicked while writing batch"
                );
                SinkResult::total_failure(batch.len(), format!("sink '{name}' panicked: {message}"))
            }
        };

        metrics.record(&result, elapsed);
        if result.failed_records > 0 {
            warn!(
                sink = %name,
                batch = batch.index(),
                failed = result.failed_records,
                total = result.total_records,
                "Batch written with failures"
            );
        }

        let outcome = SinkOutcome {
            sink: name.clone(),
            batch_index: batch.index(),
            result,
            elapsed,
        };
        if reply.send(outcome).is_err() {
            warn!(sink = %name, "Outcome receiver dropped");
        }
    }

    let closed = sink.close().await;
    if let Err(e) = &closed {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }
    debug!(sink = %name, "Sink worker stopped");
    closed
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
