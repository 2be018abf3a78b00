//! ResourceGuard - closes the source and every sink exactly once

use std::sync::Arc;

use contracts::{ContractError, DataSource, PipelineObserver};
use dispatcher::Dispatcher;
use tracing::{debug, info, instrument, warn};

/// Holds the run's resources until `release`
pub struct ResourceGuard<S: DataSource> {
    source: Option<S>,
    dispatcher: Option<Dispatcher>,
    observer: Arc<dyn PipelineObserver>,
}

impl<S: DataSource> ResourceGuard<S> {
    pub fn new(source: S, dispatcher: Dispatcher, observer: Arc<dyn PipelineObserver>) -> Self {
        Self {
            source: Some(source),
            dispatcher: Some(dispatcher),
            observer,
        }
    }

    /// Borrow the resources for the run; `None` once released
    pub fn resources(&mut self) -> Option<(&mut S, &Dispatcher)> {
        match (self.source.as_mut(), self.dispatcher.as_ref()) {
            (Some(source), Some(dispatcher)) => Some((source, dispatcher)),
            _ => None,
        }
    }

    pub fn is_released(&self) -> bool {
        self.source.is_none() && self.dispatcher.is_none()
    }

    /// Close the source, then every sink.
    ///
    /// Later calls do nothing. Close failures are logged and reported to the
    /// observer, then returned for inspection; they never fail the run.
    #[instrument(name = "resource_guard_release", skip(self))]
    pub async fn release(&mut self) -> Vec<(String, ContractError)> {
        let mut failures = Vec::new();

        if let Some(mut source) = self.source.take() {
            let name = source.name().to_string();
            match source.close().await {
                Ok(()) => debug!(source = %name, "Source closed"),
                Err(e) => failures.push((name, e)),
            }
        }

        if let Some(dispatcher) = self.dispatcher.take() {
            failures.extend(dispatcher.shutdown().await);
        }

        for (resource, error) in &failures {
            warn!(resource = %resource, error = %error, "Close failed");
            self.observer.on_close_failed(resource, &error.to_string());
        }
        if failures.is_empty() {
            info!("All resources released");
        }
        failures
    }
}

impl<S: DataSource> Drop for ResourceGuard<S> {
    fn drop(&mut self) {
        if !self.is_released() {
            // sink workers still close their sinks once their queues drop
            warn!("ResourceGuard dropped before release; source was not closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Batch, DataSink, NoopObserver, SinkResult};
    use dispatcher::{LogSink, SinkHandle};
    use ingestion::MockDataSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingClose {
        closes: Arc<AtomicUsize>,
    }

    impl DataSink for FailingClose {
        fn name(&self) -> &str {
            "sticky"
        }

        async fn upsert_batch(&mut self, batch: &Batch) -> SinkResult {
            SinkResult::success(batch.len())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Err(ContractError::sink_connection("sticky", "connection reset on close"))
        }
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let source = MockDataSource::numbered(1);
        let tracker = source.tracker();
        let closes = Arc::new(AtomicUsize::new(0));
        let handles = vec![
            SinkHandle::spawn(LogSink::new("log")),
            SinkHandle::spawn(FailingClose {
                closes: Arc::clone(&closes),
            }),
        ];
        let dispatcher = Dispatcher::with_handles(handles, 2).unwrap();

        let mut guard = ResourceGuard::new(source, dispatcher, Arc::new(NoopObserver));
        assert!(guard.resources().is_some());

        let failures = guard.release().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "sticky");

        assert!(guard.release().await.is_empty());
        assert!(guard.resources().is_none());
        assert_eq!(tracker.closes(), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
