//! Dispatcher - concurrent fan-out of one batch to every sink

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use contracts::{Batch, ContractError, OpenSearchAuth, OpenSearchConfig, SinkConfig, SinkKind};

use crate::error::DispatcherError;
use crate::handle::{SinkHandle, SinkOutcome};
use crate::metrics::MetricsSnapshot;
#[cfg(feature = "aws")]
use crate::sinks::{DynamoDbSink, RequestSigner};
use crate::sinks::{FileSink, LogSink, OpenSearchSink};

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    sinks: Vec<SinkConfig>,
    max_workers: usize,
    #[cfg(feature = "aws")]
    aws: Option<aws_config::SdkConfig>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(sinks: Vec<SinkConfig>, max_workers: usize) -> Self {
        Self {
            sinks,
            max_workers,
            #[cfg(feature = "aws")]
            aws: None,
        }
    }

    /// AWS config shared by DynamoDB sinks and SigV4-signed OpenSearch sinks
    #[cfg(feature = "aws")]
    pub fn with_aws_config(mut self, config: aws_config::SdkConfig) -> Self {
        self.aws = Some(config);
        self
    }

    /// Build and start the dispatcher
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(sink_count = self.sinks.len(), max_workers = self.max_workers)
    )]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut handles = Vec::with_capacity(self.sinks.len());
        for config in &self.sinks {
            match self.create_sink_handle(config).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // close whatever was already started
                    for handle in handles {
                        if let Err(close_err) = handle.shutdown().await {
                            warn!(error = %close_err, "Close failed while aborting build");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Dispatcher::with_handles(handles, self.max_workers)
    }

    /// Create a SinkHandle from configuration
    #[instrument(
        name = "dispatcher_create_sink_handle",
        skip(self, config),
        fields(sink = %config.name, sink_type = config.kind.type_name())
    )]
    async fn create_sink_handle(&self, config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
        match &config.kind {
            SinkKind::Log => Ok(SinkHandle::spawn(LogSink::new(&config.name))),
            SinkKind::File(file) => {
                let sink = FileSink::new(&config.name, file)
                    .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
                Ok(SinkHandle::spawn(sink))
            }
            SinkKind::OpenSearch(search) => {
                let sink = OpenSearchSink::new(&config.name, search.clone())
                    .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
                let sink = self.with_auth(config, search, sink)?;
                Ok(SinkHandle::spawn(sink))
            }
            #[cfg(feature = "aws")]
            SinkKind::DynamoDb(table) => {
                let sdk = self.aws.as_ref().ok_or_else(|| {
                    DispatcherError::sink_creation(&config.name, "AWS config was not loaded")
                })?;
                Ok(SinkHandle::spawn(DynamoDbSink::new(&config.name, sdk, table.clone())))
            }
            #[cfg(not(feature = "aws"))]
            SinkKind::DynamoDb(_) => Err(DispatcherError::Unsupported {
                name: config.name.clone(),
                sink_type: config.kind.type_name().to_string(),
                feature: "aws".to_string(),
            }),
        }
    }
}

impl DispatcherBuilder {
    /// Attach a SigV4 signer built from the shared AWS config
    #[cfg(feature = "aws")]
    fn with_auth(
        &self,
        config: &SinkConfig,
        search: &OpenSearchConfig,
        sink: OpenSearchSink,
    ) -> Result<OpenSearchSink, DispatcherError> {
        if search.auth != OpenSearchAuth::Sigv4 {
            return Ok(sink);
        }
        let sdk = self.aws.as_ref().ok_or_else(|| {
            DispatcherError::sink_creation(&config.name, "sigv4 auth needs an AWS config")
        })?;
        let signer = RequestSigner::from_sdk_config(sdk, &search.signing_service)
            .map_err(|e| DispatcherError::sink_creation(&config.name, e))?;
        debug!(region = signer.region(), service = %search.signing_service, "SigV4 signing enabled");
        Ok(sink.with_signer(signer))
    }

    #[cfg(not(feature = "aws"))]
    fn with_auth(
        &self,
        config: &SinkConfig,
        search: &OpenSearchConfig,
        sink: OpenSearchSink,
    ) -> Result<OpenSearchSink, DispatcherError> {
        if search.auth != OpenSearchAuth::Sigv4 {
            return Ok(sink);
        }
        Err(DispatcherError::Unsupported {
            name: config.name.clone(),
            sink_type: "opensearch (sigv4)".to_string(),
            feature: "aws".to_string(),
        })
    }
}

/// Fans batches out to a fixed set of sinks
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    workers: Arc<Semaphore>,
    max_workers: usize,
}

impl Dispatcher {
    /// Create a dispatcher from running sink handles
    pub fn with_handles(handles: Vec<SinkHandle>, max_workers: usize) -> Result<Self, DispatcherError> {
        if max_workers == 0 {
            return Err(DispatcherError::InvalidWorkerCount(max_workers));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = handles.iter().find(|h| !seen.insert(h.name().to_string())) {
            return Err(DispatcherError::DuplicateSink {
                name: duplicate.name().to_string(),
            });
        }

        info!(sinks = handles.len(), max_workers, "Dispatcher ready");
        Ok(Self {
            handles,
            workers: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        })
    }

    /// Sink names in registration order
    pub fn sink_names(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.name().to_string()).collect()
    }

    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Write one batch to every sink concurrently.
    ///
    /// Returns only after every sink has answered, one outcome per sink in
    /// registration order. At most `max_workers` sinks write at the same time.
    #[instrument(
        name = "dispatcher_dispatch",
        skip(self, batch),
        fields(batch = batch.index(), records = batch.len())
    )]
    pub async fn dispatch(&self, batch: Arc<Batch>) -> Vec<SinkOutcome> {
        let writes = self.handles.iter().map(|handle| {
            let batch = Arc::clone(&batch);
            let workers = Arc::clone(&self.workers);
            async move {
                let permit = workers.acquire_owned().await.ok();
                handle.upsert_with_permit(batch, permit).await
            }
        });

        let outcomes = join_all(writes).await;
        debug!(sinks = outcomes.len(), "Batch barrier cleared");
        outcomes
    }

    /// Stop every worker and close every sink.
    ///
    /// Returns the close failures by sink name; shutdown itself never fails.
    #[instrument(name = "dispatcher_shutdown", skip(self), fields(sinks = self.handles.len()))]
    pub async fn shutdown(self) -> Vec<(String, ContractError)> {
        let closes = self.handles.into_iter().map(|handle| async move {
            let name = handle.name().to_string();
            handle.shutdown().await.err().map(|e| (name, e))
        });

        let failures: Vec<_> = join_all(closes).await.into_iter().flatten().collect();
        info!(close_failures = failures.len(), "Dispatcher shutdown complete");
        failures
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    max_workers: usize,
) -> Result<Dispatcher, DispatcherError> {
    DispatcherBuilder::new(sink_configs, max_workers).build().await
}
