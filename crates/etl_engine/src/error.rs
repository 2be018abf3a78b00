//! Run-level errors
//!
//! Only failures that abort a run live here. Sink failures never do; they end
//! up in the `RunReport`.

use contracts::ContractError;
use dispatcher::DispatcherError;
use ingestion::{BatchProcessingError, IngestionError};
use thiserror::Error;

/// Fatal pipeline error
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid settings, detected before any I/O
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Query submission, execution, or result fetch failed
    #[error("source error: {0}")]
    Source(#[source] ContractError),

    /// The record stream failed mid-run
    #[error(transparent)]
    BatchProcessing(#[from] BatchProcessingError),

    /// Unexpected fault inside the engine itself
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Source(_) => "source",
            Self::BatchProcessing(_) => "batch_processing",
            Self::Internal(_) => "internal",
        }
    }

    /// Underlying source error, if the run died on one
    pub fn source_error(&self) -> Option<&ContractError> {
        match self {
            Self::Source(e) => Some(e),
            Self::BatchProcessing(e) => Some(&e.cause),
            _ => None,
        }
    }
}

impl From<IngestionError> for PipelineError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::BatchProcessing(e) => Self::BatchProcessing(e),
            other => Self::Configuration(other.to_string()),
        }
    }
}

impl From<DispatcherError> for PipelineError {
    fn from(err: DispatcherError) -> Self {
        Self::Configuration(err.to_string())
    }
}
