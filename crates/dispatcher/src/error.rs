//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
///
/// These only occur while building the dispatcher. Once running, sink
/// failures are reported through `SinkResult` instead.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Two sinks share a name; report keys must be unique
    #[error("duplicate sink name '{name}'")]
    DuplicateSink { name: String },

    /// Worker pool must have at least one slot
    #[error("max_workers must be >= 1, got {0}")]
    InvalidWorkerCount(usize),

    /// Sink type needs a feature this build was compiled without
    #[error("sink '{name}' of type '{sink_type}' is not available in this build (enable the `{feature}` feature)")]
    Unsupported {
        name: String,
        sink_type: String,
        feature: String,
    },

    /// Contract error
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
