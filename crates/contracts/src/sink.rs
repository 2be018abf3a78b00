//! DataSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for Sinks.

use crate::{Batch, ContractError, SinkResult};

/// Batch upsert target
///
/// All sink implementations must implement this trait.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics and as the report key)
    fn name(&self) -> &str;

    /// Write every record of the batch
    ///
    /// Never fails past this boundary: per-record problems are counted in
    /// `failed_records`/`errors`, and a failed storage call yields a result
    /// with `failed_records == batch.len()`. The batch must not be modified.
    async fn upsert_batch(&mut self, batch: &Batch) -> SinkResult;

    /// Close sink
    ///
    /// Idempotent: calling it again after a successful close is a no-op.
    async fn close(&mut self) -> Result<(), ContractError>;
}
