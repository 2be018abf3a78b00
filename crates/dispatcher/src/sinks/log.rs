//! LogSink - logs batch summary via tracing

use contracts::{Batch, ContractError, DataSink, SinkResult};
use tracing::{debug, info, instrument};

/// Sink that logs batch summaries for debugging
pub struct LogSink {
    name: String,
    batches: u64,
    records: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            batches: 0,
            records: 0,
        }
    }

    fn log_batch_summary(&self, batch: &Batch) {
        let field_count = batch.records().first().map(|r| r.len()).unwrap_or(0);

        info!(
            sink = %self.name,
            batch = batch.index(),
            records = batch.len(),
            fields = field_count,
            "Batch received"
        );
        debug!(sink = %self.name, first = ?batch.records().first(), "First record");
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_upsert",
        skip(self, batch),
        fields(sink = %self.name, batch = batch.index())
    )]
    async fn upsert_batch(&mut self, batch: &Batch) -> SinkResult {
        self.log_batch_summary(batch);
        self.batches += 1;
        self.records += batch.len() as u64;
        SinkResult::success(batch.len())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            batches = self.batches,
            records = self.records,
            "LogSink closed"
        );
        Ok(())
    }
}
