//! Batcher - groups a record stream into ordered fixed-size batches
//!
//! The batcher pulls from its stream only while a caller is waiting on
//! `next_batch`, so a consumer that finishes batch *i* before asking for
//! batch *i+1* never has more than one batch of records in flight.

use contracts::{Batch, Record, RecordStream};
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, warn};

use crate::error::{BatchProcessingError, IngestionError, Result};

/// Stream of batches produced by [`process_batches`]
pub type BatchStream = BoxStream<'static, std::result::Result<Batch, BatchProcessingError>>;

/// Batcher lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatcherState {
    /// Still pulling from the source
    Streaming,
    /// Source ended normally; the final short batch (if any) was emitted
    Exhausted,
    /// Source reported an error; nothing more is produced
    Failed,
}

/// Pull-based batcher over a [`RecordStream`]
pub struct Batcher {
    stream: RecordStream,
    batch_size: usize,
    state: BatcherState,
    buffer: Vec<Record>,
    next_index: u64,
    records_seen: u64,
}

impl Batcher {
    /// Create a batcher; `batch_size` must be at least 1
    pub fn new(stream: RecordStream, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(IngestionError::InvalidBatchSize { size: batch_size });
        }

        Ok(Self {
            stream,
            batch_size,
            state: BatcherState::Streaming,
            buffer: Vec::with_capacity(batch_size),
            next_index: 0,
            records_seen: 0,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> BatcherState {
        self.state
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Batches emitted so far
    pub fn batches_emitted(&self) -> u64 {
        self.next_index
    }

    /// Records pulled from the source so far
    pub fn records_seen(&self) -> u64 {
        self.records_seen
    }

    /// Pull the next batch.
    ///
    /// Returns `None` once the source is exhausted and every record was
    /// emitted, or after a failure was reported. A source error discards the
    /// partially filled buffer and is reported exactly once.
    pub async fn next_batch(&mut self) -> Option<std::result::Result<Batch, BatchProcessingError>> {
        if self.state != BatcherState::Streaming {
            return None;
        }

        while let Some(item) = self.stream.next().await {
            match item {
                Ok(record) => {
                    self.records_seen += 1;
                    self.buffer.push(record);
                    if self.buffer.len() == self.batch_size {
                        return Some(Ok(self.emit()));
                    }
                }
                Err(cause) => {
                    let discarded = self.buffer.len();
                    self.buffer.clear();
                    self.state = BatcherState::Failed;
                    warn!(
                        batch_index = self.next_index,
                        records_read = self.records_seen,
                        discarded,
                        error = %cause,
                        "Source failed mid-stream"
                    );
                    return Some(Err(BatchProcessingError {
                        batch_index: self.next_index,
                        records_read: self.records_seen,
                        discarded,
                        cause,
                    }));
                }
            }
        }

        self.state = BatcherState::Exhausted;
        if self.buffer.is_empty() {
            debug!(batches = self.next_index, records = self.records_seen, "Source exhausted");
            None
        } else {
            Some(Ok(self.emit()))
        }
    }

    fn emit(&mut self) -> Batch {
        let records = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.batch_size));
        let batch = Batch::new(self.next_index, records);
        self.next_index += 1;
        batch
    }
}

/// Turn a record stream into a lazy batch stream
pub fn process_batches(stream: RecordStream, batch_size: usize) -> Result<BatchStream> {
    let batcher = Batcher::new(stream, batch_size)?;
    Ok(stream::unfold(batcher, |mut batcher| async move {
        batcher.next_batch().await.map(|item| (item, batcher))
    })
    .boxed())
}
