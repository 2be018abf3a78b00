//! # Ingestion
//!
//! Record stream side of the pipeline.
//!
//! Responsibilities:
//! - Data sources (Athena, NDJSON file, mock) behind the `DataSource` contract
//! - Wait for query completion with bounded polling
//! - Page through query results on demand, one page at a time
//! - Decode tabular result pages into `Record`s
//! - Group the stream into ordered fixed-size `Batch`es
//!
//! ## Usage Example
//!
//! ```ignore
//! use contracts::DataSource;
//! use ingestion::{Batcher, MockDataSource};
//!
//! let mut source = MockDataSource::numbered(5);
//! let stream = source.fetch("SELECT 1").await?;
//! let mut batcher = Batcher::new(stream, 2)?;
//! while let Some(batch) = batcher.next_batch().await {
//!     let batch = batch?;
//!     // dispatch batch
//! }
//! ```

#[cfg(feature = "aws")]
mod athena;
mod backend;
mod batcher;
mod error;
mod file;
mod mock;
mod paged;
mod poll;
mod stream;
mod tabular;
mod transform;

// Re-exports
#[cfg(feature = "aws")]
pub use athena::AthenaSource;
pub use backend::SourceBackend;
pub use batcher::{process_batches, BatchStream, Batcher, BatcherState};
pub use contracts::{Batch, Record, RecordStream};
pub use error::{BatchProcessingError, IngestionError, Result};
pub use file::FileSource;
pub use mock::{MockDataSource, MockSourceTracker};
pub use paged::{paged_records, ResultPage};
pub use poll::{wait_for_completion, PollConfig, QueryStatus};
pub use stream::{from_records, from_results};
pub use tabular::TabularDecoder;
pub use transform::{decode_encoded_array, expand_encoded_arrays};
