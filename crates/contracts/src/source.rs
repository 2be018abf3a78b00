//! DataSource trait - record stream producer abstraction
//!
//! A source turns a query into a lazy, finite, non-restartable stream of
//! records. Any item error ends the run; sources never retry on their own.

use futures::stream::BoxStream;

use crate::{ContractError, Record};

/// Pull-based record stream returned by [`DataSource::fetch`]
///
/// `None` marks exhaustion; an `Err` item marks a failed stream and no
/// further items should be requested.
pub type RecordStream = BoxStream<'static, Result<Record, ContractError>>;

/// Queryable record source
#[trait_variant::make(DataSource: Send)]
pub trait LocalDataSource {
    /// Source name (used for logging)
    fn name(&self) -> &str;

    /// Run `query` and return its records as a stream
    ///
    /// May suspend until the query reaches a terminal state.
    ///
    /// # Errors
    /// Query submission failure, failed/cancelled query, or timeout.
    async fn fetch(&mut self, query: &str) -> Result<RecordStream, ContractError>;

    /// Release connections
    ///
    /// Idempotent: calling it again after a successful close is a no-op.
    async fn close(&mut self) -> Result<(), ContractError>;
}
