//! In-memory record streams

use contracts::{ContractError, Record, RecordStream};
use futures::stream::{self, StreamExt};

/// Stream that yields every record in order
pub fn from_records(records: Vec<Record>) -> RecordStream {
    stream::iter(records.into_iter().map(Ok)).boxed()
}

/// Stream that yields the given items verbatim, errors included
pub fn from_results(items: Vec<Result<Record, ContractError>>) -> RecordStream {
    stream::iter(items).boxed()
}
