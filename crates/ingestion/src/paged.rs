//! Pull-driven paging over tabular query results
//!
//! A page is requested only when the consumer asks for a record and every
//! record of the previous page has been handed out, so the stream is never
//! more than one page ahead of the batcher.

use std::collections::VecDeque;
use std::future::Future;

use contracts::{ContractError, Record, RecordStream};
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::tabular::TabularDecoder;

/// One page of raw result rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultPage {
    pub rows: Vec<Vec<Option<String>>>,
    /// Continuation token; `None` on the last page
    pub next_token: Option<String>,
}

struct PageCursor<F> {
    fetch_page: F,
    decoder: TabularDecoder,
    pending: VecDeque<Record>,
    next_token: Option<String>,
    exhausted: bool,
    failed: bool,
    pages: u64,
    fetched: u64,
}

/// Turn a page fetcher into a lazy record stream.
///
/// `fetch_page` receives the continuation token of the previous page
/// (`None` for the first call). A fetch error is yielded once and ends the
/// stream.
pub fn paged_records<F, Fut>(decoder: TabularDecoder, fetch_page: F) -> RecordStream
where
    F: FnMut(Option<String>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<ResultPage, ContractError>> + Send + 'static,
{
    let cursor = PageCursor {
        fetch_page,
        decoder,
        pending: VecDeque::new(),
        next_token: None,
        exhausted: false,
        failed: false,
        pages: 0,
        fetched: 0,
    };

    stream::unfold(cursor, |mut cursor| async move {
        loop {
            if let Some(record) = cursor.pending.pop_front() {
                cursor.fetched += 1;
                return Some((Ok(record), cursor));
            }
            if cursor.failed {
                return None;
            }
            if cursor.exhausted {
                info!(
                    pages = cursor.pages,
                    records = cursor.fetched,
                    "Fetched all result records"
                );
                return None;
            }

            let token = cursor.next_token.take();
            match (cursor.fetch_page)(token).await {
                Ok(page) => {
                    cursor.pages += 1;
                    cursor.exhausted = page.next_token.is_none();
                    cursor.next_token = page.next_token;
                    let records = cursor.decoder.decode_page(page.rows);
                    debug!(page = cursor.pages, records = records.len(), "Result page decoded");
                    cursor.pending.extend(records);
                }
                Err(e) => {
                    cursor.failed = true;
                    return Some((Err(e), cursor));
                }
            }
        }
    })
    .boxed()
}
