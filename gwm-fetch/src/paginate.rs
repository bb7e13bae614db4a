//! Sequential range pagination.
//!
//! Pages are requested strictly one after another: page `n + 1` is only
//! requested once page `n` has resolved. A page holding fewer than
//! `page_size` rows ends the loop, so a result set whose size is an exact
//! multiple of the page size costs one extra, empty request.

use crate::{CancelFlag, FetchError, PageRange, TableQuery, TabularSource};
use gwm_core::Row;
use log::{debug, info};
use std::future::Future;

/// Default rows per request.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Fetch every row by calling `fetch_page` with successive ranges.
///
/// Fails with the first page error; no partial result is returned and
/// nothing is retried here.
pub async fn fetch_all<F, Fut>(fetch_page: F, page_size: usize) -> Result<Vec<Row>, FetchError>
where
    F: FnMut(PageRange) -> Fut,
    Fut: Future<Output = Result<Vec<Row>, FetchError>>,
{
    fetch_all_with_cancel(fetch_page, page_size, &CancelFlag::new()).await
}

/// [`fetch_all`] that stops with [`FetchError::Cancelled`] when `cancel`
/// is set. The flag is checked before the first request and after every page.
pub async fn fetch_all_with_cancel<F, Fut>(
    mut fetch_page: F,
    page_size: usize,
    cancel: &CancelFlag,
) -> Result<Vec<Row>, FetchError>
where
    F: FnMut(PageRange) -> Fut,
    Fut: Future<Output = Result<Vec<Row>, FetchError>>,
{
    if page_size == 0 {
        return Err(FetchError::InvalidPageSize);
    }
    let mut rows: Vec<Row> = Vec::new();
    let mut page = 0usize;
    loop {
        cancel.check()?;
        let range = PageRange::for_page(page, page_size);
        let batch = fetch_page(range).await?;
        cancel.check()?;
        let received = batch.len();
        debug!("page {} ({}) returned {} rows", page, range, received);
        rows.extend(batch);
        if received < page_size {
            break;
        }
        page += 1;
    }
    info!("fetched {} rows in {} pages", rows.len(), page + 1);
    Ok(rows)
}

/// Fetch the full result set of `query` from `source`.
pub async fn fetch_table<S: TabularSource>(
    source: &S,
    query: &TableQuery,
    page_size: usize,
) -> Result<Vec<Row>, FetchError> {
    fetch_table_with_cancel(source, query, page_size, &CancelFlag::new()).await
}

/// [`fetch_table`] with cooperative cancellation.
pub async fn fetch_table_with_cancel<S: TabularSource>(
    source: &S,
    query: &TableQuery,
    page_size: usize,
    cancel: &CancelFlag,
) -> Result<Vec<Row>, FetchError> {
    debug!("fetching table {} in pages of {}", query.table, page_size);
    fetch_all_with_cancel(move |range| source.fetch_range(query, range), page_size, cancel).await
}
