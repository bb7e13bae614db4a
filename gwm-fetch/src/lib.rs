//! Retrieval of observation rows from a remote tabular backend.
//!
//! The backend is anything implementing [`TabularSource`]: it answers a
//! [`TableQuery`] (projection, equality / not-null filters, ordering) for one
//! inclusive [`PageRange`] at a time. [`paginate`] drives a source page by page
//! until a short page signals the end of the data.
//!
//! - [`MemorySource`]: rows held in memory, used for tests and offline fixtures
//! - `RestSource` (feature `api`): PostgREST-compatible HTTP backend

pub mod cancel;
pub mod error;
pub mod memory;
pub mod paginate;
pub mod query;
#[cfg(feature = "api")]
pub mod rest;

pub use cancel::CancelFlag;
pub use error::FetchError;
pub use memory::MemorySource;
pub use paginate::{fetch_all, fetch_all_with_cancel, fetch_table, fetch_table_with_cancel, DEFAULT_PAGE_SIZE};
pub use query::{Direction, Filter, PageRange, TableQuery};
#[cfg(feature = "api")]
pub use rest::{RestSource, RetryPolicy};

use gwm_core::Row;
use std::future::Future;

/// A remote tabular store answering one bounded page per request.
pub trait TabularSource {
    /// Rows `range.from..=range.to` of the query's result set.
    fn fetch_range(
        &self,
        query: &TableQuery,
        range: PageRange,
    ) -> impl Future<Output = Result<Vec<Row>, FetchError>>;
}

impl<S: TabularSource + ?Sized> TabularSource for &S {
    fn fetch_range(
        &self,
        query: &TableQuery,
        range: PageRange,
    ) -> impl Future<Output = Result<Vec<Row>, FetchError>> {
        (**self).fetch_range(query, range)
    }
}
