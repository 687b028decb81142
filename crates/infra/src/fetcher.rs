//! Paginated bulk retrieval.

use tracing::{debug, warn};

use stockrecon_core::{Record, RetrievalError, StoreId};

use crate::remote::{MAX_PAGE_SIZE, Query, QueryRequest, RecordStore};

/// Fetches a complete record set one bounded page at a time.
///
/// Stops on the first page shorter than `page_size` (an empty page included).
/// A full page never ends the scan, so a set whose size is an exact multiple
/// of the page size costs one extra, empty request. `max_pages` bounds the
/// loop against a store that keeps returning full pages.
#[derive(Debug)]
pub struct PaginatedFetcher<'a, S: ?Sized> {
    remote: &'a S,
    page_size: usize,
    max_pages: usize,
}

impl<'a, S> PaginatedFetcher<'a, S>
where
    S: RecordStore + ?Sized,
{
    pub fn new(remote: &'a S) -> Self {
        Self {
            remote,
            page_size: MAX_PAGE_SIZE,
            max_pages: 10_000,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch every record matching `filter`, in retrieval order.
    ///
    /// Any failed page discards everything fetched so far. No retries.
    pub async fn fetch_all(
        &self,
        store: &StoreId,
        filter: &Query,
        fields: &[String],
    ) -> Result<Vec<Record>, RetrievalError> {
        let mut records: Vec<Record> = Vec::new();
        let mut expected_total = None;

        for page_no in 0..self.max_pages {
            let offset = records.len();
            let request = QueryRequest {
                store: store.clone(),
                filter: filter.clone(),
                fields: fields.to_vec(),
                limit: self.page_size,
                offset,
                total_count: page_no == 0,
            };

            let page = self.remote.query(&request).await.map_err(|source| {
                warn!(store = %store, offset, error = %source, "page fetch failed");
                RetrievalError::Page {
                    store: store.clone(),
                    offset,
                    source,
                }
            })?;

            if page_no == 0 {
                expected_total = page.total_count;
            }

            let len = page.records.len();
            debug!(store = %store, offset, len, "fetched page");
            records.extend(page.records);

            if len < self.page_size {
                if let Some(total) = expected_total {
                    if total != records.len() as u64 {
                        warn!(
                            store = %store,
                            expected = total,
                            fetched = records.len(),
                            "record count changed during scan"
                        );
                    }
                }
                return Ok(records);
            }
        }

        Err(RetrievalError::PageLimitExceeded {
            store: store.clone(),
            max_pages: self.max_pages,
        })
    }
}
