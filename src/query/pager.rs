//! Token-following page loop shared by index queries and scans.

use tracing::debug;

use super::{QueryError, QueryLayer};
use crate::record::Record;
use crate::storage::{
    PageToken, QueryRequest, ScanRequest, SecondaryIndex, SortKeyFilter, StoreError,
};
use crate::utils::retry::retry_transient;

/// What each page request reads from.
#[derive(Debug, Clone)]
pub(crate) enum PageSource {
    Index {
        index: SecondaryIndex,
        partition_value: String,
        sort_filter: Option<SortKeyFilter>,
    },
    Scan {
        date_filter: Option<SortKeyFilter>,
    },
}

/// Sequential pager. Each request depends on the previous page's token,
/// so pages of one result set are never fetched concurrently.
pub(crate) struct Pager<'a> {
    layer: &'a QueryLayer,
    source: PageSource,
    remaining: Option<usize>,
    token: Option<PageToken>,
    pub(crate) pages_fetched: usize,
    pub(crate) fetched: usize,
    pub(crate) cancelled: bool,
    done: bool,
}

impl<'a> Pager<'a> {
    pub(crate) fn new(
        layer: &'a QueryLayer,
        source: PageSource,
        max_items: Option<usize>,
        start: Option<PageToken>,
    ) -> Self {
        Self {
            layer,
            source,
            remaining: max_items,
            token: start,
            pages_fetched: 0,
            fetched: 0,
            cancelled: false,
            done: false,
        }
    }

    /// Token to resume from if the pager stopped before the end.
    pub(crate) fn resume_token(&self) -> Option<PageToken> {
        self.token.clone()
    }

    /// Items to ask for on the next page.
    fn next_limit(&self) -> Option<usize> {
        match (self.layer.page_size, self.remaining) {
            (Some(page), Some(left)) => Some(page.min(left)),
            (Some(page), None) => Some(page),
            (None, left) => left,
        }
    }

    /// Fetch the next page. `None` once the result set is exhausted, the
    /// item cap is reached, or cancellation was observed.
    ///
    /// A scan page may be empty and still not be the last page.
    pub(crate) async fn next_page(&mut self) -> Result<Option<Vec<Record>>, QueryError> {
        if self.done || self.remaining == Some(0) {
            self.done = true;
            return Ok(None);
        }
        if self.layer.cancel.is_cancelled() {
            debug!(pages = self.pages_fetched, "Cancellation observed before page request");
            self.cancelled = true;
            self.done = true;
            return Ok(None);
        }

        let limit = self.next_limit();
        let store = &self.layer.store;
        let result = match self.source {
            PageSource::Index {
                index,
                ref partition_value,
                ref sort_filter,
            } => {
                let request = QueryRequest {
                    index,
                    partition_value: partition_value.clone(),
                    sort_filter: sort_filter.clone(),
                    limit,
                    start: self.token.clone(),
                };
                retry_transient(&self.layer.retry, "query", || store.query(&request)).await
            }
            PageSource::Scan { ref date_filter } => {
                let request = ScanRequest {
                    date_filter: date_filter.clone(),
                    limit,
                    start: self.token.clone(),
                };
                retry_transient(&self.layer.retry, "scan", || store.scan(&request)).await
            }
        };

        let page = match result {
            Ok(page) => page,
            Err(source @ StoreError::Configuration(_)) => {
                self.done = true;
                return Err(QueryError::Configuration(source));
            }
            Err(source) => {
                self.done = true;
                return Err(QueryError::Retrieval {
                    page_index: self.pages_fetched,
                    resume_token: self.token.clone(),
                    fetched: self.fetched,
                    source,
                });
            }
        };

        let mut items = page.items;
        if let Some(left) = self.remaining {
            items.truncate(left);
            self.remaining = Some(left - items.len());
        }
        self.pages_fetched += 1;
        self.fetched += items.len();
        self.token = page.next_token;
        if self.token.is_none() {
            self.done = true;
        }

        debug!(
            page_index = self.pages_fetched - 1,
            items = items.len(),
            more = !self.done,
            "Fetched page"
        );
        Ok(Some(items))
    }
}
