//! Paginated query layer.
//!
//! Follows continuation tokens until the store reports no more pages or a
//! caller-supplied item cap is reached, preserving the store's ascending
//! `invoice_date` order. Transient page failures are retried with the same
//! policy the loader uses; configuration errors are returned at once.
//!
//! The layer keeps nothing between top-level calls. Callers that want to
//! resume later persist the token found in [`QueryOutcome::resume_token`]
//! or [`QueryError::Retrieval`].

mod pager;

use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use thiserror::Error;
use tracing::info;

use crate::config::QueryConfig;
use crate::record::Record;
use crate::storage::{PageToken, SecondaryIndex, SortKeyFilter, StoreError, TransactionStore};
use crate::utils::cancel::CancellationSignal;
use crate::utils::retry::RetryPolicy;

use pager::{PageSource, Pager};

/// Query failures.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Unknown index, malformed key value or bad token. Not retried.
    #[error("Query configuration error: {0}")]
    Configuration(#[source] StoreError),

    /// A page request kept failing after retries.
    #[error("Page {page_index} could not be retrieved after {fetched} items: {source}")]
    Retrieval {
        page_index: usize,
        /// Token that would re-request the failed page.
        resume_token: Option<PageToken>,
        /// Items delivered before the failure.
        fetched: usize,
        #[source]
        source: StoreError,
    },

    /// A [`QueryLayer::stream`] stopped on cancellation before the result
    /// set was exhausted. Every item before this error was delivered.
    #[error("Query cancelled after {fetched} items")]
    Cancelled {
        fetched: usize,
        /// Token to continue from, unless the last page was already fetched.
        resume_token: Option<PageToken>,
    },
}

/// One index query.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub index: SecondaryIndex,
    pub partition_value: String,
    pub sort_filter: Option<SortKeyFilter>,
    /// Stop once this many items have been produced.
    pub max_items: Option<usize>,
    /// Resume from a previously returned token.
    pub start: Option<PageToken>,
}

impl IndexQuery {
    pub fn new(index: SecondaryIndex, partition_value: impl Into<String>) -> Self {
        Self {
            index,
            partition_value: partition_value.into(),
            sort_filter: None,
            max_items: None,
            start: None,
        }
    }

    /// Select the index by its provisioned name.
    pub fn by_name(index_name: &str, partition_value: impl Into<String>) -> Result<Self, QueryError> {
        let index = index_name.parse().map_err(QueryError::Configuration)?;
        Ok(Self::new(index, partition_value))
    }

    pub fn sort_filter(mut self, filter: SortKeyFilter) -> Self {
        self.sort_filter = Some(filter);
        self
    }

    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    pub fn resume_from(mut self, token: PageToken) -> Self {
        self.start = Some(token);
        self
    }

    fn validate(&self) -> Result<(), QueryError> {
        if self.partition_value.trim().is_empty() {
            return Err(QueryError::Configuration(StoreError::Configuration(format!(
                "empty partition value for index {}",
                self.index
            ))));
        }
        Ok(())
    }

    fn source(&self) -> PageSource {
        PageSource::Index {
            index: self.index,
            partition_value: self.partition_value.clone(),
            sort_filter: self.sort_filter.clone(),
        }
    }
}

/// Everything a completed (or stopped) query produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    /// Records in store order.
    pub records: Vec<Record>,
    pub pages_fetched: usize,
    /// Cancellation was observed before the result set was exhausted.
    pub cancelled: bool,
    /// Set when the query stopped early (cap or cancellation) and more
    /// pages remain.
    pub resume_token: Option<PageToken>,
}

/// Index queries and scans over a [`TransactionStore`].
pub struct QueryLayer {
    store: Arc<dyn TransactionStore>,
    retry: RetryPolicy,
    page_size: Option<usize>,
    concurrency: usize,
    cancel: CancellationSignal,
}

impl QueryLayer {
    pub fn new(store: Arc<dyn TransactionStore>, config: &QueryConfig, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            page_size: config.page_size.filter(|&n| n > 0),
            concurrency: config.concurrency.max(1),
            cancel: CancellationSignal::never(),
        }
    }

    /// Stop issuing page requests once `signal` is raised.
    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancel = signal;
        self
    }

    /// Lazily yield every matching record, fetching pages on demand.
    ///
    /// If cancellation stops the pager early, the stream ends with
    /// [`QueryError::Cancelled`] after the records fetched so far.
    pub fn stream(
        &self,
        query: IndexQuery,
    ) -> impl Stream<Item = Result<Record, QueryError>> + '_ {
        let invalid = query.validate().err();
        let pager = Pager::new(self, query.source(), query.max_items, query.start);

        stream::try_unfold((invalid, pager), |(invalid, mut pager)| async move {
            if let Some(err) = invalid {
                return Err(err);
            }
            match pager.next_page().await? {
                Some(items) => Ok(Some((items, (None, pager)))),
                None if pager.cancelled => Err(QueryError::Cancelled {
                    fetched: pager.fetched,
                    resume_token: pager.resume_token(),
                }),
                None => Ok(None),
            }
        })
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<Record, QueryError>)))
        .try_flatten()
    }

    /// Run an index query to completion (or its cap, or cancellation).
    pub async fn collect(&self, query: IndexQuery) -> Result<QueryOutcome, QueryError> {
        query.validate()?;
        let pager = Pager::new(self, query.source(), query.max_items, query.start.clone());
        let outcome = drain(pager).await?;
        info!(
            index = %query.index,
            partition = %query.partition_value,
            records = outcome.records.len(),
            pages = outcome.pages_fetched,
            cancelled = outcome.cancelled,
            "Index query complete"
        );
        Ok(outcome)
    }

    /// Full-table scan filtered on `invoice_date`, for ranges no index covers.
    pub async fn scan_dates(
        &self,
        date_filter: Option<SortKeyFilter>,
        max_items: Option<usize>,
    ) -> Result<QueryOutcome, QueryError> {
        let pager = Pager::new(self, PageSource::Scan { date_filter }, max_items, None);
        let outcome = drain(pager).await?;
        info!(
            records = outcome.records.len(),
            pages = outcome.pages_fetched,
            cancelled = outcome.cancelled,
            "Date scan complete"
        );
        Ok(outcome)
    }

    /// Query several partitions of one index with bounded concurrency.
    ///
    /// Results come back in the order of `partition_values` whatever order
    /// the fetches finish in.
    pub async fn query_partitions(
        &self,
        index: SecondaryIndex,
        partition_values: Vec<String>,
        sort_filter: Option<SortKeyFilter>,
    ) -> Result<Vec<(String, QueryOutcome)>, QueryError> {
        stream::iter(partition_values)
            .map(|value| {
                let mut query = IndexQuery::new(index, value.clone());
                query.sort_filter = sort_filter.clone();
                async move { self.collect(query).await.map(|outcome| (value, outcome)) }
            })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    // ------------------------------------------------------------------
    // Domain queries
    // ------------------------------------------------------------------

    /// Sales lines for one country, optionally restricted by date.
    pub async fn sales_by_country(
        &self,
        country: &str,
        date_filter: Option<SortKeyFilter>,
    ) -> Result<QueryOutcome, QueryError> {
        let mut query = IndexQuery::new(SecondaryIndex::ByCountry, country);
        query.sort_filter = date_filter;
        self.collect(query).await
    }

    /// Every line ordered by one customer.
    pub async fn orders_by_customer(&self, customer_id: &str) -> Result<QueryOutcome, QueryError> {
        self.collect(IndexQuery::new(SecondaryIndex::ByCustomer, customer_id))
            .await
    }

    /// Every line with `start <= invoice_date <= end`, via table scan.
    pub async fn orders_in_date_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<QueryOutcome, QueryError> {
        self.scan_dates(Some(SortKeyFilter::between(start, end)), None)
            .await
    }
}

async fn drain(mut pager: Pager<'_>) -> Result<QueryOutcome, QueryError> {
    let mut records = Vec::new();
    while let Some(items) = pager.next_page().await? {
        records.extend(items);
    }
    Ok(QueryOutcome {
        records,
        pages_fetched: pager.pages_fetched,
        cancelled: pager.cancelled,
        resume_token: pager.resume_token(),
    })
}
