//! Transaction store access.
//!
//! The store is a managed hash-and-range keyed table with two secondary
//! indexes (see [`schema`]). This crate consumes four operations from it:
//! single-item put, batch write (which may leave items unprocessed), index
//! query and table scan (both paginated by [`PageToken`]).
//!
//! ## Backends
//!
//! - `DynamoTransactionStore` (feature: dynamo) - Amazon DynamoDB
//! - `MockTransactionStore` (tests / feature: test-utils) - in-memory, with fault injection

use async_trait::async_trait;
use thiserror::Error;

use crate::record::Record;

pub mod schema;
mod token;

#[cfg(feature = "dynamo")]
pub mod dynamo;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

#[cfg(feature = "dynamo")]
pub use dynamo::DynamoTransactionStore;
#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockTransactionStore;
pub use schema::{IndexDescriptor, SecondaryIndex, MAX_BATCH_WRITE_ITEMS};
pub use token::PageToken;

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Throttling, timeouts, network failures, server-side errors.
    /// Safe to retry.
    #[error("Transient store error during {operation}: {message}")]
    Transient {
        operation: &'static str,
        message: String,
    },

    /// Unknown table or index, invalid key value, bad page token.
    /// Never retried.
    #[error("Store configuration error: {0}")]
    Configuration(String),

    /// The store refused the request for a reason that retrying will not fix.
    #[error("Store rejected {operation}: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },

    /// An item read back from the store does not match the schema.
    #[error("Malformed item: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, StoreError::Configuration(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Condition on an index sort key (`invoice_date`). Bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKeyFilter {
    Between { start: String, end: String },
    BeginsWith(String),
    AtOrAfter(String),
    AtOrBefore(String),
}

impl SortKeyFilter {
    pub fn between(start: impl Into<String>, end: impl Into<String>) -> Self {
        SortKeyFilter::Between {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Every timestamp on one calendar day.
    pub fn day(date: chrono::NaiveDate) -> Self {
        let day = date.format("%Y-%m-%d");
        SortKeyFilter::between(format!("{}T00:00:00", day), format!("{}T23:59:59", day))
    }

    /// Build from optional bounds; `None` when both are absent.
    pub fn from_bounds(start: Option<String>, end: Option<String>) -> Option<Self> {
        match (start, end) {
            (Some(start), Some(end)) => Some(SortKeyFilter::Between { start, end }),
            (Some(start), None) => Some(SortKeyFilter::AtOrAfter(start)),
            (None, Some(end)) => Some(SortKeyFilter::AtOrBefore(end)),
            (None, None) => None,
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            SortKeyFilter::Between { start, end } => value >= start.as_str() && value <= end.as_str(),
            SortKeyFilter::BeginsWith(prefix) => value.starts_with(prefix.as_str()),
            SortKeyFilter::AtOrAfter(start) => value >= start.as_str(),
            SortKeyFilter::AtOrBefore(end) => value <= end.as_str(),
        }
    }
}

/// One index query page request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub index: SecondaryIndex,
    pub partition_value: String,
    pub sort_filter: Option<SortKeyFilter>,
    /// Maximum items the store should return for this page.
    pub limit: Option<usize>,
    /// Continuation from the previous page.
    pub start: Option<PageToken>,
}

/// One table scan page request, optionally filtered on `invoice_date`.
///
/// The filter is applied after the store reads a page, so a page may come
/// back short, or even empty, while still carrying a continuation token.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub date_filter: Option<SortKeyFilter>,
    pub limit: Option<usize>,
    pub start: Option<PageToken>,
}

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Record>,
    /// Present when more results may exist.
    pub next_token: Option<PageToken>,
}

/// Access to the transaction table.
///
/// Implementations:
/// - `DynamoTransactionStore`: Amazon DynamoDB
/// - `MockTransactionStore`: In-memory mock for testing
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Write a single record, overwriting any record with the same key.
    async fn put_item(&self, record: &Record) -> Result<()>;

    /// Write up to [`MAX_BATCH_WRITE_ITEMS`] records in one request.
    ///
    /// Returns the records the store did not process (throttling or
    /// partial failure). An empty vector means every record was written.
    async fn batch_write(&self, records: &[Record]) -> Result<Vec<Record>>;

    /// Fetch one page of an index query, in ascending sort-key order.
    async fn query(&self, request: &QueryRequest) -> Result<Page>;

    /// Fetch one page of a full-table scan.
    async fn scan(&self, request: &ScanRequest) -> Result<Page>;
}

// ============================================================================
// Factory
// ============================================================================

/// Initialize the DynamoDB-backed store from configuration.
#[cfg(feature = "dynamo")]
pub async fn init_store(
    config: &crate::config::Config,
) -> Result<std::sync::Arc<dyn TransactionStore>> {
    use tracing::info;

    info!(
        table = %config.table.name,
        region = ?config.aws.region,
        endpoint = ?config.aws.endpoint_url,
        "TransactionStore: dynamo"
    );
    let store = DynamoTransactionStore::new(&config.aws, config.table.name.clone()).await?;
    Ok(std::sync::Arc::new(store))
}
