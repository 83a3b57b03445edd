//! Tuning for the cleaning, loading, query and report stages.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::storage::MAX_BATCH_WRITE_ITEMS;
use crate::utils::retry::RetryPolicy;

/// Default number of chunks written concurrently.
pub const DEFAULT_LOADER_CONCURRENCY: usize = 4;
/// Default number of index partitions fetched concurrently.
pub const DEFAULT_QUERY_CONCURRENCY: usize = 4;
/// Default histogram bin count.
pub const DEFAULT_HISTOGRAM_BINS: usize = 30;
/// Default number of countries in the country summary.
pub const DEFAULT_TOP_COUNTRIES: usize = 5;

/// Batch loader settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Records per batch-write call. Clamped to `1..=25`.
    pub batch_size: usize,
    /// Maximum chunk writes in flight.
    pub concurrency: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_WRITE_ITEMS,
            concurrency: DEFAULT_LOADER_CONCURRENCY,
        }
    }
}

impl LoaderConfig {
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_WRITE_ITEMS)
    }
}

/// Query layer settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Items requested per page. `None` lets the store decide.
    pub page_size: Option<usize>,
    /// Maximum partitions fetched concurrently by multi-partition queries.
    pub concurrency: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: None,
            concurrency: DEFAULT_QUERY_CONCURRENCY,
        }
    }
}

/// Backoff for transient store failures and unprocessed batch items.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            jitter: policy.jitter,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.base_delay_ms)),
            max_retries: config.max_retries,
            jitter: config.jitter,
        }
    }
}

/// Cleaner settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Reject rows whose quantity or unit price is zero or negative
    /// (returns and adjustments).
    pub drop_non_positive: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            drop_non_positive: true,
        }
    }
}

/// Report settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    /// Country for the daily sales trend. Omitted from the report when unset.
    pub country: Option<String>,
    /// Customer whose order history is reported.
    pub customer_id: Option<String>,
    /// `YYYY-MM-DD` date whose revenue is reported.
    pub revenue_date: Option<String>,
    pub histogram_bins: usize,
    pub top_countries: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("reports"),
            country: None,
            customer_id: None,
            revenue_date: None,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            top_countries: DEFAULT_TOP_COUNTRIES,
        }
    }
}
