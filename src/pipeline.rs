//! Orchestrator.
//!
//! Sequences the stages for the two entry points:
//!
//! ```text
//! load:   bytes --Cleaner--> records --consolidate--> BatchLoader --> store
//! report: store --QueryLayer--> records --analytics--> AnalyticsReport --> JSON files
//! ```
//!
//! Every run carries a `run_id` span field so log lines from one run can be
//! correlated.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analytics::{self, AnalyticsReport, CountryTrend, DailyRevenue};
use crate::cleaning::{CleanError, Cleaner};
use crate::config::Config;
use crate::loader::{BatchLoader, LoadError, LoadReport};
use crate::query::{QueryError, QueryLayer};
use crate::source::{self, SourceError};
use crate::storage::{SortKeyFilter, TransactionStore};
use crate::utils::cancel::CancellationSignal;
use crate::utils::retry::RetryPolicy;

/// Errors surfaced to the binaries.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Cleaning error: {0}")]
    Clean(#[from] CleanError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Invalid report date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Counts reported at the end of a load run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub run_id: String,
    /// Raw data rows read.
    pub rows: usize,
    /// Records after cleaning and consolidation.
    pub cleaned: usize,
    pub rejected: usize,
    /// Rows folded into an earlier row with the same key.
    pub merged: usize,
    pub written: usize,
    pub failed: usize,
    pub cancelled: bool,
    /// Full loader report, including failed keys.
    pub load: LoadReport,
}

/// One ETL run over a store.
pub struct Pipeline {
    config: Config,
    store: Arc<dyn TransactionStore>,
    cancel: CancellationSignal,
    run_id: String,
}

impl Pipeline {
    pub fn new(config: &Config, store: Arc<dyn TransactionStore>) -> Self {
        Self {
            config: config.clone(),
            store,
            cancel: CancellationSignal::never(),
            run_id: Uuid::new_v4().to_string(),
        }
    }

    /// Stop issuing store requests once `signal` is raised.
    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancel = signal;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.config.retry)
    }

    fn query_layer(&self) -> QueryLayer {
        QueryLayer::new(self.store.clone(), &self.config.query, self.retry_policy())
            .with_cancellation(self.cancel.clone())
    }

    /// Fetch the configured raw source and load it.
    pub async fn run_load(&self) -> Result<LoadSummary> {
        let bytes = source::fetch_raw(&self.config).await?;
        self.load(&bytes).await
    }

    /// Clean raw CSV bytes and write the resulting records.
    pub async fn load(&self, bytes: &[u8]) -> Result<LoadSummary> {
        let span = info_span!("pipeline.load", run_id = %self.run_id);
        async move {
            let cleaned = Cleaner::new(&self.config.cleaning)
                .clean_csv(bytes)?
                .consolidate();
            let report = cleaned.report;

            let loader = BatchLoader::new(
                self.store.clone(),
                &self.config.loader,
                self.retry_policy(),
            )
            .with_cancellation(self.cancel.clone());
            let load = loader.load(cleaned.records).await?;

            let summary = LoadSummary {
                run_id: self.run_id.clone(),
                rows: report.rows_read,
                cleaned: report.records,
                rejected: report.rejected(),
                merged: report.duplicates_merged,
                written: load.written,
                failed: load.failed(),
                cancelled: load.cancelled,
                load,
            };

            for (field, count) in &report.rejections_by_field {
                info!(field, count, "Rejections by field");
            }
            if summary.failed > 0 {
                warn!(failed = summary.failed, "Some records were not written");
            }
            info!(
                rows = summary.rows,
                cleaned = summary.cleaned,
                rejected = summary.rejected,
                merged = summary.merged,
                written = summary.written,
                failed = summary.failed,
                cancelled = summary.cancelled,
                "Load run complete"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Run the configured queries and aggregate them.
    ///
    /// Sections whose parameter is unset in `report` config are omitted. A
    /// cancelled query still contributes what it fetched and marks the
    /// report `partial`.
    pub async fn report(&self) -> Result<AnalyticsReport> {
        let span = info_span!("pipeline.report", run_id = %self.run_id);
        async move {
            let layer = self.query_layer();
            let settings = &self.config.report;
            let mut report = AnalyticsReport {
                run_id: self.run_id.clone(),
                ..Default::default()
            };

            if let Some(ref country) = settings.country {
                let outcome = layer.sales_by_country(country, None).await?;
                report.partial |= outcome.cancelled;
                report.country_trend = Some(CountryTrend {
                    country: country.clone(),
                    daily: analytics::daily_sales(&outcome.records),
                });
            }

            if let Some(ref customer_id) = settings.customer_id {
                let outcome = layer.orders_by_customer(customer_id).await?;
                report.partial |= outcome.cancelled;
                report.customer = Some(analytics::customer_summary(customer_id, &outcome.records));
            }

            if let Some(ref raw) = settings.revenue_date {
                let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| PipelineError::InvalidDate(raw.clone()))?;
                let outcome = layer.scan_dates(Some(SortKeyFilter::day(date)), None).await?;
                report.partial |= outcome.cancelled;
                report.revenue = Some(DailyRevenue {
                    date,
                    revenue: analytics::revenue_on(&outcome.records, date),
                });
            }

            let everything = layer.scan_dates(None, None).await?;
            report.partial |= everything.cancelled;
            report.records_scanned = everything.records.len();
            report.histogram =
                analytics::amount_histogram(&everything.records, settings.histogram_bins);
            report.country_stats =
                analytics::country_stats(&everything.records, settings.top_countries);
            report.geo = analytics::monthly_geo_sales(&everything.records);

            info!(
                records_scanned = report.records_scanned,
                countries = report.country_stats.len(),
                partial = report.partial,
                "Report complete"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Write each report section as a JSON file under `dir`. Returns the
    /// paths written.
    pub async fn write_report(&self, report: &AnalyticsReport, dir: &Path) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| PipelineError::Write {
                path: dir.to_path_buf(),
                source,
            })?;

        let mut sections: Vec<(&str, Vec<u8>)> = vec![
            ("report.json", serde_json::to_vec_pretty(report)?),
            ("histogram.json", serde_json::to_vec_pretty(&report.histogram)?),
            ("country_stats.json", serde_json::to_vec_pretty(&report.country_stats)?),
            ("geo_sales.json", serde_json::to_vec_pretty(&report.geo)?),
        ];
        if let Some(ref trend) = report.country_trend {
            sections.push(("country_trend.json", serde_json::to_vec_pretty(trend)?));
        }
        if let Some(ref customer) = report.customer {
            sections.push(("customer.json", serde_json::to_vec_pretty(customer)?));
        }

        let mut written = Vec::with_capacity(sections.len());
        for (name, body) in sections {
            let path = dir.join(name);
            tokio::fs::write(&path, body)
                .await
                .map_err(|source| PipelineError::Write {
                    path: path.clone(),
                    source,
                })?;
            written.push(path);
        }

        info!(dir = %dir.display(), files = written.len(), run_id = %self.run_id, "Report written");
        Ok(written)
    }
}
