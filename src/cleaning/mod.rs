//! Record cleaner.
//!
//! Turns raw tabular rows into canonical [`Record`]s or rejections. The
//! cleaner holds no state beyond its policy, so cleaning the same rows
//! twice yields the same output in the same order.
//!
//! ```text
//! bytes --read_rows--> [RawRow] --clean--> Ok(Record) | Err(Rejection)
//! ```

mod fields;
mod input;

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::CleaningConfig;
use crate::record::{Record, RecordKey};

pub use input::{decode, normalize_header, read_rows, RawRow};

/// Country stored when the raw row leaves it blank. Index keys cannot be
/// empty strings.
pub const UNSPECIFIED_COUNTRY: &str = "Unspecified";

/// Errors that make the whole input unreadable.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Row {row} could not be read: {source}")]
    Row {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("Required column {0} not found in header")]
    MissingColumn(&'static str),
}

/// Why a row was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("missing required field {field}")]
    MissingField { field: &'static str },

    #[error("{field} is not numeric: {value:?}")]
    NonNumeric { field: &'static str, value: String },

    #[error("invoice_date could not be parsed: {value:?}")]
    UnparseableDate { value: String },

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: String },

    #[error("quantity {quantity} * unit_price {unit_price} overflows")]
    AmountOverflow { quantity: i64, unit_price: String },
}

impl RejectionReason {
    /// The field the rejection cites.
    pub fn field(&self) -> &'static str {
        match self {
            RejectionReason::MissingField { field }
            | RejectionReason::NonNumeric { field, .. }
            | RejectionReason::NonPositive { field, .. } => field,
            RejectionReason::UnparseableDate { .. } => "invoice_date",
            RejectionReason::AmountOverflow { .. } => "quantity",
        }
    }
}

/// A rejected row: 1-based data row number (header excluded) and reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub row: usize,
    pub reason: RejectionReason,
}

/// Result of cleaning one row.
pub type CleanOutcome = Result<Record, Rejection>;

/// Counts and rejections for one cleaning run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanReport {
    pub rows_read: usize,
    pub records: usize,
    pub rejections: Vec<Rejection>,
    pub rejections_by_field: BTreeMap<&'static str, usize>,
    pub duplicates_merged: usize,
}

impl CleanReport {
    pub fn rejected(&self) -> usize {
        self.rejections.len()
    }
}

/// Canonical records plus the report that produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedBatch {
    pub records: Vec<Record>,
    pub report: CleanReport,
}

impl CleanedBatch {
    /// Merge records that share a key (see [`consolidate_duplicates`]).
    pub fn consolidate(self) -> Self {
        let CleanedBatch { records, mut report } = self;
        let before = records.len();
        let records = consolidate_duplicates(records);
        report.duplicates_merged = before - records.len();
        report.records = records.len();
        Self { records, report }
    }
}

/// Row-to-record cleaner.
#[derive(Debug, Clone)]
pub struct Cleaner {
    drop_non_positive: bool,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new(&CleaningConfig::default())
    }
}

impl Cleaner {
    pub fn new(config: &CleaningConfig) -> Self {
        Self {
            drop_non_positive: config.drop_non_positive,
        }
    }

    /// Validate and convert one row.
    ///
    /// Checks run in column order (keys, quantity, unit price, date), so a
    /// row with several problems is rejected for the first one.
    pub fn clean_row(&self, row: &RawRow) -> Result<Record, RejectionReason> {
        let invoice_id = fields::required(row.invoice_id.as_deref(), "invoice_id")?;
        let stock_code = fields::required(row.stock_code.as_deref(), "stock_code")?;
        let quantity = fields::quantity(fields::required(row.quantity.as_deref(), "quantity")?)?;
        let unit_price =
            fields::unit_price(fields::required(row.unit_price.as_deref(), "unit_price")?)?;
        let invoice_date =
            fields::invoice_date(fields::required(row.invoice_date.as_deref(), "invoice_date")?)?;

        if self.drop_non_positive {
            if quantity <= 0 {
                return Err(RejectionReason::NonPositive {
                    field: "quantity",
                    value: quantity.to_string(),
                });
            }
            if unit_price <= rust_decimal::Decimal::ZERO {
                return Err(RejectionReason::NonPositive {
                    field: "unit_price",
                    value: unit_price.to_string(),
                });
            }
        }

        let record = Record {
            invoice_id: invoice_id.to_string(),
            stock_code: stock_code.to_string(),
            description: fields::present(row.description.as_deref())
                .unwrap_or_default()
                .to_string(),
            quantity,
            unit_price,
            invoice_date,
            customer_id: fields::customer_id(row.customer_id.as_deref()),
            country: fields::present(row.country.as_deref())
                .unwrap_or(UNSPECIFIED_COUNTRY)
                .to_string(),
        };

        // total_amount is persisted and summed downstream
        if record.checked_total_amount().is_none() {
            return Err(RejectionReason::AmountOverflow {
                quantity,
                unit_price: unit_price.to_string(),
            });
        }
        Ok(record)
    }

    /// Lazily clean `rows` in order. Call again to restart.
    pub fn clean<'a>(&'a self, rows: &'a [RawRow]) -> impl Iterator<Item = CleanOutcome> + 'a {
        rows.iter().enumerate().map(move |(index, row)| {
            self.clean_row(row).map_err(|reason| Rejection {
                row: index + 1,
                reason,
            })
        })
    }

    /// Clean every row, splitting records from rejections.
    pub fn clean_all(&self, rows: &[RawRow]) -> CleanedBatch {
        let mut batch = CleanedBatch::default();
        batch.report.rows_read = rows.len();

        for outcome in self.clean(rows) {
            match outcome {
                Ok(record) => batch.records.push(record),
                Err(rejection) => {
                    debug!(row = rejection.row, reason = %rejection.reason, "Row rejected");
                    *batch
                        .report
                        .rejections_by_field
                        .entry(rejection.reason.field())
                        .or_default() += 1;
                    batch.report.rejections.push(rejection);
                }
            }
        }
        batch.report.records = batch.records.len();

        info!(
            rows = batch.report.rows_read,
            records = batch.report.records,
            rejected = batch.report.rejected(),
            "Cleaning complete"
        );
        batch
    }

    /// Read CSV bytes and clean every row.
    pub fn clean_csv(&self, bytes: &[u8]) -> Result<CleanedBatch, CleanError> {
        let rows = read_rows(bytes)?;
        Ok(self.clean_all(&rows))
    }
}

/// Merge records sharing `(invoice_id, stock_code)`.
///
/// Quantities are summed; every other field keeps its first-seen value.
/// Output order is the order of first occurrence.
pub fn consolidate_duplicates(records: Vec<Record>) -> Vec<Record> {
    let mut positions: HashMap<RecordKey, usize> = HashMap::with_capacity(records.len());
    let mut merged: Vec<Record> = Vec::with_capacity(records.len());

    for record in records {
        match positions.get(&record.key()) {
            Some(&at) => {
                merged[at].quantity = merged[at].quantity.saturating_add(record.quantity);
            }
            None => {
                positions.insert(record.key(), merged.len());
                merged.push(record);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests;
