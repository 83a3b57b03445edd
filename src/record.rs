//! Canonical transaction line record.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Canonical `invoice_date` layout. Lexicographic order equals chronological
/// order, which the secondary indexes rely on for their range key.
pub const INVOICE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Primary key of a record: `(invoice_id HASH, stock_code RANGE)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub invoice_id: String,
    pub stock_code: String,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.invoice_id, self.stock_code)
    }
}

/// One transaction line item.
///
/// Produced by the cleaner, written once by the loader and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub invoice_id: String,
    pub stock_code: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    /// Canonical `YYYY-MM-DDTHH:MM:SS`.
    pub invoice_date: String,
    /// Guest checkouts carry no customer and are absent from `by-customer`.
    pub customer_id: Option<String>,
    pub country: String,
}

impl Record {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            invoice_id: self.invoice_id.clone(),
            stock_code: self.stock_code.clone(),
        }
    }

    /// Line total: `quantity * unit_price`, saturating at the `Decimal`
    /// bounds. The cleaner rejects rows whose total does not fit.
    pub fn total_amount(&self) -> Decimal {
        Decimal::from(self.quantity).saturating_mul(self.unit_price)
    }

    /// Line total, or `None` if it overflows `Decimal`.
    pub fn checked_total_amount(&self) -> Option<Decimal> {
        Decimal::from(self.quantity).checked_mul(self.unit_price)
    }

    pub fn invoice_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.invoice_date, INVOICE_DATE_FORMAT).ok()
    }

    pub fn invoice_day(&self) -> Option<NaiveDate> {
        self.invoice_datetime().map(|dt| dt.date())
    }

    /// `YYYY-MM` period of the invoice.
    pub fn year_month(&self) -> Option<String> {
        self.invoice_datetime()
            .map(|dt| dt.format("%Y-%m").to_string())
    }
}
