//! Typed field extraction.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::RejectionReason;
use crate::record::INVOICE_DATE_FORMAT;

/// Accepted timestamp layouts, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Accepted date-only layouts (midnight).
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Trimmed, non-empty text.
pub(crate) fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) fn required<'a>(
    value: Option<&'a str>,
    field: &'static str,
) -> Result<&'a str, RejectionReason> {
    present(value).ok_or(RejectionReason::MissingField { field })
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Whole-number quantity. `"6.0"` is accepted, `"6.5"` is not.
pub(crate) fn quantity(raw: &str) -> Result<i64, RejectionReason> {
    let non_numeric = || RejectionReason::NonNumeric {
        field: "quantity",
        value: raw.to_string(),
    };
    if let Ok(q) = raw.parse::<i64>() {
        return Ok(q);
    }
    let value = parse_decimal(raw).ok_or_else(non_numeric)?;
    if !value.fract().is_zero() {
        return Err(non_numeric());
    }
    value.to_i64().ok_or_else(non_numeric)
}

pub(crate) fn unit_price(raw: &str) -> Result<Decimal, RejectionReason> {
    parse_decimal(raw)
        .map(|d| d.normalize())
        .ok_or_else(|| RejectionReason::NonNumeric {
            field: "unit_price",
            value: raw.to_string(),
        })
}

/// Parse any accepted layout into the canonical `YYYY-MM-DDTHH:MM:SS`.
pub(crate) fn invoice_date(raw: &str) -> Result<String, RejectionReason> {
    let parsed = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        });

    parsed
        .map(|dt| dt.format(INVOICE_DATE_FORMAT).to_string())
        .ok_or_else(|| RejectionReason::UnparseableDate {
            value: raw.to_string(),
        })
}

/// Customer ids arrive as floats from spreadsheet exports (`17850.0`).
/// Blank and `nan` mean a guest checkout.
pub(crate) fn customer_id(raw: Option<&str>) -> Option<String> {
    let raw = present(raw)?;
    if raw.eq_ignore_ascii_case("nan") {
        return None;
    }
    match raw.split_once('.') {
        Some((whole, fraction))
            if !whole.is_empty()
                && whole.chars().all(|c| c.is_ascii_digit())
                && fraction.chars().all(|c| c == '0') =>
        {
            Some(whole.to_string())
        }
        _ => Some(raw.to_string()),
    }
}
