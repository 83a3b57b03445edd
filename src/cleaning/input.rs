//! Raw CSV boundary: decoding, header normalisation, untyped rows.

use std::borrow::Cow;

use serde::Deserialize;

use super::CleanError;

/// One raw input row. Every field is optional text; typed extraction
/// happens in [`super::Cleaner::clean_row`].
///
/// Headers are normalised before matching (lower-cased, trimmed, spaces to
/// `_`), so `InvoiceNo`, `Invoice No` and `invoice_id` all land in
/// `invoice_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawRow {
    #[serde(alias = "invoiceno", alias = "invoice_no", alias = "invoice")]
    pub invoice_id: Option<String>,
    #[serde(alias = "stockcode")]
    pub stock_code: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<String>,
    #[serde(alias = "unitprice", alias = "price")]
    pub unit_price: Option<String>,
    #[serde(alias = "invoicedate")]
    pub invoice_date: Option<String>,
    #[serde(alias = "customerid", alias = "customer")]
    pub customer_id: Option<String>,
    pub country: Option<String>,
}

/// Decode raw bytes. Valid UTF-8 is used as is (minus a BOM); anything
/// else is read as ISO-8859-1, which maps every byte to a char.
pub fn decode(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text.strip_prefix('\u{feff}').unwrap_or(text)),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

pub fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Parse CSV bytes into raw rows, in input order.
///
/// Only structural CSV problems fail here. Bad values are left for the
/// cleaner to reject row by row.
pub fn read_rows(bytes: &[u8]) -> Result<Vec<RawRow>, CleanError> {
    let text = decode(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: csv::StringRecord = reader.headers()?.iter().map(normalize_header).collect();
    if !headers.iter().any(|h| h == "invoice_id" || h == "invoiceno" || h == "invoice_no") {
        return Err(CleanError::MissingColumn("invoice_id"));
    }

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        let row: RawRow = record
            .deserialize(Some(&headers))
            .map_err(|source| CleanError::Row {
                row: index + 1,
                source,
            })?;
        rows.push(row);
    }
    Ok(rows)
}
