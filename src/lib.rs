//! Retail ETL
//!
//! Moves e-commerce transaction lines from raw CSV through a cleaning
//! stage into a DynamoDB table keyed by `(invoice_id, stock_code)`, then
//! reads them back through the `by-country` / `by-customer` secondary
//! indexes for analytics.

pub mod analytics;
#[cfg(any(feature = "dynamo", feature = "s3"))]
pub mod aws;
pub mod cleaning;
pub mod config;
pub mod loader;
pub mod pipeline;
pub mod query;
pub mod record;
pub mod source;
pub mod storage;
pub mod utils;

pub use record::{Record, RecordKey};
