//! Where the data lives: AWS endpoint, table and raw source object.

use std::path::PathBuf;

use serde::Deserialize;

use crate::storage::schema::DEFAULT_TABLE_NAME;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// AWS client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// AWS region. Falls back to the SDK's default provider chain.
    pub region: Option<String>,
    /// Endpoint override (e.g. LocalStack: `http://localhost:4566`).
    pub endpoint_url: Option<String>,
    /// Per-attempt timeout. An expired attempt is a transient failure.
    pub request_timeout_ms: u64,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// Transaction table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub name: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TABLE_NAME.to_string(),
        }
    }
}

/// Raw CSV location.
///
/// `local_path` wins when set; otherwise the object `raw_key` is fetched
/// from `bucket`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub bucket: Option<String>,
    pub raw_key: Option<String>,
    pub local_path: Option<PathBuf>,
}
