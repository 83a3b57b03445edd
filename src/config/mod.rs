//! Application configuration.
//!
//! Aggregates configuration for every stage into a single Config struct
//! that can be loaded from YAML files or environment variables. The struct
//! is passed by reference into each component at construction; there is
//! no process-wide instance.

mod connection;
mod stages;

pub use connection::{AwsConfig, SourceConfig, TableConfig, DEFAULT_REQUEST_TIMEOUT_MS};
pub use stages::{
    CleaningConfig, LoaderConfig, QueryConfig, ReportConfig, RetryConfig,
    DEFAULT_HISTOGRAM_BINS, DEFAULT_LOADER_CONCURRENCY, DEFAULT_QUERY_CONCURRENCY,
    DEFAULT_TOP_COUNTRIES,
};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "RETAIL_ETL_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "RETAIL_ETL";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "RETAIL_ETL_LOG";
/// Environment variable selecting the log output format (`json` or text).
pub const LOG_FORMAT_ENV_VAR: &str = "RETAIL_ETL_LOG_FORMAT";

use serde::Deserialize;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// AWS client configuration.
    pub aws: AwsConfig,
    /// Transaction table.
    pub table: TableConfig,
    /// Raw CSV location.
    pub source: SourceConfig,
    /// Batch loader tuning.
    pub loader: LoaderConfig,
    /// Query layer tuning.
    pub query: QueryConfig,
    /// Shared backoff policy.
    pub retry: RetryConfig,
    /// Cleaner policy.
    pub cleaning: CleaningConfig,
    /// Report output and parameters.
    pub report: ReportConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix, `__` separated
    ///    (e.g. `RETAIL_ETL__TABLE__NAME`)
    pub fn load(path: Option<&str>) -> Result<Self, ::config::ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}
