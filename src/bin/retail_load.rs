//! retail-load: raw CSV -> cleaner -> batch loader -> DynamoDB
//!
//! Reads the raw export named by `source` config (local file or S3 object),
//! cleans it and writes the records into the transaction table. Ctrl+C stops
//! new batch writes; chunks already in flight finish.
//!
//! ## Usage
//! ```text
//! retail-load [CONFIG_FILE]
//! ```
//!
//! ## Configuration
//! - RETAIL_ETL_CONFIG: YAML config file
//! - RETAIL_ETL__TABLE__NAME, RETAIL_ETL__SOURCE__LOCAL_PATH, ...: overrides
//! - RETAIL_ETL_LOG: log filter (default "info")

use tracing::{error, info, warn};

use retail_etl::config::Config;
use retail_etl::pipeline::Pipeline;
use retail_etl::storage::init_store;
use retail_etl::utils::bootstrap::init_tracing;
use retail_etl::utils::cancel::cancellation;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(table = %config.table.name, "Starting retail-load");

    let store = init_store(&config).await?;

    let (handle, signal) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight batches");
            handle.cancel();
        }
    });

    let pipeline = Pipeline::new(&config, store).with_cancellation(signal);
    let summary = pipeline.run_load().await.map_err(|e| {
        error!(run_id = %pipeline.run_id(), "Load failed: {}", e);
        e
    })?;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.failed > 0 || summary.cancelled {
        std::process::exit(2);
    }
    Ok(())
}
