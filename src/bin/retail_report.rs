//! retail-report: DynamoDB -> paginated queries -> aggregates -> JSON
//!
//! Runs the configured country, customer and revenue queries plus a
//! table-wide scan, aggregates the results and writes one JSON file per
//! chart into `report.output_dir`. Ctrl+C stops further page requests and
//! writes a partial report.
//!
//! ## Usage
//! ```text
//! retail-report [CONFIG_FILE]
//! ```

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

    info!(table = %config.table.name, "Starting retail-report");

    let store = init_store(&config).await?;

    let (handle, signal) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, no further pages will be requested");
            handle.cancel();
        }
    });

    let pipeline = Pipeline::new(&config, store).with_cancellation(signal);
    let report = pipeline.report().await.map_err(|e| {
        error!(run_id = %pipeline.run_id(), "Report failed: {}", e);
        e
    })?;

    let written = pipeline
        .write_report(&report, &config.report.output_dir)
        .await?;
    for path in &written {
        info!(path = %path.display(), "Wrote");
    }

    if report.partial {
        warn!("Report is partial: a query was cancelled before completion");
    }
    Ok(())
}
