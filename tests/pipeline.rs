//! End-to-end pipeline scenarios against the in-memory store.
//!
//! Run with: cargo test --test pipeline --features test-utils

mod fixtures;

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use fixtures::{csv, fast_config, uk_rows, RETAIL_SAMPLE};
use retail_etl::pipeline::{Pipeline, PipelineError};
use retail_etl::storage::MockTransactionStore;
use retail_etl::utils::cancel::cancellation;
use retail_etl::RecordKey;

#[tokio::test]
async fn test_thirty_rows_one_malformed() {
    let mut rows = uk_rows(30);
    rows[17] = "540017,227217A,LUNCH BAG RED RETROSPOT,abc,12/5/2010 9:17,1.65,17850.0,United Kingdom"
        .to_string();
    let store = Arc::new(MockTransactionStore::new());

    let summary = Pipeline::new(&fast_config(), store.clone())
        .load(&csv(&rows))
        .await
        .unwrap();

    assert_eq!(summary.rows, 30);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.cleaned, 29);
    assert_eq!(summary.written, 29);
    assert_eq!(summary.failed, 0);
    assert_eq!(store.len().await, 29);
    assert!(store
        .get(&RecordKey {
            invoice_id: "540017".into(),
            stock_code: "227217A".into(),
        })
        .await
        .is_none());
}

#[tokio::test]
async fn test_unprocessed_items_in_second_chunk_are_retried() {
    let store = Arc::new(MockTransactionStore::new());
    store.leave_unprocessed_on_call(2, 2).await;

    let summary = Pipeline::new(&fast_config(), store.clone())
        .load(&csv(&uk_rows(30)))
        .await
        .unwrap();

    assert_eq!(summary.written, 30);
    assert_eq!(summary.failed, 0);
    assert_eq!(store.batch_write_calls(), 3);
    let mut sizes = store.batch_sizes().await;
    sizes.sort_unstable();
    assert_eq!(sizes, vec![2, 5, 25]);
    assert_eq!(store.len().await, 30);
}

#[tokio::test]
async fn test_reload_is_idempotent() {
    let store = Arc::new(MockTransactionStore::new());
    let pipeline = Pipeline::new(&fast_config(), store.clone());
    let bytes = RETAIL_SAMPLE.as_bytes();

    let first = pipeline.load(bytes).await.unwrap();
    let snapshot = store.records().await;
    let second = pipeline.load(bytes).await.unwrap();

    assert_eq!(first.written, second.written);
    assert_eq!(store.records().await, snapshot);
}

#[tokio::test]
async fn test_partial_write_failure_is_reported_not_raised() {
    let store = Arc::new(MockTransactionStore::new());
    let stuck = RecordKey {
        invoice_id: "540003".into(),
        stock_code: "22723A".into(),
    };
    store.stuck_keys([stuck.clone()]).await;

    let summary = Pipeline::new(&fast_config(), store.clone())
        .load(&csv(&uk_rows(30)))
        .await
        .unwrap();

    assert_eq!(summary.written, 29);
    assert_eq!(summary.failed, 1);
    let failed: Vec<&RecordKey> = summary.load.failed_keys().collect();
    assert_eq!(failed, vec![&stuck]);
}

#[tokio::test]
async fn test_missing_table_aborts_load() {
    let store = Arc::new(MockTransactionStore::new());
    store.set_table_missing(true).await;

    let err = Pipeline::new(&fast_config(), store.clone())
        .load(RETAIL_SAMPLE.as_bytes())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Load(_)));
    assert_eq!(store.batch_write_calls(), 1);
}

#[tokio::test]
async fn test_cancelled_load_reports_partial_progress() {
    let mut config = fast_config();
    config.loader.batch_size = 5;
    config.loader.concurrency = 1;
    let store = Arc::new(MockTransactionStore::new());
    let (handle, signal) = cancellation();
    store
        .on_batch_write(move |call| {
            if call == 2 {
                handle.cancel();
            }
        })
        .await;

    let summary = Pipeline::new(&config, store.clone())
        .with_cancellation(signal)
        .load(&csv(&uk_rows(30)))
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.written, 10);
    assert_eq!(summary.failed, 0);
    assert_eq!(store.len().await, 10);
}

#[tokio::test]
async fn test_load_then_report() {
    let mut config = fast_config();
    config.query.page_size = Some(3);
    config.report.country = Some("United Kingdom".to_string());
    config.report.customer_id = Some("17850".to_string());
    config.report.revenue_date = Some("2010-12-01".to_string());
    let store = Arc::new(MockTransactionStore::new());
    let pipeline = Pipeline::new(&config, store.clone());

    let summary = pipeline.load(RETAIL_SAMPLE.as_bytes()).await.unwrap();
    assert_eq!(summary.rows, 9);
    // Credit note C536379 has a negative quantity
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.written, 8);

    let report = pipeline.report().await.unwrap();
    assert_eq!(report.run_id, pipeline.run_id());
    assert!(!report.partial);
    assert_eq!(report.records_scanned, 8);

    let trend = report.country_trend.as_ref().unwrap();
    assert_eq!(trend.daily.len(), 2);
    assert_eq!(trend.daily[0].date, NaiveDate::from_ymd_opt(2010, 12, 1).unwrap());
    assert_eq!(trend.daily[0].total, dec!(100.82));
    assert_eq!(trend.daily[0].lines, 4);
    assert_eq!(trend.daily[1].total, dec!(5.80));

    let customer = report.customer.as_ref().unwrap();
    assert_eq!(customer.lines, 4);
    assert_eq!(customer.invoices, 3);
    assert_eq!(customer.total, dec!(52.54));
    assert_eq!(customer.first_order.as_deref(), Some("2010-12-01T08:26:00"));
    assert_eq!(customer.last_order.as_deref(), Some("2010-12-03T11:00:00"));

    let revenue = report.revenue.as_ref().unwrap();
    assert_eq!(revenue.revenue, dec!(190.82));

    let countries: Vec<(&str, usize)> = report
        .country_stats
        .iter()
        .map(|s| (s.country.as_str(), s.orders))
        .collect();
    assert_eq!(
        countries,
        vec![("United Kingdom", 5), ("France", 2), ("Unspecified", 1)]
    );

    // Unspecified has no map code
    assert_eq!(report.geo.len(), 3);
    assert_eq!(report.histogram.samples, 8);
}

#[tokio::test]
async fn test_blank_report_customer_is_a_configuration_error() {
    let mut config = fast_config();
    config.report.customer_id = Some("".to_string());
    let store = Arc::new(MockTransactionStore::new());
    let pipeline = Pipeline::new(&config, store.clone());
    pipeline.load(RETAIL_SAMPLE.as_bytes()).await.unwrap();

    let err = pipeline.report().await.unwrap_err();
    assert!(matches!(err, PipelineError::Query(_)));
}

#[tokio::test]
async fn test_invalid_revenue_date() {
    let mut config = fast_config();
    config.report.revenue_date = Some("01/12/2010".to_string());
    let store = Arc::new(MockTransactionStore::new());

    let err = Pipeline::new(&config, store).report().await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidDate(ref d) if d == "01/12/2010"));
}

#[tokio::test]
async fn test_write_report_files() {
    let mut config = fast_config();
    config.report.country = Some("France".to_string());
    let store = Arc::new(MockTransactionStore::new());
    let pipeline = Pipeline::new(&config, store);
    pipeline.load(RETAIL_SAMPLE.as_bytes()).await.unwrap();
    let report = pipeline.report().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("charts");
    let written = pipeline.write_report(&report, &out).await.unwrap();

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(names.contains(&"report.json".to_string()));
    assert!(names.contains(&"country_trend.json".to_string()));
    assert!(!names.contains(&"customer.json".to_string()));

    let body = std::fs::read(out.join("report.json")).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["run_id"], pipeline.run_id());
    assert_eq!(json["records_scanned"], 8);
    assert_eq!(json["country_trend"]["country"], "France");
}

#[tokio::test]
async fn test_run_load_reads_local_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("online_retail.csv");
    std::fs::write(&path, RETAIL_SAMPLE).unwrap();

    let mut config = fast_config();
    config.source.local_path = Some(path);
    let store = Arc::new(MockTransactionStore::new());

    let summary = Pipeline::new(&config, store.clone()).run_load().await.unwrap();
    assert_eq!(summary.written, 8);
    assert_eq!(store.len().await, 8);
}
