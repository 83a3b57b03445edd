use rust_decimal_macros::dec;

use super::*;

const HEADER: &str = "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country";

fn csv_with_rows(rows: &[String]) -> Vec<u8> {
    let mut text = String::from(HEADER);
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text.into_bytes()
}

fn valid_row(i: usize) -> String {
    format!(
        "5363{:02},8512{}A,HEART T-LIGHT HOLDER,6,12/1/2010 8:26,2.55,17850.0,United Kingdom",
        i, i
    )
}

#[test]
fn test_one_malformed_quantity_among_thirty_rows() {
    let mut rows: Vec<String> = (0..30).map(valid_row).collect();
    rows[17] = "536317,85117A,HEART T-LIGHT HOLDER,abc,12/1/2010 8:26,2.55,17850,United Kingdom"
        .to_string();

    let batch = Cleaner::default().clean_csv(&csv_with_rows(&rows)).unwrap();

    assert_eq!(batch.records.len(), 29);
    assert_eq!(batch.report.rows_read, 30);
    assert_eq!(batch.report.rejected(), 1);
    let rejection = &batch.report.rejections[0];
    assert_eq!(rejection.row, 18);
    assert_eq!(rejection.reason.field(), "quantity");
    assert_eq!(batch.report.rejections_by_field.get("quantity"), Some(&1));

    // Rows around the bad one survive, in order
    assert_eq!(batch.records[16].invoice_id, "536316");
    assert_eq!(batch.records[17].invoice_id, "536318");
}

#[test]
fn test_clean_is_restartable() {
    let rows = read_rows(&csv_with_rows(&[
        valid_row(1),
        "536302,,x,1,12/1/2010 8:26,1.00,,France".to_string(),
        valid_row(3),
    ]))
    .unwrap();
    let cleaner = Cleaner::default();

    let first: Vec<CleanOutcome> = cleaner.clean(&rows).collect();
    let second: Vec<CleanOutcome> = cleaner.clean(&rows).collect();

    assert_eq!(first, second);
    assert!(first[0].is_ok());
    assert_eq!(
        first[1],
        Err(Rejection {
            row: 2,
            reason: RejectionReason::MissingField {
                field: "stock_code"
            }
        })
    );
}

#[test]
fn test_canonical_record_shape() {
    let batch = Cleaner::default()
        .clean_csv(&csv_with_rows(&[valid_row(5)]))
        .unwrap();
    let record = &batch.records[0];

    assert_eq!(record.invoice_id, "536305");
    assert_eq!(record.stock_code, "85125A");
    assert_eq!(record.quantity, 6);
    assert_eq!(record.unit_price, dec!(2.55));
    assert_eq!(record.invoice_date, "2010-12-01T08:26:00");
    assert_eq!(record.customer_id.as_deref(), Some("17850"));
    assert_eq!(record.country, "United Kingdom");
}

#[test]
fn test_snake_case_headers_and_guest_checkout() {
    let text = "invoice_id , stock code,quantity,unit_price,invoice_date,customer_id,country\n\
                580001,23084,2,4.15,2011-12-01T10:00:00,,Germany\n";
    let batch = Cleaner::default().clean_csv(text.as_bytes()).unwrap();

    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].customer_id, None);
    assert_eq!(batch.records[0].description, "");
}

#[test]
fn test_blank_country_becomes_unspecified() {
    let batch = Cleaner::default()
        .clean_csv(&csv_with_rows(&[
            "536400,22000,x,1,12/1/2010 9:00,1.00,12345,".to_string()
        ]))
        .unwrap();
    assert_eq!(batch.records[0].country, UNSPECIFIED_COUNTRY);
}

#[test]
fn test_latin1_input_is_decoded() {
    let mut bytes = csv_with_rows(&[]);
    bytes.extend_from_slice(b"\n536500,21000,CAF\xc9 MUG,1,12/1/2010 9:00,1.00,12345,France");

    let batch = Cleaner::default().clean_csv(&bytes).unwrap();
    assert_eq!(batch.records[0].description, "CAFÉ MUG");
}

#[test]
fn test_non_positive_rows() {
    let rows = read_rows(&csv_with_rows(&[
        "C536379,D,Discount,-1,12/1/2010 9:41,27.50,14527,United Kingdom".to_string(),
        "536380,22961,JAM,0,12/1/2010 9:41,1.45,14527,United Kingdom".to_string(),
        "536381,22962,JAR,1,12/1/2010 9:41,0,14527,United Kingdom".to_string(),
    ]))
    .unwrap();

    let strict = Cleaner::default().clean_all(&rows);
    assert!(strict.records.is_empty());
    assert_eq!(strict.report.rejections_by_field.get("quantity"), Some(&2));
    assert_eq!(strict.report.rejections_by_field.get("unit_price"), Some(&1));
    assert!(matches!(
        strict.report.rejections[0].reason,
        RejectionReason::NonPositive { .. }
    ));

    let lenient = Cleaner::new(&CleaningConfig {
        drop_non_positive: false,
    })
    .clean_all(&rows);
    assert_eq!(lenient.records.len(), 3);
}

#[test]
fn test_unparseable_date_and_price() {
    let rows = read_rows(&csv_with_rows(&[
        "536600,1,x,1,someday,1.00,1,France".to_string(),
        "536601,1,x,1,12/1/2010 9:00,cheap,1,France".to_string(),
    ]))
    .unwrap();
    let batch = Cleaner::default().clean_all(&rows);

    assert!(matches!(
        batch.report.rejections[0].reason,
        RejectionReason::UnparseableDate { .. }
    ));
    assert_eq!(batch.report.rejections[1].reason.field(), "unit_price");
}

#[test]
fn test_line_total_overflow_is_rejected() {
    let rows = read_rows(&csv_with_rows(&[
        "536700,1,x,9223372036854775807,12/1/2010 9:00,99999999999999999999,1,France".to_string(),
        valid_row(1),
    ]))
    .unwrap();
    let batch = Cleaner::default().clean_all(&rows);

    assert_eq!(batch.records.len(), 1);
    let rejection = &batch.report.rejections[0];
    assert_eq!(rejection.row, 1);
    assert_eq!(rejection.reason.field(), "quantity");
    assert!(matches!(
        rejection.reason,
        RejectionReason::AmountOverflow {
            quantity: i64::MAX,
            ..
        }
    ));
}

#[test]
fn test_missing_invoice_column_is_fatal() {
    let err = Cleaner::default()
        .clean_csv(b"stock_code,quantity\n1,2\n")
        .unwrap_err();
    assert!(matches!(err, CleanError::MissingColumn("invoice_id")));
}

#[test]
fn test_consolidate_duplicates_sums_quantity_in_first_seen_order() {
    let rows = read_rows(&csv_with_rows(&[
        "536700,A,first,2,12/1/2010 9:00,1.50,1,France".to_string(),
        "536700,B,other,1,12/1/2010 9:00,3.00,1,France".to_string(),
        "536700,A,second,3,12/1/2010 9:05,9.99,1,France".to_string(),
    ]))
    .unwrap();

    let batch = Cleaner::default().clean_all(&rows).consolidate();

    assert_eq!(batch.records.len(), 2);
    assert_eq!(batch.report.duplicates_merged, 1);
    assert_eq!(batch.report.records, 2);
    let merged = &batch.records[0];
    assert_eq!(merged.stock_code, "A");
    assert_eq!(merged.quantity, 5);
    assert_eq!(merged.description, "first");
    assert_eq!(merged.unit_price, dec!(1.50));
    assert_eq!(merged.total_amount(), dec!(7.50));
    assert_eq!(batch.records[1].stock_code, "B");
}
