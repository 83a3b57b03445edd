//! Shared CSV and record fixtures for integration tests.

#![allow(dead_code)]

use retail_etl::config::Config;
use retail_etl::Record;
use rust_decimal::Decimal;

pub const HEADER: &str =
    "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country";

/// A small export covering two countries, a guest checkout, a credit note
/// and a second month.
pub const RETAIL_SAMPLE: &str = "\
InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country
536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,12/1/2010 8:26,2.55,17850.0,United Kingdom
536365,71053,WHITE METAL LANTERN,6,12/1/2010 8:26,3.39,17850.0,United Kingdom
536366,22633,HAND WARMER UNION JACK,6,12/1/2010 8:28,1.85,17850.0,United Kingdom
536367,84879,ASSORTED COLOUR BIRD ORNAMENT,32,12/1/2010 8:34,1.69,13047.0,United Kingdom
536370,22728,ALARM CLOCK BAKELIKE PINK,24,12/1/2010 8:45,3.75,12583.0,France
536520,21123,SET/10 IVORY POLKADOT PARTY CANDLES,2,12/2/2010 12:43,1.25,,Unspecified
C536379,D,Discount,-1,12/1/2010 9:41,27.50,14527.0,United Kingdom
536530,22960,JAM MAKING SET WITH JARS,10,1/4/2011 10:00,0.85,12583.0,France
536531,22961,JAM MAKING SET PRINTED,4,12/3/2010 11:00,1.45,17850.0,United Kingdom
";

/// `n` valid UK rows with distinct keys, one invoice per minute.
pub fn uk_rows(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            format!(
                "5400{:02},2272{}A,LUNCH BAG RED RETROSPOT,{},12/5/2010 9:{:02},1.65,17850.0,United Kingdom",
                i,
                i,
                i + 1,
                i
            )
        })
        .collect()
}

pub fn csv(rows: &[String]) -> Vec<u8> {
    let mut text = String::from(HEADER);
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text.into_bytes()
}

/// Config with millisecond backoff so retry paths run fast.
pub fn fast_config() -> Config {
    let mut config = Config::for_test();
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 4;
    config.retry.jitter = false;
    config
}

pub fn record(invoice: &str, stock: &str, date: &str, country: &str, customer: Option<&str>) -> Record {
    Record {
        invoice_id: invoice.to_string(),
        stock_code: stock.to_string(),
        description: "PARTY BUNTING".to_string(),
        quantity: 4,
        unit_price: Decimal::new(495, 2),
        invoice_date: date.to_string(),
        customer_id: customer.map(str::to_string),
        country: country.to_string(),
    }
}
