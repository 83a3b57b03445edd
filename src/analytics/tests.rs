use rust_decimal_macros::dec;

use super::*;

fn line(invoice: &str, date: &str, quantity: i64, price: Decimal, country: &str) -> Record {
    Record {
        invoice_id: invoice.to_string(),
        stock_code: format!("{}-{}", invoice, quantity),
        description: "JUMBO BAG RED RETROSPOT".to_string(),
        quantity,
        unit_price: price,
        invoice_date: date.to_string(),
        customer_id: Some("13047".to_string()),
        country: country.to_string(),
    }
}

fn sample() -> Vec<Record> {
    vec![
        line("536365", "2010-12-01T08:26:00", 6, dec!(2.55), "United Kingdom"),
        line("536365", "2010-12-01T08:26:00", 8, dec!(3.39), "United Kingdom"),
        line("536370", "2010-12-01T08:45:00", 24, dec!(3.75), "France"),
        line("C536379", "2010-12-01T09:41:00", -1, dec!(27.50), "United Kingdom"),
        line("536520", "2010-12-02T12:43:00", 2, dec!(1.25), "Unspecified"),
        line("536530", "2011-01-04T10:00:00", 10, dec!(0.85), "France"),
    ]
}

#[test]
fn test_daily_sales_groups_by_calendar_day() {
    let daily = daily_sales(&sample());

    assert_eq!(daily.len(), 3);
    assert_eq!(daily[0].date, NaiveDate::from_ymd_opt(2010, 12, 1).unwrap());
    // 15.30 + 27.12 + 90.00 - 27.50
    assert_eq!(daily[0].total, dec!(104.92));
    assert_eq!(daily[0].lines, 4);
    assert_eq!(daily[1].total, dec!(2.50));
    assert_eq!(daily[2].date, NaiveDate::from_ymd_opt(2011, 1, 4).unwrap());
}

#[test]
fn test_daily_sales_skips_bad_dates() {
    let mut records = sample();
    records[0].invoice_date = "not a date".to_string();

    let daily = daily_sales(&records);
    assert_eq!(daily[0].lines, 3);
}

#[test]
fn test_histogram_spans_min_to_max() {
    let records: Vec<Record> = [0, 2, 4, 6, 8, 10]
        .iter()
        .map(|&q| line("1", "2011-01-01T00:00:00", q, dec!(1), "France"))
        .collect();

    let histogram = amount_histogram(&records, 5);

    assert_eq!(histogram.samples, 6);
    assert_eq!(histogram.bins.len(), 5);
    assert_eq!(histogram.bins[0].lower, dec!(0));
    assert_eq!(histogram.bins[4].upper, dec!(10));
    let counts: Vec<usize> = histogram.bins.iter().map(|b| b.count).collect();
    // Max lands in the last bin rather than past it
    assert_eq!(counts, vec![1, 1, 1, 1, 2]);
    assert_eq!(counts.iter().sum::<usize>(), histogram.samples);
}

#[test]
fn test_histogram_includes_refunds() {
    let histogram = amount_histogram(&sample(), 30);
    assert_eq!(histogram.bins[0].lower, dec!(-27.50));
    assert_eq!(histogram.bins[0].count, 1);
    assert_eq!(histogram.bins.iter().map(|b| b.count).sum::<usize>(), 6);
}

#[test]
fn test_histogram_degenerate_inputs() {
    assert_eq!(amount_histogram(&[], 10), Histogram::default());
    assert_eq!(amount_histogram(&sample(), 0), Histogram::default());

    let same = vec![
        line("1", "2011-01-01T00:00:00", 2, dec!(1.5), "France"),
        line("2", "2011-01-01T00:00:00", 3, dec!(1), "France"),
    ];
    let histogram = amount_histogram(&same, 10);
    assert_eq!(histogram.bins.len(), 1);
    assert_eq!(histogram.bins[0].count, 2);
    assert_eq!(histogram.bins[0].lower, histogram.bins[0].upper);
}

#[test]
fn test_country_stats_counts_positive_lines_only() {
    let stats = country_stats(&sample(), 5);

    let uk = stats.iter().find(|s| s.country == "United Kingdom").unwrap();
    assert_eq!(uk.orders, 2);
    assert_eq!(uk.total, dec!(42.42));
    assert_eq!(uk.mean, dec!(21.21));

    let france = stats.iter().find(|s| s.country == "France").unwrap();
    assert_eq!(france.orders, 2);
    assert_eq!(france.total, dec!(98.50));
}

#[test]
fn test_country_stats_order_and_truncation() {
    let stats = country_stats(&sample(), 2);

    // UK and France tie on 2 lines; name breaks the tie
    let names: Vec<&str> = stats.iter().map(|s| s.country.as_str()).collect();
    assert_eq!(names, vec!["France", "United Kingdom"]);

    assert!(country_stats(&sample(), 0).is_empty());
}

#[test]
fn test_country_stats_mean_is_rounded() {
    let records = vec![
        line("1", "2011-01-01T00:00:00", 1, dec!(1), "Spain"),
        line("2", "2011-01-01T00:00:00", 1, dec!(1), "Spain"),
        line("3", "2011-01-01T00:00:00", 1, dec!(2), "Spain"),
    ];
    assert_eq!(country_stats(&records, 1)[0].mean, dec!(1.33));
}

#[test]
fn test_monthly_geo_sales() {
    let geo = monthly_geo_sales(&sample());

    // "Unspecified" has no map code
    assert!(geo.iter().all(|g| g.country != "Unspecified"));
    assert_eq!(geo.len(), 3);

    assert_eq!(geo[0].year_month, "2010-12");
    assert_eq!(geo[0].country, "France");
    assert_eq!(geo[0].iso_alpha3, "FRA");
    assert_eq!(geo[0].order_count, 1);

    let uk = &geo[1];
    assert_eq!(uk.iso_alpha3, "GBR");
    // Two lines of 536365 plus the credit note
    assert_eq!(uk.order_count, 2);
    assert_eq!(uk.total_sales, dec!(14.92));

    assert_eq!(geo[2].year_month, "2011-01");
    assert_eq!(geo[2].total_sales, dec!(8.50));
}

#[test]
fn test_revenue_on() {
    let records = sample();
    let day = |d| NaiveDate::from_ymd_opt(2010, 12, d).unwrap();

    assert_eq!(revenue_on(&records, day(1)), dec!(104.92));
    assert_eq!(revenue_on(&records, day(2)), dec!(2.50));
    assert_eq!(revenue_on(&records, day(3)), Decimal::ZERO);
}

#[test]
fn test_customer_summary() {
    let records = sample();
    let summary = customer_summary("13047", &records);

    assert_eq!(summary.lines, 6);
    assert_eq!(summary.invoices, 5);
    assert_eq!(summary.total, dec!(115.92));
    assert_eq!(summary.first_order.as_deref(), Some("2010-12-01T08:26:00"));
    assert_eq!(summary.last_order.as_deref(), Some("2011-01-04T10:00:00"));

    let empty = customer_summary("99999", &[]);
    assert_eq!(empty.lines, 0);
    assert_eq!(empty.total, Decimal::ZERO);
    assert!(empty.first_order.is_none());
}

#[test]
fn test_extreme_amounts_saturate() {
    let records = vec![
        line("1", "2011-01-01T00:00:00", i64::MAX, Decimal::MAX, "France"),
        line("2", "2011-01-01T00:00:00", i64::MIN, Decimal::MAX, "France"),
        line("3", "2011-01-01T00:00:00", i64::MAX, Decimal::MAX, "France"),
    ];

    let histogram = amount_histogram(&records, 4);
    assert_eq!(histogram.samples, 3);
    assert_eq!(histogram.bins.iter().map(|b| b.count).sum::<usize>(), 3);
    assert_eq!(histogram.bins[0].lower, Decimal::MIN);
    assert_eq!(histogram.bins[3].upper, Decimal::MAX);

    let day = NaiveDate::from_ymd_opt(2011, 1, 1).unwrap();
    assert_eq!(daily_sales(&records[..1])[0].total, Decimal::MAX);
    assert_eq!(revenue_on(&[records[0].clone(), records[2].clone()], day), Decimal::MAX);
    assert_eq!(country_stats(&records, 1)[0].total, Decimal::MAX);
    assert_eq!(customer_summary("13047", &records).total, Decimal::MAX);
}
