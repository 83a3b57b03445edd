//! Analytics aggregator.
//!
//! Pure aggregations over ordered records. Every output is `Serialize` so
//! an external plotting tool can consume it as JSON; nothing here renders.
//! Money stays in [`Decimal`] throughout; sums saturate at its bounds.

mod geo;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::record::Record;

pub use geo::iso_alpha3;

/// Total sales for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub total: Decimal,
    pub lines: usize,
}

/// Daily totals in date order. Records with an unparseable date are skipped.
pub fn daily_sales(records: &[Record]) -> Vec<DailySales> {
    let mut by_day: BTreeMap<NaiveDate, (Decimal, usize)> = BTreeMap::new();
    for record in records {
        if let Some(day) = record.invoice_day() {
            let entry = by_day.entry(day).or_insert((Decimal::ZERO, 0));
            entry.0 = entry.0.saturating_add(record.total_amount());
            entry.1 += 1;
        }
    }
    by_day
        .into_iter()
        .map(|(date, (total, lines))| DailySales { date, total, lines })
        .collect()
}

/// One equal-width histogram bin. `lower` is inclusive; `upper` is
/// exclusive except for the last bin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramBin {
    pub lower: Decimal,
    pub upper: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
    pub samples: usize,
}

/// Distribution of line totals over `bins` equal-width bins spanning
/// `[min, max]`.
pub fn amount_histogram(records: &[Record], bins: usize) -> Histogram {
    let amounts: Vec<Decimal> = records.iter().map(Record::total_amount).collect();
    let (Some(&min), Some(&max)) = (amounts.iter().min(), amounts.iter().max()) else {
        return Histogram::default();
    };
    if bins == 0 {
        return Histogram::default();
    }

    if min == max {
        return Histogram {
            bins: vec![HistogramBin {
                lower: min,
                upper: max,
                count: amounts.len(),
            }],
            samples: amounts.len(),
        };
    }

    let width = max.saturating_sub(min) / Decimal::from(bins);
    let mut counts = vec![0usize; bins];
    for amount in &amounts {
        let index = amount
            .saturating_sub(min)
            .checked_div(width)
            .and_then(|position| position.floor().to_usize())
            .unwrap_or(0)
            .min(bins - 1);
        counts[index] += 1;
    }

    let edge = |n: usize| min.saturating_add(width.saturating_mul(Decimal::from(n)));
    let filled = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let lower = edge(i);
            let upper = if i + 1 == bins { max } else { edge(i + 1) };
            HistogramBin {
                lower,
                upper,
                count,
            }
        })
        .collect();

    Histogram {
        bins: filled,
        samples: amounts.len(),
    }
}

/// Per-country order statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryStats {
    pub country: String,
    pub orders: usize,
    pub total: Decimal,
    /// Mean line total, rounded to 2 places.
    pub mean: Decimal,
}

/// Top `top_n` countries by number of positive-amount lines.
///
/// Refunds and zero-value lines are excluded before counting. Ties are
/// broken by country name.
pub fn country_stats(records: &[Record], top_n: usize) -> Vec<CountryStats> {
    let mut by_country: HashMap<&str, (usize, Decimal)> = HashMap::new();
    for record in records {
        let amount = record.total_amount();
        if amount > Decimal::ZERO {
            let entry = by_country
                .entry(record.country.as_str())
                .or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 = entry.1.saturating_add(amount);
        }
    }

    let mut stats: Vec<CountryStats> = by_country
        .into_iter()
        .map(|(country, (orders, total))| CountryStats {
            country: country.to_string(),
            orders,
            total,
            mean: (total / Decimal::from(orders)).round_dp(2),
        })
        .collect();
    stats.sort_by(|a, b| b.orders.cmp(&a.orders).then_with(|| a.country.cmp(&b.country)));
    stats.truncate(top_n);
    stats
}

/// Sales for one country in one month, located for a map chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeoSales {
    pub country: String,
    pub iso_alpha3: &'static str,
    /// `YYYY-MM`.
    pub year_month: String,
    pub total_sales: Decimal,
    /// Distinct invoices.
    pub order_count: usize,
}

/// Monthly totals per mappable country, ordered by month then country.
/// Countries without an ISO code are dropped.
pub fn monthly_geo_sales(records: &[Record]) -> Vec<GeoSales> {
    type Group<'a> = (Decimal, BTreeSet<&'a str>);
    let mut groups: BTreeMap<(String, &str, &'static str), Group<'_>> = BTreeMap::new();

    for record in records {
        let (Some(code), Some(month)) = (iso_alpha3(&record.country), record.year_month()) else {
            continue;
        };
        let entry = groups
            .entry((month, record.country.as_str(), code))
            .or_insert_with(|| (Decimal::ZERO, BTreeSet::new()));
        entry.0 = entry.0.saturating_add(record.total_amount());
        entry.1.insert(record.invoice_id.as_str());
    }

    groups
        .into_iter()
        .map(|((year_month, country, code), (total_sales, invoices))| GeoSales {
            country: country.to_string(),
            iso_alpha3: code,
            year_month,
            total_sales,
            order_count: invoices.len(),
        })
        .collect()
}

/// Sum of line totals on `date`.
pub fn revenue_on(records: &[Record], date: NaiveDate) -> Decimal {
    records
        .iter()
        .filter(|r| r.invoice_day() == Some(date))
        .map(Record::total_amount)
        .fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Trend for one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryTrend {
    pub country: String,
    pub daily: Vec<DailySales>,
}

/// One customer's order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerSummary {
    pub customer_id: String,
    pub lines: usize,
    pub invoices: usize,
    pub total: Decimal,
    pub first_order: Option<String>,
    pub last_order: Option<String>,
}

/// Summarise one customer's lines (expected in date order).
pub fn customer_summary(customer_id: &str, records: &[Record]) -> CustomerSummary {
    let invoices: BTreeSet<&str> = records.iter().map(|r| r.invoice_id.as_str()).collect();
    CustomerSummary {
        customer_id: customer_id.to_string(),
        lines: records.len(),
        invoices: invoices.len(),
        total: records
            .iter()
            .map(Record::total_amount)
            .fold(Decimal::ZERO, Decimal::saturating_add),
        first_order: records.first().map(|r| r.invoice_date.clone()),
        last_order: records.last().map(|r| r.invoice_date.clone()),
    }
}

/// Revenue for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue: Decimal,
}

/// Everything the report stage hands to plotting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsReport {
    pub run_id: String,
    pub country_trend: Option<CountryTrend>,
    pub customer: Option<CustomerSummary>,
    pub revenue: Option<DailyRevenue>,
    pub histogram: Histogram,
    pub country_stats: Vec<CountryStats>,
    pub geo: Vec<GeoSales>,
    /// Records scanned for the table-wide sections.
    pub records_scanned: usize,
    /// Some query stopped early on cancellation.
    pub partial: bool,
}

#[cfg(test)]
mod tests;
