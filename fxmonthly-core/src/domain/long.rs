//! Long (tidy) form of a price table: one record per (date, currency).

use super::table::PriceTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single monthly fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    pub date: NaiveDate,
    pub currency: String,
    pub rate: Option<f64>,
}

/// Flatten a wide table into records sorted by currency, then date.
///
/// Every cell becomes a record, empty cells included.
pub fn to_long(table: &PriceTable) -> Vec<LongRecord> {
    let mut columns: Vec<_> = table.columns().iter().collect();
    columns.sort_by(|a, b| a.name.cmp(&b.name));

    let mut records = Vec::with_capacity(table.len() * columns.len());
    for column in columns {
        for (date, rate) in table.dates().iter().zip(&column.values) {
            records.push(LongRecord {
                date: *date,
                currency: column.name.clone(),
                rate: *rate,
            });
        }
    }
    records
}

/// Pivot records back into a wide table. Columns come out in currency order.
pub fn pivot_long(records: &[LongRecord]) -> PriceTable {
    let mut series: BTreeMap<&str, BTreeMap<NaiveDate, Option<f64>>> = BTreeMap::new();
    for record in records {
        series
            .entry(record.currency.as_str())
            .or_default()
            .insert(record.date, record.rate);
    }

    // Empty cells are keys too, so an all-empty month keeps its row.
    PriceTable::from_series(series)
}
