//! Monthly resampling of daily price tables.
//!
//! Every calendar month between the first and last daily row gets a row,
//! labelled by its first day. A cell is the arithmetic mean of the non-empty
//! daily values in that month, or `None` when the month has none.

use crate::domain::{DailyPriceTable, MonthlyPriceTable, PriceTable};
use chrono::{Datelike, Months, NaiveDate};
use std::collections::BTreeMap;

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Month-start labels from the month of `first` through the month of `last`.
fn month_range(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut current = month_start(first);
    let last = month_start(last);
    while current <= last {
        months.push(current);
        match current.checked_add_months(Months::new(1)) {
            Some(next) => current = next,
            None => break,
        }
    }
    months
}

/// Offset of `date`'s month from `base` (both month starts).
fn month_offset(base: NaiveDate, date: NaiveDate) -> usize {
    let months = (date.year() - base.year()) * 12 + date.month() as i32 - base.month() as i32;
    months as usize
}

/// Running mean accumulator.
#[derive(Debug, Default, Clone, Copy)]
struct MeanAcc {
    sum: f64,
    count: u32,
}

impl MeanAcc {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Resample a daily table to monthly means.
///
/// Columns keep their order. A table without rows gives a monthly table
/// without rows but with the same columns.
pub fn monthly_mean(daily: &DailyPriceTable) -> MonthlyPriceTable {
    let (Some(&first), Some(&last)) = (daily.dates().first(), daily.dates().last()) else {
        return daily.clone();
    };

    let months = month_range(first, last);
    let base = months[0];
    let row_month: Vec<usize> = daily
        .dates()
        .iter()
        .map(|d| month_offset(base, month_start(*d)))
        .collect();

    // Every month is a key of every series, so empty months keep their row.
    let series = daily.columns().iter().map(|column| {
        let mut accs = vec![MeanAcc::default(); months.len()];
        for (month, value) in row_month.iter().zip(&column.values) {
            if let Some(v) = value {
                accs[*month].push(*v);
            }
        }
        let means: BTreeMap<NaiveDate, Option<f64>> = months
            .iter()
            .zip(&accs)
            .map(|(m, acc)| (*m, acc.mean()))
            .collect();
        (column.name.clone(), means)
    });
    PriceTable::from_series(series)
}
