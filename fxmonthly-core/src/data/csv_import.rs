//! CSV import provider for offline runs.
//!
//! Reads a flattened daily export: a leading date column followed by columns
//! labelled `Close_GHS=X` or `GHS=X Close`. Empty cells and `NaN` are missing
//! observations.

use super::provider::{
    check_range, split_flat_label, FetchError, Interval, PriceHistory, PriceProvider,
};
use crate::domain::PriceTable;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct CsvImportProvider {
    path: PathBuf,
}

impl CsvImportProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Parse the leading date cell. Accepts a bare date or a timestamp whose
/// first ten characters are the date.
fn parse_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    let date = cell.get(..10).unwrap_or(cell);
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn parse_value(cell: &str) -> Result<Option<f64>, String> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    cell.parse::<f64>()
        .map(Some)
        .map_err(|e| format!("invalid number '{cell}': {e}"))
}

/// Read the whole file into a flattened table, restricted to `[start, end)`
/// and to columns whose label splits into a requested symbol.
fn read_flattened(
    path: &Path,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceTable, FetchError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| FetchError::Import(format!("{}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| FetchError::Import(format!("{}: {e}", path.display())))?
        .clone();

    if headers.is_empty() {
        return Err(FetchError::Import(format!(
            "{}: missing header row",
            path.display()
        )));
    }

    // Column 0 is the date index.
    let keep: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, label)| {
            split_flat_label(label).is_some_and(|(_, symbol)| symbols.iter().any(|s| s == symbol))
        })
        .map(|(i, label)| (i, label.to_string()))
        .collect();

    let mut series: Vec<(String, BTreeMap<NaiveDate, Option<f64>>)> = keep
        .iter()
        .map(|(_, label)| (label.clone(), BTreeMap::new()))
        .collect();

    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| FetchError::Import(format!("{}: {e}", path.display())))?;
        let raw_date = record.get(0).unwrap_or("");
        let date = parse_date(raw_date).ok_or_else(|| {
            FetchError::Import(format!(
                "{}: row {}: invalid date '{raw_date}'",
                path.display(),
                line + 2
            ))
        })?;
        if date < start || date >= end {
            continue;
        }
        for ((idx, _), (_, obs)) in keep.iter().zip(series.iter_mut()) {
            let value = parse_value(record.get(*idx).unwrap_or("")).map_err(|e| {
                FetchError::Import(format!("{}: row {}: {e}", path.display(), line + 2))
            })?;
            obs.insert(date, value);
        }
    }

    Ok(PriceTable::from_series(series))
}

impl PriceProvider for CsvImportProvider {
    fn name(&self) -> &str {
        "csv_import"
    }

    fn fetch(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        _interval: Interval,
    ) -> Result<PriceHistory, FetchError> {
        if symbols.is_empty() {
            return Ok(PriceHistory::empty());
        }
        check_range(start, end)?;

        let table = read_flattened(&self.path, symbols, start, end)?;
        debug!(
            path = %self.path.display(),
            rows = table.len(),
            columns = table.width(),
            "imported flattened history"
        );
        Ok(PriceHistory::Flattened(table))
    }

    fn is_available(&self) -> bool {
        self.path.is_file()
    }
}
