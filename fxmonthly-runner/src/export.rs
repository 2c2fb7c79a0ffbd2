//! CSV export of monthly tables.
//!
//! - **wide**: one row per month, a `date` column then one column per currency
//! - **long**: one row per (month, currency), sorted by currency then date
//!
//! Empty cells are written as empty fields, never as `0` or `NaN`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fxmonthly_core::domain::{LongRecord, MonthlyPriceTable};

use crate::manifest::RunManifest;

/// Text form of a rate cell: plain decimal, never exponent notation, with a
/// `.0` suffix on whole numbers.
pub fn format_rate(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() && v.fract() == 0.0 => format!("{v:.1}"),
        Some(v) => format!("{v}"),
        None => String::new(),
    }
}

/// Header of the long table's rate column, e.g. `rate_units_per_usd`.
pub fn long_rate_header(reference_code: &str) -> String {
    format!("rate_units_per_{}", reference_code.to_lowercase())
}

/// Render the wide monthly table.
pub fn export_wide_csv(monthly: &MonthlyPriceTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["date"];
    header.extend(monthly.column_names());
    wtr.write_record(&header)?;

    for (row, date) in monthly.dates().iter().enumerate() {
        let mut record = Vec::with_capacity(monthly.width() + 1);
        record.push(date.to_string());
        record.extend(monthly.columns().iter().map(|c| format_rate(c.values[row])));
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Render the long monthly table.
pub fn export_long_csv(records: &[LongRecord], reference_code: &str) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "currency", &long_rate_header(reference_code)])?;
    for r in records {
        wtr.write_record([r.date.to_string(), r.currency.clone(), format_rate(r.rate)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Locations of the files one run writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub wide: PathBuf,
    pub long: PathBuf,
    pub manifest: PathBuf,
}

/// Write the wide, long and manifest files.
///
/// Everything is rendered before the first file is touched, so a render
/// failure leaves the output directory as it was.
pub fn write_outputs(
    paths: &OutputPaths,
    monthly: &MonthlyPriceTable,
    long: &[LongRecord],
    reference_code: &str,
    manifest: &RunManifest,
) -> Result<()> {
    let wide_csv = export_wide_csv(monthly)?;
    let long_csv = export_long_csv(long, reference_code)?;
    let manifest_json =
        serde_json::to_string_pretty(manifest).context("failed to serialize run manifest")?;

    for path in [&paths.wide, &paths.long, &paths.manifest] {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create output dir: {}", dir.display()))?;
        }
    }

    write_file(&paths.wide, &wide_csv)?;
    write_file(&paths.long, &long_csv)?;
    write_file(&paths.manifest, &manifest_json)?;
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}
