//! Run manifest: a JSON record of what one run asked for and where each
//! currency's data came from.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use fxmonthly_core::domain::MonthlyPriceTable;
use serde::{Deserialize, Serialize};

/// Current manifest schema version. Newer versions are rejected on load.
pub const SCHEMA_VERSION: u32 = 1;

/// Which source supplied a requested currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageSource {
    Primary,
    Fallback,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub generated_at: NaiveDateTime,
    pub provider: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub requested: Vec<String>,
    pub coverage: BTreeMap<String, CoverageSource>,
    /// Wide-table columns in output order.
    pub columns: Vec<String>,
    pub months: usize,
    pub reference: Option<String>,
    pub wide_file: String,
    pub long_file: String,
    pub dataset_hash: String,
}

impl RunManifest {
    /// Codes that ended up without any data.
    pub fn missing(&self) -> Vec<&str> {
        self.coverage
            .iter()
            .filter(|(_, s)| **s == CoverageSource::Missing)
            .map(|(c, _)| c.as_str())
            .collect()
    }
}

/// Read a manifest back, rejecting unknown schema versions.
pub fn load_manifest(path: &Path) -> Result<RunManifest> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let manifest: RunManifest =
        serde_json::from_str(&json).context("failed to deserialize run manifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

/// Deterministic BLAKE3 hash over the monthly table.
///
/// Covers column names in output order, then every cell by date. Empty cells
/// hash differently from any value.
pub fn compute_dataset_hash(monthly: &MonthlyPriceTable) -> String {
    let mut hasher = blake3::Hasher::new();

    for column in monthly.columns() {
        hasher.update(column.name.as_bytes());
        hasher.update(&[0]);
        for (date, value) in monthly.dates().iter().zip(&column.values) {
            hasher.update(date.to_string().as_bytes());
            match value {
                Some(v) => {
                    hasher.update(&[1]);
                    hasher.update(&v.to_le_bytes());
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
    }

    hasher.finalize().to_hex().to_string()
}
