//! Price provider trait, fetched-history shapes and structured error types.
//!
//! The PriceProvider trait abstracts over data sources (Yahoo Finance, CSV
//! import) so the pipeline can swap implementations and mock them in tests.

use crate::domain::PriceTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Structured error types for fetch operations.
///
/// These are designed to be displayable in CLI output.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("price provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("invalid date range: start {start} is not before end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("import failed: {0}")]
    Import(String),

    #[error("fetch error: {0}")]
    Other(String),
}

/// Sampling interval. Only daily bars are requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    #[default]
    Daily,
}

impl Interval {
    /// Query-string form used by the chart API.
    pub fn as_query(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
        }
    }
}

/// A per-bar price field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    AdjClose,
    Volume,
}

impl PriceField {
    /// Parse a field label as it appears in exported column headers.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "high" => Some(Self::High),
            "low" => Some(Self::Low),
            "close" => Some(Self::Close),
            "adj close" | "adjclose" => Some(Self::AdjClose),
            "volume" => Some(Self::Volume),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::High => "High",
            Self::Low => "Low",
            Self::Close => "Close",
            Self::AdjClose => "Adj Close",
            Self::Volume => "Volume",
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Split a flattened `field + symbol` column label.
///
/// `Close_GHS=X` splits on the first underscore into field and symbol;
/// otherwise `GHS=X Close` splits on the first space into symbol and field.
/// Labels matching neither rule, or naming an unknown field, yield `None`.
pub fn split_flat_label(label: &str) -> Option<(PriceField, &str)> {
    let (field, symbol) = if let Some((field, symbol)) = label.split_once('_') {
        (field, symbol)
    } else if let Some((symbol, field)) = label.split_once(' ') {
        (field, symbol)
    } else {
        return None;
    };
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return None;
    }
    PriceField::from_label(field).map(|f| (f, symbol))
}

/// Daily history returned by a provider.
///
/// The two variants are the two layouts a history can arrive in; consumers
/// match on them rather than guessing from column names.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceHistory {
    /// One table per field, columns named by provider symbol.
    Fielded(BTreeMap<PriceField, PriceTable>),
    /// A single table whose column labels combine field and symbol
    /// (see [`split_flat_label`]).
    Flattened(PriceTable),
}

impl PriceHistory {
    pub fn empty() -> Self {
        Self::Fielded(BTreeMap::new())
    }

    /// True when no field table holds any data.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Fielded(fields) => fields.values().all(PriceTable::is_empty),
            Self::Flattened(table) => table.is_empty(),
        }
    }

    /// Provider symbols present in the history.
    pub fn symbols(&self) -> BTreeSet<String> {
        match self {
            Self::Fielded(fields) => fields
                .values()
                .flat_map(|t| t.column_names())
                .map(str::to_string)
                .collect(),
            Self::Flattened(table) => table
                .column_names()
                .into_iter()
                .filter_map(split_flat_label)
                .map(|(_, symbol)| symbol.to_string())
                .collect(),
        }
    }
}

/// Trait for price providers (Yahoo Finance, CSV import, etc).
///
/// `fetch` returns only symbols it found; an unknown symbol is left out of
/// the history rather than failing the batch. An empty symbol list returns
/// an empty history without touching the source.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily history for `symbols` over `[start, end)`.
    fn fetch(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<PriceHistory, FetchError>;

    /// Check if the provider can serve requests at all.
    fn is_available(&self) -> bool;
}

/// Reject empty or inverted date ranges.
pub fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), FetchError> {
    if start >= end {
        return Err(FetchError::InvalidRange { start, end });
    }
    Ok(())
}

/// Deduplicate symbols, keeping first-seen order.
pub(crate) fn distinct_symbols(symbols: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    symbols
        .iter()
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect()
}
