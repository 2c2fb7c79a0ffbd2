//! Gap filler: retry currencies missing from the primary fetch under their
//! fallback symbols.
//!
//! Best effort for fetching: a failed or empty fallback fetch leaves the gap
//! in place and is only logged. A fallback history without close data is a
//! shape error and is returned. Existing columns are never overwritten.

use super::normalize::{extract_close, NormalizeError};
use super::provider::{Interval, PriceProvider};
use crate::domain::{DailyPriceTable, SymbolMap};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// Outcome of a gap-filling pass, in requested-code order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapFillReport {
    /// Codes absent from the primary table.
    pub missing: Vec<String>,
    /// Codes added from the fallback source.
    pub filled: Vec<String>,
    /// Codes still absent afterwards.
    pub unfilled: Vec<String>,
}

impl GapFillReport {
    pub fn is_complete(&self) -> bool {
        self.unfilled.is_empty()
    }
}

/// Requested codes that have no column in `table`, in requested order.
pub fn missing_codes(table: &DailyPriceTable, requested: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|code| !table.has_column(code))
        .cloned()
        .collect()
}

/// Fill missing currency columns of `primary` from the fallback symbols.
///
/// Issues at most one fetch, and only when some requested code is missing
/// and has a fallback symbol.
///
/// # Errors
///
/// Returns `NormalizeError::DataShape` when the fallback history is
/// non-empty but holds no close series.
pub fn fill_gaps(
    primary: &mut DailyPriceTable,
    requested: &[String],
    fallback: &SymbolMap,
    provider: &dyn PriceProvider,
    start: NaiveDate,
    end: NaiveDate,
    interval: Interval,
) -> Result<GapFillReport, NormalizeError> {
    let missing = missing_codes(primary, requested);
    if missing.is_empty() {
        return Ok(GapFillReport::default());
    }

    let fallback_map = fallback.restrict_to_codes(&missing);
    if fallback_map.is_empty() {
        info!(missing = ?missing, "no fallback symbols for missing currencies");
        return Ok(GapFillReport {
            unfilled: missing.clone(),
            missing,
            filled: Vec::new(),
        });
    }

    info!(
        missing = ?missing,
        symbols = ?fallback_map.symbols(),
        "fetching fallback symbols"
    );

    let filled = match provider.fetch(&fallback_map.symbols(), start, end, interval) {
        Ok(history) if history.is_empty() => {
            warn!("fallback fetch returned no data");
            Vec::new()
        }
        Ok(history) => {
            debug!(symbols = ?history.symbols(), "fallback history");
            let fallback_table = extract_close(&history, &fallback_map)?;
            // Only currencies that were actually missing may come in.
            primary.merge_missing_columns(&fallback_table.select_columns(&missing))
        }
        Err(e) => {
            warn!(error = %e, "fallback fetch failed");
            Vec::new()
        }
    };

    let unfilled = missing_codes(primary, &missing);
    if !unfilled.is_empty() {
        info!(unfilled = ?unfilled, "currencies left without data");
    }

    Ok(GapFillReport {
        missing,
        filled,
        unfilled,
    })
}
