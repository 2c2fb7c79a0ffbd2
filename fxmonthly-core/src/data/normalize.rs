//! Column normalizer: fetched history -> daily close table keyed by ISO code.

use super::provider::{split_flat_label, PriceField, PriceHistory};
use crate::domain::{DailyPriceTable, PriceTable, SymbolMap};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("unrecognized data shape: {0}")]
    DataShape(String),
}

/// Extract closing prices and rename columns from provider symbol to ISO code.
///
/// Unmapped symbols keep their provider label. An empty history yields an
/// empty table; a non-empty history without any close series is a shape error.
pub fn extract_close(
    history: &PriceHistory,
    map: &SymbolMap,
) -> Result<DailyPriceTable, NormalizeError> {
    if history.is_empty() {
        return Ok(PriceTable::empty());
    }

    let mut close = match history {
        PriceHistory::Fielded(fields) => fields.get(&PriceField::Close).cloned().ok_or_else(|| {
            NormalizeError::DataShape(format!(
                "no Close field among {}",
                fields
                    .keys()
                    .map(PriceField::label)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?,
        PriceHistory::Flattened(table) => close_from_flattened(table)?,
    };

    rename_to_codes(&mut close, map);
    debug!(columns = ?close.column_names(), rows = close.len(), "normalized closes");
    Ok(close)
}

/// Rename symbol columns to ISO codes. Applying it twice changes nothing,
/// since codes are never keys of the map.
pub fn rename_to_codes(table: &mut PriceTable, map: &SymbolMap) {
    let collisions = table.rename_columns(|name| map.code_or_symbol(name).to_string());
    for code in collisions {
        warn!(%code, "several symbols map to the same code, keeping the first");
    }
}

/// Pick the Close columns of a flattened table and relabel them by symbol.
fn close_from_flattened(table: &PriceTable) -> Result<PriceTable, NormalizeError> {
    let mut out = PriceTable::with_dates(table.dates().to_vec())
        .map_err(|e| NormalizeError::DataShape(e.to_string()))?;

    for column in table.columns() {
        match split_flat_label(&column.name) {
            Some((PriceField::Close, symbol)) => {
                if out.has_column(symbol) {
                    warn!(label = %column.name, "duplicate close column ignored");
                    continue;
                }
                out.push_column(symbol, column.values.clone())
                    .map_err(|e| NormalizeError::DataShape(e.to_string()))?;
            }
            Some(_) => {}
            None => debug!(label = %column.name, "ignoring unrecognized column label"),
        }
    }

    if out.width() == 0 {
        return Err(NormalizeError::DataShape(format!(
            "no close columns among labels: {}",
            table.column_names().join(", ")
        )));
    }
    Ok(out)
}
