//! Date-indexed wide price table.
//!
//! One row per calendar date, one named column per series. Missing
//! observations are `None`; rows are never dropped to represent a gap.
//! The same type carries daily closes and monthly means.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Structural errors when building or extending a table.
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("date index is not strictly ascending at position {position}")]
    UnsortedIndex { position: usize },

    #[error("column '{column}' has {actual} values, index has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("column '{0}' already exists")]
    DuplicateColumn(String),
}

/// A named series aligned to the table's date index.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    columns: Vec<PriceColumn>,
}

/// Daily closes, one column per ISO code.
pub type DailyPriceTable = PriceTable;

/// Monthly means, indexed by the first day of each month.
pub type MonthlyPriceTable = PriceTable;

impl PriceTable {
    /// Table with no rows and no columns.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Table with the given index and no columns.
    pub fn with_dates(dates: Vec<NaiveDate>) -> Result<Self, TableError> {
        if let Some(position) = dates.windows(2).position(|w| w[0] >= w[1]) {
            return Err(TableError::UnsortedIndex {
                position: position + 1,
            });
        }
        Ok(Self {
            dates,
            columns: Vec::new(),
        })
    }

    /// Build a table from per-series observations, aligned on the union of
    /// their dates. Series without an observation on a date get `None`.
    /// A repeated series name keeps the first occurrence.
    pub fn from_series<I, S>(series: I) -> Self
    where
        I: IntoIterator<Item = (S, BTreeMap<NaiveDate, Option<f64>>)>,
        S: Into<String>,
    {
        let series: Vec<(String, BTreeMap<NaiveDate, Option<f64>>)> =
            series.into_iter().map(|(n, s)| (n.into(), s)).collect();

        let all_dates: BTreeSet<NaiveDate> = series
            .iter()
            .flat_map(|(_, s)| s.keys().copied())
            .collect();
        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();

        let mut table = Self {
            dates,
            columns: Vec::with_capacity(series.len()),
        };
        for (name, obs) in series {
            if table.has_column(&name) {
                continue;
            }
            let values = table
                .dates
                .iter()
                .map(|d| obs.get(d).copied().flatten())
                .collect();
            table.columns.push(PriceColumn { name, values });
        }
        table
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[PriceColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&PriceColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Copy keeping only the named columns, in table order.
    pub fn select_columns(&self, names: &[String]) -> Self {
        Self {
            dates: self.dates.clone(),
            columns: self
                .columns
                .iter()
                .filter(|c| names.contains(&c.name))
                .cloned()
                .collect(),
        }
    }

    /// Value of `column` on `date`, `None` when either is absent or the cell is empty.
    pub fn value(&self, date: NaiveDate, column: &str) -> Option<f64> {
        let row = self.dates.binary_search(&date).ok()?;
        self.column(column)?.values[row]
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// True when the table has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }

    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<(), TableError> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(TableError::DuplicateColumn(name));
        }
        if values.len() != self.dates.len() {
            return Err(TableError::LengthMismatch {
                column: name,
                expected: self.dates.len(),
                actual: values.len(),
            });
        }
        self.columns.push(PriceColumn { name, values });
        Ok(())
    }

    /// Append a column holding `value` on every row.
    pub fn push_constant_column(
        &mut self,
        name: impl Into<String>,
        value: f64,
    ) -> Result<(), TableError> {
        let values = vec![Some(value); self.dates.len()];
        self.push_column(name, values)
    }

    /// Rename columns through `rename`. Returns the names that collided with
    /// an earlier column after renaming; those columns are dropped.
    pub fn rename_columns<F>(&mut self, mut rename: F) -> Vec<String>
    where
        F: FnMut(&str) -> String,
    {
        let mut kept: Vec<PriceColumn> = Vec::with_capacity(self.columns.len());
        let mut collisions = Vec::new();
        for mut column in self.columns.drain(..) {
            let renamed = rename(&column.name);
            if kept.iter().any(|c| c.name == renamed) {
                collisions.push(renamed);
                continue;
            }
            column.name = renamed;
            kept.push(column);
        }
        self.columns = kept;
        collisions
    }

    /// Move the named columns to the front in the given order; the rest keep
    /// their relative order. Unknown names are skipped.
    pub fn reorder_columns(&mut self, order: &[&str]) {
        let mut remaining: Vec<PriceColumn> = self.columns.drain(..).collect();
        let mut ordered = Vec::with_capacity(remaining.len());
        for name in order {
            if let Some(pos) = remaining.iter().position(|c| c.name == *name) {
                ordered.push(remaining.remove(pos));
            }
        }
        ordered.extend(remaining);
        self.columns = ordered;
    }

    /// Same columns over a new (ascending) index. Dates missing from the
    /// current index yield `None`.
    pub fn reindex(&self, dates: &[NaiveDate]) -> Self {
        let lookup: BTreeMap<NaiveDate, usize> = self
            .dates
            .iter()
            .enumerate()
            .map(|(i, d)| (*d, i))
            .collect();

        let columns = self
            .columns
            .iter()
            .map(|c| PriceColumn {
                name: c.name.clone(),
                values: dates
                    .iter()
                    .map(|d| lookup.get(d).and_then(|&i| c.values[i]))
                    .collect(),
            })
            .collect();

        Self {
            dates: dates.to_vec(),
            columns,
        }
    }

    /// Copy in the columns of `other` that this table lacks, aligned to this
    /// table's dates. Rows are never added or removed; dates only `other`
    /// has are dropped. A table without rows takes `other`'s index instead.
    /// Existing columns are never overwritten. Returns the names added.
    pub fn merge_missing_columns(&mut self, other: &PriceTable) -> Vec<String> {
        if other.columns.iter().all(|c| self.has_column(&c.name)) {
            return Vec::new();
        }

        if self.dates.is_empty() {
            *self = self.reindex(&other.dates);
        }
        let aligned = other.reindex(&self.dates);

        let mut added = Vec::new();
        for column in aligned.columns {
            if self.has_column(&column.name) {
                continue;
            }
            added.push(column.name.clone());
            self.columns.push(column);
        }
        added
    }
}
