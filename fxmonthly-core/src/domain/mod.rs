//! Domain types: symbol maps, wide price tables and long records.

pub mod long;
pub mod symbol_map;
pub mod table;

pub use long::{pivot_long, to_long, LongRecord};
pub use symbol_map::{SymbolEntry, SymbolMap, DEFAULT_CODES, REFERENCE_CODE};
pub use table::{DailyPriceTable, MonthlyPriceTable, PriceColumn, PriceTable, TableError};
