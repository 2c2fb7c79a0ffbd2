//! Price providers and the fetch-side pipeline stages.

pub mod csv_import;
pub mod gap_fill;
pub mod normalize;
pub mod provider;
pub mod yahoo;

pub use csv_import::CsvImportProvider;
pub use gap_fill::{fill_gaps, missing_codes, GapFillReport};
pub use normalize::{extract_close, rename_to_codes, NormalizeError};
pub use provider::{
    split_flat_label, FetchError, Interval, PriceField, PriceHistory, PriceProvider,
};
pub use yahoo::YahooProvider;
