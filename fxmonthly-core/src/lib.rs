//! fxmonthly core — domain types, price providers, normalization, gap filling
//! and monthly aggregation.
//!
//! This crate holds every stage of the FX pipeline except orchestration and
//! file output:
//! - Symbol maps (provider ticker -> ISO code) and the wide price table
//! - Price providers (Yahoo chart API, flattened CSV import)
//! - Close-column normalization over the two history layouts
//! - Best-effort gap filling from fallback symbols
//! - Monthly mean resampling and the long (tidy) reshaping

pub mod aggregate;
pub mod data;
pub mod domain;

pub use aggregate::{month_start, monthly_mean};
