//! fxmonthly runner — pipeline orchestration and file output.
//!
//! This crate builds on `fxmonthly-core` to provide:
//! - TOML-backed pipeline configuration with built-in defaults
//! - The end-to-end run (fetch, gap fill, ordering, monthly means)
//! - Wide and long CSV export
//! - A JSON run manifest with per-currency coverage and a dataset hash

pub mod config;
pub mod export;
pub mod manifest;
pub mod pipeline;

pub use config::{ConfigError, PipelineConfig, DEFAULT_OUT_PREFIX};
pub use export::{export_long_csv, export_wide_csv, format_rate, write_outputs, OutputPaths};
pub use manifest::{
    compute_dataset_hash, load_manifest, CoverageSource, RunManifest, SCHEMA_VERSION,
};
pub use pipeline::{build_monthly, run_pipeline, PipelineError, PipelineRun};
