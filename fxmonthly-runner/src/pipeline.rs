//! End-to-end pipeline: fetch, normalize, fill gaps, add the reference
//! column, order columns, resample monthly, reshape long, write outputs.

use std::collections::BTreeMap;

use anyhow::Context;
use fxmonthly_core::data::{
    extract_close, fill_gaps, FetchError, GapFillReport, NormalizeError, PriceProvider,
};
use fxmonthly_core::domain::{
    to_long, DailyPriceTable, LongRecord, MonthlyPriceTable, PriceTable, TableError,
};
use fxmonthly_core::monthly_mean;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, PipelineConfig};
use crate::export::{write_outputs, OutputPaths};
use crate::manifest::{compute_dataset_hash, CoverageSource, RunManifest, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    DataShape(#[from] NormalizeError),
}

/// Everything one run produced, before anything is written.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub provider: String,
    pub requested: Vec<String>,
    pub daily: DailyPriceTable,
    pub monthly: MonthlyPriceTable,
    pub long: Vec<LongRecord>,
    pub coverage: BTreeMap<String, CoverageSource>,
    pub gap_fill: GapFillReport,
}

impl PipelineRun {
    pub fn manifest(&self, config: &PipelineConfig, paths: &OutputPaths) -> RunManifest {
        RunManifest {
            schema_version: SCHEMA_VERSION,
            generated_at: chrono::Local::now().naive_local(),
            provider: self.provider.clone(),
            start: config.start,
            end: config.end,
            requested: self.requested.clone(),
            coverage: self.coverage.clone(),
            columns: self
                .monthly
                .column_names()
                .into_iter()
                .map(String::from)
                .collect(),
            months: self.monthly.len(),
            reference: config.reference_column().map(String::from),
            wide_file: file_name(&paths.wide),
            long_file: file_name(&paths.long),
            dataset_hash: compute_dataset_hash(&self.monthly),
        }
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Run every stage up to (not including) file output.
pub fn build_monthly(
    provider: &dyn PriceProvider,
    config: &PipelineConfig,
) -> Result<PipelineRun, PipelineError> {
    config.validate()?;

    if !provider.is_available() {
        return Err(FetchError::ProviderUnavailable(format!(
            "provider '{}' is not available",
            provider.name()
        ))
        .into());
    }

    let requested = config.requested_codes();
    info!(
        provider = provider.name(),
        start = %config.start,
        end = %config.end,
        codes = ?requested,
        "fetching primary symbols"
    );

    let history = provider.fetch(
        &config.primary.symbols(),
        config.start,
        config.end,
        config.interval,
    )?;
    debug!(symbols = ?history.symbols(), "primary history");
    let mut daily = extract_close(&history, &config.primary)?;
    let from_primary: Vec<String> = requested
        .iter()
        .filter(|c| daily.has_column(c))
        .cloned()
        .collect();
    debug!(rows = daily.len(), columns = ?daily.column_names(), "primary close table");

    let gap_fill = fill_gaps(
        &mut daily,
        &requested,
        &config.fallback,
        provider,
        config.start,
        config.end,
        config.interval,
    )?;

    let coverage = coverage(&requested, &from_primary, &gap_fill);
    for (code, source) in &coverage {
        debug!(code = %code, source = ?source, "currency coverage");
    }
    if gap_fill.is_complete() {
        info!(currencies = requested.len(), "all requested currencies covered");
    } else {
        warn!(missing = ?gap_fill.unfilled, "no data for some currencies");
    }

    if let Some(reference) = config.reference_column() {
        add_reference_column(&mut daily, reference);
    }
    order_columns(&mut daily, &config.preferred_order, config.reference_column());

    let monthly = monthly_mean(&daily);
    let long = to_long(&monthly);
    info!(
        days = daily.len(),
        months = monthly.len(),
        columns = monthly.width(),
        "aggregated monthly means"
    );

    Ok(PipelineRun {
        provider: provider.name().to_string(),
        requested,
        daily,
        monthly,
        long,
        coverage,
        gap_fill,
    })
}

/// Build the tables, then write wide, long and manifest files.
///
/// Nothing is written when any stage before export fails.
pub fn run_pipeline(
    provider: &dyn PriceProvider,
    config: &PipelineConfig,
) -> anyhow::Result<(PipelineRun, OutputPaths)> {
    let run = build_monthly(provider, config)?;

    let paths = OutputPaths {
        wide: config.wide_path(),
        long: config.long_path(),
        manifest: config.manifest_path(),
    };
    let manifest = run.manifest(config, &paths);
    write_outputs(
        &paths,
        &run.monthly,
        &run.long,
        &config.reference_code,
        &manifest,
    )
    .context("failed to write pipeline outputs")?;

    info!(
        wide = %paths.wide.display(),
        long = %paths.long.display(),
        "outputs written"
    );
    Ok((run, paths))
}

fn coverage(
    requested: &[String],
    from_primary: &[String],
    gap_fill: &GapFillReport,
) -> BTreeMap<String, CoverageSource> {
    requested
        .iter()
        .map(|code| {
            let source = if from_primary.contains(code) {
                CoverageSource::Primary
            } else if gap_fill.filled.contains(code) {
                CoverageSource::Fallback
            } else {
                CoverageSource::Missing
            };
            (code.clone(), source)
        })
        .collect()
}

/// Append the constant 1.0 reference column. A fetched column of the same
/// name is kept as is.
pub fn add_reference_column(table: &mut PriceTable, reference: &str) {
    match table.push_constant_column(reference, 1.0) {
        Ok(()) => {}
        Err(TableError::DuplicateColumn(_)) => {
            warn!(column = reference, "reference column already present, keeping fetched data");
        }
        Err(e) => warn!(error = %e, "could not add reference column"),
    }
}

/// Preferred codes that are present, then the remaining columns in their
/// current order, then the reference column.
pub fn order_columns(table: &mut PriceTable, preferred: &[String], reference: Option<&str>) {
    let names: Vec<String> = table.column_names().into_iter().map(String::from).collect();
    let is_reference = |name: &str| reference == Some(name);

    let mut order: Vec<&str> = preferred
        .iter()
        .map(String::as_str)
        .filter(|p| !is_reference(*p) && names.iter().any(|n| n == *p))
        .collect();
    for name in &names {
        if !is_reference(name.as_str()) && !order.contains(&name.as_str()) {
            order.push(name);
        }
    }
    if let Some(reference) = reference.filter(|r| names.iter().any(|n| n == *r)) {
        order.push(reference);
    }
    table.reorder_columns(&order);
}
