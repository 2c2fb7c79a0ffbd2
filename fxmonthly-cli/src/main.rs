//! fxmonthly CLI — fetch daily FX closes and export monthly averages.
//!
//! Writes `<out>_wide.csv`, `<out>_long.csv` and `<out>_manifest.json` into
//! the output directory. Data comes from Yahoo Finance, or from a flattened
//! CSV export with `--input`.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use fxmonthly_core::data::{CsvImportProvider, PriceProvider, YahooProvider};
use fxmonthly_runner::{
    load_manifest, run_pipeline, CoverageSource, PipelineConfig, PipelineRun, RunManifest,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "fxmonthly",
    about = "fxmonthly — monthly average FX rates against USD"
)]
struct Cli {
    /// Start date (YYYY-MM-DD, inclusive). Defaults to 2020-01-01.
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYY-MM-DD, exclusive). Defaults to today.
    #[arg(long)]
    end: Option<String>,

    /// Output file prefix. Defaults to monthly_fx.
    #[arg(long)]
    out: Option<String>,

    /// Leave out the constant USD = 1.0 column.
    #[arg(long, default_value_t = false)]
    no_usd: bool,

    /// Directory for the output files. Defaults to the current directory.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// TOML config file; flags given on the command line override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read daily prices from a flattened CSV export instead of Yahoo.
    #[arg(long)]
    input: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = build_config(&cli)?;
    let provider: Box<dyn PriceProvider> = match &cli.input {
        Some(path) => Box::new(CsvImportProvider::new(path)),
        None => Box::new(YahooProvider::new()?),
    };

    let (run, paths) = run_pipeline(provider.as_ref(), &config)?;
    let manifest = load_manifest(&paths.manifest)?;

    print_summary(&run, &manifest);
    println!("Saved:");
    println!("  {}", paths.wide.display());
    println!("  {}", paths.long.display());
    println!("  {}", paths.manifest.display());

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_date(value: &str, flag: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid {flag} date '{value}', expected YYYY-MM-DD"))
}

/// Config file (or defaults), then command-line overrides.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(start) = &cli.start {
        config.start = parse_date(start, "--start")?;
    }
    if let Some(end) = &cli.end {
        config.end = parse_date(end, "--end")?;
    }
    if let Some(out) = &cli.out {
        config.out_prefix = out.clone();
    }
    if let Some(dir) = &cli.out_dir {
        config.output_dir = dir.clone();
    }
    if cli.no_usd {
        config.include_reference = false;
    }

    config.validate()?;
    Ok(config)
}

fn print_summary(run: &PipelineRun, manifest: &RunManifest) {
    println!();
    println!("=== Monthly FX ({}) ===", run.provider);
    println!("Days:     {}", run.daily.len());
    println!("Months:   {}", run.monthly.len());
    println!("Columns:  {}", run.monthly.column_names().join(", "));
    for code in &run.requested {
        let source = match run.coverage.get(code) {
            Some(CoverageSource::Primary) => "primary",
            Some(CoverageSource::Fallback) => "fallback",
            Some(CoverageSource::Missing) | None => "MISSING",
        };
        println!("  {code:<4} {source}");
    }
    let missing = manifest.missing();
    if !missing.is_empty() {
        println!("Missing:  {}", missing.join(", "));
    }
    println!("Hash:     {}", manifest.dataset_hash);
    println!();
}
