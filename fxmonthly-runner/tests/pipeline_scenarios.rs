//! End-to-end pipeline scenarios against an in-memory provider.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use fxmonthly_core::data::{FetchError, Interval, PriceField, PriceHistory, PriceProvider};
use fxmonthly_core::domain::{pivot_long, PriceTable, SymbolMap};
use fxmonthly_runner::{
    build_monthly, load_manifest, run_pipeline, CoverageSource, PipelineConfig, PipelineError,
};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

type Series = BTreeMap<NaiveDate, Option<f64>>;

/// Serves close series by symbol and records every request.
struct MockProvider {
    series: BTreeMap<String, Series>,
    available: bool,
    /// Serve only an Open field, which has no close data, for requests
    /// containing one of these symbols.
    open_only: Vec<String>,
    /// Fail any request containing one of these symbols.
    failing: Vec<String>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockProvider {
    fn new() -> Self {
        Self {
            series: BTreeMap::new(),
            available: true,
            open_only: Vec::new(),
            failing: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with(mut self, symbol: &str, obs: &[(&str, Option<f64>)]) -> Self {
        let series = obs.iter().map(|(date, v)| (d(date), *v)).collect();
        self.series.insert(symbol.to_string(), series);
        self
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl PriceProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(
        &self,
        symbols: &[String],
        _start: NaiveDate,
        _end: NaiveDate,
        _interval: Interval,
    ) -> Result<PriceHistory, FetchError> {
        self.calls.lock().unwrap().push(symbols.to_vec());
        if symbols.iter().any(|s| self.failing.contains(s)) {
            return Err(FetchError::NetworkUnreachable("mock outage".into()));
        }

        let table = PriceTable::from_series(
            symbols
                .iter()
                .filter_map(|s| self.series.get(s).map(|obs| (s.clone(), obs.clone()))),
        );
        let field = if symbols.iter().any(|s| self.open_only.contains(s)) {
            PriceField::Open
        } else {
            PriceField::Close
        };
        let mut fields = BTreeMap::new();
        fields.insert(field, table);
        Ok(PriceHistory::Fielded(fields))
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

fn config(codes: &[&str]) -> PipelineConfig {
    let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
    PipelineConfig {
        start: d("2024-01-01"),
        end: d("2024-03-01"),
        primary: SymbolMap::default_primary().restrict_to_codes(&codes),
        fallback: SymbolMap::default_fallback().restrict_to_codes(&codes),
        ..PipelineConfig::default()
    }
}

#[test]
fn fallback_fills_only_the_missing_currency() {
    let provider = MockProvider::new()
        .with("GHS=X", &[("2024-01-02", Some(12.0)), ("2024-01-03", Some(12.5))])
        .with("NGN=X", &[("2024-01-02", Some(900.0)), ("2024-01-03", Some(910.0))])
        .with("USDKES=X", &[("2024-01-02", Some(158.0)), ("2024-01-04", Some(160.0))])
        .with("USDGHS=X", &[("2024-01-02", Some(99.0))]);

    let run = build_monthly(&provider, &config(&["GHS", "KES", "NGN"])).unwrap();

    assert_eq!(
        run.monthly.column_names(),
        vec!["GHS", "KES", "NGN", "USD"]
    );
    assert_eq!(run.monthly.value(d("2024-01-01"), "GHS"), Some(12.25));
    assert_eq!(run.monthly.value(d("2024-01-01"), "KES"), Some(158.0));
    assert_eq!(run.monthly.value(d("2024-01-01"), "USD"), Some(1.0));

    let calls = provider.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1], vec!["USDKES=X".to_string()]);

    assert_eq!(run.coverage["GHS"], CoverageSource::Primary);
    assert_eq!(run.coverage["KES"], CoverageSource::Fallback);
    assert_eq!(run.coverage["NGN"], CoverageSource::Primary);
}

#[test]
fn fallback_dates_outside_primary_index_are_dropped() {
    let provider = MockProvider::new()
        .with("GHS=X", &[("2024-01-02", Some(12.0)), ("2024-01-03", Some(12.5))])
        .with(
            "USDKES=X",
            &[
                ("2024-01-02", Some(158.0)),
                ("2024-01-04", Some(160.0)),
                ("2024-02-05", Some(170.0)),
            ],
        );

    let run = build_monthly(&provider, &config(&["GHS", "KES"])).unwrap();

    assert_eq!(run.daily.dates(), &[d("2024-01-02"), d("2024-01-03")]);
    assert_eq!(
        run.daily.column("GHS").unwrap().values,
        vec![Some(12.0), Some(12.5)]
    );
    assert_eq!(run.monthly.dates(), &[d("2024-01-01")]);
    assert_eq!(run.monthly.value(d("2024-01-01"), "KES"), Some(158.0));
}

#[test]
fn fallback_fills_empty_primary_on_its_own_dates() {
    let provider = MockProvider::new().with(
        "USDKES=X",
        &[("2024-01-02", Some(158.0)), ("2024-02-05", Some(170.0))],
    );

    let run = build_monthly(&provider, &config(&["KES"])).unwrap();
    assert_eq!(run.daily.len(), 2);
    assert_eq!(run.monthly.value(d("2024-02-01"), "KES"), Some(170.0));
    assert_eq!(run.coverage["KES"], CoverageSource::Fallback);
}

#[test]
fn january_mean_skips_missing_day() {
    let provider = MockProvider::new().with(
        "GHS=X",
        &[
            ("2024-01-02", Some(10.0)),
            ("2024-01-03", None),
            ("2024-01-04", Some(12.0)),
        ],
    );

    let run = build_monthly(&provider, &config(&["GHS"])).unwrap();
    assert_eq!(run.monthly.dates(), &[d("2024-01-01")]);
    assert_eq!(run.monthly.value(d("2024-01-01"), "GHS"), Some(11.0));
}

#[test]
fn currency_missing_everywhere_is_absent() {
    let provider = MockProvider::new().with("GHS=X", &[("2024-01-02", Some(12.0))]);

    let run = build_monthly(&provider, &config(&["GHS", "ZMW"])).unwrap();
    assert!(!run.monthly.has_column("ZMW"));
    assert!(run.long.iter().all(|r| r.currency != "ZMW"));
    assert_eq!(run.coverage["ZMW"], CoverageSource::Missing);
    assert_eq!(run.gap_fill.unfilled, vec!["ZMW"]);
}

#[test]
fn failed_fallback_is_not_fatal() {
    let mut provider = MockProvider::new().with("GHS=X", &[("2024-01-02", Some(12.0))]);
    provider.failing = vec!["USDKES=X".into()];

    let run = build_monthly(&provider, &config(&["GHS", "KES"])).unwrap();
    assert_eq!(run.monthly.column_names(), vec!["GHS", "USD"]);
    assert_eq!(run.coverage["KES"], CoverageSource::Missing);
}

#[test]
fn failed_primary_fetch_is_fatal() {
    let mut provider = MockProvider::new();
    provider.failing = vec!["GHS=X".into()];

    let err = build_monthly(&provider, &config(&["GHS"])).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Fetch(FetchError::NetworkUnreachable(_))
    ));
}

#[test]
fn unavailable_provider_fails_before_fetching() {
    let mut provider = MockProvider::new();
    provider.available = false;

    let err = build_monthly(&provider, &config(&["GHS"])).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Fetch(FetchError::ProviderUnavailable(_))
    ));
    assert!(provider.calls().is_empty());
}

#[test]
fn shape_error_writes_nothing() {
    let mut provider = MockProvider::new().with("GHS=X", &[("2024-01-02", Some(12.0))]);
    provider.open_only = vec!["GHS=X".into()];

    let dir = tempfile::tempdir().unwrap();
    let cfg = PipelineConfig {
        output_dir: dir.path().join("out"),
        ..config(&["GHS"])
    };

    let err = run_pipeline(&provider, &cfg).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::DataShape(_))
    ));
    assert!(!cfg.output_dir.exists());
}

#[test]
fn fallback_shape_error_is_fatal_and_writes_nothing() {
    let mut provider = MockProvider::new()
        .with("GHS=X", &[("2024-01-02", Some(12.0))])
        .with("USDKES=X", &[("2024-01-02", Some(158.0))]);
    provider.open_only = vec!["USDKES=X".into()];

    let dir = tempfile::tempdir().unwrap();
    let cfg = PipelineConfig {
        output_dir: dir.path().join("out"),
        ..config(&["GHS", "KES"])
    };

    let err = run_pipeline(&provider, &cfg).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::DataShape(_))
    ));
    assert_eq!(provider.calls().len(), 2);
    assert!(!cfg.output_dir.exists());
}

#[test]
fn no_reference_column_when_disabled() {
    let provider = MockProvider::new().with("KES=X", &[("2024-02-05", Some(150.0))]);
    let cfg = PipelineConfig {
        include_reference: false,
        ..config(&["KES"])
    };

    let run = build_monthly(&provider, &cfg).unwrap();
    assert_eq!(run.monthly.column_names(), vec!["KES"]);
    assert_eq!(run.long.len(), 1);
}

#[test]
fn empty_fetches_give_empty_outputs() {
    let provider = MockProvider::new();
    let dir = tempfile::tempdir().unwrap();
    let cfg = PipelineConfig {
        output_dir: dir.path().to_path_buf(),
        ..config(&["GHS", "KES"])
    };

    let (run, paths) = run_pipeline(&provider, &cfg).unwrap();
    assert!(run.long.is_empty());
    assert_eq!(run.monthly.len(), 0);

    let long = std::fs::read_to_string(&paths.long).unwrap();
    assert_eq!(long.trim_end(), "date,currency,rate_units_per_usd");
}

#[test]
fn outputs_and_manifest_are_written() {
    let provider = MockProvider::new()
        .with("ZAR=X", &[("2024-01-10", Some(18.0)), ("2024-02-12", Some(19.0))])
        .with("GHS=X", &[("2024-01-10", Some(12.0))]);
    let dir = tempfile::tempdir().unwrap();
    let cfg = PipelineConfig {
        output_dir: dir.path().join("nested"),
        out_prefix: "fx".into(),
        ..config(&["ZAR", "GHS"])
    };

    let (run, paths) = run_pipeline(&provider, &cfg).unwrap();
    assert!(paths.wide.ends_with("fx_wide.csv"));

    let wide = std::fs::read_to_string(&paths.wide).unwrap();
    let lines: Vec<&str> = wide.lines().collect();
    assert_eq!(lines[0], "date,GHS,ZAR,USD");
    assert_eq!(lines[1], "2024-01-01,12.0,18.0,1.0");
    assert_eq!(lines[2], "2024-02-01,,19.0,1.0");

    let long = std::fs::read_to_string(&paths.long).unwrap();
    let lines: Vec<&str> = long.lines().collect();
    assert_eq!(lines[0], "date,currency,rate_units_per_usd");
    assert_eq!(lines[1], "2024-01-01,GHS,12.0");
    assert_eq!(lines[2], "2024-02-01,GHS,");
    assert_eq!(lines[3], "2024-01-01,USD,1.0");

    let manifest = load_manifest(&paths.manifest).unwrap();
    assert_eq!(manifest.months, 2);
    assert_eq!(manifest.provider, "mock");
    assert_eq!(manifest.wide_file, "fx_wide.csv");
    assert_eq!(manifest.reference.as_deref(), Some("USD"));
    assert!(manifest.missing().is_empty());

    // The long file pivots back to the wide table.
    let mut back = pivot_long(&run.long);
    back.reorder_columns(&run.monthly.column_names());
    assert_eq!(back, run.monthly);
}
