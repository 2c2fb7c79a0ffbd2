//! Serializable pipeline configuration.
//!
//! Every field has a default, so a TOML file only needs the keys it changes:
//!
//! ```toml
//! start = "2021-01-01"
//! out_prefix = "east_africa"
//! output_dir = "out"
//!
//! [[primary]]
//! symbol = "KES=X"
//! code = "KES"
//! ```

use chrono::NaiveDate;
use fxmonthly_core::data::Interval;
use fxmonthly_core::domain::{SymbolMap, DEFAULT_CODES, REFERENCE_CODE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default output file prefix.
pub const DEFAULT_OUT_PREFIX: &str = "monthly_fx";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything one pipeline run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// First date requested (inclusive).
    pub start: NaiveDate,
    /// Last date requested (exclusive).
    pub end: NaiveDate,
    pub interval: Interval,
    /// Directory the output files are written into.
    pub output_dir: PathBuf,
    /// File prefix; outputs are `<prefix>_wide.csv`, `<prefix>_long.csv`
    /// and `<prefix>_manifest.json`.
    pub out_prefix: String,
    /// Append a constant 1.0 column for the reference currency.
    pub include_reference: bool,
    pub reference_code: String,
    /// Currency columns that lead the wide table, in this order.
    pub preferred_order: Vec<String>,
    pub primary: SymbolMap,
    pub fallback: SymbolMap,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            end: chrono::Local::now().date_naive(),
            interval: Interval::Daily,
            output_dir: PathBuf::from("."),
            out_prefix: DEFAULT_OUT_PREFIX.to_string(),
            include_reference: true,
            reference_code: REFERENCE_CODE.to_string(),
            preferred_order: DEFAULT_CODES.iter().map(|c| c.to_string()).collect(),
            primary: SymbolMap::default_primary(),
            fallback: SymbolMap::default_fallback(),
        }
    }
}

impl PipelineConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start >= self.end {
            return Err(ConfigError::Invalid(format!(
                "start {} must be before end {}",
                self.start, self.end
            )));
        }
        if self.out_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("out_prefix is empty".into()));
        }
        if self.include_reference && self.reference_code.trim().is_empty() {
            return Err(ConfigError::Invalid("reference_code is empty".into()));
        }
        if self.primary.is_empty() {
            return Err(ConfigError::Invalid("primary symbol map is empty".into()));
        }
        Ok(())
    }

    /// Currency codes the run asks for: the primary map's codes, in order.
    pub fn requested_codes(&self) -> Vec<String> {
        self.primary.codes()
    }

    /// Reference column name when enabled.
    pub fn reference_column(&self) -> Option<&str> {
        self.include_reference.then_some(self.reference_code.as_str())
    }

    pub fn wide_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_wide.csv", self.out_prefix))
    }

    pub fn long_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_long.csv", self.out_prefix))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_manifest.json", self.out_prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn defaults_match_builtin_maps() {
        let config = PipelineConfig::default();
        assert_eq!(config.start, d("2020-01-01"));
        assert_eq!(config.out_prefix, "monthly_fx");
        assert!(config.include_reference);
        assert_eq!(config.requested_codes(), DEFAULT_CODES.to_vec());
        assert_eq!(config.reference_column(), Some("USD"));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
start = "2021-01-01"
end = "2022-01-01"
out_prefix = "ea"
include_reference = false

[[primary]]
symbol = "KES=X"
code = "KES"
"#,
        )
        .unwrap();

        assert_eq!(config.start, d("2021-01-01"));
        assert_eq!(config.requested_codes(), vec!["KES"]);
        assert_eq!(config.fallback, SymbolMap::default_fallback());
        assert_eq!(config.reference_column(), None);
        assert!(config.wide_path().ends_with("ea_wide.csv"));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = PipelineConfig::from_toml(
            r#"
start = "2022-01-01"
end = "2021-01-01"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = PipelineConfig::default();
        config.end = d("2025-06-30");
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = PipelineConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn output_paths_use_prefix_and_dir() {
        let config = PipelineConfig {
            output_dir: PathBuf::from("out"),
            out_prefix: "fx".into(),
            ..PipelineConfig::default()
        };
        assert_eq!(config.long_path(), PathBuf::from("out/fx_long.csv"));
        assert_eq!(config.manifest_path(), PathBuf::from("out/fx_manifest.json"));
    }
}
