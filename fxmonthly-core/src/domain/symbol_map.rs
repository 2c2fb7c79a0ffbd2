//! Ordered mapping from provider symbols to ISO currency codes.
//!
//! Yahoo quotes USD/XXX pairs as `XXX=X`; some pairs are also listed under the
//! explicit alias `USDXXX=X`. The primary map uses the short form and the
//! fallback map the alias, both pointing at the same ISO code.

use serde::{Deserialize, Serialize};

/// Currencies reported by default, in their preferred column order.
pub const DEFAULT_CODES: [&str; 7] = ["GHS", "KES", "NGN", "RWF", "UGX", "ZAR", "ZMW"];

/// Reference currency every rate is expressed against.
pub const REFERENCE_CODE: &str = "USD";

/// One `symbol -> code` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub symbol: String,
    pub code: String,
}

/// Insertion-ordered symbol map.
///
/// Order matters: it drives request order and the encounter order of
/// currency columns that are not in the preferred list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolMap {
    entries: Vec<SymbolEntry>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from `(symbol, code)` pairs. Later duplicates of a symbol
    /// replace the code of the earlier entry in place.
    pub fn from_pairs<I, S, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, C)>,
        S: Into<String>,
        C: Into<String>,
    {
        let mut map = Self::new();
        for (symbol, code) in pairs {
            map.insert(symbol, code);
        }
        map
    }

    /// Primary Yahoo map: `GHS=X -> GHS`, ...
    pub fn default_primary() -> Self {
        Self::from_pairs(DEFAULT_CODES.iter().map(|c| (format!("{c}=X"), *c)))
    }

    /// Fallback Yahoo map: `USDGHS=X -> GHS`, ...
    pub fn default_fallback() -> Self {
        Self::from_pairs(DEFAULT_CODES.iter().map(|c| (format!("USD{c}=X"), *c)))
    }

    pub fn insert(&mut self, symbol: impl Into<String>, code: impl Into<String>) {
        let symbol = symbol.into();
        let code = code.into();
        match self.entries.iter_mut().find(|e| e.symbol == symbol) {
            Some(entry) => entry.code = code,
            None => self.entries.push(SymbolEntry { symbol, code }),
        }
    }

    /// ISO code for a provider symbol.
    pub fn get(&self, symbol: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.symbol == symbol)
            .map(|e| e.code.as_str())
    }

    /// Code for `symbol`, or the symbol itself when unmapped.
    pub fn code_or_symbol<'a>(&'a self, symbol: &'a str) -> &'a str {
        self.get(symbol).unwrap_or(symbol)
    }

    /// Provider symbols in map order.
    pub fn symbols(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.symbol.clone()).collect()
    }

    /// Distinct ISO codes in first-seen order.
    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !codes.contains(&entry.code) {
                codes.push(entry.code.clone());
            }
        }
        codes
    }

    /// Sub-map keeping only entries whose code is in `codes`.
    pub fn restrict_to_codes(&self, codes: &[String]) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|e| codes.contains(&e.code))
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
