//! Yahoo Finance price provider.
//!
//! Fetches daily quotes from Yahoo's v8 chart API, one request per symbol,
//! fanned out on the rayon pool so a multi-symbol fetch behaves like one
//! batched download. There is no retry: the first hard failure is returned.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes. The CSV import path is the offline alternative.

use super::provider::{
    check_range, distinct_symbols, FetchError, Interval, PriceField, PriceHistory, PriceProvider,
};
use crate::domain::PriceTable;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// One parsed daily row. Every field may be missing.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DailyQuote {
    date: NaiveDate,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    adj_close: Option<f64>,
    volume: Option<f64>,
}

impl DailyQuote {
    fn field(&self, field: PriceField) -> Option<f64> {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::AdjClose => self.adj_close,
            PriceField::Volume => self.volume,
        }
    }
}

const FIELDS: [PriceField; 6] = [
    PriceField::Open,
    PriceField::High,
    PriceField::Low,
    PriceField::Close,
    PriceField::AdjClose,
    PriceField::Volume,
];

/// Yahoo Finance price provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    /// Build the provider. Fails with `ProviderUnavailable` when the HTTP
    /// client cannot be constructed (e.g. no TLS backend).
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| FetchError::ProviderUnavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build the chart API URL for a symbol over `[start, end)`.
    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate, interval: Interval) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        format!(
            "{}/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval={}\
             &includeAdjustedClose=true",
            self.base_url,
            interval.as_query()
        )
    }

    /// Parse the chart API response into daily rows within `[start, end)`.
    ///
    /// Timestamps are shifted by the exchange's GMT offset before taking the
    /// calendar date; FX bars are stamped at local midnight.
    fn parse_response(
        symbol: &str,
        resp: ChartResponse,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyQuote>, FetchError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    FetchError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }
                } else {
                    FetchError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                FetchError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::ResponseFormatChanged("result array is empty".into()))?;

        let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);

        // A symbol with no trading history comes back without timestamps.
        let Some(timestamps) = data.timestamp else {
            return Err(FetchError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut rows = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts + offset, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    FetchError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            if date < start || date >= end {
                continue;
            }

            rows.push(DailyQuote {
                date,
                open: quote.open.get(i).copied().flatten(),
                high: quote.high.get(i).copied().flatten(),
                low: quote.low.get(i).copied().flatten(),
                close: quote.close.get(i).copied().flatten(),
                adj_close: adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten()),
                volume: quote.volume.get(i).copied().flatten(),
            });
        }

        if rows.is_empty() {
            return Err(FetchError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        Ok(rows)
    }

    /// Execute a single HTTP request for one symbol.
    fn fetch_symbol(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<DailyQuote>, FetchError> {
        let url = self.chart_url(symbol, start, end, interval);
        debug!(%symbol, %url, "requesting chart");

        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_timeout() {
                FetchError::NetworkUnreachable(format!("timed out fetching {symbol}: {e}"))
            } else {
                FetchError::NetworkUnreachable(e.to_string())
            }
        })?;

        let status = resp.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(FetchError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(FetchError::AuthenticationRequired(format!(
                "Yahoo Finance refused the request (HTTP {status})"
            )));
        }

        if !status.is_success() {
            return Err(FetchError::Other(format!("HTTP {status} for {symbol}")));
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            FetchError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        Self::parse_response(symbol, chart, start, end)
    }
}

/// Assemble per-symbol rows into one table per field.
fn assemble(per_symbol: Vec<(String, Vec<DailyQuote>)>) -> PriceHistory {
    let mut fields = BTreeMap::new();
    for field in FIELDS {
        let series = per_symbol.iter().map(|(symbol, rows)| {
            let obs: BTreeMap<NaiveDate, Option<f64>> =
                rows.iter().map(|q| (q.date, q.field(field))).collect();
            (symbol.clone(), obs)
        });
        fields.insert(field, PriceTable::from_series(series));
    }
    PriceHistory::Fielded(fields)
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<PriceHistory, FetchError> {
        if symbols.is_empty() {
            return Ok(PriceHistory::empty());
        }
        check_range(start, end)?;

        let symbols = distinct_symbols(symbols);
        let results: Vec<(String, Result<Vec<DailyQuote>, FetchError>)> = symbols
            .par_iter()
            .map(|symbol| (symbol.clone(), self.fetch_symbol(symbol, start, end, interval)))
            .collect();

        let mut found = Vec::with_capacity(results.len());
        for (symbol, result) in results {
            match result {
                Ok(rows) => {
                    debug!(%symbol, rows = rows.len(), "fetched");
                    found.push((symbol, rows));
                }
                Err(FetchError::SymbolNotFound { .. }) => {
                    warn!(%symbol, "no data returned, symbol left out");
                }
                Err(e) => return Err(e),
            }
        }

        if found.is_empty() {
            return Ok(PriceHistory::empty());
        }
        Ok(assemble(found))
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn parse(json: &str) -> Result<Vec<DailyQuote>, FetchError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        YahooProvider::parse_response("GHS=X", resp, d("2024-01-01"), d("2024-02-01"))
    }

    // 2024-01-02T00:00:00Z and 2024-01-02T23:00:00Z
    const TWO_BARS: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"gmtoffset": 0},
                "timestamp": [1704153600, 1704236400],
                "indicators": {
                    "quote": [{
                        "open": [12.0, 12.1],
                        "high": [12.2, 12.3],
                        "low": [11.9, 12.0],
                        "close": [12.1, null],
                        "volume": [0, 0]
                    }],
                    "adjclose": [{"adjclose": [12.1, null]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_rows_and_keeps_missing_close() {
        let rows = parse(TWO_BARS).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, d("2024-01-02"));
        assert_eq!(rows[0].close, Some(12.1));
        assert_eq!(rows[1].close, None);
        assert_eq!(rows[1].open, Some(12.1));
    }

    #[test]
    fn gmt_offset_shifts_calendar_date() {
        let json = TWO_BARS.replace(r#""gmtoffset": 0"#, r#""gmtoffset": 3600"#);
        let rows = parse(&json).unwrap();
        assert_eq!(rows[1].date, d("2024-01-03"));
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let json = r#"{"chart": {"result": null,
            "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        assert!(matches!(parse(json), Err(FetchError::SymbolNotFound { .. })));
    }

    #[test]
    fn other_chart_error_is_format_change() {
        let json = r#"{"chart": {"result": null,
            "error": {"code": "Bad Request", "description": "Invalid input"}}}"#;
        assert!(matches!(
            parse(json),
            Err(FetchError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn rows_outside_range_are_dropped() {
        let resp: ChartResponse = serde_json::from_str(TWO_BARS).unwrap();
        let err =
            YahooProvider::parse_response("GHS=X", resp, d("2024-03-01"), d("2024-04-01"))
                .unwrap_err();
        assert!(matches!(err, FetchError::SymbolNotFound { .. }));
    }

    #[test]
    fn assemble_builds_field_tables() {
        let rows = parse(TWO_BARS).unwrap();
        let history = assemble(vec![("GHS=X".into(), rows)]);
        let PriceHistory::Fielded(fields) = history else {
            panic!("expected fielded history");
        };
        let close = &fields[&PriceField::Close];
        assert_eq!(close.column_names(), vec!["GHS=X"]);
        assert_eq!(close.value(d("2024-01-02"), "GHS=X"), Some(12.1));
        assert_eq!(fields.len(), FIELDS.len());
    }

    #[test]
    fn empty_symbol_list_makes_no_request() {
        // Unroutable base URL: any request would fail.
        let provider = YahooProvider::with_base_url("http://127.0.0.1:9").unwrap();
        let history = provider
            .fetch(&[], d("2024-01-01"), d("2024-02-01"), Interval::Daily)
            .unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn url_encodes_range_and_interval() {
        let provider = YahooProvider::with_base_url("http://example.test/").unwrap();
        let url = provider.chart_url("GHS=X", d("2024-01-01"), d("2024-01-02"), Interval::Daily);
        assert_eq!(
            url,
            "http://example.test/v8/finance/chart/GHS=X?period1=1704067200&period2=1704153600&interval=1d&includeAdjustedClose=true"
        );
    }
}
