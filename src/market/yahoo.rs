use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::info;

use crate::error::MarketDataError;
use crate::market::MarketData;
use crate::model::Interval;
use crate::series::{RawBars, RawColumn};

pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = concat!("stock-projector/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 15;
const NOT_FOUND_CODE: &str = "Not Found";

/// Yahoo Finance v8 chart endpoint.
pub struct YahooMarketData {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl YahooMarketData {
    pub fn new(
        base_url: impl Into<String>,
        requests_per_second: NonZeroU32,
    ) -> Result<Self, Report<MarketDataError>> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .change_context(MarketDataError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(requests_per_second))),
        })
    }
}

impl MarketData for YahooMarketData {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        range: &str,
        interval: Interval,
    ) -> BoxFuture<'_, Result<RawBars, Report<MarketDataError>>> {
        let symbol = symbol.to_owned();
        let range = range.to_owned();
        Box::pin(async move {
            // Wait for rate limiter before making the request
            self.rate_limiter.until_ready().await;

            let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
            let params = [("range", range.as_str()), ("interval", interval.as_str())];

            let response = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .change_context(MarketDataError::Request {
                    symbol: symbol.clone(),
                })?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(Report::new(MarketDataError::SymbolNotFound { symbol }));
            }
            if !status.is_success() {
                return Err(Report::new(MarketDataError::Request { symbol })
                    .attach(format!("HTTP status: {status}")));
            }

            let envelope: ChartEnvelope =
                response
                    .json()
                    .await
                    .change_context(MarketDataError::ResponseParse {
                        symbol: symbol.clone(),
                    })?;
            let raw = envelope.into_raw_bars(&symbol)?;

            info!(
                symbol = %symbol,
                range = %range,
                interval = %interval,
                fetched = raw.timestamps.len(),
                "yahoo chart fetch complete"
            );

            Ok(raw)
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    /// Absent when the range holds no trading sessions.
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
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

impl ChartEnvelope {
    fn into_raw_bars(self, requested: &str) -> Result<RawBars, Report<MarketDataError>> {
        if let Some(error) = self.chart.error {
            let context = if error.code == NOT_FOUND_CODE {
                MarketDataError::SymbolNotFound {
                    symbol: requested.to_string(),
                }
            } else {
                MarketDataError::ResponseParse {
                    symbol: requested.to_string(),
                }
            };
            return Err(Report::new(context)
                .attach(format!("{}: {}", error.code, error.description)));
        }

        let Some(result) = self.chart.result.and_then(|r| r.into_iter().next()) else {
            return Err(Report::new(MarketDataError::SymbolNotFound {
                symbol: requested.to_string(),
            }));
        };

        let timestamps = result
            .timestamp
            .iter()
            .map(|&secs| DateTime::from_timestamp(secs, 0))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                Report::new(MarketDataError::ResponseParse {
                    symbol: requested.to_string(),
                })
                .attach("timestamp out of range")
            })?;

        // Every quote block becomes one sub-column of each field.
        let mut quotes = result.indicators.quote;
        if quotes.is_empty() {
            quotes.push(ChartQuote::default());
        }
        let column = |pick: fn(&ChartQuote) -> &Vec<Option<f64>>| {
            RawColumn::Nested(quotes.iter().map(|q| pick(q).clone()).collect())
        };

        Ok(RawBars {
            symbol: result.meta.symbol,
            timestamps,
            open: column(|q| &q.open),
            high: column(|q| &q.high),
            low: column(|q| &q.low),
            close: column(|q| &q.close),
            volume: column(|q| &q.volume),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{NormalizeOptions, normalize};

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "BBRI.JK", "currency": "IDR"},
                "timestamp": [1767571200, 1767657600, 1767744000],
                "indicators": {
                    "quote": [{
                        "open":   [4000.0, 4050.0, null],
                        "high":   [4100.0, 4120.0, 4080.0],
                        "low":    [3980.0, 4010.0, 4000.0],
                        "close":  [4050.0, 4060.0, 4030.0],
                        "volume": [123400, 98000, null]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn chart_response_parses_into_raw_bars() {
        let envelope: ChartEnvelope = serde_json::from_str(SAMPLE).unwrap();
        let raw = envelope.into_raw_bars("BBRI.JK").unwrap();
        assert_eq!(raw.symbol, "BBRI.JK");
        assert_eq!(raw.timestamps.len(), 3);
        assert_eq!(raw.timestamps[0].timestamp(), 1767571200);
        assert_eq!(
            raw.close,
            RawColumn::Nested(vec![vec![Some(4050.0), Some(4060.0), Some(4030.0)]])
        );
    }

    #[test]
    fn parsed_bars_normalize_and_skip_null_rows() {
        let envelope: ChartEnvelope = serde_json::from_str(SAMPLE).unwrap();
        let raw = envelope.into_raw_bars("BBRI.JK").unwrap();
        let series = normalize(raw, &NormalizeOptions::change_only()).unwrap();
        assert_eq!(series.closes(), vec![4050.0, 4060.0]);
        assert_eq!(series.volumes(), vec![123400.0, 98000.0]);
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let envelope: ChartEnvelope = serde_json::from_str(body).unwrap();
        let err = envelope.into_raw_bars("NOPE.JK").unwrap_err();
        assert!(matches!(
            err.current_context(),
            MarketDataError::SymbolNotFound { symbol } if symbol == "NOPE.JK"
        ));
    }

    #[test]
    fn other_errors_map_to_parse_failure() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input - interval=7m is not supported"}}}"#;
        let envelope: ChartEnvelope = serde_json::from_str(body).unwrap();
        let err = envelope.into_raw_bars("BBRI.JK").unwrap_err();
        assert!(matches!(
            err.current_context(),
            MarketDataError::ResponseParse { .. }
        ));
    }

    #[test]
    fn empty_result_is_symbol_not_found() {
        let body = r#"{"chart":{"result":[],"error":null}}"#;
        let envelope: ChartEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.into_raw_bars("X").is_err());
    }

    #[test]
    fn missing_timestamps_yield_empty_batch() {
        let body = r#"{"chart":{"result":[{"meta":{"symbol":"X.JK"},"indicators":{"quote":[{}]}}],"error":null}}"#;
        let envelope: ChartEnvelope = serde_json::from_str(body).unwrap();
        let raw = envelope.into_raw_bars("X.JK").unwrap();
        assert!(raw.timestamps.is_empty());
        let err = normalize(raw, &NormalizeOptions::change_only()).unwrap_err();
        assert!(matches!(
            err.current_context(),
            crate::error::SeriesError::InsufficientData { .. }
        ));
    }

    /// Integration test: requires network access. Run with `cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn integration_fetch_bars() {
        let market = YahooMarketData::new(YAHOO_BASE_URL, NonZeroU32::new(1).unwrap()).unwrap();
        let raw = market.fetch_bars("BBRI.JK", "5d", Interval::Day1).await.unwrap();
        assert!(!raw.timestamps.is_empty());
    }
}
