use std::fmt;

use chrono::{DateTime, Duration, Utc};
use error_stack::{Report, bail};
use serde::Serialize;

use crate::error::SeriesError;

/// Bar interval accepted by the chart endpoint.
///
/// String representations match the config file format (e.g. `"1d"`, `"1wk"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Min1,
    Min2,
    Min5,
    Min15,
    Min30,
    Min60,
    Min90,
    Hour1,
    Day1,
    Day5,
    Week1,
    Month1,
}

impl Interval {
    /// Parse a config-format string into an `Interval`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Self::Min1),
            "2m" => Some(Self::Min2),
            "5m" => Some(Self::Min5),
            "15m" => Some(Self::Min15),
            "30m" => Some(Self::Min30),
            "60m" => Some(Self::Min60),
            "90m" => Some(Self::Min90),
            "1h" => Some(Self::Hour1),
            "1d" => Some(Self::Day1),
            "5d" => Some(Self::Day5),
            "1wk" => Some(Self::Week1),
            "1mo" => Some(Self::Month1),
            _ => None,
        }
    }

    /// Return the config-format string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min1 => "1m",
            Self::Min2 => "2m",
            Self::Min5 => "5m",
            Self::Min15 => "15m",
            Self::Min30 => "30m",
            Self::Min60 => "60m",
            Self::Min90 => "90m",
            Self::Hour1 => "1h",
            Self::Day1 => "1d",
            Self::Day5 => "5d",
            Self::Week1 => "1wk",
            Self::Month1 => "1mo",
        }
    }

    /// Nominal length of one bar. Months are counted as 30 days.
    pub fn duration(self) -> Duration {
        match self {
            Self::Min1 => Duration::minutes(1),
            Self::Min2 => Duration::minutes(2),
            Self::Min5 => Duration::minutes(5),
            Self::Min15 => Duration::minutes(15),
            Self::Min30 => Duration::minutes(30),
            Self::Min60 | Self::Hour1 => Duration::hours(1),
            Self::Min90 => Duration::minutes(90),
            Self::Day1 => Duration::days(1),
            Self::Day5 => Duration::days(5),
            Self::Week1 => Duration::weeks(1),
            Self::Month1 => Duration::days(30),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One OHLCV observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// `true` when prices are positive and finite, volume is non-negative and
    /// `low <= min(open, close) <= max(open, close) <= high`.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return false;
        }
        self.low <= self.open.min(self.close) && self.open.max(self.close) <= self.high
    }
}

/// Time-ascending bars for one instrument, most recent last.
#[derive(Debug, Clone)]
pub struct Series {
    symbol: String,
    bars: Vec<Bar>,
}

impl Series {
    /// Build a series, rejecting timestamps that are not strictly increasing.
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, Report<SeriesError>> {
        for (index, pair) in bars.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                bail!(SeriesError::NonMonotonicTimestamps { index: index + 1 });
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.last().map(|b| b.timestamp)
    }

    /// Spacing between the two most recent bars.
    pub fn native_step(&self) -> Option<Duration> {
        let n = self.bars.len();
        if n < 2 {
            return None;
        }
        Some(self.bars[n - 1].timestamp - self.bars[n - 2].timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistRow {
    pub symbol: String,
    pub last_price: f64,
    pub percent_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}
