pub mod json;
pub mod terminal;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::indicator::bundle::IndicatorSnapshot;
use crate::model::{ProjectionPoint, WatchlistRow};

/// Everything `analyze` shows for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub symbol: String,
    pub interval: String,
    pub bars: usize,
    pub last_timestamp: DateTime<Utc>,
    pub last_close: f64,
    pub method: String,
    pub indicators: IndicatorSnapshot,
    pub projection: Vec<ProjectionPoint>,
}

/// Sink for command output.
pub trait Reporter: Send + Sync {
    fn watchlist(&self, rows: &[WatchlistRow]);

    fn analysis(&self, analysis: &Analysis);

    /// A symbol that could not be analyzed; shown instead of failing the run.
    fn no_data(&self, symbol: &str, reason: &str);
}
