pub mod yahoo;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::MarketDataError;
use crate::model::Interval;
use crate::series::RawBars;

/// Source of historical OHLCV batches.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn MarketData`).
pub trait MarketData: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch `range` worth of bars (e.g. `"5d"`, `"1y"`) at `interval`.
    ///
    /// Unknown symbols fail with `MarketDataError::SymbolNotFound`.
    fn fetch_bars(
        &self,
        symbol: &str,
        range: &str,
        interval: Interval,
    ) -> BoxFuture<'_, Result<RawBars, Report<MarketDataError>>>;
}

/// Ranges accepted by the chart endpoint.
pub const VALID_RANGES: &[&str] = &[
    "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max",
];
