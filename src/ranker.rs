use std::cmp::Ordering;

use error_stack::{Report, bail};
use tracing::warn;

use crate::error::RankError;
use crate::model::{Series, WatchlistRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    PercentChange,
    LastPrice,
    Symbol,
}

impl SortKey {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "percent_change" => Some(Self::PercentChange),
            "last_price" => Some(Self::LastPrice),
            "symbol" => Some(Self::Symbol),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ascending" | "asc" => Some(Self::Ascending),
            "descending" | "desc" => Some(Self::Descending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingRequest {
    pub sort_key: SortKey,
    pub direction: SortDirection,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub limit: Option<usize>,
}

impl Default for RankingRequest {
    fn default() -> Self {
        Self {
            sort_key: SortKey::PercentChange,
            direction: SortDirection::Descending,
            min_price: None,
            max_price: None,
            limit: None,
        }
    }
}

impl RankingRequest {
    fn in_price_range(&self, price: f64) -> bool {
        self.min_price.is_none_or(|min| price >= min) && self.max_price.is_none_or(|max| price <= max)
    }
}

/// Ranked rows plus the instruments that could not be scored.
#[derive(Debug, Default)]
pub struct Ranking {
    pub rows: Vec<WatchlistRow>,
    pub failures: Vec<(String, Report<RankError>)>,
}

/// Percent change between the two most recent closes, rounded to 2 decimals.
pub fn change_row(series: &Series) -> Result<WatchlistRow, Report<RankError>> {
    let bars = series.bars();
    let [.., previous, last] = bars else {
        bail!(RankError::InsufficientData {
            required: 2,
            available: bars.len(),
        });
    };

    if previous.close == 0.0 {
        bail!(RankError::DegenerateInput {
            symbol: series.symbol().to_string(),
        });
    }

    let change = (last.close - previous.close) / previous.close * 100.0;
    Ok(WatchlistRow {
        symbol: series.symbol().to_string(),
        last_price: last.close,
        percent_change: round_2dp(change),
    })
}

/// Score every instrument in `basket` and order the rows per `request`.
///
/// Instruments that cannot be scored are reported in `Ranking::failures`
/// and left out of the rows; the rest of the basket is unaffected. Ties keep
/// the basket order.
pub fn rank(basket: &[Series], request: &RankingRequest) -> Ranking {
    let mut ranking = Ranking::default();

    for series in basket {
        match change_row(series) {
            Ok(row) => ranking.rows.push(row),
            Err(report) => {
                warn!(symbol = %series.symbol(), error = %report, "instrument excluded from ranking");
                ranking.failures.push((series.symbol().to_string(), report));
            }
        }
    }

    // `sort_by` is stable, so equal keys keep their basket order in both directions.
    ranking.rows.sort_by(|a, b| {
        let ordering = compare(request.sort_key, a, b);
        match request.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });

    ranking.rows.retain(|row| request.in_price_range(row.last_price));
    if let Some(limit) = request.limit {
        ranking.rows.truncate(limit);
    }

    ranking
}

fn compare(key: SortKey, a: &WatchlistRow, b: &WatchlistRow) -> Ordering {
    match key {
        SortKey::PercentChange => a.percent_change.total_cmp(&b.percent_change),
        SortKey::LastPrice => a.last_price.total_cmp(&b.last_price),
        SortKey::Symbol => a.symbol.cmp(&b.symbol),
    }
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
