use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt, bail};
use tracing::{debug, warn};

use crate::error::SeriesError;
use crate::model::{Bar, Series};

/// A per-field column as delivered by the data source.
///
/// Sources may return the same field several times (one sub-column per
/// request symbol or per quote block); only the first sub-column is used.
#[derive(Debug, Clone, PartialEq)]
pub enum RawColumn {
    #[cfg_attr(not(test), allow(dead_code))]
    Flat(Vec<Option<f64>>),
    Nested(Vec<Vec<Option<f64>>>),
}

impl RawColumn {
    fn flatten(self) -> Vec<Option<f64>> {
        match self {
            Self::Flat(values) => values,
            Self::Nested(columns) => columns.into_iter().next().unwrap_or_default(),
        }
    }
}

/// Unvalidated OHLCV batch for one symbol.
#[derive(Debug, Clone)]
pub struct RawBars {
    pub symbol: String,
    pub timestamps: Vec<DateTime<Utc>>,
    pub open: RawColumn,
    pub high: RawColumn,
    pub low: RawColumn,
    pub close: RawColumn,
    pub volume: RawColumn,
}

/// What to do with bars violating `low <= open/close <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidBarPolicy {
    Reject,
    Drop,
}

impl InvalidBarPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "reject" => Some(Self::Reject),
            "drop" => Some(Self::Drop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    /// Callers choose: 2 for change-only use, the indicator/projection
    /// requirement otherwise.
    pub min_bars: usize,
    pub invalid_bars: InvalidBarPolicy,
}

impl NormalizeOptions {
    pub fn change_only() -> Self {
        Self {
            min_bars: 2,
            invalid_bars: InvalidBarPolicy::Drop,
        }
    }
}

/// Flatten, align and validate a raw batch into a `Series`.
pub fn normalize(raw: RawBars, options: &NormalizeOptions) -> Result<Series, Report<SeriesError>> {
    let RawBars {
        symbol,
        timestamps,
        open,
        high,
        low,
        close,
        volume,
    } = raw;
    let len = timestamps.len();

    let open = aligned(open, "open", len)?;
    let high = aligned(high, "high", len)?;
    let low = aligned(low, "low", len)?;
    let close = aligned(close, "close", len)?;
    let volume = aligned(volume, "volume", len)?;

    let mut bars = Vec::with_capacity(len);
    let mut incomplete = 0usize;
    for (index, timestamp) in timestamps.into_iter().enumerate() {
        let (Some(o), Some(h), Some(l), Some(c)) = (open[index], high[index], low[index], close[index])
        else {
            incomplete += 1;
            continue;
        };

        let bar = Bar {
            timestamp,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: volume[index].unwrap_or(0.0),
        };

        if !bar.is_well_formed() {
            match options.invalid_bars {
                InvalidBarPolicy::Reject => bail!(SeriesError::InvalidBar { index }),
                InvalidBarPolicy::Drop => {
                    warn!(symbol = %symbol, index, "dropping malformed bar");
                    continue;
                }
            }
        }
        bars.push(bar);
    }

    if incomplete > 0 {
        debug!(symbol = %symbol, incomplete, "skipped rows with missing prices");
    }

    if bars.len() < options.min_bars {
        bail!(SeriesError::InsufficientData {
            required: options.min_bars,
            available: bars.len(),
        });
    }

    Series::new(symbol.clone(), bars).attach_with(|| format!("symbol: {symbol}"))
}

fn aligned(
    column: RawColumn,
    name: &str,
    len: usize,
) -> Result<Vec<Option<f64>>, Report<SeriesError>> {
    let values = column.flatten();
    if values.len() != len {
        return Err(Report::new(SeriesError::ColumnLengthMismatch {
            column: name.to_string(),
        })
        .attach(format!("expected {len}, got {}", values.len())));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::start_time;
    use chrono::Duration;

    fn flat(values: &[f64]) -> RawColumn {
        RawColumn::Flat(values.iter().map(|&v| Some(v)).collect())
    }

    fn raw(closes: &[f64]) -> RawBars {
        let timestamps = (0..closes.len())
            .map(|i| start_time() + Duration::days(i as i64))
            .collect();
        RawBars {
            symbol: "BBRI.JK".into(),
            timestamps,
            open: flat(closes),
            high: flat(&closes.iter().map(|c| c + 1.0).collect::<Vec<_>>()),
            low: flat(&closes.iter().map(|c| c - 1.0).collect::<Vec<_>>()),
            close: flat(closes),
            volume: flat(&vec![500.0; closes.len()]),
        }
    }

    #[test]
    fn normalizes_flat_columns() {
        let series = normalize(raw(&[10.0, 11.0, 12.0]), &NormalizeOptions::change_only()).unwrap();
        assert_eq!(series.symbol(), "BBRI.JK");
        assert_eq!(series.closes(), vec![10.0, 11.0, 12.0]);
        assert_eq!(series.volumes(), vec![500.0; 3]);
    }

    #[test]
    fn nested_columns_use_first_sub_column() {
        let mut batch = raw(&[10.0, 11.0]);
        batch.close = RawColumn::Nested(vec![
            vec![Some(10.5), Some(11.5)],
            vec![Some(99.0), Some(99.0)],
        ]);
        let series = normalize(batch, &NormalizeOptions::change_only()).unwrap();
        assert_eq!(series.closes(), vec![10.5, 11.5]);
    }

    #[test]
    fn rows_with_missing_prices_are_skipped() {
        let mut batch = raw(&[10.0, 11.0, 12.0]);
        batch.close = RawColumn::Flat(vec![Some(10.0), None, Some(12.0)]);
        let series = normalize(batch, &NormalizeOptions::change_only()).unwrap();
        assert_eq!(series.closes(), vec![10.0, 12.0]);
    }

    #[test]
    fn missing_volume_becomes_zero() {
        let mut batch = raw(&[10.0, 11.0]);
        batch.volume = RawColumn::Flat(vec![None, Some(3.0)]);
        let series = normalize(batch, &NormalizeOptions::change_only()).unwrap();
        assert_eq!(series.volumes(), vec![0.0, 3.0]);
    }

    #[test]
    fn too_few_bars_is_insufficient_data() {
        let err = normalize(raw(&[10.0]), &NormalizeOptions::change_only()).unwrap_err();
        assert!(matches!(
            err.current_context(),
            SeriesError::InsufficientData {
                required: 2,
                available: 1
            }
        ));
    }

    #[test]
    fn caller_minimum_is_enforced() {
        let options = NormalizeOptions {
            min_bars: 40,
            invalid_bars: InvalidBarPolicy::Reject,
        };
        assert!(normalize(raw(&[10.0; 39]), &options).is_err());
        assert!(normalize(raw(&[10.0; 40]), &options).is_ok());
    }

    #[test]
    fn misaligned_column_rejected() {
        let mut batch = raw(&[10.0, 11.0, 12.0]);
        batch.low = flat(&[9.0, 10.0]);
        let err = normalize(batch, &NormalizeOptions::change_only()).unwrap_err();
        assert!(matches!(
            err.current_context(),
            SeriesError::ColumnLengthMismatch { .. }
        ));
    }

    #[test]
    fn malformed_bar_rejected_or_dropped_by_policy() {
        let mut batch = raw(&[10.0, 11.0, 12.0]);
        // high below close on the middle bar
        batch.high = flat(&[11.0, 10.0, 13.0]);

        let reject = NormalizeOptions {
            min_bars: 2,
            invalid_bars: InvalidBarPolicy::Reject,
        };
        let err = normalize(batch.clone(), &reject).unwrap_err();
        assert!(matches!(
            err.current_context(),
            SeriesError::InvalidBar { index: 1 }
        ));

        let series = normalize(batch, &NormalizeOptions::change_only()).unwrap();
        assert_eq!(series.closes(), vec![10.0, 12.0]);
    }

    #[test]
    fn duplicate_timestamps_rejected() {
        let mut batch = raw(&[10.0, 11.0]);
        batch.timestamps[1] = batch.timestamps[0];
        let err = normalize(batch, &NormalizeOptions::change_only()).unwrap_err();
        assert!(matches!(
            err.current_context(),
            SeriesError::NonMonotonicTimestamps { index: 1 }
        ));
    }

    #[test]
    fn invalid_bar_policy_parses() {
        assert_eq!(InvalidBarPolicy::from_str("drop"), Some(InvalidBarPolicy::Drop));
        assert_eq!(InvalidBarPolicy::from_str("reject"), Some(InvalidBarPolicy::Reject));
        assert_eq!(InvalidBarPolicy::from_str("ignore"), None);
    }
}
