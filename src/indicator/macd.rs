use error_stack::{Report, bail};
use serde::Serialize;

use crate::error::IndicatorError;
use crate::indicator::ma::Ema;
use crate::indicator::{Indicator, ensure_len};
use crate::model::Series;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

pub struct Macd {
    fast_span: usize,
    slow_span: usize,
    signal_span: usize,
}

impl Macd {
    pub fn new(
        fast_span: usize,
        slow_span: usize,
        signal_span: usize,
    ) -> Result<Self, Report<IndicatorError>> {
        if fast_span == 0 || slow_span == 0 || signal_span == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "all spans must be > 0".into(),
            });
        }
        if fast_span >= slow_span {
            bail!(IndicatorError::InvalidParameter {
                name: "fast_span must be < slow_span".into(),
            });
        }
        Ok(Self {
            fast_span,
            slow_span,
            signal_span,
        })
    }

    /// One (macd, signal, histogram) point per input price.
    ///
    /// The EMAs are seeded by the first price, so every point is defined once
    /// the series is at least `slow_span` long.
    pub fn calculate_full(&self, prices: &[f64]) -> Result<Vec<MacdPoint>, Report<IndicatorError>> {
        ensure_len(prices.len(), self.required_bars())?;

        let fast_ema = Ema::new(self.fast_span)?.calculate_prices(prices)?;
        let slow_ema = Ema::new(self.slow_span)?.calculate_prices(prices)?;
        let macd_line: Vec<f64> = fast_ema
            .iter()
            .zip(slow_ema.iter())
            .map(|(f, s)| f - s)
            .collect();
        let signal_line = Ema::new(self.signal_span)?.calculate_prices(&macd_line)?;

        Ok(macd_line
            .into_iter()
            .zip(signal_line)
            .map(|(macd, signal)| MacdPoint {
                macd,
                signal,
                histogram: macd - signal,
            })
            .collect())
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        "macd"
    }

    fn required_bars(&self) -> usize {
        self.slow_span
    }

    /// Returns MACD line values only.
    fn calculate(&self, series: &Series) -> Result<Vec<Option<f64>>, Report<IndicatorError>> {
        Ok(self
            .calculate_full(&series.closes())?
            .into_iter()
            .map(|p| Some(p.macd))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::series_from_closes;

    #[test]
    fn macd_invalid_fast_ge_slow() {
        assert!(Macd::new(26, 12, 9).is_err());
    }

    #[test]
    fn macd_span_zero_invalid() {
        assert!(Macd::new(0, 26, 9).is_err());
    }

    #[test]
    fn macd_insufficient_data() {
        let macd = Macd::new(12, 26, 9).unwrap();
        assert!(macd.calculate(&series_from_closes("T", &[1.0; 25])).is_err());
    }

    #[test]
    fn macd_flat_prices_returns_zero() {
        let points = Macd::new(12, 26, 9).unwrap().calculate_full(&[10.0; 30]).unwrap();
        assert_eq!(points.len(), 30);
        for p in &points {
            assert!(p.macd.abs() < 1e-9, "expected 0 for flat prices, got {}", p.macd);
            assert!(p.signal.abs() < 1e-9);
        }
    }

    #[test]
    fn macd_turns_positive_on_rising_prices() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let points = Macd::new(12, 26, 9).unwrap().calculate_full(&closes).unwrap();
        let last = points.last().unwrap();
        assert!(last.macd > 0.0);
        assert!(last.signal > 0.0);
        // fast EMA keeps pulling ahead for a steady ramp
        assert!(points[59].macd > points[30].macd);
    }

    #[test]
    fn macd_histogram_is_difference() {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + (i % 5) as f64).collect();
        let points = Macd::new(3, 6, 4).unwrap().calculate_full(&closes).unwrap();
        for p in points {
            assert!((p.histogram - (p.macd - p.signal)).abs() < 1e-12);
        }
    }
}
