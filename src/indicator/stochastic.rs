use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::ma::Sma;
use crate::indicator::{Indicator, NEUTRAL_OSCILLATOR, align, ensure_len, ensure_positive};
use crate::model::Series;

/// Aligned %K and %D lines.
#[derive(Debug, Clone, PartialEq)]
pub struct StochasticLines {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

/// Stochastic oscillator.
///
/// A window whose highest high equals its lowest low has no range to place the
/// close in; %K reads as the neutral 50 there, the same policy RSI uses for a
/// window without movement.
pub struct Stochastic {
    window: usize,
    smoothing: usize,
}

impl Stochastic {
    pub fn new(window: usize, smoothing: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_positive(window, "window")?;
        ensure_positive(smoothing, "smoothing")?;
        Ok(Self { window, smoothing })
    }

    pub fn calculate_lines(
        &self,
        highs: &[f64],
        lows: &[f64],
        closes: &[f64],
    ) -> Result<StochasticLines, Report<IndicatorError>> {
        let len = closes.len();
        ensure_len(len, self.required_bars())?;
        ensure_len(highs.len().min(lows.len()), len)?;

        let k_values: Vec<f64> = (self.window - 1..len)
            .map(|i| {
                let start = i + 1 - self.window;
                let highest = highs[start..=i].iter().copied().fold(f64::MIN, f64::max);
                let lowest = lows[start..=i].iter().copied().fold(f64::MAX, f64::min);
                let range = highest - lowest;
                if range == 0.0 {
                    NEUTRAL_OSCILLATOR
                } else {
                    100.0 * (closes[i] - lowest) / range
                }
            })
            .collect();

        let d = Sma::new(self.smoothing)?.calculate_prices(&k_values)?;
        let d_values: Vec<f64> = d.into_iter().flatten().collect();

        Ok(StochasticLines {
            k: align(len, k_values),
            d: align(len, d_values),
        })
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        "stochastic"
    }

    fn required_bars(&self) -> usize {
        self.window + self.smoothing - 1
    }

    /// Returns %K values only.
    fn calculate(&self, series: &Series) -> Result<Vec<Option<f64>>, Report<IndicatorError>> {
        Ok(self
            .calculate_lines(&series.highs(), &series.lows(), &series.closes())?
            .k)
    }
}
