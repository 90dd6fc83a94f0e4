use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, NEUTRAL_OSCILLATOR, ensure_len, ensure_positive};
use crate::model::Series;

/// RSI over simple rolling means of gains and losses.
///
/// Warm-up entries and windows without any movement read as the neutral 50,
/// a window of pure gains reads 100, so every output is `Some` and lies in
/// `[0, 100]`.
pub struct Rsi {
    window: usize,
}

impl Rsi {
    pub fn new(window: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_positive(window, "window")?;
        Ok(Self { window })
    }

    pub fn calculate_prices(&self, prices: &[f64]) -> Result<Vec<f64>, Report<IndicatorError>> {
        ensure_len(prices.len(), self.required_bars())?;

        let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
        let mut results = vec![NEUTRAL_OSCILLATOR; self.window];

        for window in deltas.windows(self.window) {
            let avg_gain = window.iter().map(|&d| d.max(0.0)).sum::<f64>() / self.window as f64;
            let avg_loss = window.iter().map(|&d| (-d).max(0.0)).sum::<f64>() / self.window as f64;
            results.push(rsi_value(avg_gain, avg_loss));
        }

        Ok(results)
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        "rsi"
    }

    fn required_bars(&self) -> usize {
        self.window + 1
    }

    fn calculate(&self, series: &Series) -> Result<Vec<Option<f64>>, Report<IndicatorError>> {
        Ok(self
            .calculate_prices(&series.closes())?
            .into_iter()
            .map(Some)
            .collect())
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { NEUTRAL_OSCILLATOR } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - 100.0 / (1.0 + rs);
    if rsi.is_finite() {
        rsi
    } else {
        NEUTRAL_OSCILLATOR
    }
}
