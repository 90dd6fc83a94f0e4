use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, align, ensure_len, ensure_positive};
use crate::model::Series;

/// Simple Moving Average.
pub struct Sma {
    window: usize,
}

impl Sma {
    pub fn new(window: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_positive(window, "window")?;
        Ok(Self { window })
    }

    /// Trailing mean aligned with `prices`; the first `window - 1` entries are `None`.
    pub fn calculate_prices(
        &self,
        prices: &[f64],
    ) -> Result<Vec<Option<f64>>, Report<IndicatorError>> {
        ensure_len(prices.len(), self.window)?;
        let values = prices
            .windows(self.window)
            .map(|w| w.iter().sum::<f64>() / self.window as f64)
            .collect();
        Ok(align(prices.len(), values))
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        "sma"
    }

    fn required_bars(&self) -> usize {
        self.window
    }

    fn calculate(&self, series: &Series) -> Result<Vec<Option<f64>>, Report<IndicatorError>> {
        self.calculate_prices(&series.closes())
    }
}

/// Exponential Moving Average, `alpha = 2 / (span + 1)`, seeded by the first value.
pub struct Ema {
    span: usize,
}

impl Ema {
    pub fn new(span: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_positive(span, "span")?;
        Ok(Self { span })
    }

    /// One EMA value per input price.
    pub fn calculate_prices(&self, prices: &[f64]) -> Result<Vec<f64>, Report<IndicatorError>> {
        let Some((&first, rest)) = prices.split_first() else {
            bail!(IndicatorError::InsufficientData {
                required: 1,
                available: 0,
            });
        };

        let alpha = 2.0 / (self.span as f64 + 1.0);
        let mut ema = first;
        let mut results = Vec::with_capacity(prices.len());
        results.push(ema);

        for &price in rest {
            ema = price * alpha + ema * (1.0 - alpha);
            results.push(ema);
        }

        Ok(results)
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        "ema"
    }

    fn required_bars(&self) -> usize {
        1
    }

    fn calculate(&self, series: &Series) -> Result<Vec<Option<f64>>, Report<IndicatorError>> {
        Ok(self
            .calculate_prices(&series.closes())?
            .into_iter()
            .map(Some)
            .collect())
    }
}
