pub mod bollinger;
pub mod bundle;
pub mod ma;
pub mod macd;
pub mod rsi;
pub mod stochastic;
pub mod volume;

use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::model::Series;

/// Value substituted when an oscillator's denominator degenerates to zero.
pub const NEUTRAL_OSCILLATOR: f64 = 50.0;

/// A technical analysis indicator over a time-ascending series.
pub trait Indicator: Send + Sync {
    /// Unique name of this indicator (e.g., "rsi", "sma").
    fn name(&self) -> &str;

    /// Minimum number of bars required to produce at least one output value.
    fn required_bars(&self) -> usize;

    /// Calculate the indicator's primary line.
    ///
    /// The output is aligned with the input: one entry per bar, `None` during
    /// the warm-up period.
    fn calculate(&self, series: &Series) -> Result<Vec<Option<f64>>, Report<IndicatorError>>;
}

pub(crate) fn ensure_len(available: usize, required: usize) -> Result<(), Report<IndicatorError>> {
    if available < required {
        bail!(IndicatorError::InsufficientData {
            required,
            available,
        });
    }
    Ok(())
}

pub(crate) fn ensure_positive(value: usize, name: &str) -> Result<(), Report<IndicatorError>> {
    if value == 0 {
        bail!(IndicatorError::InvalidParameter {
            name: format!("{name} must be > 0"),
        });
    }
    Ok(())
}

/// Left-pad `values` with `None` so the result is `total_len` long.
pub(crate) fn align(total_len: usize, values: Vec<f64>) -> Vec<Option<f64>> {
    let offset = total_len.saturating_sub(values.len());
    let mut output = vec![None; total_len];
    for (index, value) in values.into_iter().enumerate() {
        output[offset + index] = Some(value);
    }
    output
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). Zero for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
