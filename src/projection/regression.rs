use error_stack::{Report, ResultExt, bail};

use crate::error::ProjectionError;
use crate::indicator::bollinger::BollingerBands;
use crate::indicator::rsi::Rsi;
use crate::projection::{ProjectionMethod, StepContext, ensure_lookback};

const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;
const BAND_WIDTH: f64 = 2.0;

/// Least-squares slope of the window, nudged back toward the Bollinger middle
/// band when the last close leaves the bands and damped when RSI is stretched.
pub struct Regression {
    lookback: usize,
    mean_reversion: f64,
    rsi_reversal: f64,
    bands: BollingerBands,
    rsi: Rsi,
}

impl Regression {
    pub fn new(
        lookback: usize,
        mean_reversion: f64,
        rsi_window: usize,
        rsi_reversal: f64,
    ) -> Result<Self, Report<ProjectionError>> {
        ensure_lookback(lookback)?;
        if rsi_window == 0 || rsi_window >= lookback {
            bail!(ProjectionError::InvalidParameter {
                name: "rsi_window must be in 1..lookback".into(),
            });
        }
        if !(mean_reversion.is_finite() && mean_reversion >= 0.0)
            || !(rsi_reversal.is_finite() && rsi_reversal >= 0.0)
        {
            bail!(ProjectionError::InvalidParameter {
                name: "reversion weights must be >= 0".into(),
            });
        }

        Ok(Self {
            lookback,
            mean_reversion,
            rsi_reversal,
            bands: BollingerBands::new(lookback, BAND_WIDTH)
                .change_context(ProjectionError::Indicator)?,
            rsi: Rsi::new(rsi_window).change_context(ProjectionError::Indicator)?,
        })
    }
}

impl ProjectionMethod for Regression {
    fn name(&self) -> &str {
        "regression"
    }

    fn lookback(&self) -> usize {
        self.lookback
    }

    fn drift(&self, ctx: &StepContext<'_>) -> Result<f64, Report<ProjectionError>> {
        let window = ctx.window(self.lookback);
        let last = window[window.len() - 1];
        let slope = linear_slope(window);

        let bands = self
            .bands
            .calculate_bands(window)
            .change_context(ProjectionError::Indicator)?;
        let nudge = match bands.last().copied().flatten() {
            Some(b) if last > b.upper || last < b.lower => -(last - b.middle) * self.mean_reversion,
            _ => 0.0,
        };

        let rsi = self
            .rsi
            .calculate_prices(window)
            .change_context(ProjectionError::Indicator)?;
        let reversal = match rsi.last() {
            Some(&r) if r > RSI_OVERBOUGHT => -slope.abs() * self.rsi_reversal,
            Some(&r) if r < RSI_OVERSOLD => slope.abs() * self.rsi_reversal,
            _ => 0.0,
        };

        Ok(slope + nudge + reversal)
    }
}

/// Slope of the ordinary least-squares line through `(j, values[j])`.
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;
    let (covariance, variance) =
        values
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(cov, var), (j, &y)| {
                let dx = j as f64 - x_mean;
                (cov + dx * (y - y_mean), var + dx * dx)
            });
    covariance / variance
}
