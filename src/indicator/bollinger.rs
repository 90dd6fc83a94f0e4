use error_stack::{Report, bail};
use serde::Serialize;

use crate::error::IndicatorError;
use crate::indicator::ma::Sma;
use crate::indicator::{Indicator, ensure_len, sample_std_dev};
use crate::model::Series;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Moving average plus/minus `k` sample standard deviations.
pub struct BollingerBands {
    window: usize,
    k: f64,
}

impl BollingerBands {
    pub fn new(window: usize, k: f64) -> Result<Self, Report<IndicatorError>> {
        if window < 2 {
            bail!(IndicatorError::InvalidParameter {
                name: "window must be >= 2".into(),
            });
        }
        if !k.is_finite() || k <= 0.0 {
            bail!(IndicatorError::InvalidParameter {
                name: "k must be > 0".into(),
            });
        }
        Ok(Self { window, k })
    }

    /// Bands aligned with `prices`; `None` for the first `window - 1` entries.
    pub fn calculate_bands(
        &self,
        prices: &[f64],
    ) -> Result<Vec<Option<Bands>>, Report<IndicatorError>> {
        ensure_len(prices.len(), self.window)?;
        let sma = Sma::new(self.window)?.calculate_prices(prices)?;

        let bands = sma
            .iter()
            .enumerate()
            .map(|(i, middle)| {
                let middle = (*middle)?;
                let std_dev = sample_std_dev(&prices[i + 1 - self.window..=i]);
                Some(Bands {
                    upper: middle + self.k * std_dev,
                    middle,
                    lower: middle - self.k * std_dev,
                })
            })
            .collect();

        Ok(bands)
    }
}

impl Indicator for BollingerBands {
    fn name(&self) -> &str {
        "bollinger"
    }

    fn required_bars(&self) -> usize {
        self.window
    }

    /// Returns middle band (SMA) values only.
    fn calculate(&self, series: &Series) -> Result<Vec<Option<f64>>, Report<IndicatorError>> {
        Ok(self
            .calculate_bands(&series.closes())?
            .into_iter()
            .map(|b| b.map(|b| b.middle))
            .collect())
    }
}
