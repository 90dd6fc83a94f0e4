use error_stack::{Report, ResultExt};
use serde::Serialize;
use tracing::debug;

use crate::error::IndicatorError;
use crate::indicator::bollinger::BollingerBands;
use crate::indicator::ma::Sma;
use crate::indicator::macd::Macd;
use crate::indicator::rsi::Rsi;
use crate::indicator::stochastic::Stochastic;
use crate::indicator::{Indicator, ensure_len};
use crate::model::Series;

/// Parameters for every indicator in the bundle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSettings {
    pub ma_window: usize,
    pub bollinger_window: usize,
    pub bollinger_k: f64,
    pub rsi_window: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub stoch_window: usize,
    pub stoch_smoothing: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            ma_window: 20,
            bollinger_window: 20,
            bollinger_k: 2.0,
            rsi_window: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            stoch_window: 14,
            stoch_smoothing: 3,
        }
    }
}

/// Indicator lines aligned with the series they were computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorBundle {
    pub ma: Vec<Option<f64>>,
    pub bollinger_upper: Vec<Option<f64>>,
    pub bollinger_lower: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub stoch_k: Vec<Option<f64>>,
    pub stoch_d: Vec<Option<f64>>,
}

/// Most recent value of each line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub ma: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_lower: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
}

struct Indicators {
    ma: Sma,
    bands: BollingerBands,
    rsi: Rsi,
    macd: Macd,
    stochastic: Stochastic,
}

impl Indicators {
    fn build(settings: &IndicatorSettings) -> Result<Self, Report<IndicatorError>> {
        Ok(Self {
            ma: Sma::new(settings.ma_window)?,
            bands: BollingerBands::new(settings.bollinger_window, settings.bollinger_k)?,
            rsi: Rsi::new(settings.rsi_window)?,
            macd: Macd::new(settings.macd_fast, settings.macd_slow, settings.macd_signal)?,
            stochastic: Stochastic::new(settings.stoch_window, settings.stoch_smoothing)?,
        })
    }

    fn all(&self) -> [&dyn Indicator; 5] {
        [
            &self.ma,
            &self.bands,
            &self.rsi,
            &self.macd,
            &self.stochastic,
        ]
    }

    fn required_bars(&self) -> usize {
        self.all()
            .iter()
            .map(|i| i.required_bars())
            .max()
            .unwrap_or(1)
    }
}

impl IndicatorBundle {
    /// Bars a series needs before `compute` can succeed with `settings`.
    pub fn required_bars(settings: &IndicatorSettings) -> Result<usize, Report<IndicatorError>> {
        Ok(Indicators::build(settings)?.required_bars())
    }

    pub fn compute(
        series: &Series,
        settings: &IndicatorSettings,
    ) -> Result<Self, Report<IndicatorError>> {
        let indicators = Indicators::build(settings)?;

        for indicator in indicators.all() {
            ensure_len(series.len(), indicator.required_bars())
                .attach_with(|| format!("indicator: {}", indicator.name()))?;
        }

        let closes = series.closes();
        let ma = indicators.ma.calculate(series)?;
        let bands = indicators.bands.calculate_bands(&closes)?;
        let rsi = indicators.rsi.calculate(series)?;
        let macd = indicators.macd.calculate_full(&closes)?;
        let stoch = indicators
            .stochastic
            .calculate_lines(&series.highs(), &series.lows(), &closes)?;

        debug!(
            symbol = %series.symbol(),
            bars = series.len(),
            required = indicators.required_bars(),
            "indicator bundle computed"
        );

        Ok(Self {
            ma,
            bollinger_upper: bands.iter().map(|b| b.map(|b| b.upper)).collect(),
            bollinger_lower: bands.iter().map(|b| b.map(|b| b.lower)).collect(),
            rsi,
            macd: macd.iter().map(|p| Some(p.macd)).collect(),
            macd_signal: macd.iter().map(|p| Some(p.signal)).collect(),
            stoch_k: stoch.k,
            stoch_d: stoch.d,
        })
    }

    pub fn latest(&self) -> IndicatorSnapshot {
        let last = |line: &[Option<f64>]| line.last().copied().flatten();
        IndicatorSnapshot {
            ma: last(&self.ma),
            bollinger_upper: last(&self.bollinger_upper),
            bollinger_lower: last(&self.bollinger_lower),
            rsi: last(&self.rsi),
            macd: last(&self.macd),
            macd_signal: last(&self.macd_signal),
            stoch_k: last(&self.stoch_k),
            stoch_d: last(&self.stoch_d),
        }
    }
}
