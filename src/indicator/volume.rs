use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::ma::Sma;
use crate::indicator::{Indicator, ensure_positive, mean};
use crate::model::Series;

/// Simple average of trading volume over a window.
pub struct VolumeMa {
    window: usize,
}

impl VolumeMa {
    pub fn new(window: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_positive(window, "window")?;
        Ok(Self { window })
    }

    /// Ratio of the most recent volume to the trailing average that includes it.
    ///
    /// `None` when there are fewer than `window` volumes or the average is zero.
    pub fn latest_ratio(&self, volumes: &[f64]) -> Option<f64> {
        if volumes.len() < self.window {
            return None;
        }
        let average = mean(&volumes[volumes.len() - self.window..]);
        if average <= 0.0 {
            return None;
        }
        volumes.last().map(|v| v / average)
    }
}

impl Indicator for VolumeMa {
    fn name(&self) -> &str {
        "volume_ma"
    }

    fn required_bars(&self) -> usize {
        self.window
    }

    fn calculate(&self, series: &Series) -> Result<Vec<Option<f64>>, Report<IndicatorError>> {
        Sma::new(self.window)?.calculate_prices(&series.volumes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::series_from_bars;

    fn series_with_volumes(vols: &[f64]) -> Series {
        let rows: Vec<_> = vols.iter().map(|&v| (100.0, 100.0, 100.0, 100.0, v)).collect();
        series_from_bars("T", &rows)
    }

    #[test]
    fn volume_ma_window_zero_invalid() {
        assert!(VolumeMa::new(0).is_err());
    }

    #[test]
    fn volume_ma_insufficient_data() {
        let vma = VolumeMa::new(5).unwrap();
        assert!(vma.calculate(&series_with_volumes(&[1.0; 4])).is_err());
    }

    #[test]
    fn volume_ma_known_value() {
        let vma = VolumeMa::new(3).unwrap();
        let values = vma.calculate(&series_with_volumes(&[1.0, 2.0, 3.0, 4.0])).unwrap();
        // (1+2+3)/3 = 2.0, (2+3+4)/3 = 3.0
        assert!((values[2].unwrap() - 2.0).abs() < 1e-9);
        assert!((values[3].unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn latest_ratio_detects_surge() {
        let vma = VolumeMa::new(4).unwrap();
        // average of [1,1,1,5] = 2.0, latest 5.0
        assert_eq!(vma.latest_ratio(&[9.0, 1.0, 1.0, 1.0, 5.0]), Some(2.5));
    }

    #[test]
    fn latest_ratio_degenerate_cases() {
        let vma = VolumeMa::new(3).unwrap();
        assert_eq!(vma.latest_ratio(&[1.0, 2.0]), None);
        assert_eq!(vma.latest_ratio(&[0.0, 0.0, 0.0]), None);
    }
}
