use error_stack::Report;

use crate::error::ProjectionError;
use crate::projection::{ProjectionMethod, StepContext, ensure_lookback};

/// Momentum of the last close against an exponentially weighted window mean.
///
/// `drift = (last - weighted_mean) / lookback`, with weights
/// `exp(-1 + j / (lookback - 1))` normalized to sum to one, heaviest on the
/// most recent close. Despite older naming this is not a regression slope.
pub struct WeightedMomentum {
    lookback: usize,
    weights: Vec<f64>,
}

impl WeightedMomentum {
    pub fn new(lookback: usize) -> Result<Self, Report<ProjectionError>> {
        ensure_lookback(lookback)?;
        let last = (lookback - 1) as f64;
        let raw: Vec<f64> = (0..lookback)
            .map(|j| (-1.0 + j as f64 / last).exp())
            .collect();
        let total: f64 = raw.iter().sum();
        Ok(Self {
            lookback,
            weights: raw.into_iter().map(|w| w / total).collect(),
        })
    }

    #[cfg(test)]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// `last - weighted_mean` of `window`, written as a weighted sum of gaps
    /// so a flat window yields exactly zero.
    pub(crate) fn gap(&self, window: &[f64]) -> f64 {
        let Some(&last) = window.last() else {
            return 0.0;
        };
        window
            .iter()
            .zip(&self.weights)
            .map(|(value, weight)| (last - value) * weight)
            .sum()
    }
}

impl ProjectionMethod for WeightedMomentum {
    fn name(&self) -> &str {
        "weighted_momentum"
    }

    fn lookback(&self) -> usize {
        self.lookback
    }

    fn drift(&self, ctx: &StepContext<'_>) -> Result<f64, Report<ProjectionError>> {
        Ok(self.gap(ctx.window(self.lookback)) / self.lookback as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(buffer: &[f64]) -> StepContext<'_> {
        StepContext {
            buffer,
            volumes: &[],
        }
    }

    #[test]
    fn lookback_below_two_invalid() {
        assert!(WeightedMomentum::new(1).is_err());
        assert!(WeightedMomentum::new(0).is_err());
    }

    #[test]
    fn weights_normalized_and_increasing() {
        let momentum = WeightedMomentum::new(40).unwrap();
        let weights = momentum.weights();
        assert_eq!(weights.len(), 40);
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(weights.windows(2).all(|w| w[1] > w[0]));
        // exp(0) / exp(-1) between the newest and oldest weight
        assert!((weights[39] / weights[0] - std::f64::consts::E).abs() < 1e-9);
    }

    #[test]
    fn drift_matches_weighted_mean_formula() {
        let momentum = WeightedMomentum::new(4).unwrap();
        let window = [10.0, 11.0, 13.0, 12.0];
        let weighted_mean: f64 = window
            .iter()
            .zip(momentum.weights())
            .map(|(v, w)| v * w)
            .sum();
        let expected = (12.0 - weighted_mean) / 4.0;
        let drift = momentum.drift(&ctx(&window)).unwrap();
        assert!((drift - expected).abs() < 1e-12);
    }

    #[test]
    fn drift_uses_trailing_window_only() {
        let momentum = WeightedMomentum::new(3).unwrap();
        let long = [500.0, 1.0, 2.0, 3.0];
        let short = [1.0, 2.0, 3.0];
        assert_eq!(
            momentum.drift(&ctx(&long)).unwrap(),
            momentum.drift(&ctx(&short)).unwrap()
        );
    }

    #[test]
    fn flat_window_has_zero_drift() {
        let momentum = WeightedMomentum::new(40).unwrap();
        assert_eq!(momentum.drift(&ctx(&[1000.0; 40])).unwrap(), 0.0);
    }

    #[test]
    fn rising_window_has_positive_drift() {
        let momentum = WeightedMomentum::new(40).unwrap();
        let closes: Vec<f64> = (100..140).map(|c| c as f64).collect();
        assert!(momentum.drift(&ctx(&closes)).unwrap() > 0.0);
    }
}
