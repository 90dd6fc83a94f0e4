use error_stack::{Report, ResultExt};

use crate::error::ProjectionError;
use crate::indicator::volume::VolumeMa;
use crate::projection::momentum::WeightedMomentum;
use crate::projection::{ProjectionMethod, StepContext};

/// Weighted momentum scaled by how busy the latest bar was.
///
/// The multiplier is `last_volume / mean(volume over lookback)`; it falls back
/// to 1 when the average volume is zero or volumes are missing.
pub struct VolumeWeighted {
    momentum: WeightedMomentum,
    volume: VolumeMa,
}

impl VolumeWeighted {
    pub fn new(lookback: usize) -> Result<Self, Report<ProjectionError>> {
        Ok(Self {
            momentum: WeightedMomentum::new(lookback)?,
            volume: VolumeMa::new(lookback).change_context(ProjectionError::Indicator)?,
        })
    }
}

impl ProjectionMethod for VolumeWeighted {
    fn name(&self) -> &str {
        "volume_weighted"
    }

    fn lookback(&self) -> usize {
        self.momentum.lookback()
    }

    fn drift(&self, ctx: &StepContext<'_>) -> Result<f64, Report<ProjectionError>> {
        let ratio = self.volume.latest_ratio(ctx.volumes).unwrap_or(1.0);
        Ok(self.momentum.drift(ctx)? * ratio)
    }
}
