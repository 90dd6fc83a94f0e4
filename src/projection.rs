pub mod momentum;
pub mod regression;
pub mod volume;

use chrono::Duration;
use error_stack::{Report, bail};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::ProjectionError;
use crate::indicator::sample_std_dev;
use crate::model::{ProjectionPoint, Series};
use momentum::WeightedMomentum;
use regression::Regression;
use volume::VolumeWeighted;

/// Inputs visible to a method when it computes the drift of one step.
pub struct StepContext<'a> {
    /// Observed closes followed by the prices projected so far.
    pub buffer: &'a [f64],
    /// Observed volumes only; projected steps carry no volume.
    pub volumes: &'a [f64],
}

impl StepContext<'_> {
    /// The trailing `lookback` values of the buffer.
    pub fn window(&self, lookback: usize) -> &[f64] {
        &self.buffer[self.buffer.len().saturating_sub(lookback)..]
    }
}

/// How a projector turns the lookback window into a per-step move.
pub trait ProjectionMethod: Send + Sync {
    fn name(&self) -> &str;

    /// Closes the method needs before it can project.
    fn lookback(&self) -> usize;

    /// Undamped, noise-free move for the next step.
    fn drift(&self, ctx: &StepContext<'_>) -> Result<f64, Report<ProjectionError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    WeightedMomentum,
    Regression,
    VolumeWeighted,
}

impl MethodKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "weighted_momentum" => Some(Self::WeightedMomentum),
            "regression" => Some(Self::Regression),
            "volume_weighted" => Some(Self::VolumeWeighted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionSettings {
    pub method: MethodKind,
    pub lookback: usize,
    /// `decay = 1 / (1 + step * decay_rate)`.
    pub decay_rate: f64,
    /// Noise standard deviation as a fraction of the recent price deviation.
    pub noise_scale: f64,
    /// Trailing values used for the recent price deviation.
    pub noise_window: usize,
    /// Regression only: pull toward the middle band when outside the bands.
    pub mean_reversion: f64,
    /// Regression only.
    pub rsi_window: usize,
    /// Regression only: fraction of the slope removed when RSI is stretched.
    pub rsi_reversal: f64,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self {
            method: MethodKind::WeightedMomentum,
            lookback: 40,
            decay_rate: 0.1,
            noise_scale: 0.05,
            noise_window: 10,
            mean_reversion: 0.05,
            rsi_window: 14,
            rsi_reversal: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionRequest {
    pub horizon: usize,
    /// Spacing of projected points; the series' native step when `None`.
    pub step: Option<Duration>,
}

/// Build the random source for a projection run.
///
/// A fixed seed makes the noise term reproducible.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Recursive single-step price projector.
pub struct Projector {
    method: Box<dyn ProjectionMethod>,
    settings: ProjectionSettings,
}

impl Projector {
    pub fn new(settings: ProjectionSettings) -> Result<Self, Report<ProjectionError>> {
        if !settings.decay_rate.is_finite() || settings.decay_rate < 0.0 {
            bail!(ProjectionError::InvalidParameter {
                name: "decay_rate must be >= 0".into(),
            });
        }
        if !settings.noise_scale.is_finite() || settings.noise_scale < 0.0 {
            bail!(ProjectionError::InvalidParameter {
                name: "noise_scale must be >= 0".into(),
            });
        }
        if settings.noise_window == 0 {
            bail!(ProjectionError::InvalidParameter {
                name: "noise_window must be > 0".into(),
            });
        }

        Ok(Self {
            method: build_method(&settings)?,
            settings,
        })
    }

    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    pub fn required_bars(&self) -> usize {
        self.method.lookback()
    }

    /// Project `request.horizon` future closes.
    ///
    /// Each projected price is appended to the lookback buffer before the next
    /// step, so later points depend on earlier ones.
    pub fn project<R: Rng + ?Sized>(
        &self,
        series: &Series,
        request: &ProjectionRequest,
        rng: &mut R,
    ) -> Result<Vec<ProjectionPoint>, Report<ProjectionError>> {
        if request.horizon == 0 {
            bail!(ProjectionError::InvalidParameter {
                name: "horizon must be > 0".into(),
            });
        }

        let required = self.required_bars();
        let insufficient = || ProjectionError::InsufficientData {
            required,
            available: series.len(),
        };
        if series.len() < required {
            bail!(insufficient());
        }
        let Some(last_timestamp) = series.last_timestamp() else {
            bail!(insufficient());
        };

        let step = match request.step.or_else(|| series.native_step()) {
            Some(step) if step > Duration::zero() => step,
            _ => bail!(ProjectionError::InvalidParameter {
                name: "step must be positive".into(),
            }),
        };

        // Every offset up to `step * horizon` must be representable.
        let Some(steps) = i32::try_from(request.horizon)
            .ok()
            .filter(|&n| {
                step.checked_mul(n)
                    .and_then(|offset| last_timestamp.checked_add_signed(offset))
                    .is_some()
            })
        else {
            bail!(ProjectionError::InvalidParameter {
                name: "horizon exceeds the representable time range".into(),
            });
        };

        let volumes = series.volumes();
        let mut buffer = series.closes();
        buffer.reserve(request.horizon);
        let mut points = Vec::with_capacity(request.horizon);

        for i in 1..=steps {
            let ctx = StepContext {
                buffer: &buffer,
                volumes: &volumes,
            };
            let drift = self.method.drift(&ctx)?;
            let decay = 1.0 / (1.0 + f64::from(i) * self.settings.decay_rate);
            let sigma = sample_std_dev(ctx.window(self.settings.noise_window)) * self.settings.noise_scale;
            let noise = sample_normal(rng, sigma);

            let last = buffer[buffer.len() - 1];
            let next = last + drift * decay + noise;
            buffer.push(next);

            points.push(ProjectionPoint {
                timestamp: last_timestamp + step * i,
                price: next,
            });
        }

        debug!(
            symbol = %series.symbol(),
            method = self.method.name(),
            horizon = request.horizon,
            "projection complete"
        );

        Ok(points)
    }
}

fn build_method(
    settings: &ProjectionSettings,
) -> Result<Box<dyn ProjectionMethod>, Report<ProjectionError>> {
    Ok(match settings.method {
        MethodKind::WeightedMomentum => Box::new(WeightedMomentum::new(settings.lookback)?),
        MethodKind::Regression => Box::new(Regression::new(
            settings.lookback,
            settings.mean_reversion,
            settings.rsi_window,
            settings.rsi_reversal,
        )?),
        MethodKind::VolumeWeighted => Box::new(VolumeWeighted::new(settings.lookback)?),
    })
}

/// Draw from `N(0, sigma)`. A non-positive `sigma` yields exactly zero without
/// consuming randomness.
fn sample_normal<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> f64 {
    if !(sigma.is_finite() && sigma > 0.0) {
        return 0.0;
    }
    // Box-Muller; u1 is kept in (0, 1] so ln() stays finite
    let u1: f64 = 1.0 - rng.r#gen::<f64>();
    let u2: f64 = rng.r#gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    sigma * z
}

pub(crate) fn ensure_lookback(lookback: usize) -> Result<(), Report<ProjectionError>> {
    if lookback < 2 {
        bail!(ProjectionError::InvalidParameter {
            name: "lookback must be >= 2".into(),
        });
    }
    Ok(())
}
