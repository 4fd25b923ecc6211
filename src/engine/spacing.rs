//! Duration → space mapping.
//!
//! `t = duration / shortest` is the duration ratio relative to the shortest
//! value in the system; every model yields exactly `ratio` at `t = 1` and
//! grows monotonically with `t`.

use serde::{Deserialize, Serialize};

/// Largest duration ratio considered (a whole note against a 1024th).
const MAX_DURATION_RATIO: f64 = 1024.0;

const SQRT_WEIGHT: f64 = 0.777;
const LOG_WEIGHT: f64 = 0.865617;
const LINEAR_WEIGHT: f64 = 0.134;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpacingModel {
    #[default]
    SquareRoot,
    Logarithmic,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpacingCalculator {
    model: SpacingModel,
    ratio: f64,
    base: f64,
}

impl SpacingCalculator {
    pub fn new(model: SpacingModel, ratio: f64) -> Self {
        Self { model, ratio, base: 0.7 }
    }

    /// Base for the exponential model; values outside (0,1) keep the default.
    pub fn with_exponential_base(mut self, base: f64) -> Self {
        if base > 0.0 && base < 1.0 {
            self.base = base;
        }
        self
    }

    pub fn model(&self) -> SpacingModel {
        self.model
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Abstract space unit for `duration` given the shortest duration of the
    /// system. Without duration information the bare ratio is returned.
    pub fn space(&self, duration: f64, shortest: f64) -> f64 {
        if !(shortest > 0.0) || !duration.is_finite() {
            return self.ratio;
        }
        let t = (duration / shortest).clamp(1.0, MAX_DURATION_RATIO);
        let factor = match self.model {
            SpacingModel::SquareRoot => 1.0 - SQRT_WEIGHT + SQRT_WEIGHT * t.sqrt(),
            SpacingModel::Logarithmic => 1.0 + LOG_WEIGHT * t.ln(),
            SpacingModel::Linear => 1.0 - LINEAR_WEIGHT + LINEAR_WEIGHT * t,
            // normalised so that t = 1 gives 1; tends to 1/base as t grows
            SpacingModel::Exponential => self.base.powf(1.0 / t - 1.0),
        };
        factor * self.ratio
    }
}
