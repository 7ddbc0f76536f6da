use crate::config::SimulationConfig;
use crate::force::ForceEstimator;
use crate::interpolation::{loop_index, ReferenceInterpolator};
use crate::traits::{ForceModel, ReferenceScale};
use serde::{Deserialize, Serialize};

/// Per-index output of one integration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowArrays {
    /// Flow quantity.
    pub u: Vec<f64>,
    /// Force estimate.
    pub model: Vec<f64>,
    /// Sensitivity of the force estimate. Element 0 is a priming value.
    pub grad: Vec<f64>,
}

impl FlowArrays {
    fn with_length(length: usize) -> Self {
        Self {
            u: vec![0.0; length],
            model: vec![0.0; length],
            grad: vec![0.0; length],
        }
    }

    pub fn len(&self) -> usize {
        self.u.len()
    }

    pub fn is_empty(&self) -> bool {
        self.u.is_empty()
    }

    /// Meaningful gradient values, i.e. `grad` without its priming element.
    pub fn sensitivities(&self) -> &[f64] {
        self.grad.get(1..).unwrap_or(&[])
    }
}

/// Explicit velocity/flow recurrence over the spatial indices.
pub struct FlowIntegrator<F = ForceEstimator, R = ReferenceInterpolator<'static>> {
    config: SimulationConfig,
    force: F,
    reference: R,
}

impl FlowIntegrator {
    pub fn new(config: SimulationConfig) -> Self {
        let force = ForceEstimator::from_constants(&config.model);
        Self::with_models(config, force, ReferenceInterpolator::default())
    }
}

impl<F: ForceModel, R: ReferenceScale> FlowIntegrator<F, R> {
    pub fn with_models(config: SimulationConfig, force: F, reference: R) -> Self {
        Self {
            config,
            force,
            reference,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Linear velocity profile: u0 - x * p / alpha * length.
    pub fn velocity(&self, x: f64) -> f64 {
        let c = &self.config;
        c.u0 - x * c.p / c.alpha * c.length as f64
    }

    /// Series time value for index `i`.
    pub fn series_time(&self, i: usize) -> f64 {
        let c = &self.config;
        let span = c.model.series_end - c.model.series_start;
        c.model.series_start + i as f64 * span / (c.length as f64 - 1.0)
    }

    /// Runs the recurrence for every index and returns freshly allocated arrays.
    pub fn run(&self) -> FlowArrays {
        let c = &self.config;
        let length = c.length;
        let mut arrays = FlowArrays::with_length(length);
        let mut v_prev = c.u0;

        for i in 0..length {
            let x = loop_index(i, c.dx, length);
            let vi = self.velocity(x);

            let sample = self.force.sample(self.series_time(i), i as f64, length);
            arrays.grad[i] = sample.gradient;
            arrays.model[i] = sample.estimate;

            let diff = (vi - v_prev) * self.reference.weight(i, length);
            arrays.u[i] = diff / c.dt - v_prev * diff / c.dx;
            v_prev = vi;
        }

        arrays
    }
}
