use crate::autodiff::{Tape, Var};
use crate::config::ModelConstants;
use crate::series::SeriesModel;
use crate::traits::{ForceModel, ForceSample};

/// Element-wise force term of the flow model and its sensitivities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceEstimator {
    series: SeriesModel,
    scale: f64,
    probability: f64,
    dim_constant: f64,
}

impl Default for ForceEstimator {
    fn default() -> Self {
        Self::from_constants(&ModelConstants::default())
    }
}

impl ForceEstimator {
    pub fn from_constants(constants: &ModelConstants) -> Self {
        Self {
            series: SeriesModel::new(constants.coefficients),
            scale: constants.scale,
            probability: constants.force_probability,
            dim_constant: constants.dim_constant,
        }
    }

    pub fn series(&self) -> &SeriesModel {
        &self.series
    }

    /// K * (1 - lx * length)
    pub fn scale<'t>(&self, lx: Var<'t>, length: usize) -> Var<'t> {
        (1.0 - lx * length as f64) * self.scale
    }

    /// scale(lx) * p * dim_constant * tsgrad
    pub fn estimated<'t>(&self, lx: Var<'t>, tsgrad: Var<'t>, length: usize) -> Var<'t> {
        self.scale(lx, length) * self.probability * self.dim_constant * tsgrad
    }

    /// Evaluates the force at series time `t` and position `lx`.
    ///
    /// The power series value enters the tape as an independent input, so the
    /// returned gradient is d/dlx + d/dtsgrad of the estimate.
    pub fn estimate(&self, t: f64, lx: f64, length: usize) -> ForceSample {
        let tape = Tape::new();
        let lx = tape.var(lx);
        let tsgrad = tape.var(self.series.power_series(t));
        let force = self.estimated(lx, tsgrad, length);
        let grads = force.gradients();

        ForceSample {
            estimate: force.value(),
            gradient: grads.wrt(&lx) + grads.wrt(&tsgrad),
        }
    }
}

impl ForceModel for ForceEstimator {
    fn sample(&self, t: f64, lx: f64, length: usize) -> ForceSample {
        self.estimate(t, lx, length)
    }
}

#[cfg(test)]
mod tests {
    use super::ForceEstimator;
    use crate::config::ModelConstants;

    fn closed_form(t: f64, lx: f64, length: usize) -> (f64, f64) {
        let constants = ModelConstants::default();
        let ps = ForceEstimator::default().series().power_series(t);
        let n = length as f64;
        let factor = constants.force_probability * constants.dim_constant;
        let estimate = constants.scale * (1.0 - lx * n) * factor * ps;
        let d_lx = -constants.scale * n * factor * ps;
        let d_ps = constants.scale * (1.0 - lx * n) * factor;
        (estimate, d_lx + d_ps)
    }

    #[test]
    fn estimate_and_gradient_match_chain_rule() {
        let estimator = ForceEstimator::default();
        for &(t, lx, length) in &[
            (0.0, 0.0, 100usize),
            (0.1, 3.0, 100),
            (0.3, 99.0, 100),
            (0.2, 511.0, 1024),
        ] {
            let sample = estimator.estimate(t, lx, length);
            let (estimate, gradient) = closed_form(t, lx, length);
            let tol = 1e-12 * (1.0 + estimate.abs());
            assert!((sample.estimate - estimate).abs() < tol, "estimate at {t}, {lx}");
            let tol = 1e-12 * (1.0 + gradient.abs());
            assert!((sample.gradient - gradient).abs() < tol, "gradient at {t}, {lx}");
        }
    }

    #[test]
    fn zero_series_leaves_only_the_scale_sensitivity() {
        // At t = 0 the power series vanishes, so d/dlx = 0 and the gradient is
        // K * (1 - lx * length) * p * dim_constant.
        let sample = ForceEstimator::default().estimate(0.0, 2.0, 100);
        assert_eq!(sample.estimate, 0.0);
        let expected = 10.0 * (1.0 - 200.0) * 0.01 * 0.1;
        assert!((sample.gradient - expected).abs() < 1e-12);
    }

    #[test]
    fn constants_are_swappable() {
        let constants = ModelConstants {
            scale: 1e11,
            ..ModelConstants::default()
        };
        let big = ForceEstimator::from_constants(&constants).estimate(0.2, 1.0, 100);
        let small = ForceEstimator::default().estimate(0.2, 1.0, 100);
        assert!((big.estimate / small.estimate - 1e10).abs() < 1e-2);
    }
}
