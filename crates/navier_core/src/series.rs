//! Fifth-power time series and the weighted power series built on its derivative.

use crate::autodiff::{Tape, Var};

/// Power series coefficients: theta1 * x + theta2 * x^2 + ... + theta8 * x^8.
pub const POWER_SERIES_COEFFICIENTS: [f64; 8] = [
    2.23021253e-03,
    -1.72195385e-04,
    1.28483935e-05,
    -5.62817685e-07,
    1.44104377e-08,
    -2.12475897e-10,
    1.66951848e-12,
    -5.40886780e-15,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesModel {
    coefficients: [f64; 8],
}

impl Default for SeriesModel {
    fn default() -> Self {
        Self::new(POWER_SERIES_COEFFICIENTS)
    }
}

impl SeriesModel {
    pub fn new(coefficients: [f64; 8]) -> Self {
        Self { coefficients }
    }

    pub fn coefficients(&self) -> &[f64; 8] {
        &self.coefficients
    }

    /// t^5, recorded on the tape of `t`.
    pub fn time_series<'t>(t: Var<'t>) -> Var<'t> {
        t.powf(5.0)
    }

    /// d/dt of [`Self::time_series`] via a reverse sweep.
    pub fn time_series_gradient(t: f64) -> f64 {
        let tape = Tape::new();
        let t = tape.var(t);
        let u = Self::time_series(t);
        u.gradients().wrt(&t)
    }

    /// Sum over k = 1..=8 of coef[k] * (d/dt t^5)^k.
    pub fn power_series(&self, t: f64) -> f64 {
        let ut = Self::time_series_gradient(t);
        self.coefficients
            .iter()
            .zip(1..)
            .map(|(coef, k)| coef * ut.powi(k))
            .sum()
    }
}
