//! Run parameters.
//!
//! `ExperimentOptions` mirrors the command-line inputs (log2 sizes, optional overrides);
//! `SimulationConfig` is the validated, immutable parameter set every component reads.

use crate::error::ConfigError;
use crate::series::POWER_SERIES_COEFFICIENTS;
use serde::{Deserialize, Serialize};

/// Smallest number of spatial samples the reference curve supports.
pub const MIN_LENGTH: usize = 100;
pub const DEFAULT_QUANTISATION_FACTOR: f64 = 3.49e-5;

/// Constants of the force model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConstants {
    pub series_start: f64,
    pub series_end: f64,
    /// K in `K * (1 - lx * length)`.
    pub scale: f64,
    pub force_probability: f64,
    pub dim_constant: f64,
    pub coefficients: [f64; 8],
}

impl Default for ModelConstants {
    fn default() -> Self {
        Self {
            series_start: 0.0,
            series_end: 0.3,
            scale: 1e1,
            force_probability: 0.01,
            dim_constant: 0.1,
            coefficients: POWER_SERIES_COEFFICIENTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub length: usize,
    pub n_intervals: usize,
    pub dt: f64,
    pub dx: f64,
    /// Probability of movement.
    pub p: f64,
    /// Normalization parameter for the probability of movement.
    pub alpha: f64,
    /// Initial velocity.
    pub u0: f64,
    pub quantisation_factor: f64,
    pub condition_exponent: f64,
    pub precision_multiplier: f64,
    pub concordance_norm: f64,
    pub model: ModelConstants,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            length: 1 << 10,
            n_intervals: 1 << 8,
            dt: 1e-3,
            dx: 1e-6,
            p: 0.02614316,
            alpha: 1.5878459,
            u0: 0.26612195,
            quantisation_factor: DEFAULT_QUANTISATION_FACTOR,
            condition_exponent: 2.0,
            precision_multiplier: 1.0,
            concordance_norm: 2.0,
            model: ModelConstants::default(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.length < MIN_LENGTH {
            return Err(ConfigError::LengthTooShort {
                length: self.length,
                minimum: MIN_LENGTH,
            });
        }
        if self.n_intervals == 0 {
            return Err(ConfigError::ZeroIntervals);
        }
        if self.length / self.n_intervals < 1 {
            return Err(ConfigError::IntervalsExceedLength {
                length: self.length,
                n_intervals: self.n_intervals,
            });
        }

        let reals = [
            ("dt", self.dt),
            ("dx", self.dx),
            ("p", self.p),
            ("alpha", self.alpha),
            ("u0", self.u0),
            ("quantisation_factor", self.quantisation_factor),
            ("condition_exponent", self.condition_exponent),
            ("precision_multiplier", self.precision_multiplier),
            ("concordance_norm", self.concordance_norm),
            ("series_start", self.model.series_start),
            ("series_end", self.model.series_end),
            ("scale", self.model.scale),
            ("force_probability", self.model.force_probability),
            ("dim_constant", self.model.dim_constant),
        ];
        for (name, value) in reals {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
        }

        for (name, value) in [
            ("dt", self.dt),
            ("dx", self.dx),
            ("alpha", self.alpha),
            ("precision_multiplier", self.precision_multiplier),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::NonPositive { name, value });
            }
        }

        for (name, value) in [
            ("condition_exponent", self.condition_exponent),
            ("concordance_norm", self.concordance_norm),
            ("quantisation_factor", self.quantisation_factor),
        ] {
            if value < 0.0 {
                return Err(ConfigError::Negative { name, value });
            }
        }

        Ok(())
    }

    /// Number of samples in each interval window.
    pub fn interval_width(&self) -> usize {
        self.length / self.n_intervals
    }
}

/// Inputs as given on the command line or by a JavaScript caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentOptions {
    /// log2 of the interval count.
    pub intervals: u32,
    /// log2 of the total length.
    pub iterations: u32,
    pub quantisation_factor: Option<f64>,
    pub condition_factor: f64,
    pub multiplier: f64,
}

impl Default for ExperimentOptions {
    fn default() -> Self {
        Self {
            intervals: 8,
            iterations: 10,
            quantisation_factor: None,
            condition_factor: 2.0,
            multiplier: 1.0,
        }
    }
}

impl ExperimentOptions {
    pub fn into_config(self) -> Result<SimulationConfig, ConfigError> {
        let n_intervals = pow2("intervals", self.intervals)?;
        let length = pow2("iterations", self.iterations)?;

        let config = SimulationConfig {
            length,
            n_intervals,
            quantisation_factor: self
                .quantisation_factor
                .unwrap_or(DEFAULT_QUANTISATION_FACTOR),
            condition_exponent: self.condition_factor,
            precision_multiplier: self.multiplier,
            ..SimulationConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

fn pow2(name: &'static str, exponent: u32) -> Result<usize, ConfigError> {
    1usize
        .checked_shl(exponent)
        .filter(|_| exponent < usize::BITS - 1)
        .ok_or(ConfigError::ExponentOutOfRange {
            name,
            value: exponent,
        })
}
