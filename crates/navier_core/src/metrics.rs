//! Model-quality statistics over an index window of a completed run.
//!
//! All functions are pure: they read the flow arrays and return fresh counters
//! or scalars. Non-finite results are not suppressed here; callers inspect
//! [`IntervalMetrics::anomalies`] to detect them.

use crate::config::SimulationConfig;
use crate::error::{ConfigError, Metric, NumericAnomaly};
use crate::integrator::FlowArrays;
use crate::interpolation::loop_index;
use nalgebra::{UnitComplex, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Half-open index range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexWindow {
    pub start: usize,
    pub end: usize,
}

impl IndexWindow {
    /// Window of interval `k` when `length` samples are split into `n_intervals`
    /// equal parts. Trailing samples that do not fill a whole interval are unused;
    /// `k` wraps modulo `n_intervals`.
    pub fn for_interval(k: usize, n_intervals: usize, length: usize) -> Result<Self, ConfigError> {
        if n_intervals == 0 {
            return Err(ConfigError::ZeroIntervals);
        }
        let width = length / n_intervals;
        if width < 1 {
            return Err(ConfigError::IntervalsExceedLength {
                length,
                n_intervals,
            });
        }
        let k = k % n_intervals;
        Ok(Self {
            start: k * width,
            end: (k + 1) * width,
        })
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clamp to `[0, length)`.
    pub fn clamp_to(self, length: usize) -> Self {
        let end = self.end.min(length);
        Self {
            start: self.start.min(end),
            end,
        }
    }
}

/// {quantized, non-quantized} counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCounts {
    pub quantized: usize,
    pub non_quantized: usize,
}

impl ClassificationCounts {
    pub fn as_array(&self) -> [usize; 2] {
        [self.quantized, self.non_quantized]
    }

    pub fn total(&self) -> usize {
        self.quantized + self.non_quantized
    }
}

/// Octant labels in bucket order.
pub const PARTITION_LABELS: [&str; 8] = ["lb", "bl", "fl", "lf", "rf", "fr", "br", "rb"];

/// Histogram of angular change between consecutive polar points ("tpcc").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionHistogram {
    pub counts: [usize; 8],
}

impl PartitionHistogram {
    /// `floor(delta / (2pi/8)) + 4`, clamped to `[0, 7]`.
    /// Non-finite deltas fall into the zero-change bucket.
    pub fn bucket(delta: f64) -> usize {
        if !delta.is_finite() {
            return 4;
        }
        let width = 2.0 * PI / 8.0;
        ((delta / width).floor() + 4.0).clamp(0.0, 7.0) as usize
    }

    pub fn record(&mut self, delta: f64) {
        self.counts[Self::bucket(delta)] += 1;
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        PARTITION_LABELS
            .iter()
            .position(|&l| l == label)
            .map(|idx| self.counts[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        PARTITION_LABELS.iter().copied().zip(self.counts.iter().copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Concordance {
    pub ratio: f64,
    pub classification: ClassificationCounts,
    pub partition: PartitionHistogram,
    /// Number of consecutive pairs whose angular change was not finite.
    pub invalid_angles: usize,
}

/// Every statistic computed for one interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalMetrics {
    pub window: IndexWindow,
    pub concordance: f64,
    pub classification: ClassificationCounts,
    pub partition: PartitionHistogram,
    pub precision: f64,
    pub residual: f64,
    pub reliability: f64,
    pub anomalies: Vec<NumericAnomaly>,
}

impl IntervalMetrics {
    pub fn is_finite(&self) -> bool {
        self.anomalies.is_empty()
    }
}

fn powered(value: f64, norm: f64) -> f64 {
    value.abs().powf(norm)
}

/// Evaluates the statistics with the thresholds and exponents of one configuration.
#[derive(Debug, Clone, Copy)]
pub struct ModelMetrics {
    length: usize,
    dx: f64,
    quantisation_factor: f64,
    concordance_norm: f64,
    condition_exponent: f64,
    multiplier: f64,
}

impl ModelMetrics {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            length: config.length,
            dx: config.dx,
            quantisation_factor: config.quantisation_factor,
            concordance_norm: config.concordance_norm,
            condition_exponent: config.condition_exponent,
            multiplier: config.precision_multiplier,
        }
    }

    /// Polar angle of `(loop_index(i), u[i])`, measured from the x axis.
    fn polar_angle(&self, i: usize, u: f64) -> f64 {
        let point = Vector2::new(loop_index(i, self.dx, self.length), u);
        // rotation_between maps a degenerate point to the identity.
        if !point.iter().all(|c| c.is_finite()) {
            return f64::NAN;
        }
        UnitComplex::rotation_between(&Vector2::x(), &point).angle()
    }

    /// Ratio of powered gradient magnitude to powered flow magnitude, plus the
    /// classification and partition counters over the same window.
    ///
    /// `sensitivities` is the gradient seen from offset 1 (see
    /// [`FlowArrays::sensitivities`]), so `sensitivities[i]` pairs with `u[i]`.
    pub fn concordance(&self, u: &[f64], sensitivities: &[f64], window: IndexWindow) -> Concordance {
        let window = window.clamp_to(u.len());
        let norm = self.concordance_norm;
        let threshold = powered(self.quantisation_factor, norm);

        let mut classification = ClassificationCounts::default();
        let mut flow = 0.0;
        for &value in &u[window.start..window.end] {
            let p = powered(value, norm);
            flow += p;
            if p >= threshold {
                classification.quantized += 1;
            } else {
                classification.non_quantized += 1;
            }
        }

        let grad_end = window.end.min(sensitivities.len());
        let grad_start = window.start.min(grad_end);
        let gradient: f64 = sensitivities[grad_start..grad_end]
            .iter()
            .map(|&g| powered(g, norm))
            .sum();

        let mut partition = PartitionHistogram::default();
        let mut invalid_angles = 0;
        for i in window.start..window.end.saturating_sub(1) {
            let delta = self.polar_angle(i + 1, u[i + 1]) - self.polar_angle(i, u[i]);
            if !delta.is_finite() {
                invalid_angles += 1;
            }
            partition.record(delta);
        }

        Concordance {
            ratio: gradient / flow,
            classification,
            partition,
            invalid_angles,
        }
    }

    /// `|model[i] - u[i]| * multiplier` for every index in the window.
    pub fn precision(&self, u: &[f64], model: &[f64], window: IndexWindow) -> Vec<f64> {
        let window = window.clamp_to(u.len().min(model.len()));
        u[window.start..window.end]
            .iter()
            .zip(&model[window.start..window.end])
            .map(|(&u, &m)| (m - u).abs() * self.multiplier)
            .collect()
    }

    /// Mean of `(1 - min(precision / multiplier, 1))^exponent`.
    pub fn reliability(&self, precision: &[f64]) -> f64 {
        if precision.is_empty() {
            return 1.0;
        }
        let total: f64 = precision
            .iter()
            .map(|&p| (1.0 - (p / self.multiplier).min(1.0)).powf(self.condition_exponent))
            .sum();
        total / precision.len() as f64
    }

    /// Sum of `|u[i+1] - u[i]|^norm / ((u[i+1] + u[i]) / 2)` over consecutive pairs.
    pub fn residual_error(&self, u: &[f64], window: IndexWindow) -> f64 {
        let window = window.clamp_to(u.len());
        let norm = self.condition_exponent;
        (window.start..window.end.saturating_sub(1))
            .map(|i| powered(u[i + 1] - u[i], norm) / ((u[i + 1] + u[i]) / 2.0))
            .sum()
    }

    pub fn evaluate(&self, arrays: &FlowArrays, window: IndexWindow) -> IntervalMetrics {
        let window = window.clamp_to(arrays.len());
        let concordance = self.concordance(&arrays.u, arrays.sensitivities(), window);
        let precision_values = self.precision(&arrays.u, &arrays.model, window);
        let precision = mean(&precision_values);
        let reliability = self.reliability(&precision_values);
        let residual = self.residual_error(&arrays.u, window);

        let mut anomalies = Vec::new();
        for (metric, value) in [
            (Metric::Concordance, concordance.ratio),
            (Metric::Precision, precision),
            (Metric::Residual, residual),
            (Metric::Reliability, reliability),
        ] {
            if !value.is_finite() {
                anomalies.push(NumericAnomaly {
                    metric,
                    window,
                    value,
                });
            }
        }
        if concordance.invalid_angles > 0 {
            anomalies.push(NumericAnomaly {
                metric: Metric::Partition,
                window,
                value: f64::NAN,
            });
        }

        IntervalMetrics {
            window,
            concordance: concordance.ratio,
            classification: concordance.classification,
            partition: concordance.partition,
            precision,
            residual,
            reliability,
            anomalies,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
