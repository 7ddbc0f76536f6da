use crate::metrics::IndexWindow;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Invalid run parameters, detected before any simulation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("length must be at least {minimum}, got {length}")]
    LengthTooShort { length: usize, minimum: usize },
    #[error("number of intervals must be at least 1")]
    ZeroIntervals,
    #[error("length {length} is too small for {n_intervals} intervals")]
    IntervalsExceedLength { length: usize, n_intervals: usize },
    #[error("{name} exponent {value} is out of range")]
    ExponentOutOfRange { name: &'static str, value: u32 },
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },
    #[error("{name} must be non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Concordance,
    Partition,
    Precision,
    Residual,
    Reliability,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Concordance => "concordance",
            Metric::Partition => "partition",
            Metric::Precision => "precision",
            Metric::Residual => "residual",
            Metric::Reliability => "reliability",
        };
        f.write_str(name)
    }
}

/// A non-finite metric value produced inside an index window.
#[derive(Debug, Clone, Copy, PartialEq, Error, Serialize, Deserialize)]
#[error("non-finite {metric} ({value}) in window {}..{}", .window.start, .window.end)]
pub struct NumericAnomaly {
    pub metric: Metric,
    pub window: IndexWindow,
    pub value: f64,
}
