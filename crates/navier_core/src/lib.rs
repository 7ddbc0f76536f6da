//! The `navier_core` crate simulates a one-dimensional flow quantity over a discretized
//! interval and scores it against a differentiable force model.
//!
//! Key components:
//! - **Autodiff**: a reverse-mode tape used to differentiate the series and force terms.
//! - **Series / Force**: the fifth-power time series, its weighted power series and the
//!   estimated force with its combined sensitivity.
//! - **Interpolation**: the fixed calibration curve and index-to-curve mapping.
//! - **Integrator**: the explicit per-index velocity/flow recurrence.
//! - **Metrics**: concordance, classification, partition histogram, precision,
//!   residual error and reliability over index windows.
//! - **Driver**: timed trials with warm-up handling and mean/std aggregation.

pub mod autodiff;
pub mod config;
pub mod driver;
pub mod error;
pub mod force;
pub mod integrator;
pub mod interpolation;
pub mod metrics;
pub mod series;
pub mod traits;

pub use config::{ExperimentOptions, ModelConstants, SimulationConfig};
pub use driver::{
    run_experiment, DriverSettings, ExperimentOutcome, ExperimentRunner, ExperimentSummary,
    TrialReport,
};
#[cfg(feature = "parallel")]
pub use driver::run_experiment_parallel;
pub use error::{ConfigError, Metric, NumericAnomaly};
pub use integrator::{FlowArrays, FlowIntegrator};
pub use metrics::{IndexWindow, IntervalMetrics, ModelMetrics};
