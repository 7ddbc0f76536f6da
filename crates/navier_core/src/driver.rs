//! Repeated timed trials over the interval windows.

use crate::config::SimulationConfig;
use crate::integrator::FlowIntegrator;
use crate::metrics::{IndexWindow, IntervalMetrics, ModelMetrics};
use crate::traits::Stopwatch;
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    /// Leading trials treated as warm-up and left out of the statistics.
    pub skip_trials: usize,
    /// Abort on the first non-finite metric instead of reporting it.
    pub strict_numerics: bool,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            skip_trials: 3,
            strict_numerics: false,
        }
    }
}

/// Result of one timed integration run and its interval statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialReport {
    pub step: usize,
    pub warm_up: bool,
    pub elapsed_ms: f64,
    /// GSteps/s; `None` when the clock did not advance during the run.
    pub throughput_gsteps: Option<f64>,
    pub window: IndexWindow,
    pub metrics: IntervalMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanStd {
    pub mean: f64,
    pub std_dev: f64,
}

/// Running sum and sum of squares.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    sum: f64,
    sum_sq: f64,
    count: usize,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.sum_sq += value * value;
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean_std(&self) -> Option<MeanStd> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        Some(MeanStd {
            mean,
            std_dev: variance.sqrt(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub trials: usize,
    pub counted_trials: usize,
    pub time_ms: Option<MeanStd>,
    pub throughput_gsteps: Option<MeanStd>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentProgress {
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentOutcome {
    pub reports: Vec<TrialReport>,
    pub summary: ExperimentSummary,
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct InstantClock {
    origin: Instant,
}

impl Default for InstantClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Stopwatch for InstantClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1.0e3
    }
}

/// Giga-steps per second for `steps` integration steps taking `elapsed_ms`.
pub fn throughput_gsteps(steps: usize, elapsed_ms: f64) -> Option<f64> {
    if elapsed_ms > 0.0 {
        Some(steps as f64 * 1.0e-9 / (elapsed_ms * 1.0e-3))
    } else {
        None
    }
}

struct TrialContext<'a> {
    config: &'a SimulationConfig,
    settings: &'a DriverSettings,
    integrator: &'a FlowIntegrator,
    metrics: &'a ModelMetrics,
}

impl TrialContext<'_> {
    fn execute(&self, step: usize, clock: &impl Stopwatch) -> Result<TrialReport> {
        let t0 = clock.now_ms();
        let arrays = self.integrator.run();
        let t1 = clock.now_ms();
        let elapsed_ms = (t1 - t0).max(0.0);

        let window =
            IndexWindow::for_interval(step - 1, self.config.n_intervals, self.config.length)?;
        let metrics = self.metrics.evaluate(&arrays, window);
        screen_anomalies(step, &metrics, self.settings)?;

        let report = TrialReport {
            step,
            warm_up: step <= self.settings.skip_trials,
            elapsed_ms,
            throughput_gsteps: throughput_gsteps(self.config.length, elapsed_ms),
            window,
            metrics,
        };
        debug!(
            "trial {} window {}..{}: {:.3} ms, concordance {:e}",
            step, window.start, window.end, elapsed_ms, report.metrics.concordance
        );
        Ok(report)
    }
}

/// Logs every anomaly of a trial; in strict mode the first one is an error.
fn screen_anomalies(step: usize, metrics: &IntervalMetrics, settings: &DriverSettings) -> Result<()> {
    for anomaly in &metrics.anomalies {
        warn!("trial {step}: {anomaly}");
        if settings.strict_numerics {
            return Err(anyhow::Error::new(*anomaly))
                .with_context(|| format!("Trial {step} produced a non-finite metric."));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulators {
    time: RunningStats,
    throughput: RunningStats,
}

impl Accumulators {
    fn record(&mut self, report: &TrialReport) {
        if report.warm_up {
            return;
        }
        self.time.push(report.elapsed_ms);
        if let Some(throughput) = report.throughput_gsteps {
            self.throughput.push(throughput);
        }
    }

    fn summary(&self, trials: usize) -> ExperimentSummary {
        ExperimentSummary {
            trials,
            counted_trials: self.time.count(),
            time_ms: self.time.mean_std(),
            throughput_gsteps: self.throughput.mean_std(),
        }
    }
}

/// Stepped experiment: one trial per interval, run in batches.
pub struct ExperimentRunner<C: Stopwatch = InstantClock> {
    config: SimulationConfig,
    settings: DriverSettings,
    clock: C,
    integrator: FlowIntegrator,
    metrics: ModelMetrics,
    next_step: usize,
    completed: usize,
    accumulators: Accumulators,
}

impl ExperimentRunner {
    pub fn new(config: SimulationConfig, settings: DriverSettings) -> Result<Self> {
        Self::with_clock(config, settings, InstantClock::default())
    }
}

impl<C: Stopwatch> ExperimentRunner<C> {
    pub fn with_clock(config: SimulationConfig, settings: DriverSettings, clock: C) -> Result<Self> {
        config
            .validate()
            .context("Invalid simulation configuration.")?;

        info!(
            "experiment: length {}, {} intervals, {} warm-up trials",
            config.length, config.n_intervals, settings.skip_trials
        );

        Ok(Self {
            config,
            settings,
            clock,
            integrator: FlowIntegrator::new(config),
            metrics: ModelMetrics::new(&config),
            next_step: 1,
            completed: 0,
            accumulators: Accumulators::default(),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn total_trials(&self) -> usize {
        self.config.n_intervals
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total_trials()
    }

    pub fn progress(&self) -> ExperimentProgress {
        ExperimentProgress {
            completed: self.completed,
            total: self.total_trials(),
        }
    }

    /// Runs up to `batch_size` further trials and returns their reports.
    ///
    /// A batch is recorded only once all of its trials succeed; after an error
    /// the progress and statistics are those from before the batch.
    pub fn run_trials(&mut self, batch_size: usize) -> Result<Vec<TrialReport>> {
        if batch_size == 0 {
            bail!("batch_size must be at least 1.");
        }

        let context = TrialContext {
            config: &self.config,
            settings: &self.settings,
            integrator: &self.integrator,
            metrics: &self.metrics,
        };

        let remaining = self.total_trials().saturating_sub(self.completed);
        let first = self.next_step;
        let reports = (first..first + batch_size.min(remaining))
            .map(|step| context.execute(step, &self.clock))
            .collect::<Result<Vec<_>>>()?;

        for report in &reports {
            self.accumulators.record(report);
        }
        self.next_step += reports.len();
        self.completed += reports.len();
        Ok(reports)
    }

    pub fn summary(&self) -> ExperimentSummary {
        self.accumulators.summary(self.completed)
    }

    pub fn run_to_completion(mut self) -> Result<ExperimentOutcome> {
        let mut reports = Vec::with_capacity(self.total_trials());
        while !self.is_done() {
            reports.extend(self.run_trials(self.total_trials())?);
        }
        Ok(ExperimentOutcome {
            reports,
            summary: self.summary(),
        })
    }
}

pub fn run_experiment(config: SimulationConfig, settings: DriverSettings) -> Result<ExperimentOutcome> {
    ExperimentRunner::new(config, settings)?.run_to_completion()
}

/// Runs every trial on the rayon pool and reduces the statistics afterwards.
#[cfg(feature = "parallel")]
pub fn run_experiment_parallel(
    config: SimulationConfig,
    settings: DriverSettings,
) -> Result<ExperimentOutcome> {
    use rayon::prelude::*;

    config
        .validate()
        .context("Invalid simulation configuration.")?;
    info!(
        "parallel experiment: length {}, {} intervals on {} threads",
        config.length,
        config.n_intervals,
        rayon::current_num_threads()
    );

    let integrator = FlowIntegrator::new(config);
    let metrics = ModelMetrics::new(&config);
    let context = TrialContext {
        config: &config,
        settings: &settings,
        integrator: &integrator,
        metrics: &metrics,
    };
    let clock = InstantClock::default();

    let reports = (1..=config.n_intervals)
        .into_par_iter()
        .map(|step| context.execute(step, &clock))
        .collect::<Result<Vec<_>>>()?;

    let mut accumulators = Accumulators::default();
    for report in &reports {
        accumulators.record(report);
    }

    Ok(ExperimentOutcome {
        summary: accumulators.summary(reports.len()),
        reports,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        run_experiment, screen_anomalies, throughput_gsteps, DriverSettings, ExperimentRunner,
        RunningStats,
    };
    use crate::config::SimulationConfig;
    use crate::error::Metric;
    use crate::integrator::FlowArrays;
    use crate::metrics::{IndexWindow, ModelMetrics};
    use crate::traits::Stopwatch;
    use std::cell::Cell;

    /// Advances by a fixed amount every time it is read.
    struct TickClock {
        now: Cell<f64>,
        tick: f64,
    }

    impl TickClock {
        fn new(tick: f64) -> Self {
            Self {
                now: Cell::new(0.0),
                tick,
            }
        }
    }

    impl Stopwatch for TickClock {
        fn now_ms(&self) -> f64 {
            let now = self.now.get();
            self.now.set(now + self.tick);
            now
        }
    }

    fn small_config(n_intervals: usize) -> SimulationConfig {
        SimulationConfig {
            length: 128,
            n_intervals,
            ..SimulationConfig::default()
        }
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err:#}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn running_stats_mean_and_std() {
        let mut stats = RunningStats::default();
        assert!(stats.mean_std().is_none());
        for value in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.push(value);
        }
        let result = stats.mean_std().expect("stats");
        assert!((result.mean - 5.0).abs() < 1e-12);
        assert!((result.std_dev - 2.0).abs() < 1e-12);
        assert_eq!(stats.count(), 8);
    }

    #[test]
    fn throughput_requires_elapsed_time() {
        assert_eq!(throughput_gsteps(1000, 0.0), None);
        let t = throughput_gsteps(1_000_000, 1.0).expect("throughput");
        assert!((t - 1.0).abs() < 1e-12);
    }

    #[test]
    fn warm_up_trials_are_excluded() {
        let runner = ExperimentRunner::with_clock(
            small_config(8),
            DriverSettings::default(),
            TickClock::new(2.0),
        )
        .expect("runner");
        let outcome = runner.run_to_completion().expect("outcome");

        assert_eq!(outcome.reports.len(), 8);
        assert_eq!(outcome.summary.trials, 8);
        assert_eq!(outcome.summary.counted_trials, 5);
        let warm: Vec<_> = outcome.reports.iter().map(|r| r.warm_up).collect();
        assert_eq!(warm, [true, true, true, false, false, false, false, false]);

        let time = outcome.summary.time_ms.expect("time");
        assert!((time.mean - 2.0).abs() < 1e-12);
        assert!(time.std_dev.abs() < 1e-6);
        let throughput = outcome.summary.throughput_gsteps.expect("throughput");
        assert!((throughput.mean - 128.0e-9 / 2.0e-3).abs() < 1e-15);
    }

    #[test]
    fn trials_walk_the_interval_windows() {
        let outcome = ExperimentRunner::with_clock(
            small_config(4),
            DriverSettings::default(),
            TickClock::new(1.0),
        )
        .expect("runner")
        .run_to_completion()
        .expect("outcome");

        for (k, report) in outcome.reports.iter().enumerate() {
            assert_eq!(report.step, k + 1);
            assert_eq!(report.window.start, k * 32);
            assert_eq!(report.window.end, (k + 1) * 32);
            assert_eq!(report.metrics.classification.total(), 32);
            assert_eq!(report.metrics.partition.total(), 31);
        }
    }

    #[test]
    fn runner_steps_in_batches() {
        let mut runner = ExperimentRunner::with_clock(
            small_config(4),
            DriverSettings::default(),
            TickClock::new(1.0),
        )
        .expect("runner");

        assert!(!runner.is_done());
        assert_eq!(runner.run_trials(3).expect("batch").len(), 3);
        assert_eq!(runner.progress().completed, 3);
        assert_eq!(runner.run_trials(3).expect("batch").len(), 1);
        assert!(runner.is_done());
        assert!(runner.run_trials(1).expect("batch").is_empty());
        assert_err_contains(runner.run_trials(0), "batch_size");
        assert_eq!(runner.summary().counted_trials, 1);
    }

    #[test]
    fn too_few_trials_yield_no_statistics() {
        let outcome = ExperimentRunner::with_clock(
            small_config(2),
            DriverSettings::default(),
            TickClock::new(1.0),
        )
        .expect("runner")
        .run_to_completion()
        .expect("outcome");
        assert_eq!(outcome.summary.counted_trials, 0);
        assert!(outcome.summary.time_ms.is_none());
        assert!(outcome.summary.throughput_gsteps.is_none());
    }

    #[test]
    fn invalid_configuration_aborts_before_simulation() {
        let config = SimulationConfig {
            length: 50,
            n_intervals: 1,
            ..SimulationConfig::default()
        };
        assert_err_contains(
            run_experiment(config, DriverSettings::default()),
            "length must be at least 100",
        );
    }

    #[test]
    fn strict_numerics_abort_on_anomalies() {
        // With p = 0 the velocity never changes, u stays at zero and the
        // concordance ratio diverges.
        let config = SimulationConfig {
            p: 0.0,
            ..small_config(4)
        };
        let settings = DriverSettings {
            strict_numerics: true,
            ..DriverSettings::default()
        };
        let result = ExperimentRunner::with_clock(config, settings, TickClock::new(1.0))
            .expect("runner")
            .run_to_completion();
        assert_err_contains(result, "non-finite");

        let lenient = ExperimentRunner::with_clock(
            config,
            DriverSettings::default(),
            TickClock::new(1.0),
        )
        .expect("runner")
        .run_to_completion()
        .expect("outcome");
        assert!(lenient.reports.iter().all(|r| !r.metrics.anomalies.is_empty()));
    }

    #[test]
    fn failed_batch_leaves_progress_unchanged() {
        let config = SimulationConfig {
            p: 0.0,
            ..small_config(4)
        };
        let settings = DriverSettings {
            strict_numerics: true,
            ..DriverSettings::default()
        };
        let mut runner =
            ExperimentRunner::with_clock(config, settings, TickClock::new(1.0)).expect("runner");
        assert_err_contains(runner.run_trials(3), "Trial 1");
        assert_eq!(runner.progress().completed, 0);
        assert_eq!(runner.summary().trials, 0);
        assert!(!runner.is_done());
    }

    #[test]
    fn strict_numerics_reject_broken_partition() {
        let config = small_config(1);
        let arrays = FlowArrays {
            u: vec![1.0, f64::NAN, 2.0, 3.0],
            model: vec![1.0; 4],
            grad: vec![0.0, 1.0, 1.0, 1.0],
        };
        let mut metrics =
            ModelMetrics::new(&config).evaluate(&arrays, IndexWindow { start: 0, end: 4 });
        assert_eq!(metrics.partition.total(), 3);
        metrics.anomalies.retain(|a| a.metric == Metric::Partition);
        assert_eq!(metrics.anomalies.len(), 1);

        assert!(screen_anomalies(2, &metrics, &DriverSettings::default()).is_ok());
        let strict = DriverSettings {
            strict_numerics: true,
            ..DriverSettings::default()
        };
        assert_err_contains(screen_anomalies(2, &metrics, &strict), "Trial 2");
        assert_err_contains(screen_anomalies(2, &metrics, &strict), "non-finite partition");
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_run_matches_sequential_metrics() {
        let config = small_config(8);
        let sequential = run_experiment(config, DriverSettings::default()).expect("sequential");
        let parallel =
            super::run_experiment_parallel(config, DriverSettings::default()).expect("parallel");

        assert_eq!(parallel.reports.len(), sequential.reports.len());
        for (a, b) in parallel.reports.iter().zip(&sequential.reports) {
            assert_eq!(a.step, b.step);
            assert_eq!(a.window, b.window);
            assert_eq!(a.metrics, b.metrics);
        }
        assert_eq!(parallel.summary.counted_trials, 5);
    }
}
