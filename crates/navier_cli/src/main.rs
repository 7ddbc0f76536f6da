//! navier - timed flow-integration experiment
//!
//! Usage:
//!   navier                       # 2^10 samples split into 2^8 intervals
//!   navier -n 12 -i 4 --json     # machine-readable output
//!   navier --parallel            # run trials on all cores

use anyhow::Result;
use clap::Parser;
use log::info;
use navier_core::driver::ExperimentOutcome;
use navier_core::metrics::PARTITION_LABELS;
use navier_core::{DriverSettings, ExperimentOptions, ExperimentRunner, TrialReport};

#[derive(Parser)]
#[command(name = "navier")]
#[command(about = "Numerical integration of a 1-D flow quantity against an autodiff force model")]
#[command(version)]
struct Cli {
    /// log2 of the number of intervals
    #[arg(short, long, default_value_t = 8)]
    intervals: u32,

    /// log2 of the number of spatial samples
    #[arg(short = 'n', long, default_value_t = 10)]
    iterations: u32,

    /// Classification threshold (defaults to 3.49e-5)
    #[arg(short, long)]
    quantisation_factor: Option<f64>,

    /// Exponent of the residual error and reliability
    #[arg(short, long, default_value_t = 2.0)]
    condition_factor: f64,

    /// Precision scale factor
    #[arg(short, long, default_value_t = 1.0)]
    multiplier: f64,

    /// Leading trials excluded from the averages
    #[arg(long, default_value_t = 3)]
    skip: usize,

    /// Abort on the first non-finite metric
    #[arg(long)]
    strict: bool,

    /// Run trials on the rayon thread pool
    #[arg(long)]
    parallel: bool,

    /// Print reports and summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let options = ExperimentOptions {
        intervals: cli.intervals,
        iterations: cli.iterations,
        quantisation_factor: cli.quantisation_factor,
        condition_factor: cli.condition_factor,
        multiplier: cli.multiplier,
    };
    let config = options.into_config()?;
    let settings = DriverSettings {
        skip_trials: cli.skip,
        strict_numerics: cli.strict,
    };
    info!("{:?}", config);

    if cli.json {
        let outcome = run(config, settings, cli.parallel)?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!(
        "\nNumerical integration with length={} over {} intervals",
        config.length, config.n_intervals
    );
    print_header();

    let summary = if cli.parallel {
        let outcome = run(config, settings, true)?;
        outcome.reports.iter().for_each(print_report);
        outcome.summary
    } else {
        // Stream rows as trials complete.
        let mut runner = ExperimentRunner::new(config, settings)?;
        while !runner.is_done() {
            for report in runner.run_trials(1)? {
                print_report(&report);
            }
        }
        runner.summary()
    };

    println!("{}", "-".repeat(60));
    println!("Average performance ({} trials):", summary.counted_trials);
    match (summary.time_ms, summary.throughput_gsteps) {
        (Some(time), Some(throughput)) => println!(
            "{:8}   {:8.3}+-{:.3} ms   {:8.3}+-{:.3} GSteps/s",
            "", time.mean, time.std_dev, throughput.mean, throughput.std_dev
        ),
        (Some(time), None) => println!("{:8}   {:8.3}+-{:.3} ms", "", time.mean, time.std_dev),
        _ => println!("{:8}   no trials after warm-up", ""),
    }
    println!("{}", "-".repeat(60));
    println!("* - warm-up, not included in average\n");
    Ok(())
}

fn run(
    config: navier_core::SimulationConfig,
    settings: DriverSettings,
    parallel: bool,
) -> Result<ExperimentOutcome> {
    if parallel {
        navier_core::run_experiment_parallel(config, settings)
    } else {
        navier_core::run_experiment(config, settings)
    }
}

fn print_header() {
    println!(
        "{:>5} {:>12} {:>12} {:>12} {:>11} {:>12} {:>12} {:>12}  {}",
        "Step",
        "Time, ms",
        "GSteps/s",
        "Concordance",
        "Quantized",
        "Precision",
        "Residual",
        "Reliability",
        PARTITION_LABELS.join("/")
    );
}

fn print_report(report: &TrialReport) {
    let m = &report.metrics;
    let throughput = report
        .throughput_gsteps
        .map(|t| format!("{:12.3}", t))
        .unwrap_or_else(|| format!("{:>12}", "-"));
    let counts = m.classification.as_array();
    let partition: Vec<String> = m.partition.counts.iter().map(|c| c.to_string()).collect();
    println!(
        "{:5} {:12.3} {} {:12.3e} {:>11} {:12.3e} {:12.3e} {:12.3e}  {}{}",
        report.step,
        report.elapsed_ms,
        throughput,
        m.concordance,
        format!("{}/{}", counts[0], counts[1]),
        m.precision,
        m.residual,
        m.reliability,
        partition.join("/"),
        if report.warm_up { " *" } else { "" }
    );
}
