use clap::Parser;
use spinrta::{AnalysisConfig, ResponseTimeSeed, Time, DEFAULT_MAX_ITERATIONS};
use std::path::PathBuf;
use thiserror::Error;

mod experiment;
mod report;
mod search;
mod sweep;
mod utils;

fn main() {
    env_logger::from_env(env_logger::Env::default().default_filter_or("spinrta_sweep=info"))
        .init();

    if let Err(e) = main_inner() {
        log::error!("Command failed.\n{:?}", e);
        std::process::exit(1);
    }
}

#[derive(Error, Debug)]
enum MainError {
    #[error("Could not load the experiment.")]
    LoadExperiment(#[source] experiment::ExperimentLoadError),
    #[error("Could not complete the sweep.")]
    Sweep(#[source] sweep::SweepError),
    #[error("Could not export the results.")]
    WriteCsv(#[source] report::WriteCsvError),
    #[error("The search range {0}..={1} is empty.")]
    BadRange(Time, Time),
    #[error("The search range must not include a zero period.")]
    ZeroPeriod,
}

/// Compares spinlock implementations by the smallest period at which a task
/// set remains schedulable
#[derive(Parser)]
#[command(version)]
struct Opt {
    /// Experiment description (TOML). The built-in experiment is used if
    /// omitted
    experiment: Option<PathBuf>,
    /// How to decide the schedulability of each period
    #[arg(short = 'm', long = "mode", value_enum, default_value = "single")]
    mode: sweep::Mode,
    /// The smallest period to try (at least 1)
    #[arg(long = "lo", default_value = "1")]
    lo: Time,
    /// The largest period to try
    #[arg(long = "hi", default_value = "100000")]
    hi: Time,
    /// Give up on the iterative analysis after this many rounds
    #[arg(long = "max-iterations", default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,
    /// Also write the results to this CSV file
    #[arg(long = "csv")]
    csv: Option<PathBuf>,
}

fn main_inner() -> anyhow::Result<()> {
    // Parse arguments
    let opt = Opt::parse();

    check_range(opt.lo, opt.hi)?;

    // Load the experiment
    let experiment = match &opt.experiment {
        Some(path) => {
            experiment::Experiment::load(path).map_err(MainError::LoadExperiment)?
        }
        None => {
            log::debug!("No experiment was specified; using the built-in one");
            experiment::Experiment::builtin()
        }
    };
    log::info!(
        "Comparing {} lock(s) on {} task(s)",
        experiment.locks.len(),
        experiment.tasks.len()
    );

    // Search
    let sweep_opt = sweep::SweepOpt {
        mode: opt.mode,
        lo: opt.lo,
        hi: opt.hi,
        analysis: AnalysisConfig {
            max_iterations: opt.max_iterations,
            seed: ResponseTimeSeed::Keep,
            ..AnalysisConfig::default()
        },
    };
    let results = sweep::sweep(&experiment, &sweep_opt).map_err(MainError::Sweep)?;

    // Report
    report::print_summary(std::io::stdout().lock(), &results)?;

    if let Some(path) = &opt.csv {
        report::write_csv_file(path, &results).map_err(MainError::WriteCsv)?;
        log::info!("Wrote the results to '{}'", path.display());
    }

    Ok(())
}

fn check_range(lo: Time, hi: Time) -> Result<(), MainError> {
    if lo == 0 {
        Err(MainError::ZeroPeriod)
    } else if lo > hi {
        Err(MainError::BadRange(lo, hi))
    } else {
        Ok(())
    }
}
