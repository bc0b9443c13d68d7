//! Finding the smallest feasible period for each lock
use spinrta::{AnalysisConfig, AnalysisError, Analyzer, SpinlockPolicy, Time};
use spinrta_bounds::{FixedPriorityRta, SpinBounds};

use crate::{
    experiment::{Experiment, LockSpec},
    search,
};

/// How the schedulability of each candidate period is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum Mode {
    /// Compute blocking once, assuming every response time equals the
    /// period.
    Single,
    /// Iterate blocking bounds and response-time analysis until the response
    /// times settle.
    Iterative,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SweepOpt {
    pub mode: Mode,
    pub lo: Time,
    pub hi: Time,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, thiserror::Error)]
#[error("Could not analyze the lock '{name}' at period {period}.")]
pub(crate) struct SweepError {
    name: String,
    period: Time,
    #[source]
    source: AnalysisError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SweepResult {
    pub name: String,
    pub policy: SpinlockPolicy,
    /// The smallest feasible period. `None` if no period in the searched
    /// range is feasible.
    pub period: Option<Time>,
}

/// Find the smallest feasible period for every lock in `experiment`, sorted
/// by the period (infeasible locks last).
pub(crate) fn sweep(
    experiment: &Experiment,
    opt: &SweepOpt,
) -> Result<Vec<SweepResult>, SweepError> {
    let mut results = experiment
        .locks
        .iter()
        .map(|lock| {
            let period = min_period(experiment, lock, opt)?;
            log::debug!("{}: smallest feasible period = {period:?}", lock.name);
            Ok(SweepResult {
                name: lock.name.clone(),
                policy: lock.policy(),
                period,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    results.sort_by_key(|r| (r.period.is_none(), r.period));
    Ok(results)
}

fn min_period(
    experiment: &Experiment,
    lock: &LockSpec,
    opt: &SweepOpt,
) -> Result<Option<Time>, SweepError> {
    let locks = lock.assignment();
    let analyzer =
        Analyzer::new(&locks, SpinBounds, FixedPriorityRta).with_config(opt.analysis);
    log::debug!("{}: searching {}..={} ({:?})", lock.name, opt.lo, opt.hi, opt.mode);

    search::lower_bound(opt.lo, opt.hi, |period| {
        let mut tasks = experiment.task_set(period);
        let schedulable = match opt.mode {
            Mode::Single => analyzer.is_schedulable(&mut tasks, None),
            Mode::Iterative => analyzer
                .converge(&mut tasks, None)
                .map(|convergence| convergence.is_schedulable()),
        }
        .map_err(|source| SweepError {
            name: lock.name.clone(),
            period,
            source,
        })?;
        log::trace!("{}: period {period}: schedulable = {schedulable}", lock.name);
        Ok(schedulable)
    })
}
