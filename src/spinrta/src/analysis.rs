//! The schedulability analysis
//!
//! # Convergence
//!
//! Blocking depends on response times (a longer response time leaves more
//! room for remote critical sections to get in the way), and response times
//! depend on blocking. [`Analyzer::converge`] resolves this by iterating:
//!
//! ```text
//!             charge overheads, save baseline
//!   Init ───────────────────────────────────────▶ Iterating
//!                                                   │  ▲
//!     restore baseline, apply bounds, test every    │  │ response times
//!     partition                                     │  │ changed
//!                                                   ▼  │
//!                          ┌──────────────────── compare ───────────────┐
//!                          │ a partition failed     │ nothing changed   │ too many
//!                          ▼                        ▼                   ▼ iterations
//!                        Failed                   Stable             Diverged
//! ```
//!
//! If the bounds are monotonic in the response-time estimates, every round
//! moves all estimates in the same direction as the first round did, so the
//! loop terminates in at most as many rounds as there are distinct response
//! times below the deadlines. When starting from the deadlines
//! ([`ResponseTimeSeed::Deadline`]) the estimates can only shrink. When
//! starting from the costs ([`ResponseTimeSeed::Cost`]) they can only grow
//! and the loop finds the least fixed point.
//!
//! [`ResponseTimeSeed::Keep`] gives no such guarantee. If some caller-provided
//! estimates are above a fixed point and others below it, even monotonic
//! bounds can make the estimates swap back and forth until the loop reports
//! [`AnalysisError::Diverged`].
use itertools::Itertools;

use crate::{
    error::AnalysisError,
    model::{PartitionId, TaskSet},
    policy::{BlockingBounds, SpinlockPolicy},
    registry::LockAssignment,
    sched::SchedulabilityTest,
};

/// The default value of [`AnalysisConfig::max_iterations`].
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// The initial response-time estimates used by [`Analyzer::converge`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTimeSeed {
    /// Use [`Task::response_time`](crate::Task::response_time) as set by the
    /// caller. Tasks without one start from their deadline.
    ///
    /// The estimates should all be upper bounds (e.g., the response times of
    /// an earlier analysis with smaller blocking) or all lower bounds. Mixed
    /// estimates may cycle even with monotonic blocking bounds, in which case
    /// [`Analyzer::converge`] returns [`AnalysisError::Diverged`].
    #[default]
    Keep,
    /// Start every task from its deadline.
    Deadline,
    /// Start every task from its cost (including lock overheads).
    Cost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// The number of processors in each partition.
    pub cpus_per_partition: usize,
    /// The maximum number of rounds [`Analyzer::converge`] may take.
    pub max_iterations: usize,
    pub seed: ResponseTimeSeed,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cpus_per_partition: 1,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: ResponseTimeSeed::Keep,
        }
    }
}

/// The result of [`Analyzer::converge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The response times reached a fixed point and every partition passed
    /// the schedulability test.
    Stable,
    /// The schedulability test rejected `partition` (the one with the lowest
    /// ID if there were many).
    Failed { partition: PartitionId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Convergence {
    pub outcome: Outcome,
    /// The number of rounds taken, including the final one.
    pub iterations: usize,
}

impl Convergence {
    #[inline]
    pub fn is_schedulable(&self) -> bool {
        self.outcome == Outcome::Stable
    }
}

/// Non-terminal states of [`Analyzer::converge`]
#[derive(Debug, Clone, Copy)]
enum State {
    Init,
    Iterating { iteration: usize },
}

/// Performs schedulability analysis using the specified collaborators.
///
///  - `locks` determines the overheads charged for each resource.
///  - `bounds` computes the blocking. Only one discipline's bound is used per
///    analysis, that of the policy passed to [`Self::is_schedulable`] or
///    [`Self::converge`] (or `locks`'s default policy).
///  - `test` decides the schedulability of each partition.
///
/// `locks` stays borrowed for the lifetime of the analyzer, so it can't be
/// reassigned while an analysis is in progress.
pub struct Analyzer<'a, B, T> {
    locks: &'a LockAssignment,
    bounds: B,
    test: T,
    config: AnalysisConfig,
}

impl<'a, B, T> Analyzer<'a, B, T>
where
    B: BlockingBounds,
    T: SchedulabilityTest,
{
    pub fn new(locks: &'a LockAssignment, bounds: B, test: T) -> Self {
        Self {
            locks,
            bounds,
            test,
            config: AnalysisConfig::default(),
        }
    }

    /// Returns the analyzer with the configuration `config`.
    pub fn with_config(self, config: AnalysisConfig) -> Self {
        Self { config, ..self }
    }

    #[inline]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    #[inline]
    pub fn locks(&self) -> &'a LockAssignment {
        self.locks
    }

    /// Check the schedulability of `tasks` with a single round of blocking
    /// bounds.
    ///
    /// Lock overheads are charged to `tasks`, then the blocking bound of
    /// `policy` (defaulting to the default policy of the lock assignment) is
    /// folded into the tasks' costs, and finally every partition is tested
    /// once.
    ///
    /// The blocking is computed from the response-time estimates present in
    /// `tasks` when this method is called, and it's not recomputed when the
    /// test produces new ones. Use [`Self::converge`] if the bounds depend on
    /// the response times.
    ///
    /// `tasks` retains the charged costs and can't be analyzed again.
    pub fn is_schedulable(
        &self,
        tasks: &mut TaskSet,
        policy: Option<&SpinlockPolicy>,
    ) -> Result<bool, AnalysisError> {
        self.check_config()?;
        let policy = policy.unwrap_or_else(|| self.locks.default_policy());
        log::debug!("is_schedulable: {} task(s), policy = {policy}", tasks.len());

        tasks.charge_overheads(self.locks)?;
        policy.apply_bounds(tasks, &self.bounds);

        let failed = self.test_partitions(tasks);
        log::debug!("is_schedulable: failed partition = {failed:?}");

        Ok(failed.is_none())
    }

    /// Iterate blocking bounds and the schedulability test until the response
    /// times settle or a partition fails, and return whether `tasks` is
    /// schedulable along with the analyzed task set.
    ///
    /// See [`Self::converge`].
    pub fn stable_schedule(
        &self,
        mut tasks: TaskSet,
        policy: Option<&SpinlockPolicy>,
    ) -> Result<(bool, TaskSet), AnalysisError> {
        let convergence = self.converge(&mut tasks, policy)?;
        Ok((convergence.is_schedulable(), tasks))
    }

    /// Iterate blocking bounds and the schedulability test until the response
    /// times settle or a partition fails.
    ///
    /// Returns [`AnalysisError::Diverged`] if that doesn't happen within
    /// [`AnalysisConfig::max_iterations`] rounds. The first round can't
    /// observe settled response times, so at least two rounds are needed to
    /// reach [`Outcome::Stable`].
    ///
    /// On return, every task's cost is the baseline plus the blocking of the
    /// final round.
    pub fn converge(
        &self,
        tasks: &mut TaskSet,
        policy: Option<&SpinlockPolicy>,
    ) -> Result<Convergence, AnalysisError> {
        self.check_config()?;
        let policy = policy.unwrap_or_else(|| self.locks.default_policy());
        let max_iterations = self.config.max_iterations;

        let mut state = State::Init;
        loop {
            log::trace!("converge: {state:?}");

            state = match state {
                State::Init => {
                    log::debug!(
                        "converge: {} task(s), policy = {policy}, config = {:?}",
                        tasks.len(),
                        self.config,
                    );

                    tasks.charge_overheads(self.locks)?;
                    tasks.save_baseline();
                    tasks.forget_previous_response_times();
                    self.seed_response_times(tasks);

                    State::Iterating { iteration: 1 }
                }

                State::Iterating { iteration } if iteration > max_iterations => {
                    log::warn!(
                        "converge: gave up after {max_iterations} iteration(s); \
                        the blocking bounds may not be monotonic"
                    );
                    return Err(AnalysisError::Diverged { max_iterations });
                }

                State::Iterating { iteration } => {
                    // [tag:restore_baseline_before_bounds] The blocking of the
                    // previous round must be removed before applying the new
                    // one.
                    tasks.restore_baseline();
                    policy.apply_bounds(tasks, &self.bounds);

                    let failed = self.test_partitions(tasks);

                    log::debug!(
                        "converge: iteration {iteration}: response times = [{}]",
                        tasks
                            .iter()
                            .map(|t| {
                                t.response_time
                                    .map_or_else(|| "-".to_owned(), |r| r.to_string())
                            })
                            .format(", ")
                    );

                    if let Some(partition) = failed {
                        log::debug!("converge: partition {partition} failed");
                        return Ok(Convergence {
                            outcome: Outcome::Failed { partition },
                            iterations: iteration,
                        });
                    }

                    if tasks.response_times_are_stable() {
                        log::debug!("converge: stable after {iteration} iteration(s)");
                        return Ok(Convergence {
                            outcome: Outcome::Stable,
                            iterations: iteration,
                        });
                    }

                    tasks.roll_response_times();
                    State::Iterating {
                        iteration: iteration + 1,
                    }
                }
            };
        }
    }

    fn check_config(&self) -> Result<(), AnalysisError> {
        if self.config.cpus_per_partition == 0 {
            return Err(AnalysisError::NoProcessors);
        }
        Ok(())
    }

    fn seed_response_times(&self, tasks: &mut TaskSet) {
        match self.config.seed {
            ResponseTimeSeed::Keep => {}
            ResponseTimeSeed::Deadline => {
                for task in tasks.iter_mut() {
                    task.response_time = None;
                }
            }
            ResponseTimeSeed::Cost => {
                for task in tasks.iter_mut() {
                    task.response_time = Some(task.cost);
                }
            }
        }
    }

    /// Run the schedulability test on every partition, returning the lowest
    /// ID of the failed partitions.
    ///
    /// Every partition is tested even if an earlier one fails, so that all
    /// response times are updated regardless of the partition order.
    fn test_partitions(&self, tasks: &mut TaskSet) -> Option<PartitionId> {
        let mut failed = None;

        for partition in tasks.partitions() {
            let mut group = tasks.partition_mut(&partition);
            let ok = self
                .test
                .is_schedulable(self.config.cpus_per_partition, &mut group);
            log::trace!(
                "partition {} ({} task(s)): schedulable = {ok}",
                partition.id,
                partition.len()
            );

            if !ok && failed.is_none() {
                failed = Some(partition.id);
            }
        }

        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{policy::LockDiscipline, PartitionMut, Task, Time};
    use std::cell::{Cell, RefCell};

    fn response_time_is_cost(_: usize, group: &mut PartitionMut<'_>) -> bool {
        for k in 0..group.len() {
            let task = group.task_mut(k);
            task.response_time = Some(task.cost);
        }
        group.iter().all(|t| t.cost <= t.deadline)
    }

    fn constant_blocking(tasks: &mut TaskSet) {
        for task in tasks.iter_mut() {
            task.blocked = 10;
        }
    }

    fn two_partitions() -> TaskSet {
        let mut ts = TaskSet::new(vec![
            Task::new(100, 1000).on_partition(0),
            Task::new(40, 1000).on_partition(1),
        ]);
        ts[0].request(0).add_request(5);
        ts[1].request(0).add_request(5).add_request(5);
        ts
    }

    #[test]
    fn constant_blocking_is_stable_in_two_rounds() {
        let _ = env_logger::try_init();
        let locks = LockAssignment::new(SpinlockPolicy::fifo(3));
        let analyzer = Analyzer::new(&locks, constant_blocking, response_time_is_cost);

        let mut ts = two_partitions();
        let result = analyzer.converge(&mut ts, None).unwrap();

        assert_eq!(
            result,
            Convergence {
                outcome: Outcome::Stable,
                iterations: 2
            }
        );
        assert_eq!(ts[0].uninflated_cost, 103);
        assert_eq!(ts[1].uninflated_cost, 46);
        // The blocking is counted once, not once per round
        assert_eq!(ts[0].cost, 113);
        assert_eq!(ts[1].cost, 56);
        for task in &ts {
            assert_eq!(task.response_time, task.previous_response_time);
        }
    }

    /// Each task is blocked by half the other task's response time.
    fn half_of_other(tasks: &mut TaskSet) {
        let windows: Vec<Time> = tasks.iter().map(|t| t.analysis_window()).collect();
        tasks[0].blocked = windows[1] / 2;
        tasks[1].blocked = windows[0] / 2;
    }

    #[test]
    fn response_dependent_blocking_reaches_fixed_point() {
        let _ = env_logger::try_init();
        let locks = LockAssignment::default();
        let analyzer = Analyzer::new(&locks, half_of_other, response_time_is_cost).with_config(
            AnalysisConfig {
                seed: ResponseTimeSeed::Cost,
                ..Default::default()
            },
        );

        let (converged, ts) = analyzer.stable_schedule(two_partitions(), None).unwrap();
        assert!(converged);

        let r0 = ts[0].response_time.unwrap();
        let r1 = ts[1].response_time.unwrap();
        log::debug!("r0 = {r0}, r1 = {r1}");
        assert_eq!(r0, 100 + r1 / 2);
        assert_eq!(r1, 40 + r0 / 2);
        for task in &ts {
            assert_eq!(task.cost, task.uninflated_cost + task.blocked);
        }
    }

    #[test]
    fn seed_from_deadline_descends_to_a_fixed_point() {
        let locks = LockAssignment::default();
        let analyzer = Analyzer::new(&locks, half_of_other, response_time_is_cost).with_config(
            AnalysisConfig {
                seed: ResponseTimeSeed::Deadline,
                ..Default::default()
            },
        );

        let mut ts = two_partitions();
        ts[0].response_time = Some(1);
        let result = analyzer.converge(&mut ts, None).unwrap();
        assert!(result.is_schedulable());

        let r0 = ts[0].response_time.unwrap();
        let r1 = ts[1].response_time.unwrap();
        assert_eq!(r0, 100 + r1 / 2);
        assert_eq!(r1, 40 + r0 / 2);
    }

    #[test]
    fn seed_determines_first_window() {
        let seen = RefCell::new(Vec::new());
        let bounds = |tasks: &mut TaskSet| {
            let mut seen = seen.borrow_mut();
            if seen.is_empty() {
                seen.extend(tasks.iter().map(|t| t.analysis_window()));
            }
        };
        let locks = LockAssignment::new(SpinlockPolicy::unordered(1));

        let cases: [(ResponseTimeSeed, [Time; 2]); 3] = [
            (ResponseTimeSeed::Keep, [7, 1000]),
            (ResponseTimeSeed::Deadline, [1000, 1000]),
            (ResponseTimeSeed::Cost, [101, 42]),
        ];
        for (seed, expected) in cases {
            seen.borrow_mut().clear();
            let analyzer = Analyzer::new(&locks, &bounds, response_time_is_cost).with_config(
                AnalysisConfig {
                    seed,
                    ..Default::default()
                },
            );
            let mut ts = two_partitions();
            ts[0].response_time = Some(7);
            analyzer.converge(&mut ts, None).unwrap();
            assert_eq!(*seen.borrow(), expected, "{seed:?}");
        }
    }

    struct RejectPartition(PartitionId, Cell<usize>);

    impl SchedulabilityTest for RejectPartition {
        fn is_schedulable(&self, num_cpus: usize, group: &mut PartitionMut<'_>) -> bool {
            self.1.set(self.1.get() + 1);
            response_time_is_cost(num_cpus, group) && group.id() != self.0
        }
    }

    #[test]
    fn failed_partition_is_reported_after_testing_all() {
        let locks = LockAssignment::default();
        let test = RejectPartition(1, Cell::new(0));
        let analyzer = Analyzer::new(&locks, constant_blocking, test);

        let mut ts = TaskSet::new(vec![
            Task::new(1, 100).on_partition(2),
            Task::new(1, 100).on_partition(1),
            Task::new(1, 100).on_partition(0),
        ]);
        let result = analyzer.converge(&mut ts, None).unwrap();

        assert_eq!(
            result,
            Convergence {
                outcome: Outcome::Failed { partition: 1 },
                iterations: 1
            }
        );
        assert!(!result.is_schedulable());
        assert_eq!(analyzer.test.1.get(), 3);
        assert!(ts.iter().all(|t| t.response_time == Some(11)));
    }

    #[test]
    fn lowest_failed_partition_is_reported() {
        let locks = LockAssignment::default();
        let analyzer = Analyzer::new(&locks, constant_blocking, response_time_is_cost);

        // Partitions 3 and 5 are overloaded
        let mut ts = TaskSet::new(vec![
            Task::new(200, 100).on_partition(5),
            Task::new(1, 100).on_partition(0),
            Task::new(200, 100).on_partition(3),
        ]);
        assert_eq!(
            analyzer.converge(&mut ts, None).unwrap().outcome,
            Outcome::Failed { partition: 3 }
        );
    }

    #[test]
    fn oscillating_bounds_diverge() {
        let _ = env_logger::try_init();
        let round = Cell::new(0);
        let bounds = |tasks: &mut TaskSet| {
            round.set(round.get() + 1);
            for task in tasks.iter_mut() {
                task.blocked = (round.get() % 2) * 10;
            }
        };
        let locks = LockAssignment::default();
        let analyzer = Analyzer::new(&locks, &bounds, response_time_is_cost).with_config(
            AnalysisConfig {
                max_iterations: 50,
                ..Default::default()
            },
        );

        assert_eq!(
            analyzer.converge(&mut two_partitions(), None),
            Err(AnalysisError::Diverged { max_iterations: 50 })
        );
        assert_eq!(round.get(), 50);
    }

    /// Each task is blocked for 400 if the other task's window exceeds 300.
    /// The fixed points are `(100, 100)` and `(500, 500)`.
    fn step_of_other(tasks: &mut TaskSet) {
        let windows: Vec<Time> = tasks.iter().map(|t| t.analysis_window()).collect();
        tasks[0].blocked = if windows[1] > 300 { 400 } else { 0 };
        tasks[1].blocked = if windows[0] > 300 { 400 } else { 0 };
    }

    #[test]
    fn mixed_estimates_cycle_under_monotonic_bounds() {
        let _ = env_logger::try_init();
        let locks = LockAssignment::default();
        let with_seed = |seed| {
            Analyzer::new(&locks, step_of_other, response_time_is_cost).with_config(
                AnalysisConfig {
                    max_iterations: 20,
                    seed,
                    ..Default::default()
                },
            )
        };
        let tasks = || {
            let mut ts = TaskSet::new(vec![
                Task::new(100, 1000).on_partition(0),
                Task::new(100, 1000).on_partition(1),
            ]);
            // One estimate above both fixed points, one at the least
            ts[0].response_time = Some(1000);
            ts[1].response_time = Some(100);
            ts
        };

        // (100, 500) and (500, 100) alternate forever
        assert_eq!(
            with_seed(ResponseTimeSeed::Keep).converge(&mut tasks(), None),
            Err(AnalysisError::Diverged { max_iterations: 20 })
        );

        let mut ts = tasks();
        let result = with_seed(ResponseTimeSeed::Deadline)
            .converge(&mut ts, None)
            .unwrap();
        assert_eq!(
            result,
            Convergence {
                outcome: Outcome::Stable,
                iterations: 2
            }
        );
        assert_eq!(ts[0].response_time, Some(500));
        assert_eq!(ts[1].response_time, Some(500));

        let mut ts = tasks();
        let result = with_seed(ResponseTimeSeed::Cost)
            .converge(&mut ts, None)
            .unwrap();
        assert!(result.is_schedulable());
        assert_eq!(ts[0].response_time, Some(100));
        assert_eq!(ts[1].response_time, Some(100));
    }

    #[test]
    fn iteration_limit_is_inclusive() {
        let locks = LockAssignment::default();
        let with_limit = |max_iterations| {
            Analyzer::new(&locks, constant_blocking, response_time_is_cost)
                .with_config(AnalysisConfig {
                    max_iterations,
                    ..Default::default()
                })
                .converge(&mut two_partitions(), None)
        };

        assert_eq!(
            with_limit(1),
            Err(AnalysisError::Diverged { max_iterations: 1 })
        );
        assert!(with_limit(2).unwrap().is_schedulable());
    }

    #[test]
    fn single_pass_folds_blocking_once() {
        let locks = LockAssignment::new(SpinlockPolicy::fifo(3));
        let analyzer = Analyzer::new(&locks, constant_blocking, response_time_is_cost);

        let mut ts = two_partitions();
        assert_eq!(analyzer.is_schedulable(&mut ts, None), Ok(true));
        assert_eq!(ts[0].cost, 113);
        assert_eq!(ts[0].response_time, Some(113));
        assert_eq!(ts[1].cost, 56);

        // A charged task set can't be analyzed again
        assert_eq!(
            analyzer.is_schedulable(&mut ts, None),
            Err(AnalysisError::OverheadsAlreadyCharged)
        );
        assert_eq!(
            analyzer.converge(&mut ts, None),
            Err(AnalysisError::OverheadsAlreadyCharged)
        );
        assert_eq!(ts[0].cost, 113);
    }

    #[test]
    fn single_pass_reports_overload() {
        let locks = LockAssignment::default();
        let analyzer = Analyzer::new(&locks, constant_blocking, response_time_is_cost);
        let mut ts = TaskSet::new(vec![Task::new(95, 100), Task::new(1, 100).on_partition(1)]);
        assert_eq!(analyzer.is_schedulable(&mut ts, None), Ok(false));
    }

    struct Which(Cell<Option<LockDiscipline>>);

    impl BlockingBounds for Which {
        fn unordered(&self, _: &mut TaskSet) {
            self.0.set(Some(LockDiscipline::Unordered));
        }

        fn fifo(&self, _: &mut TaskSet) {
            self.0.set(Some(LockDiscipline::Fifo));
        }

        fn priority_unordered(&self, _: &mut TaskSet) {
            self.0.set(Some(LockDiscipline::PriorityUnordered));
        }

        fn priority_fifo(&self, _: &mut TaskSet) {
            self.0.set(Some(LockDiscipline::PriorityFifo));
        }
    }

    #[test]
    fn explicit_policy_overrides_default() {
        let locks = LockAssignment::new(SpinlockPolicy::priority_fifo(0));
        let analyzer = Analyzer::new(&locks, Which(Cell::new(None)), response_time_is_cost);

        analyzer.is_schedulable(&mut two_partitions(), None).unwrap();
        assert_eq!(analyzer.bounds.0.get(), Some(LockDiscipline::PriorityFifo));

        let fifo = SpinlockPolicy::fifo(0);
        analyzer
            .is_schedulable(&mut two_partitions(), Some(&fifo))
            .unwrap();
        assert_eq!(analyzer.bounds.0.get(), Some(LockDiscipline::Fifo));

        let (converged, _) = analyzer
            .stable_schedule(two_partitions(), Some(&SpinlockPolicy::priority_unordered(0)))
            .unwrap();
        assert!(converged);
        assert_eq!(
            analyzer.bounds.0.get(),
            Some(LockDiscipline::PriorityUnordered)
        );
    }

    #[test]
    fn zero_processors_is_rejected() {
        let locks = LockAssignment::default();
        let analyzer = Analyzer::new(&locks, constant_blocking, response_time_is_cost)
            .with_config(AnalysisConfig {
                cpus_per_partition: 0,
                ..Default::default()
            });
        let mut ts = two_partitions();
        assert_eq!(
            analyzer.is_schedulable(&mut ts, None),
            Err(AnalysisError::NoProcessors)
        );
        // Nothing was charged
        assert!(!ts.overheads_charged());
    }

    #[test]
    fn num_cpus_is_forwarded() {
        let locks = LockAssignment::default();
        fn on_four_cpus(num_cpus: usize, group: &mut PartitionMut<'_>) -> bool {
            assert_eq!(num_cpus, 4);
            response_time_is_cost(num_cpus, group)
        }
        let analyzer = Analyzer::new(&locks, constant_blocking, on_four_cpus).with_config(
            AnalysisConfig {
                cpus_per_partition: 4,
                ..Default::default()
            },
        );
        assert!(analyzer.stable_schedule(two_partitions(), None).unwrap().0);
    }
}
