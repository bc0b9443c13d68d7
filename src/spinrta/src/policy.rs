//! Spinlock disciplines and their blocking bounds
use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::model::{TaskSet, Time};

/// The order in which a spinlock grants contended requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockDiscipline {
    /// No ordering guarantee. A request can be overtaken by any number of
    /// other requests.
    Unordered,
    /// Requests are granted in arrival order (e.g., ticket locks, MCS locks).
    Fifo,
    /// Requests are granted in priority order, with no ordering guarantee
    /// among requests of the same priority.
    PriorityUnordered,
    /// Requests are granted in priority order, then in arrival order.
    PriorityFifo,
}

impl LockDiscipline {
    pub const ALL: [Self; 4] = [
        Self::Unordered,
        Self::Fifo,
        Self::PriorityUnordered,
        Self::PriorityFifo,
    ];

    /// Get the name used for this discipline in logs and configuration files.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unordered => "unordered",
            Self::Fifo => "fifo",
            Self::PriorityUnordered => "priority-unordered",
            Self::PriorityFifo => "priority-fifo",
        }
    }

    /// Whether requests are ordered by priority.
    pub const fn is_priority_ordered(self) -> bool {
        matches!(self, Self::PriorityUnordered | Self::PriorityFifo)
    }
}

impl fmt::Display for LockDiscipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown lock discipline: '{0}'")]
pub struct ParseLockDisciplineError(String);

impl FromStr for LockDiscipline {
    type Err = ParseLockDisciplineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.name() == s)
            .ok_or_else(|| ParseLockDisciplineError(s.to_owned()))
    }
}

/// The execution-time overheads of a spinlock implementation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LockOverheads {
    /// Added to the task's cost once per request.
    pub total: Time,
    /// Added to the length of every critical section protected by the lock.
    pub critical: Time,
}

/// A spinlock implementation: its discipline and its overheads.
///
/// The default value is an unordered spinlock with no overheads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinlockPolicy {
    Unordered(LockOverheads),
    Fifo(LockOverheads),
    PriorityUnordered(LockOverheads),
    PriorityFifo(LockOverheads),
}

impl Default for SpinlockPolicy {
    fn default() -> Self {
        Self::Unordered(LockOverheads::default())
    }
}

impl SpinlockPolicy {
    pub const fn new(discipline: LockDiscipline, overheads: LockOverheads) -> Self {
        match discipline {
            LockDiscipline::Unordered => Self::Unordered(overheads),
            LockDiscipline::Fifo => Self::Fifo(overheads),
            LockDiscipline::PriorityUnordered => Self::PriorityUnordered(overheads),
            LockDiscipline::PriorityFifo => Self::PriorityFifo(overheads),
        }
    }

    /// An unordered spinlock costing `total_overhead` per request.
    pub const fn unordered(total_overhead: Time) -> Self {
        Self::with_total(LockDiscipline::Unordered, total_overhead)
    }

    /// A FIFO spinlock costing `total_overhead` per request.
    pub const fn fifo(total_overhead: Time) -> Self {
        Self::with_total(LockDiscipline::Fifo, total_overhead)
    }

    /// A priority-ordered spinlock costing `total_overhead` per request.
    pub const fn priority_unordered(total_overhead: Time) -> Self {
        Self::with_total(LockDiscipline::PriorityUnordered, total_overhead)
    }

    /// A priority-ordered, FIFO-within-priority spinlock costing
    /// `total_overhead` per request.
    pub const fn priority_fifo(total_overhead: Time) -> Self {
        Self::with_total(LockDiscipline::PriorityFifo, total_overhead)
    }

    const fn with_total(discipline: LockDiscipline, total: Time) -> Self {
        Self::new(discipline, LockOverheads { total, critical: 0 })
    }

    /// Returns the policy with the critical-section overhead `critical`.
    pub const fn with_critical_overhead(self, critical: Time) -> Self {
        let LockOverheads { total, .. } = self.overheads();
        Self::new(self.discipline(), LockOverheads { total, critical })
    }

    pub const fn discipline(&self) -> LockDiscipline {
        match self {
            Self::Unordered(_) => LockDiscipline::Unordered,
            Self::Fifo(_) => LockDiscipline::Fifo,
            Self::PriorityUnordered(_) => LockDiscipline::PriorityUnordered,
            Self::PriorityFifo(_) => LockDiscipline::PriorityFifo,
        }
    }

    pub const fn overheads(&self) -> LockOverheads {
        match *self {
            Self::Unordered(o)
            | Self::Fifo(o)
            | Self::PriorityUnordered(o)
            | Self::PriorityFifo(o) => o,
        }
    }

    #[inline]
    pub const fn total_overhead(&self) -> Time {
        self.overheads().total
    }

    #[inline]
    pub const fn critical_overhead(&self) -> Time {
        self.overheads().critical
    }

    /// Compute the blocking of every task in `tasks` under this policy's
    /// discipline, storing it in [`Task::blocked`](crate::Task::blocked).
    ///
    /// The bound is computed over the whole task set, not per partition,
    /// because resources may be shared across partitions.
    pub fn compute_blocking<B: BlockingBounds + ?Sized>(&self, tasks: &mut TaskSet, bounds: &B) {
        for task in tasks.iter_mut() {
            task.blocked = 0;
        }

        match self {
            Self::Unordered(_) => bounds.unordered(tasks),
            Self::Fifo(_) => bounds.fifo(tasks),
            Self::PriorityUnordered(_) => bounds.priority_unordered(tasks),
            Self::PriorityFifo(_) => bounds.priority_fifo(tasks),
        }
    }

    /// Compute the blocking of every task and add it to the task's cost.
    ///
    /// The cost is increased unconditionally, saturating at `Time::MAX` so that
    /// an unbounded blocking bound makes the task unschedulable. Calling this twice on the same
    /// task set counts the blocking twice unless the cost is restored in
    /// between. [ref:restore_baseline_before_bounds]
    pub fn apply_bounds<B: BlockingBounds + ?Sized>(&self, tasks: &mut TaskSet, bounds: &B) {
        self.compute_blocking(tasks, bounds);

        for (i, task) in tasks.iter_mut().enumerate() {
            log::trace!(
                "[{}] task {i}: blocked = {}, cost = {} + {}",
                self.discipline(),
                task.blocked,
                task.cost,
                task.blocked,
            );
            task.cost = task.cost.saturating_add(task.blocked);
        }
    }
}

impl fmt::Display for SpinlockPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let LockOverheads { total, critical } = self.overheads();
        write!(f, "{}(total = {total}, critical = {critical})", self.discipline())
    }
}

/// Computes the worst-case blocking of tasks for each [`LockDiscipline`].
///
/// Each method receives the whole task set with resource requests (already
/// inflated by lock overheads) and the current response-time estimates
/// ([`Task::analysis_window`](crate::Task::analysis_window)), and must write
/// [`Task::blocked`](crate::Task::blocked) of every task.
///
/// # Monotonicity
///
/// A bound must never decrease when any task's response-time estimate
/// increases. [`Analyzer::converge`](crate::Analyzer::converge) relies on
/// this to terminate.
///
/// Any `Fn(&mut TaskSet)` is a `BlockingBounds` that uses the same bound for
/// every discipline.
pub trait BlockingBounds {
    fn unordered(&self, tasks: &mut TaskSet);

    /// The bound for FIFO spinlocks. Should never exceed
    /// [`Self::unordered`] for the same task set.
    fn fifo(&self, tasks: &mut TaskSet);

    fn priority_unordered(&self, tasks: &mut TaskSet);

    fn priority_fifo(&self, tasks: &mut TaskSet);
}

impl<F> BlockingBounds for F
where
    F: Fn(&mut TaskSet),
{
    fn unordered(&self, tasks: &mut TaskSet) {
        self(tasks)
    }

    fn fifo(&self, tasks: &mut TaskSet) {
        self(tasks)
    }

    fn priority_unordered(&self, tasks: &mut TaskSet) {
        self(tasks)
    }

    fn priority_fifo(&self, tasks: &mut TaskSet) {
        self(tasks)
    }
}
