//! Analytic blocking bounds for non-preemptive spinlocks
//!
//! A task spinning on a resource waits for remote critical sections, i.e.,
//! those issued by tasks on other partitions. Which of them can delay the
//! task depends on how the lock orders its waiters:
//!
//! | Discipline           | Remote critical sections that can delay a task  |
//! | -------------------- | ------------------------------------------------ |
//! | `Unordered`          | all of them                                      |
//! | `Fifo`               | `N` per remote partition                         |
//! | `PriorityUnordered`  | all with higher or equal priority, `N` others    |
//! | `PriorityFifo`       | all with higher priority, `N` per remote         |
//! |                      | partition with equal priority, `N` others        |
//!
//! where `N` is the number of requests the task itself issues to the resource
//! per job.
//!
//! On top of that, a task can be delayed once on arrival by a lower-priority
//! local task that is executing (or spinning for) a non-preemptive critical
//! section.
use itertools::Itertools;
use spinrta::{
    BlockingBounds, LockDiscipline, PartitionId, Priority, ResourceId, Task, TaskSet, Time,
};
use std::collections::BTreeMap;

use crate::utils::div_ceil;

/// Reference implementation of [`BlockingBounds`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpinBounds;

impl SpinBounds {
    fn apply(self, tasks: &mut TaskSet, discipline: LockDiscipline) {
        let blocked: Vec<Time> = (0..tasks.len())
            .map(|i| blocking(tasks, i, discipline))
            .collect();

        for (task, blocked) in tasks.iter_mut().zip(blocked) {
            task.blocked = blocked;
        }
    }
}

impl BlockingBounds for SpinBounds {
    fn unordered(&self, tasks: &mut TaskSet) {
        self.apply(tasks, LockDiscipline::Unordered)
    }

    fn fifo(&self, tasks: &mut TaskSet) {
        self.apply(tasks, LockDiscipline::Fifo)
    }

    fn priority_unordered(&self, tasks: &mut TaskSet) {
        self.apply(tasks, LockDiscipline::PriorityUnordered)
    }

    fn priority_fifo(&self, tasks: &mut TaskSet) {
        self.apply(tasks, LockDiscipline::PriorityFifo)
    }
}

/// The number of jobs of `task` that can overlap an interval of length
/// `window`.
///
/// A job released before the interval can still be pending when it begins,
/// hence the task's own [`analysis_window`](Task::analysis_window) is added.
/// A task with a zero period can release an unbounded number of jobs.
pub fn max_jobs(task: &Task, window: Time) -> u64 {
    div_ceil(window.saturating_add(task.analysis_window()), task.period).unwrap_or(u64::MAX)
}

/// Critical sections of the same length issued by the same task.
#[derive(Debug, Clone, Copy)]
struct Batch {
    count: u64,
    length: Time,
    priority: Priority,
}

/// Collect the critical sections on `resource` issued by the tasks not on the
/// partition of `tasks[requester]` within a window of length `window`, grouped
/// by partition.
fn remote_batches(
    tasks: &TaskSet,
    requester: usize,
    resource: ResourceId,
    window: Time,
) -> BTreeMap<PartitionId, Vec<Batch>> {
    let local = tasks[requester].partition;
    let mut batches: BTreeMap<PartitionId, Vec<Batch>> = BTreeMap::new();

    for task in tasks.iter().filter(|task| task.partition != local) {
        let Some(req) = task.resmodel.get(&resource) else { continue };
        let jobs = max_jobs(task, window);

        let entry = batches.entry(task.partition).or_default();
        for (num, length) in [
            (req.max_writes, req.max_write_length),
            (req.max_reads, req.max_read_length),
        ] {
            if num > 0 {
                entry.push(Batch {
                    count: jobs.saturating_mul(u64::from(num)),
                    length,
                    priority: task.priority,
                });
            }
        }
    }

    batches
}

/// The total length of the `limit` longest critical sections in `batches`.
fn longest<'a>(batches: impl IntoIterator<Item = &'a Batch>, limit: u64) -> Time {
    let mut remaining = limit;
    let mut sum: Time = 0;
    for batch in batches
        .into_iter()
        .sorted_by(|a, b| b.length.cmp(&a.length))
    {
        if remaining == 0 {
            break;
        }
        let count = batch.count.min(remaining);
        remaining -= count;
        sum = sum.saturating_add(count.saturating_mul(batch.length));
    }
    sum
}

/// The total length of the critical sections in `batches`.
fn total<'a>(batches: impl IntoIterator<Item = &'a Batch>) -> Time {
    longest(batches, u64::MAX)
}

/// The maximum time `tasks[requester]` spends spinning on `resource` over
/// `num_requests` requests issued within a window of length `window`.
pub fn spin_delay(
    tasks: &TaskSet,
    requester: usize,
    resource: ResourceId,
    num_requests: u64,
    window: Time,
    discipline: LockDiscipline,
) -> Time {
    if num_requests == 0 {
        return 0;
    }

    let priority = tasks[requester].priority;
    let by_partition = remote_batches(tasks, requester, resource, window);
    let all = || by_partition.values().flatten();

    match discipline {
        LockDiscipline::Unordered => total(all()),
        LockDiscipline::Fifo => by_partition
            .values()
            .map(|batches| longest(batches, num_requests))
            .fold(0, Time::saturating_add),
        LockDiscipline::PriorityUnordered => {
            let higher_or_equal = total(all().filter(|b| b.priority <= priority));
            let lower = longest(all().filter(|b| b.priority > priority), num_requests);
            higher_or_equal.saturating_add(lower)
        }
        LockDiscipline::PriorityFifo => {
            let higher = total(all().filter(|b| b.priority < priority));
            let equal = by_partition
                .values()
                .map(|batches| {
                    longest(
                        batches.iter().filter(|b| b.priority == priority),
                        num_requests,
                    )
                })
                .fold(0, Time::saturating_add);
            let lower = longest(all().filter(|b| b.priority > priority), num_requests);
            higher.saturating_add(equal).saturating_add(lower)
        }
    }
}

/// The worst-case blocking of `tasks[i]` under `discipline`: the spin delay
/// of all of its requests plus the arrival blocking.
pub fn blocking(tasks: &TaskSet, i: usize, discipline: LockDiscipline) -> Time {
    let task = &tasks[i];
    let window = task.analysis_window();

    let spin = task
        .resmodel
        .iter()
        .map(|(&resource, req)| {
            spin_delay(
                tasks,
                i,
                resource,
                u64::from(req.max_requests()),
                window,
                discipline,
            )
        })
        .fold(0, Time::saturating_add);

    // A lower-priority local task may have started a non-preemptive section
    // (including the spinning before it) just before `task` was released
    let arrival = tasks
        .iter()
        .enumerate()
        .filter(|(_, other)| other.partition == task.partition && other.priority > task.priority)
        .flat_map(|(x, other)| {
            let other_window = other.analysis_window();
            other
                .resmodel
                .iter()
                .filter(|(_, req)| req.max_requests() > 0)
                .map(move |(&resource, req)| {
                    req.max_length().saturating_add(spin_delay(
                        tasks,
                        x,
                        resource,
                        1,
                        other_window,
                        discipline,
                    ))
                })
        })
        .max()
        .unwrap_or(0);

    log::trace!("task {i}: spin = {spin}, arrival = {arrival} ({discipline})");

    spin.saturating_add(arrival)
}
