//! Uniprocessor response-time analysis for fixed-priority scheduling
use spinrta::{PartitionMut, SchedulabilityTest, Time};

use crate::utils::div_ceil;

/// Reference implementation of [`SchedulabilityTest`] for partitions with one
/// processor each.
///
/// A task is interfered with by every other task of the same partition whose
/// priority is higher than or equal to its own. Tasks with equal priorities
/// interfere with each other both ways, which is pessimistic but doesn't
/// depend on how ties are broken.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FixedPriorityRta;

impl SchedulabilityTest for FixedPriorityRta {
    fn is_schedulable(&self, num_cpus: usize, group: &mut PartitionMut<'_>) -> bool {
        if num_cpus != 1 {
            log::warn!(
                "partition {}: {num_cpus} processors were given, but only \
                uniprocessor partitions are supported",
                group.id()
            );
            for k in 0..group.len() {
                group.task_mut(k).response_time = None;
            }
            return false;
        }

        let mut schedulable = true;
        for k in 0..group.len() {
            let task = group.task(k);
            let interference: Vec<(Time, Time)> = (0..group.len())
                .filter(|&j| j != k && group.task(j).priority <= task.priority)
                .map(|j| (group.task(j).cost, group.task(j).period))
                .collect();

            let r = response_time(task.cost, task.deadline, &interference);
            log::trace!(
                "partition {}: task {}: response time = {r:?}",
                group.id(),
                group.index_of(k)
            );

            group.task_mut(k).response_time = r;
            schedulable &= r.is_some();
        }
        schedulable
    }
}

/// Find the smallest fixed point of `R = cost + Σ ⌈R / T⌉ C` no greater than
/// `deadline`, where `(C, T)` ranges over `interference`.
///
/// Returns `None` if there's no such point, or if an interfering task has a
/// zero period.
pub fn response_time(cost: Time, deadline: Time, interference: &[(Time, Time)]) -> Option<Time> {
    if interference.iter().any(|&(_, period)| period == 0) {
        return None;
    }

    let mut r = interference
        .iter()
        .fold(cost, |acc, &(c, _)| acc.saturating_add(c));

    loop {
        if r > deadline {
            return None;
        }

        let next = interference.iter().try_fold(cost, |acc, &(c, period)| {
            Some(acc.saturating_add(div_ceil(r, period)?.saturating_mul(c)))
        })?;

        if next == r {
            return Some(r);
        }
        debug_assert!(next > r);
        r = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use spinrta::{Task, TaskSet};

    fn analyze(num_cpus: usize, tasks: &mut TaskSet) -> bool {
        let partitions = tasks.partitions();
        let mut schedulable = true;
        for partition in partitions.iter() {
            let mut group = tasks.partition_mut(partition);
            schedulable &= FixedPriorityRta.is_schedulable(num_cpus, &mut group);
        }
        schedulable
    }

    #[test]
    fn textbook() {
        // Liu & Layland style example: (C, T) = (1, 4), (2, 6), (3, 12)
        assert_eq!(response_time(1, 4, &[]), Some(1));
        assert_eq!(response_time(2, 6, &[(1, 4)]), Some(3));
        assert_eq!(response_time(3, 12, &[(1, 4), (2, 6)]), Some(10));
        assert_eq!(response_time(3, 9, &[(1, 4), (2, 6)]), None);
    }

    #[test]
    fn zero_cost() {
        assert_eq!(response_time(0, 10, &[]), Some(0));
        assert_eq!(response_time(0, 10, &[(0, 5)]), Some(0));
    }

    #[test]
    fn zero_period_interference() {
        assert_eq!(response_time(1, 10, &[(1, 0)]), None);
    }

    #[test]
    fn sets_response_times() {
        let _ = env_logger::try_init();
        let mut tasks = TaskSet::new(vec![
            Task::new(1, 4),
            Task::new(2, 6),
            Task::new(3, 12),
            Task::new(7, 10).on_partition(1),
        ]);
        assert!(analyze(1, &mut tasks));
        assert_eq!(
            tasks.iter().map(|t| t.response_time).collect::<Vec<_>>(),
            [Some(1), Some(3), Some(10), Some(7)]
        );
    }

    #[test]
    fn failure_clears_response_time() {
        let _ = env_logger::try_init();
        let mut tasks = TaskSet::new(vec![Task::new(3, 4), Task::new(3, 6)]);
        tasks[1].response_time = Some(6);
        assert!(!analyze(1, &mut tasks));
        assert_eq!(tasks[0].response_time, Some(3));
        assert_eq!(tasks[1].response_time, None);
    }

    #[test]
    fn equal_priorities_interfere_both_ways() {
        let mut tasks = TaskSet::new(vec![Task::new(2, 10), Task::new(3, 10)]);
        tasks[1].priority = tasks[0].priority;
        assert!(analyze(1, &mut tasks));
        assert_eq!(tasks[0].response_time, Some(5));
        assert_eq!(tasks[1].response_time, Some(5));
    }

    #[test]
    fn multiprocessor_partitions_are_rejected() {
        let _ = env_logger::try_init();
        let mut tasks = TaskSet::new(vec![Task::new(1, 10)]);
        tasks[0].response_time = Some(1);
        assert!(!analyze(2, &mut tasks));
        assert_eq!(tasks[0].response_time, None);
    }

    #[quickcheck]
    fn response_time_is_a_fixed_point(cost: u8, interference: Vec<(u8, u8)>) {
        let interference: Vec<(Time, Time)> = interference
            .into_iter()
            .take(5)
            .map(|(c, t)| (Time::from(c % 8), Time::from(t) + 1))
            .collect();
        let cost = Time::from(cost % 16);
        log::debug!("cost = {cost}, interference = {interference:?}");

        if let Some(r) = response_time(cost, 10_000, &interference) {
            let demand: Time = cost
                + interference
                    .iter()
                    .map(|&(c, t)| div_ceil(r, t).unwrap() * c)
                    .sum::<Time>();
            assert_eq!(demand, r);
            assert!(r >= cost);
        }
    }
}
