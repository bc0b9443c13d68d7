//! The interface to a schedulability test
use crate::partition::PartitionMut;

/// A schedulability test for the tasks of a single partition.
///
/// The test sees the tasks' costs with blocking already folded in. It must
/// set [`Task::response_time`](crate::Task::response_time) of every task in
/// `group`, and must be deterministic given the costs, periods, and deadlines
/// of the tasks.
///
/// Any `Fn(usize, &mut PartitionMut<'_>) -> bool` is a `SchedulabilityTest`.
pub trait SchedulabilityTest {
    /// Check if `group` is schedulable on `num_cpus` processors.
    fn is_schedulable(&self, num_cpus: usize, group: &mut PartitionMut<'_>) -> bool;
}

impl<F> SchedulabilityTest for F
where
    F: Fn(usize, &mut PartitionMut<'_>) -> bool,
{
    #[inline]
    fn is_schedulable(&self, num_cpus: usize, group: &mut PartitionMut<'_>) -> bool {
        self(num_cpus, group)
    }
}
