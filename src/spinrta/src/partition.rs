//! Grouping tasks by partition
use itertools::Itertools;

use crate::model::{PartitionId, Task};

/// The tasks assigned to a single partition, identified by their indices in
/// the task set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub id: PartitionId,
    /// Task indices in ascending order.
    pub members: Vec<usize>,
}

impl Partition {
    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check if the task at `index` belongs to this partition.
    pub fn contains(&self, index: usize) -> bool {
        self.members.binary_search(&index).is_ok()
    }
}

/// Group `tasks` by [`Task::partition`].
///
/// The groups are returned in ascending partition order and preserve the
/// relative order of the tasks. Empty partitions are not returned.
pub fn partitions(tasks: &[Task]) -> Vec<Partition> {
    tasks
        .iter()
        .enumerate()
        .map(|(i, task)| (task.partition, i))
        .into_group_map()
        .into_iter()
        .sorted_by_key(|&(id, _)| id)
        .map(|(id, members)| Partition { id, members })
        .collect()
}

/// A mutable view of the tasks in a [`Partition`].
///
/// This is what a [`SchedulabilityTest`](crate::SchedulabilityTest) sees. The
/// tasks are addressed by their position in the partition (`0..len()`), in
/// the same order as in the task set.
pub struct PartitionMut<'a> {
    partition: &'a Partition,
    tasks: &'a mut [Task],
}

impl<'a> PartitionMut<'a> {
    /// Construct a view of `partition` over `tasks`.
    ///
    /// # Panics
    ///
    /// Panics if any member of `partition` is out of the bounds of `tasks`.
    pub fn new(partition: &'a Partition, tasks: &'a mut [Task]) -> Self {
        assert!(
            partition.members.iter().all(|&i| i < tasks.len()),
            "partition {} refers to a nonexistent task",
            partition.id
        );
        Self { partition, tasks }
    }

    #[inline]
    pub fn id(&self) -> PartitionId {
        self.partition.id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.partition.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.partition.is_empty()
    }

    /// Get the task-set index of the `k`-th member.
    #[inline]
    pub fn index_of(&self, k: usize) -> usize {
        self.partition.members[k]
    }

    #[inline]
    pub fn task(&self, k: usize) -> &Task {
        &self.tasks[self.partition.members[k]]
    }

    #[inline]
    pub fn task_mut(&mut self, k: usize) -> &mut Task {
        &mut self.tasks[self.partition.members[k]]
    }

    /// Iterate over the member tasks.
    pub fn iter(&self) -> impl Iterator<Item = &Task> + '_ {
        self.partition.members.iter().map(|&i| &self.tasks[i])
    }
}
