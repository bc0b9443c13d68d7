//! Tasks, their resource requests, and task sets
use std::{
    collections::BTreeMap,
    ops::{Index, IndexMut},
};

use crate::{
    error::AnalysisError,
    overheads,
    partition::{self, Partition, PartitionMut},
    registry::LockAssignment,
};

/// Type of time instants and durations.
///
/// The unit is left to the user. All parameters of a task set must use the
/// same one.
pub type Time = u64;

/// Identifies a shared resource.
pub type ResourceId = usize;

/// Identifies a partition (i.e., a processor under partitioned scheduling).
pub type PartitionId = usize;

/// Fixed task priority. A lower value represents a higher priority.
pub type Priority = usize;

/// The critical sections a task executes on a single resource.
///
/// The lengths are inflated by [`overheads::charge_spinlock_overheads`] and
/// never decreased afterwards.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRequest {
    /// The number of read requests issued by a job.
    pub max_reads: u32,
    /// The number of write requests issued by a job.
    pub max_writes: u32,
    /// The maximum length of a read critical section.
    pub max_read_length: Time,
    /// The maximum length of a write critical section.
    pub max_write_length: Time,
}

impl ResourceRequest {
    /// Record one more write request of the specified length.
    pub fn add_request(&mut self, length: Time) -> &mut Self {
        self.max_writes += 1;
        self.max_write_length = self.max_write_length.max(length);
        self
    }

    /// Record one more read request of the specified length.
    pub fn add_read_request(&mut self, length: Time) -> &mut Self {
        self.max_reads += 1;
        self.max_read_length = self.max_read_length.max(length);
        self
    }

    /// The total number of requests issued by a job.
    #[inline]
    pub fn max_requests(&self) -> u32 {
        self.max_reads + self.max_writes
    }

    /// The length of the longest critical section, regardless of its kind.
    #[inline]
    pub fn max_length(&self) -> Time {
        self.max_read_length.max(self.max_write_length)
    }
}

/// A sporadic task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// The task's priority. Assigned by [`TaskSet::new`].
    pub priority: Priority,
    /// The current worst-case execution cost, which may include lock
    /// overheads and blocking.
    pub cost: Time,
    /// The cost after lock overheads were charged but before blocking was
    /// folded in. See [`overheads::save_baseline`].
    pub uninflated_cost: Time,
    /// The minimum inter-arrival time.
    pub period: Time,
    /// The relative deadline.
    pub deadline: Time,
    /// The processor the task is assigned to.
    pub partition: PartitionId,
    /// The worst-case blocking delay, as last computed by a
    /// [`BlockingBounds`](crate::BlockingBounds) implementation.
    pub blocked: Time,
    /// The response-time bound found by the last schedulability test, if any.
    pub response_time: Option<Time>,
    /// The value of `response_time` in the previous round of the convergence
    /// loop. `None` means there was no previous round.
    pub previous_response_time: Option<Time>,
    /// The critical sections of the task, indexed by resource.
    pub resmodel: BTreeMap<ResourceId, ResourceRequest>,
}

impl Task {
    /// Construct a `Task` with an implicit deadline on partition `0`.
    pub fn new(cost: Time, period: Time) -> Self {
        Self {
            priority: 0,
            cost,
            uninflated_cost: cost,
            period,
            deadline: period,
            partition: 0,
            blocked: 0,
            response_time: None,
            previous_response_time: None,
            resmodel: BTreeMap::new(),
        }
    }

    /// Returns the task with the relative deadline `deadline`.
    pub fn with_deadline(self, deadline: Time) -> Self {
        Self { deadline, ..self }
    }

    /// Returns the task assigned to `partition`.
    pub fn on_partition(self, partition: PartitionId) -> Self {
        Self { partition, ..self }
    }

    /// Get the requests issued to `resource`, creating an empty entry if there
    /// isn't one.
    pub fn request(&mut self, resource: ResourceId) -> &mut ResourceRequest {
        self.resmodel.entry(resource).or_default()
    }

    /// Get the number of requests issued to `resource` by a single job.
    pub fn requests_to(&self, resource: ResourceId) -> u32 {
        self.resmodel
            .get(&resource)
            .map_or(0, ResourceRequest::max_requests)
    }

    /// The response-time estimate to be used by blocking bounds.
    ///
    /// This is the current `response_time` if the task has one. Otherwise the
    /// deadline is used, which is the largest response time a schedulable
    /// task can have.
    #[inline]
    pub fn analysis_window(&self) -> Time {
        self.response_time.unwrap_or(self.deadline)
    }

    /// Check if `response_time` didn't change since the last round.
    #[inline]
    pub fn response_time_is_stable(&self) -> bool {
        self.response_time == self.previous_response_time
    }
}

/// An ordered collection of tasks, stored in priority order.
///
/// A task is identified by its index. Views such as [`Partition`] refer to
/// tasks by index, so the order must not change after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSet {
    tasks: Vec<Task>,
    overheads_charged: bool,
}

impl TaskSet {
    /// Construct a `TaskSet` from tasks sorted by decreasing priority.
    ///
    /// Every task receives the priority equal to its index. Assign
    /// [`Task::priority`] afterwards to put tasks on the same priority level.
    pub fn new(tasks: Vec<Task>) -> Self {
        let mut this = Self {
            tasks,
            overheads_charged: false,
        };
        this.assign_fp_priorities();
        this
    }

    /// Reassign priorities in index order.
    pub fn assign_fp_priorities(&mut self) {
        for (i, task) in self.tasks.iter_mut().enumerate() {
            task.priority = i;
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.tasks.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Task> {
        self.tasks.iter_mut()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Task] {
        &self.tasks
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Task] {
        &mut self.tasks
    }

    /// Get the resources requested by at least one task, in ascending order.
    pub fn resources(&self) -> Vec<ResourceId> {
        let mut resources: Vec<_> = self
            .tasks
            .iter()
            .flat_map(|t| t.resmodel.keys().copied())
            .collect();
        resources.sort_unstable();
        resources.dedup();
        resources
    }

    /// Group the tasks by partition. See [`partition::partitions`].
    pub fn partitions(&self) -> Vec<Partition> {
        partition::partitions(&self.tasks)
    }

    /// Get a mutable view of the tasks belonging to `partition`.
    pub fn partition_mut<'a>(&'a mut self, partition: &'a Partition) -> PartitionMut<'a> {
        PartitionMut::new(partition, &mut self.tasks)
    }

    /// Whether [`Self::charge_overheads`] was called on this task set.
    #[inline]
    pub fn overheads_charged(&self) -> bool {
        self.overheads_charged
    }

    /// Charge the lock overheads of the resources used by the tasks.
    ///
    /// Unlike [`overheads::charge_spinlock_overheads`], this refuses to
    /// inflate the same task set twice.
    pub fn charge_overheads(&mut self, locks: &LockAssignment) -> Result<(), AnalysisError> {
        if self.overheads_charged {
            return Err(AnalysisError::OverheadsAlreadyCharged);
        }
        overheads::charge_spinlock_overheads(&mut self.tasks, locks);
        self.overheads_charged = true;
        Ok(())
    }

    /// See [`overheads::save_baseline`].
    pub fn save_baseline(&mut self) {
        overheads::save_baseline(&mut self.tasks);
    }

    /// See [`overheads::restore_baseline`].
    pub fn restore_baseline(&mut self) {
        overheads::restore_baseline(&mut self.tasks);
    }

    /// Check if no task's `response_time` changed since the last round.
    pub fn response_times_are_stable(&self) -> bool {
        self.tasks.iter().all(Task::response_time_is_stable)
    }

    /// Remember the current response times for the next round.
    pub fn roll_response_times(&mut self) {
        for task in self.tasks.iter_mut() {
            task.previous_response_time = task.response_time;
        }
    }

    /// Forget the response times remembered by [`Self::roll_response_times`].
    pub fn forget_previous_response_times(&mut self) {
        for task in self.tasks.iter_mut() {
            task.previous_response_time = None;
        }
    }

    /// Consume `self`, returning the tasks.
    pub fn into_inner(self) -> Vec<Task> {
        self.tasks
    }
}

impl Index<usize> for TaskSet {
    type Output = Task;

    #[inline]
    fn index(&self, index: usize) -> &Task {
        &self.tasks[index]
    }
}

impl IndexMut<usize> for TaskSet {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Task {
        &mut self.tasks[index]
    }
}

impl<'a> IntoIterator for &'a TaskSet {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}

impl<'a> IntoIterator for &'a mut TaskSet {
    type Item = &'a mut Task;
    type IntoIter = std::slice::IterMut<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter_mut()
    }
}

impl FromIterator<Task> for TaskSet {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
