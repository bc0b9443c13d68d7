//! Spin-lock-aware schedulability analysis for partitioned multiprocessors.
//!
//! Given a set of periodic/sporadic tasks, the resources each of them requests,
//! and the spinlock discipline protecting those resources, this crate answers
//! whether every task meets its deadline once locking overheads and blocking
//! are accounted for.
//!
//! The crate itself doesn't know any blocking-bound formula or response-time
//! analysis. Those are supplied by the caller through [`BlockingBounds`] and
//! [`SchedulabilityTest`]. What it does own is the procedure that ties them
//! together:
//!
//!  1. Lock overheads are charged to the tasks exactly once
//!     ([`overheads::charge_spinlock_overheads`]).
//!  2. The resulting cost is saved as a baseline.
//!  3. Blocking is computed from the current response-time estimates and
//!     folded into the cost, which is then checked by the schedulability test
//!     on every partition. The response times it produces feed the next round
//!     of blocking bounds until they stop changing ([`Analyzer::converge`]).
//!
//! # Example
//!
//! ```
//! use spinrta::{Analyzer, LockAssignment, PartitionMut, SpinlockPolicy, Task, TaskSet};
//!
//! // A crude bound: every task may wait for the longest critical section of
//! // every other task once.
//! fn wait_for_everyone(tasks: &mut TaskSet) {
//!     let longest: Vec<_> = tasks
//!         .iter()
//!         .map(|t| t.resmodel.values().map(|r| r.max_length()).max().unwrap_or(0))
//!         .collect();
//!     let total: u64 = longest.iter().sum();
//!     for (task, own) in tasks.iter_mut().zip(longest) {
//!         task.blocked = total - own;
//!     }
//! }
//!
//! // A test that only understands one task per partition.
//! fn lone_task(_num_cpus: usize, group: &mut PartitionMut<'_>) -> bool {
//!     let task = group.task_mut(0);
//!     task.response_time = Some(task.cost);
//!     task.cost <= task.deadline
//! }
//!
//! let mut tasks = TaskSet::new(vec![
//!     Task::new(10, 100).on_partition(0),
//!     Task::new(20, 100).on_partition(1),
//! ]);
//! tasks[0].request(0).add_request(2);
//! tasks[1].request(0).add_request(3);
//!
//! let locks = LockAssignment::new(SpinlockPolicy::fifo(1));
//! let analyzer = Analyzer::new(&locks, wait_for_everyone, lone_task);
//! let (converged, tasks) = analyzer.stable_schedule(tasks, None).unwrap();
//! assert!(converged);
//! assert_eq!(tasks[0].response_time, Some(10 + 1 + 3));
//! ```
pub mod analysis;
pub mod error;
pub mod model;
pub mod overheads;
pub mod partition;
pub mod policy;
pub mod registry;
pub mod sched;

pub use self::{
    analysis::{
        AnalysisConfig, Analyzer, Convergence, Outcome, ResponseTimeSeed, DEFAULT_MAX_ITERATIONS,
    },
    error::AnalysisError,
    model::{PartitionId, Priority, ResourceId, ResourceRequest, Task, TaskSet, Time},
    partition::{Partition, PartitionMut},
    policy::{
        BlockingBounds, LockDiscipline, LockOverheads, ParseLockDisciplineError, SpinlockPolicy,
    },
    registry::LockAssignment,
    sched::SchedulabilityTest,
};
