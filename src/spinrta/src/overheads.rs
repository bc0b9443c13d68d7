//! Charging spinlock overheads to tasks
//!
//! Acquiring and releasing a spinlock takes time on top of the critical
//! section itself. [`charge_spinlock_overheads`] accounts for this by
//! inflating the tasks' costs and critical-section lengths according to the
//! [`SpinlockPolicy`](crate::SpinlockPolicy) protecting each resource.
use crate::{
    model::{Task, Time},
    registry::LockAssignment,
};

/// Inflate every request and task cost by the overheads of the spinlock
/// protecting the requested resource.
///
/// For every resource a task uses, the critical overhead is added to the
/// length of its read and write critical sections (each only if there's at
/// least one request of that kind), and the total overhead is added to the
/// task's cost once per request.
///
/// Every addition saturates at `Time::MAX`.
///
/// This has no memory of previous calls. Charging the same tasks twice
/// inflates them twice. Use [`TaskSet::charge_overheads`] to have this
/// checked.
///
/// [`TaskSet::charge_overheads`]: crate::TaskSet::charge_overheads
pub fn charge_spinlock_overheads(tasks: &mut [Task], locks: &LockAssignment) {
    for (i, task) in tasks.iter_mut().enumerate() {
        let mut extra_cost = 0;

        for (&resource, req) in task.resmodel.iter_mut() {
            let spinlock = locks.resource_spinlock(resource);
            let critical = spinlock.critical_overhead();

            if req.max_reads > 0 {
                req.max_read_length = req.max_read_length.saturating_add(critical);
            }

            if req.max_writes > 0 {
                req.max_write_length = req.max_write_length.saturating_add(critical);
            }

            extra_cost = Time::from(req.max_requests())
                .saturating_mul(spinlock.total_overhead())
                .saturating_add(extra_cost);
        }

        log::trace!(
            "task {i}: cost = {} + {extra_cost} (lock overheads)",
            task.cost
        );
        task.cost = task.cost.saturating_add(extra_cost);
    }
}

/// Remember the current cost of every task as its baseline
/// ([`Task::uninflated_cost`]).
pub fn save_baseline(tasks: &mut [Task]) {
    for task in tasks.iter_mut() {
        task.uninflated_cost = task.cost;
    }
}

/// Reset the cost of every task to the value saved by [`save_baseline`].
pub fn restore_baseline(tasks: &mut [Task]) {
    for task in tasks.iter_mut() {
        task.cost = task.uninflated_cost;
    }
}
