//! Reference implementations of the collaborators consumed by [`spinrta`]:
//!
//!  - [`SpinBounds`] bounds the spin blocking of non-preemptive spinlocks
//!    under each [`LockDiscipline`](spinrta::LockDiscipline).
//!  - [`FixedPriorityRta`] is the classic uniprocessor response-time analysis
//!    for fixed-priority scheduling.
//!
//! These are simple, analytic, and pessimistic. They satisfy the contracts
//! the analysis relies on (monotonicity in the response times, FIFO never
//! worse than unordered) and are good enough for experiments comparing lock
//! implementations, but tighter (e.g., LP-based) bounds exist.
mod rta;
mod spin;
mod utils;

pub use self::{
    rta::{response_time, FixedPriorityRta},
    spin::{blocking, max_jobs, spin_delay, SpinBounds},
};
