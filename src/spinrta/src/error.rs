use thiserror::Error;

/// Error type for the analysis.
///
/// A task set being unschedulable is not an error. It's reported as a normal
/// result by [`Analyzer`](crate::Analyzer).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// The response times didn't settle within the iteration limit. This
    /// means either the blocking bounds aren't monotonic in the response
    /// times, or the limit is too low. Either way the result can't be trusted.
    #[error("The analysis did not converge within {max_iterations} iteration(s).")]
    Diverged { max_iterations: usize },
    #[error("Spinlock overheads were already charged to the task set.")]
    OverheadsAlreadyCharged,
    #[error("A partition must have at least one processor.")]
    NoProcessors,
}
