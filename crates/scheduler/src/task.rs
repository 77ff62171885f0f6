use crate::error::TaskError;

/// A unit of work attached to a policy and executed on every tick.
///
/// `run` executes synchronously on a blocking worker thread, so
/// implementations may perform blocking I/O. A task can be invoked
/// repeatedly across ticks, possibly while a previous invocation is
/// still in flight; implementations define their own re-entrance rules.
pub trait Task: Send + Sync {
    /// Stable identifier used for logging.
    fn name(&self) -> &str;

    /// Execute the task once.
    fn run(&self) -> Result<(), TaskError>;
}
