//! Error types for policy scheduling.

/// Validation errors returned synchronously by the scheduler API.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Empty configurations")]
    EmptyConfiguration,

    /// Reported by callers that resolve a policy dynamically and find none.
    #[error("nil is not a Policy object")]
    NilPolicy,

    #[error("Policy should be assigned a name")]
    UnnamedPolicy,

    #[error("Policy must attach task(s)")]
    NoTasks,

    #[error("Duplicated policy: {0}")]
    Duplicated(String),

    #[error("Empty policy name is invalid")]
    EmptyName,

    #[error("Policy {0} is not existing")]
    NotExisting(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Errors raised by policy implementations.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("no tasks can be attached")]
    NoTasksToAttach,

    #[error("invalid policy configuration: {0}")]
    InvalidConfiguration(String),

    #[error("policy engine failed to shut down: {0}")]
    Shutdown(String),
}

/// Error returned by [`Task::run`](crate::task::Task::run).
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a collaborator error, keeping its message verbatim.
    pub fn from_source<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}
