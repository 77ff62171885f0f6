use dockyard_scheduler::{PolicyError, SchedulerError};
use thiserror::Error;

/// Errors returned synchronously by the notification bus.
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Empty topic")]
    EmptyTopic,

    #[error("Empty handler identity")]
    EmptyIdentity,

    #[error("No handlers registered for topic {0}")]
    NoHandlers(String),

    #[error("topic {0} is shut down")]
    TopicClosed(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NotifierError {
    /// Publishing to a topic nobody listens to is tolerated by most callers.
    pub fn is_no_handlers(&self) -> bool {
        matches!(self, NotifierError::NoHandlers(_))
    }
}

/// Errors raised by a handler while processing one notification.
///
/// Only ever logged by the bus; never returned to the publisher.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("unexpected payload: expected {expected}, got {actual}")]
    UnexpectedPayload {
        expected: &'static str,
        actual: &'static str,
    },

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("{0}")]
    Other(String),
}
