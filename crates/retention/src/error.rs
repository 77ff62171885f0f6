//! Error types for retention policies and their evaluation.

/// Errors raised while building filter chains, validating or storing
/// policies, and running retention passes.
#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
    #[error("missing required key {0}")]
    MissingKey(String),

    #[error("{key} is wrong type (not a {expected})")]
    WrongType { key: String, expected: &'static str },

    #[error("{0}: cannot be negative")]
    NotPositive(String),

    #[error("{0}: out of range")]
    OutOfRange(String),

    #[error("{key}: {source}")]
    InvalidRegex {
        key: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown filter type: {0}")]
    UnknownFilter(String),

    #[error("invalid retention policy: {0}")]
    InvalidPolicy(String),

    #[error("retention policy {0} not found")]
    NotFound(i64),

    #[error("a retention policy already applies to {0}")]
    ScopeTaken(String),

    #[error("filter {filter} failed on tag {tag}: {message}")]
    Filter {
        filter: &'static str,
        tag: String,
        message: String,
    },

    /// Failure reported by an external collaborator (tag listing, deletion).
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, RetentionError>;
