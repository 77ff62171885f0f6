//! Tag retention: policies, filter chains and their evaluation.
//!
//! A [`RetentionPolicy`] lists filter descriptors in order. For each
//! repository pass the descriptors are built into a fresh chain; every tag
//! goes through the chain until a filter keeps or deletes it, otherwise
//! the policy's [`FallThroughAction`] decides.

pub mod chain;
pub mod error;
pub mod evaluator;
pub mod filters;
pub mod model;
pub mod repository;
pub mod task;

pub use chain::{build_chain, build_chain_at, FilterChain};
pub use error::{RetentionError, Result};
pub use evaluator::{apply_chain, evaluate, evaluate_at, Evaluation};
pub use filters::{Filter, FilterAction, FilterSpec};
pub use model::{
    FallThroughAction, FilterMetadata, ProjectRef, RepositoryRef, RetentionPolicy, Scope, ScopeKey,
    TagRecord,
};
pub use repository::{InMemoryPolicyRepository, RetentionPolicyRepository};
pub use task::{RetentionSummary, RetentionTask, TagDeleter, TagSource};
