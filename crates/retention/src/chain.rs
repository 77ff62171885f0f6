//! Builds the ordered filter chain of a retention policy.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::Result;
use crate::filters::{Filter, FilterSpec};
use crate::model::RetentionPolicy;

/// Ordered filters of one evaluation pass.
pub type FilterChain = Vec<Box<dyn Filter>>;

/// Build the chain anchored at the current time.
pub fn build_chain(policy: &RetentionPolicy) -> Result<FilterChain> {
    build_chain_at(policy, Utc::now())
}

/// Build the chain, resolving every descriptor in order. The first error
/// aborts the build; no partial chain is returned.
pub fn build_chain_at(policy: &RetentionPolicy, now: DateTime<Utc>) -> Result<FilterChain> {
    let chain = policy
        .filters
        .iter()
        .map(|metadata| FilterSpec::resolve(metadata)?.build(now))
        .collect::<Result<FilterChain>>()?;
    debug!(policy = %policy.name, filters = chain.len(), "filter chain built");
    Ok(chain)
}
