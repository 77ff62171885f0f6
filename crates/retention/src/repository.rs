//! Retention policy storage.
//!
//! The production backend lives outside this crate; [`InMemoryPolicyRepository`]
//! enforces the same rules (one policy per scope key, filters kept in order)
//! and backs tests and single-process deployments.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use tracing::info;

use crate::error::{RetentionError, Result};
use crate::model::{RetentionPolicy, ScopeKey};

pub trait RetentionPolicyRepository: Send + Sync {
    /// Validate and store a new policy. Returns the assigned ID.
    fn create(&self, policy: RetentionPolicy) -> Result<i64>;

    fn get(&self, id: i64) -> Result<Option<RetentionPolicy>>;

    /// Replace an existing policy, matched by ID.
    fn update(&self, policy: RetentionPolicy) -> Result<()>;

    fn delete(&self, id: i64) -> Result<()>;

    fn find_by_scope(&self, key: ScopeKey) -> Result<Option<RetentionPolicy>>;

    /// All policies, ordered by ID.
    fn list(&self) -> Result<Vec<RetentionPolicy>>;
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    policies: BTreeMap<i64, RetentionPolicy>,
    by_scope: HashMap<ScopeKey, i64>,
}

#[derive(Default)]
pub struct InMemoryPolicyRepository {
    tables: RwLock<Tables>,
}

impl InMemoryPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RetentionPolicyRepository for InMemoryPolicyRepository {
    fn create(&self, mut policy: RetentionPolicy) -> Result<i64> {
        policy.validate()?;
        let key = policy.scope_key()?;

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if tables.by_scope.contains_key(&key) {
            return Err(RetentionError::ScopeTaken(key.to_string()));
        }

        tables.next_id += 1;
        let id = tables.next_id;
        let now = Utc::now();
        policy.id = id;
        policy.created_at = now;
        policy.updated_at = now;

        tables.by_scope.insert(key, id);
        tables.policies.insert(id, policy);
        info!(id, scope = %key, "retention policy created");
        Ok(id)
    }

    fn get(&self, id: i64) -> Result<Option<RetentionPolicy>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.policies.get(&id).cloned())
    }

    fn update(&self, mut policy: RetentionPolicy) -> Result<()> {
        policy.validate()?;
        let key = policy.scope_key()?;

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let existing = tables
            .policies
            .get(&policy.id)
            .ok_or(RetentionError::NotFound(policy.id))?;
        let old_key = existing.scope_key()?;
        let created_at = existing.created_at;

        if old_key != key {
            if tables.by_scope.contains_key(&key) {
                return Err(RetentionError::ScopeTaken(key.to_string()));
            }
            tables.by_scope.remove(&old_key);
            tables.by_scope.insert(key, policy.id);
        }

        policy.created_at = created_at;
        policy.updated_at = Utc::now();
        info!(id = policy.id, scope = %key, "retention policy updated");
        tables.policies.insert(policy.id, policy);
        Ok(())
    }

    fn delete(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let removed = tables.policies.remove(&id).ok_or(RetentionError::NotFound(id))?;
        if let Ok(key) = removed.scope_key() {
            tables.by_scope.remove(&key);
        }
        info!(id, "retention policy deleted");
        Ok(())
    }

    fn find_by_scope(&self, key: ScopeKey) -> Result<Option<RetentionPolicy>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables
            .by_scope
            .get(&key)
            .and_then(|id| tables.policies.get(id))
            .cloned())
    }

    fn list(&self) -> Result<Vec<RetentionPolicy>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.policies.values().cloned().collect())
    }
}
