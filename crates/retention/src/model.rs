//! Retention policy and tag records, in their wire shape.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{RetentionError, Result};
use crate::filters::FilterSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Server,
    Project,
    Repository,
}

/// Decision for tags no filter claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallThroughAction {
    KeepExtraTags,
    DeleteExtraTags,
}

/// One filter descriptor: a type tag plus its raw options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterMetadata {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: IndexMap<String, serde_json::Value>,
}

impl FilterMetadata {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            options: IndexMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    pub scope: Scope,
    pub fall_through_action: FallThroughAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<i64>,
    /// Evaluated in order; the first decisive filter wins.
    #[serde(default)]
    pub filters: Vec<FilterMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Key under which at most one retention policy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeKey {
    Server,
    Project(i64),
    Repository { project_id: i64, repository_id: i64 },
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Server => write!(f, "server"),
            ScopeKey::Project(id) => write!(f, "project:{}", id),
            ScopeKey::Repository { project_id, repository_id } => {
                write!(f, "repository:{}:{}", project_id, repository_id)
            }
        }
    }
}

impl RetentionPolicy {
    /// A new enabled policy with no filters, timestamped now.
    pub fn new(name: impl Into<String>, scope: Scope, fall_through_action: FallThroughAction) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            enabled: true,
            scope,
            fall_through_action,
            project_id: None,
            repository_id: None,
            filters: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_filter(mut self, filter: FilterMetadata) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn scope_key(&self) -> Result<ScopeKey> {
        match self.scope {
            Scope::Server => Ok(ScopeKey::Server),
            Scope::Project => self
                .project_id
                .map(ScopeKey::Project)
                .ok_or_else(|| RetentionError::InvalidPolicy("project scope requires project_id".into())),
            Scope::Repository => match (self.project_id, self.repository_id) {
                (Some(project_id), Some(repository_id)) => Ok(ScopeKey::Repository {
                    project_id,
                    repository_id,
                }),
                _ => Err(RetentionError::InvalidPolicy(
                    "repository scope requires project_id and repository_id".into(),
                )),
            },
        }
    }

    /// Check the name, the scope/ID coupling and every filter descriptor.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RetentionError::InvalidPolicy("name must not be blank".into()));
        }
        self.scope_key()?;
        for filter in &self.filters {
            FilterSpec::resolve(filter)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub id: i64,
    pub name: String,
}

/// Facts about one tag, as presented to the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub project: ProjectRef,
    pub repository: RepositoryRef,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pulled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<String>,
}
