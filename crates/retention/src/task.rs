use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use dockyard_scheduler::{Task, TaskError};

use crate::error::{RetentionError, Result};
use crate::evaluator::evaluate_at;
use crate::model::{ProjectRef, RepositoryRef, ScopeKey, TagRecord};
use crate::repository::RetentionPolicyRepository;

/// Lists repositories and tags. Implemented by the registry backend.
pub trait TagSource: Send + Sync {
    /// Repositories covered by `scope`.
    fn repositories(&self, scope: ScopeKey) -> Result<Vec<(ProjectRef, RepositoryRef)>>;

    fn tags(&self, project: &ProjectRef, repository: &RepositoryRef) -> Result<Vec<TagRecord>>;
}

/// Removes one tag. Implemented by the registry backend.
pub trait TagDeleter: Send + Sync {
    fn delete(&self, tag: &TagRecord) -> Result<()>;
}

/// Counts from one retention run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionSummary {
    pub repositories: usize,
    pub kept: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Applies one stored retention policy to every repository in its scope.
pub struct RetentionTask {
    name: String,
    policy_id: i64,
    policies: Arc<dyn RetentionPolicyRepository>,
    source: Arc<dyn TagSource>,
    deleter: Arc<dyn TagDeleter>,
    dry_run: bool,
}

impl RetentionTask {
    pub fn new(
        policy_id: i64,
        policies: Arc<dyn RetentionPolicyRepository>,
        source: Arc<dyn TagSource>,
        deleter: Arc<dyn TagDeleter>,
    ) -> Self {
        Self {
            name: format!("retention_{}", policy_id),
            policy_id,
            policies,
            source,
            deleter,
            dry_run: false,
        }
    }

    /// Evaluate and log without deleting anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn run_at(&self, now: DateTime<Utc>) -> Result<RetentionSummary> {
        let policy = self
            .policies
            .get(self.policy_id)?
            .ok_or(RetentionError::NotFound(self.policy_id))?;
        let mut summary = RetentionSummary::default();
        if !policy.enabled {
            info!(policy = %policy.name, "retention policy disabled, skipping run");
            return Ok(summary);
        }

        for (project, repository) in self.source.repositories(policy.scope_key()?)? {
            let mut tags = self.source.tags(&project, &repository)?;
            // keep-most-recent-N depends on newest-first order.
            tags.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            let evaluation = evaluate_at(&policy, &project, &repository, &tags, now)?;
            summary.repositories += 1;
            summary.kept += evaluation.kept.len();

            for tag in &evaluation.deleted {
                if self.dry_run {
                    info!(repository = %repository.name, tag = %tag.name, "dry run: would delete");
                    summary.deleted += 1;
                    continue;
                }
                match self.deleter.delete(tag) {
                    Ok(()) => summary.deleted += 1,
                    Err(e) => {
                        warn!(repository = %repository.name, tag = %tag.name, error = %e, "tag deletion failed");
                        summary.failed += 1;
                    }
                }
            }
        }

        info!(
            policy = %policy.name,
            repositories = summary.repositories,
            kept = summary.kept,
            deleted = summary.deleted,
            failed = summary.failed,
            dry_run = self.dry_run,
            "retention run finished"
        );
        Ok(summary)
    }
}

impl Task for RetentionTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> std::result::Result<(), TaskError> {
        let summary = self.run_at(Utc::now()).map_err(TaskError::from_source)?;
        if summary.failed > 0 {
            return Err(TaskError::new(format!(
                "{} of {} tag deletions failed",
                summary.failed,
                summary.failed + summary.deleted
            )));
        }
        Ok(())
    }
}
