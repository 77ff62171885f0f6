//! Runs a filter chain over one repository's tags.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::chain::{build_chain_at, FilterChain};
use crate::error::Result;
use crate::filters::FilterAction;
use crate::model::{FallThroughAction, ProjectRef, RepositoryRef, RetentionPolicy, TagRecord};

/// Outcome of one repository pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub deleted: Vec<TagRecord>,
    pub kept: Vec<TagRecord>,
}

/// Evaluate `tags` (newest first) against `policy` at the current time.
pub fn evaluate(
    policy: &RetentionPolicy,
    project: &ProjectRef,
    repository: &RepositoryRef,
    tags: &[TagRecord],
) -> Result<Evaluation> {
    evaluate_at(policy, project, repository, tags, Utc::now())
}

/// Evaluate with an explicit instant for age-based filters.
///
/// A disabled policy deletes nothing.
pub fn evaluate_at(
    policy: &RetentionPolicy,
    project: &ProjectRef,
    repository: &RepositoryRef,
    tags: &[TagRecord],
    now: DateTime<Utc>,
) -> Result<Evaluation> {
    if !policy.enabled {
        debug!(policy = %policy.name, "policy disabled, keeping all tags");
        return Ok(Evaluation {
            deleted: Vec::new(),
            kept: tags.to_vec(),
        });
    }

    let mut chain = build_chain_at(policy, now)?;
    let evaluation = apply_chain(&mut chain, policy.fall_through_action, project, repository, tags)?;
    info!(
        policy = %policy.name,
        repository = %repository.name,
        deleted = evaluation.deleted.len(),
        kept = evaluation.kept.len(),
        "retention pass evaluated"
    );
    Ok(evaluation)
}

/// Decide every tag with an already built chain. The first filter to keep
/// or delete a tag wins; undecided tags get `fall_through`. A filter error
/// aborts the whole pass.
pub fn apply_chain(
    chain: &mut FilterChain,
    fall_through: FallThroughAction,
    project: &ProjectRef,
    repository: &RepositoryRef,
    tags: &[TagRecord],
) -> Result<Evaluation> {
    for filter in chain.iter_mut() {
        filter.initialize_for(project, repository);
    }

    let mut evaluation = Evaluation::default();
    for tag in tags {
        let mut decision = FilterAction::NoDecision;
        for filter in chain.iter_mut() {
            decision = filter.process(tag)?;
            if decision != FilterAction::NoDecision {
                break;
            }
        }

        let delete = match decision {
            FilterAction::Delete => true,
            FilterAction::Keep => false,
            FilterAction::NoDecision => fall_through == FallThroughAction::DeleteExtraTags,
        };
        if delete {
            evaluation.deleted.push(tag.clone());
        } else {
            evaluation.kept.push(tag.clone());
        }
    }
    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::error::RetentionError;
    use crate::filters::{Filter, DELETE_REGEX, KEEP_MOST_RECENT_N, KEEP_REGEX};
    use crate::model::{FilterMetadata, Scope};

    fn refs() -> (ProjectRef, RepositoryRef) {
        (
            ProjectRef { id: 1, name: "library".into() },
            RepositoryRef { id: 1, name: "library/redis".into() },
        )
    }

    fn tags(names: &[&str]) -> Vec<TagRecord> {
        let (project, repository) = refs();
        let now = Utc::now();
        names
            .iter()
            .enumerate()
            .map(|(i, name)| TagRecord {
                project: project.clone(),
                repository: repository.clone(),
                name: name.to_string(),
                created_at: now - TimeDelta::hours(i as i64),
                last_pulled_at: None,
                labels: Vec::new(),
            })
            .collect()
    }

    fn names(tags: &[TagRecord]) -> Vec<&str> {
        tags.iter().map(|t| t.name.as_str()).collect()
    }

    struct Broken;

    impl Filter for Broken {
        fn kind(&self) -> &'static str {
            "broken"
        }
        fn process(&mut self, tag: &TagRecord) -> Result<FilterAction> {
            Err(RetentionError::Filter {
                filter: "broken",
                tag: tag.name.clone(),
                message: "lookup failed".into(),
            })
        }
    }

    #[test]
    fn first_decisive_filter_wins() {
        let (project, repository) = refs();
        let policy = RetentionPolicy::new("p", Scope::Server, FallThroughAction::KeepExtraTags)
            .with_filter(FilterMetadata::new(KEEP_REGEX).with_option("match", "^stable"))
            .with_filter(FilterMetadata::new(DELETE_REGEX).with_option("match", "-rc"))
            .with_filter(FilterMetadata::new(KEEP_MOST_RECENT_N).with_option("n", 1));

        let input = tags(&["stable-rc", "v2-rc", "v2", "v1"]);
        let result = evaluate(&policy, &project, &repository, &input).unwrap();

        assert_eq!(names(&result.kept), vec!["stable-rc", "v2"]);
        assert_eq!(names(&result.deleted), vec!["v2-rc", "v1"]);
    }

    #[test]
    fn disabled_policy_deletes_nothing() {
        let (project, repository) = refs();
        let mut policy = RetentionPolicy::new("p", Scope::Server, FallThroughAction::DeleteExtraTags);
        policy.enabled = false;

        let input = tags(&["a", "b"]);
        let result = evaluate(&policy, &project, &repository, &input).unwrap();
        assert!(result.deleted.is_empty());
        assert_eq!(result.kept, input);
    }

    #[test]
    fn filter_error_aborts_the_pass() {
        let (project, repository) = refs();
        let mut chain: FilterChain = vec![Box::new(Broken)];
        let err = apply_chain(
            &mut chain,
            FallThroughAction::KeepExtraTags,
            &project,
            &repository,
            &tags(&["a"]),
        )
        .unwrap_err();
        assert!(matches!(err, RetentionError::Filter { .. }));
    }

    #[test]
    fn build_error_aborts_the_pass() {
        let (project, repository) = refs();
        let policy = RetentionPolicy::new("p", Scope::Server, FallThroughAction::KeepExtraTags)
            .with_filter(FilterMetadata::new(KEEP_REGEX).with_option("match", "[unclosed"));
        assert!(evaluate(&policy, &project, &repository, &tags(&["a"])).is_err());
    }

    #[test]
    fn same_input_same_decision() {
        let (project, repository) = refs();
        let policy = RetentionPolicy::new("p", Scope::Server, FallThroughAction::DeleteExtraTags)
            .with_filter(FilterMetadata::new(KEEP_MOST_RECENT_N).with_option("n", 2));
        let input = tags(&["a", "b", "c", "d"]);
        let first = evaluate(&policy, &project, &repository, &input).unwrap();
        let second = evaluate(&policy, &project, &repository, &input).unwrap();
        assert_eq!(first, second);
        assert_eq!(names(&first.deleted), vec!["c", "d"]);
    }
}
