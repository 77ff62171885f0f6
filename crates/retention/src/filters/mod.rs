//! Retention filters and the typed form of their options.
//!
//! A [`FilterMetadata`] carries a type tag and a dynamic option map. It is
//! resolved once into a [`FilterSpec`] (the only place option maps are
//! inspected), which then builds the stateful [`Filter`].

mod everything;
mod options;
mod pattern;
mod recency;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::{RetentionError, Result};
use crate::model::{FilterMetadata, ProjectRef, RepositoryRef, TagRecord};

pub use everything::{DeleteEverything, KeepEverything};
pub use pattern::{DeleteRegex, KeepRegex};
pub use recency::{DeleteOlderThan, KeepMostRecentN};

pub const KEEP_EVERYTHING: &str = "retention:filter:keep_everything";
pub const DELETE_EVERYTHING: &str = "retention:filter:delete_everything";
pub const KEEP_REGEX: &str = "retention:filter:keep_regex";
pub const DELETE_REGEX: &str = "retention:filter:delete_regex";
pub const KEEP_MOST_RECENT_N: &str = "retention:filter:keep_most_recent_n";
pub const DELETE_OLDER_THAN: &str = "retention:filter:delete_older_than";

/// Option key of the regex filters.
pub const MATCH_KEY: &str = "match";
/// Option key of the count and age filters.
pub const N_KEY: &str = "n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    Keep,
    Delete,
    NoDecision,
}

/// One stage of a filter chain.
pub trait Filter: Send {
    /// Type tag this filter was built from.
    fn kind(&self) -> &'static str;

    /// Reset per-repository state before a new repository pass.
    fn initialize_for(&mut self, _project: &ProjectRef, _repository: &RepositoryRef) {}

    fn process(&mut self, tag: &TagRecord) -> Result<FilterAction>;
}

/// Validated filter options.
#[derive(Debug, Clone)]
pub enum FilterSpec {
    KeepEverything,
    DeleteEverything,
    KeepRegex(Regex),
    DeleteRegex(Regex),
    KeepMostRecentN(u64),
    /// Age threshold in days.
    DeleteOlderThan(i64),
}

impl FilterSpec {
    pub fn resolve(metadata: &FilterMetadata) -> Result<Self> {
        let opts = &metadata.options;
        match metadata.kind.as_str() {
            KEEP_EVERYTHING => Ok(FilterSpec::KeepEverything),
            DELETE_EVERYTHING => Ok(FilterSpec::DeleteEverything),
            KEEP_REGEX => options::regex(opts, MATCH_KEY).map(FilterSpec::KeepRegex),
            DELETE_REGEX => options::regex(opts, MATCH_KEY).map(FilterSpec::DeleteRegex),
            KEEP_MOST_RECENT_N => {
                options::positive_int(opts, N_KEY).map(|n| FilterSpec::KeepMostRecentN(n as u64))
            }
            DELETE_OLDER_THAN => options::positive_int(opts, N_KEY).map(FilterSpec::DeleteOlderThan),
            other => Err(RetentionError::UnknownFilter(other.to_string())),
        }
    }

    /// Instantiate the filter. `now` anchors age-based decisions.
    pub fn build(self, now: DateTime<Utc>) -> Result<Box<dyn Filter>> {
        Ok(match self {
            FilterSpec::KeepEverything => Box::new(KeepEverything),
            FilterSpec::DeleteEverything => Box::new(DeleteEverything),
            FilterSpec::KeepRegex(re) => Box::new(KeepRegex::new(re)),
            FilterSpec::DeleteRegex(re) => Box::new(DeleteRegex::new(re)),
            FilterSpec::KeepMostRecentN(n) => Box::new(KeepMostRecentN::new(n)),
            FilterSpec::DeleteOlderThan(days) => Box::new(DeleteOlderThan::new(days, now)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(kind: &str, options: serde_json::Value) -> Result<FilterSpec> {
        let mut meta = FilterMetadata::new(kind);
        for (k, v) in options.as_object().unwrap() {
            meta = meta.with_option(k.clone(), v.clone());
        }
        FilterSpec::resolve(&meta)
    }

    fn message(kind: &str, options: serde_json::Value) -> String {
        resolve(kind, options).unwrap_err().to_string()
    }

    #[test]
    fn option_errors() {
        assert_eq!(message(KEEP_MOST_RECENT_N, json!({})), "missing required key n");
        assert_eq!(message(KEEP_MOST_RECENT_N, json!({"n": "3"})), "n is wrong type (not a int)");
        assert_eq!(message(DELETE_OLDER_THAN, json!({"n": 2.5})), "n is wrong type (not a int)");
        assert_eq!(message(DELETE_OLDER_THAN, json!({"n": -4})), "n: cannot be negative");
        assert_eq!(message(KEEP_MOST_RECENT_N, json!({"n": 0})), "n: cannot be negative");
        assert_eq!(message(KEEP_REGEX, json!({})), "missing required key match");
        assert_eq!(message(DELETE_REGEX, json!({"match": 7})), "match is wrong type (not a string)");
        assert!(message(KEEP_REGEX, json!({"match": "("})).starts_with("match: "));
    }

    #[test]
    fn unknown_type() {
        assert_eq!(
            message("retention:filter:keep_latest_pulled", json!({})),
            "unknown filter type: retention:filter:keep_latest_pulled"
        );
    }

    #[test]
    fn resolves_every_known_type() {
        assert!(matches!(resolve(KEEP_EVERYTHING, json!({})), Ok(FilterSpec::KeepEverything)));
        assert!(matches!(resolve(DELETE_EVERYTHING, json!({})), Ok(FilterSpec::DeleteEverything)));
        assert!(matches!(resolve(KEEP_REGEX, json!({"match": "^v"})), Ok(FilterSpec::KeepRegex(_))));
        assert!(matches!(resolve(DELETE_REGEX, json!({"match": "rc"})), Ok(FilterSpec::DeleteRegex(_))));
        assert!(matches!(resolve(KEEP_MOST_RECENT_N, json!({"n": 3})), Ok(FilterSpec::KeepMostRecentN(3))));
        assert!(matches!(resolve(DELETE_OLDER_THAN, json!({"n": 10})), Ok(FilterSpec::DeleteOlderThan(10))));
    }

    #[test]
    fn huge_age_is_out_of_range() {
        let spec = resolve(DELETE_OLDER_THAN, json!({"n": i64::MAX})).unwrap();
        let err = spec.build(Utc::now()).err().unwrap();
        assert_eq!(err.to_string(), "n: out of range");
    }
}
