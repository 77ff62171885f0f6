use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{RetentionError, Result};
use crate::model::{ProjectRef, RepositoryRef, TagRecord};

use super::{Filter, FilterAction, DELETE_OLDER_THAN, KEEP_MOST_RECENT_N, N_KEY};

/// Keeps the first `n` tags of each repository pass, deletes the rest.
/// Relies on tags arriving newest first.
pub struct KeepMostRecentN {
    n: u64,
    seen: u64,
}

impl KeepMostRecentN {
    pub fn new(n: u64) -> Self {
        Self { n, seen: 0 }
    }
}

impl Filter for KeepMostRecentN {
    fn kind(&self) -> &'static str {
        KEEP_MOST_RECENT_N
    }

    fn initialize_for(&mut self, _project: &ProjectRef, _repository: &RepositoryRef) {
        self.seen = 0;
    }

    fn process(&mut self, _tag: &TagRecord) -> Result<FilterAction> {
        self.seen += 1;
        Ok(if self.seen <= self.n {
            FilterAction::Keep
        } else {
            FilterAction::Delete
        })
    }
}

/// Deletes tags created strictly before `now - days`.
pub struct DeleteOlderThan {
    cutoff: DateTime<Utc>,
}

impl DeleteOlderThan {
    pub fn new(days: i64, now: DateTime<Utc>) -> Result<Self> {
        let cutoff = TimeDelta::try_days(days)
            .and_then(|age| now.checked_sub_signed(age))
            .ok_or_else(|| RetentionError::OutOfRange(N_KEY.to_string()))?;
        Ok(Self { cutoff })
    }
}

impl Filter for DeleteOlderThan {
    fn kind(&self) -> &'static str {
        DELETE_OLDER_THAN
    }

    fn process(&mut self, tag: &TagRecord) -> Result<FilterAction> {
        Ok(if tag.created_at < self.cutoff {
            FilterAction::Delete
        } else {
            FilterAction::NoDecision
        })
    }
}
