use regex::Regex;

use crate::error::Result;
use crate::model::TagRecord;

use super::{Filter, FilterAction, DELETE_REGEX, KEEP_REGEX};

/// Keeps tags whose name matches; undecided otherwise.
pub struct KeepRegex {
    pattern: Regex,
}

impl KeepRegex {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }
}

impl Filter for KeepRegex {
    fn kind(&self) -> &'static str {
        KEEP_REGEX
    }

    fn process(&mut self, tag: &TagRecord) -> Result<FilterAction> {
        Ok(if self.pattern.is_match(&tag.name) {
            FilterAction::Keep
        } else {
            FilterAction::NoDecision
        })
    }
}

/// Deletes tags whose name matches; undecided otherwise.
pub struct DeleteRegex {
    pattern: Regex,
}

impl DeleteRegex {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }
}

impl Filter for DeleteRegex {
    fn kind(&self) -> &'static str {
        DELETE_REGEX
    }

    fn process(&mut self, tag: &TagRecord) -> Result<FilterAction> {
        Ok(if self.pattern.is_match(&tag.name) {
            FilterAction::Delete
        } else {
            FilterAction::NoDecision
        })
    }
}
