use crate::error::Result;
use crate::model::TagRecord;

use super::{Filter, FilterAction, DELETE_EVERYTHING, KEEP_EVERYTHING};

pub struct KeepEverything;

impl Filter for KeepEverything {
    fn kind(&self) -> &'static str {
        KEEP_EVERYTHING
    }

    fn process(&mut self, _tag: &TagRecord) -> Result<FilterAction> {
        Ok(FilterAction::Keep)
    }
}

pub struct DeleteEverything;

impl Filter for DeleteEverything {
    fn kind(&self) -> &'static str {
        DELETE_EVERYTHING
    }

    fn process(&mut self, _tag: &TagRecord) -> Result<FilterAction> {
        Ok(FilterAction::Delete)
    }
}
