use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::error::{RetentionError, Result};

type Options = IndexMap<String, Value>;

fn required<'a>(options: &'a Options, key: &str) -> Result<&'a Value> {
    options
        .get(key)
        .ok_or_else(|| RetentionError::MissingKey(key.to_string()))
}

/// Integer option that must be strictly positive.
pub(super) fn positive_int(options: &Options, key: &str) -> Result<i64> {
    let n = required(options, key)?
        .as_i64()
        .ok_or_else(|| RetentionError::WrongType {
            key: key.to_string(),
            expected: "int",
        })?;
    if n <= 0 {
        return Err(RetentionError::NotPositive(key.to_string()));
    }
    Ok(n)
}

pub(super) fn regex(options: &Options, key: &str) -> Result<Regex> {
    let pattern = required(options, key)?
        .as_str()
        .ok_or_else(|| RetentionError::WrongType {
            key: key.to_string(),
            expected: "string",
        })?;
    Regex::new(pattern).map_err(|source| RetentionError::InvalidRegex {
        key: key.to_string(),
        source,
    })
}
