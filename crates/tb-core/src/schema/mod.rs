//! Persisted Shapes and Version Migration
//!
//! Stored values are untrusted: they may come from any earlier release, be
//! partially written, or be edited by hand. Every shape is read field by
//! field, unknown fields are dropped, absent fields take their defaults and
//! wrongly typed fields are collected into a single [`ParseError::Invalid`].
//!
//! Each shape carries a `schemaVersion` tag. Older versions are read with
//! their own reader and then upgraded one step at a time until they reach the
//! current version.

mod block_set;
mod options;
mod reader;

use std::fmt;

use serde_json::Value;

pub use block_set::*;
pub use options::*;

/// Key of the version tag in every persisted shape.
pub const VERSION_KEY: &str = "schemaVersion";

/// A single offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted JSON path of the field, empty for the root value
    pub path: String,
    /// Description of the accepted shape
    pub expected: &'static str,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "(root)" } else { &self.path };
        write!(f, "{path}: expected {}", self.expected)
    }
}

/// Error type for parsing persisted data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Value is null or undefined")]
    NullOrUndefined,
    #[error("Can't identify schema version")]
    CantIdentifyVersion,
    #[error("Invalid fields: {}", join_issues(.0))]
    Invalid(Vec<ValidationIssue>),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Determine which schema version `value` was written with.
///
/// An absent tag or one below 1 means the untagged legacy version 0. Tags
/// from 1 up to `current` are accepted as they are.
pub(crate) fn detect_version(value: &Value, current: u32) -> Result<u32, ParseError> {
    match value.get(VERSION_KEY) {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => {
            let tag = n.as_f64().ok_or(ParseError::CantIdentifyVersion)?;
            if tag < 1.0 {
                Ok(0)
            } else if tag.fract() == 0.0 && tag <= current as f64 {
                Ok(tag as u32)
            } else {
                Err(ParseError::CantIdentifyVersion)
            }
        }
        Some(_) => Err(ParseError::CantIdentifyVersion),
    }
}

/// Reject `undefined` (absent) and `null` input up front.
pub(crate) fn require_present(raw: Option<&Value>) -> Result<&Value, ParseError> {
    match raw {
        None | Some(Value::Null) => Err(ParseError::NullOrUndefined),
        Some(value) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_version() {
        assert_eq!(detect_version(&json!({}), 1), Ok(0));
        assert_eq!(detect_version(&json!({"schemaVersion": 0}), 1), Ok(0));
        assert_eq!(detect_version(&json!({"schemaVersion": -3}), 1), Ok(0));
        assert_eq!(detect_version(&json!({"schemaVersion": 0.5}), 1), Ok(0));
        assert_eq!(detect_version(&json!({"schemaVersion": 1}), 1), Ok(1));
        assert_eq!(
            detect_version(&json!({"schemaVersion": 2}), 1),
            Err(ParseError::CantIdentifyVersion)
        );
        assert_eq!(
            detect_version(&json!({"schemaVersion": 1.5}), 1),
            Err(ParseError::CantIdentifyVersion)
        );
        assert_eq!(
            detect_version(&json!({"schemaVersion": "1"}), 1),
            Err(ParseError::CantIdentifyVersion)
        );
    }

    #[test]
    fn test_issue_display() {
        let err = ParseError::Invalid(vec![
            ValidationIssue { path: String::new(), expected: "object" },
            ValidationIssue { path: "name".into(), expected: "string" },
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid fields: (root): expected object; name: expected string"
        );
    }
}
