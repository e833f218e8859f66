//! JSONPath selectors used by template rules

use jsonpath_rust::JsonPath;
use serde_json::Value;
use std::fmt;

use crate::error::{Result, XapiError};

/// One or more `|`-separated JSONPath expressions
///
/// Matches from every alternative are concatenated in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSelector {
    source: String,
    alternatives: Vec<String>,
}

impl PathSelector {
    /// Parse and check every alternative of `source`
    pub fn parse(source: &str) -> Result<Self> {
        let alternatives: Vec<String> = source
            .split('|')
            .map(str::trim)
            .filter(|alt| !alt.is_empty())
            .map(str::to_string)
            .collect();

        if alternatives.is_empty() {
            return Err(XapiError::InvalidPath(format!("'{}' has no path expressions", source)));
        }

        for alternative in &alternatives {
            if !alternative.starts_with('$') {
                return Err(XapiError::InvalidPath(format!(
                    "'{}' must start with '$'",
                    alternative
                )));
            }
            // syntax errors surface on any input, so probe with an empty document
            Value::Null
                .query(alternative)
                .map_err(|e| XapiError::InvalidPath(format!("'{}': {}", alternative, e)))?;
        }

        Ok(Self {
            source: source.to_string(),
            alternatives,
        })
    }

    /// Expression as written in the profile
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Individual alternatives
    pub fn alternatives(&self) -> &[String] {
        &self.alternatives
    }

    /// Evaluate every alternative against `root`, concatenating the matches
    pub fn select<'a>(&self, root: &'a Value) -> Result<Vec<&'a Value>> {
        let mut matched = Vec::new();
        for alternative in &self.alternatives {
            let found = root
                .query(alternative)
                .map_err(|e| XapiError::InvalidPath(format!("'{}': {}", alternative, e)))?;
            matched.extend(found);
        }
        Ok(matched)
    }
}

impl fmt::Display for PathSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn statement() -> Value {
        json!({
            "verb": {"id": "https://example.com/verbs/scored"},
            "result": {"score": {"raw": 7, "max": 10}},
            "context": {
                "contextActivities": {
                    "parent": [{"id": "https://example.com/course"}],
                    "grouping": [{"id": "https://example.com/a"}, {"id": "https://example.com/b"}]
                }
            }
        })
    }

    #[test]
    fn test_single_path() {
        let statement = statement();
        let selector = PathSelector::parse("$.result.score.raw").unwrap();
        assert_eq!(selector.select(&statement).unwrap(), vec![&json!(7)]);
    }

    #[test]
    fn test_alternatives_preserve_order() {
        let statement = statement();
        let selector =
            PathSelector::parse("$.result.score.max | $.result.score.raw | $.result.score.min").unwrap();
        assert_eq!(selector.alternatives().len(), 3);
        assert_eq!(selector.select(&statement).unwrap(), vec![&json!(10), &json!(7)]);
    }

    #[test]
    fn test_wildcard_array_traversal() {
        let statement = statement();
        let selector = PathSelector::parse("$.context.contextActivities.grouping[*].id").unwrap();
        assert_eq!(
            selector.select(&statement).unwrap(),
            vec![&json!("https://example.com/a"), &json!("https://example.com/b")]
        );
    }

    #[test]
    fn test_missing_path_matches_nothing() {
        let statement = statement();
        let selector = PathSelector::parse("$.result.response").unwrap();
        assert!(selector.select(&statement).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_relative_paths() {
        assert!(matches!(PathSelector::parse("result.score"), Err(XapiError::InvalidPath(_))));
        assert!(matches!(PathSelector::parse(" | "), Err(XapiError::InvalidPath(_))));
    }
}
