//! Registry subject matching
//!
//! Remote subjects are grouped by the fully-qualified type name a naming
//! convention regex extracts from them. Subjects the pattern cannot parse go
//! to an explicit unresolved bucket and never match any local schema.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::error::{GateError, Result};

/// Named capture group that must yield the fully-qualified type name
pub const TYPE_NAME_GROUP: &str = "schematypefullname";

/// Compiled subject naming convention
#[derive(Debug, Clone)]
pub struct SubjectMatcher {
    pattern: Regex,
}

impl SubjectMatcher {
    /// Compile a naming convention. The pattern must contain a
    /// `schematypefullname` named group.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| GateError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        if !regex.capture_names().flatten().any(|name| name == TYPE_NAME_GROUP) {
            return Err(GateError::InvalidPattern {
                pattern: pattern.to_string(),
                message: format!("missing named group '{TYPE_NAME_GROUP}'"),
            });
        }

        Ok(Self { pattern: regex })
    }

    /// Extract the type name embedded in a subject, if the convention applies
    pub fn extract_type_name<'s>(&self, subject: &'s str) -> Option<&'s str> {
        self.pattern
            .captures(subject)
            .and_then(|caps| caps.name(TYPE_NAME_GROUP))
            .map(|m| m.as_str())
    }

    /// Group subjects by extracted type name
    pub fn index<S: AsRef<str>>(&self, subjects: &[S]) -> SubjectIndex {
        let mut index = SubjectIndex::default();
        for subject in subjects {
            let subject = subject.as_ref();
            match self.extract_type_name(subject) {
                Some(type_name) => index
                    .groups
                    .entry(type_name.to_string())
                    .or_default()
                    .push(subject.to_string()),
                None => {
                    warn!(
                        "Unable to extract full type name from subject [{}], skipping verification of this subject.",
                        subject
                    );
                    index.unresolved.push(subject.to_string());
                }
            }
        }
        index
    }
}

/// Registry subjects grouped by fully-qualified type name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectIndex {
    groups: BTreeMap<String, Vec<String>>,
    unresolved: Vec<String>,
}

impl SubjectIndex {
    /// Subjects representing the given type, in registry order
    pub fn matching(&self, full_type_name: &str) -> &[String] {
        self.groups
            .get(full_type_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Subjects the naming convention could not parse
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    /// All groups, ordered by type name
    pub fn groups(&self) -> &BTreeMap<String, Vec<String>> {
        &self.groups
    }

    /// Number of subjects that resolved to a type
    pub fn resolved_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATTERN: &str = r"^(?<topicname>.+)-(?<schematypefullname>.+)-value$";

    #[test]
    fn test_pattern_requires_type_group() {
        let err = SubjectMatcher::new(r"^(?<topicname>.+)-value$").unwrap_err();
        assert!(matches!(err, GateError::InvalidPattern { .. }));

        let err = SubjectMatcher::new(r"^(unclosed").unwrap_err();
        assert!(matches!(err, GateError::InvalidPattern { .. }));

        assert!(SubjectMatcher::new(PATTERN).is_ok());
    }

    #[test]
    fn test_groups_by_type_name() {
        let matcher = SubjectMatcher::new(PATTERN).unwrap();
        let index = matcher.index(&[
            "orders-com.example.Foo-value",
            "audit-com.example.Foo-value",
            "orders-com.example.Bar-value",
        ]);

        assert_eq!(
            index.matching("com.example.Foo"),
            ["orders-com.example.Foo-value", "audit-com.example.Foo-value"]
        );
        assert_eq!(index.matching("com.example.Bar"), ["orders-com.example.Bar-value"]);
        assert!(index.matching("com.example.Missing").is_empty());
        assert_eq!(index.resolved_count(), 3);
    }

    #[test]
    fn test_unmatched_subjects_go_to_unresolved() {
        let matcher = SubjectMatcher::new(PATTERN).unwrap();
        let index = matcher.index(&["orders-com.example.Foo-key", "orders-com.example.Foo-value"]);

        assert_eq!(index.unresolved(), ["orders-com.example.Foo-key"]);
        for subjects in index.groups().values() {
            assert!(!subjects.contains(&"orders-com.example.Foo-key".to_string()));
        }
    }

    #[test]
    fn test_index_is_deterministic() {
        let matcher = SubjectMatcher::new(PATTERN).unwrap();
        let subjects = vec![
            "b-com.example.Foo-value".to_string(),
            "weird".to_string(),
            "a-com.example.Bar-value".to_string(),
        ];
        let first = matcher.index(&subjects);
        let second = matcher.index(&subjects);
        assert_eq!(first, second);
        assert!(second.matching("com.example.Baz").is_empty());
    }

    #[test]
    fn test_legacy_named_group_syntax() {
        let matcher = SubjectMatcher::new(r"^(?P<schematypefullname>[^-]+)-value$").unwrap();
        assert_eq!(matcher.extract_type_name("com.example.Foo-value"), Some("com.example.Foo"));
        assert_eq!(matcher.extract_type_name("com.example.Foo-key"), None);
    }
}
