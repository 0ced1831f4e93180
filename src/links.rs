//! Link entries and the line codec for the links file
//!
//! The links file holds one entry per line: a path token, a run of
//! whitespace, then a target URL. Blank lines are ignored. There is no
//! comment syntax and no escaping.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Path to target mapping, as held by the registry and returned by backends
pub type LinkTable = HashMap<String, String>;

/// A single path to target mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub path: String,
    pub target: String,
}

impl Entry {
    /// Build a validated entry from user input.
    ///
    /// Trailing `/` characters are trimmed from the path. The path must then
    /// be non-empty and free of whitespace, and the target must parse as a URL.
    pub fn new(path: impl AsRef<str>, target: impl Into<String>) -> Result<Self, EntryError> {
        let path = path.as_ref().trim_end_matches('/');
        if path.is_empty() || path.chars().any(char::is_whitespace) {
            return Err(EntryError::InvalidPath(path.to_string()));
        }

        let target = target.into();
        if let Err(reason) = Url::parse(&target) {
            return Err(EntryError::InvalidTarget { target, reason });
        }

        Ok(Self {
            path: path.to_string(),
            target,
        })
    }

    /// Serialize as a links file line, newline included
    pub fn to_line(&self) -> String {
        format_line(&self.path, &self.target)
    }
}

/// Why a non-blank line was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedReason {
    #[error("expected exactly two fields, found {0}")]
    FieldCount(usize),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("Malformed entry on line {line}: {reason} ({content:?})")]
    Malformed {
        line: usize,
        content: String,
        reason: MalformedReason,
    },

    #[error("Invalid path '{0}': paths must be non-empty and contain no whitespace")]
    InvalidPath(String),

    #[error("Invalid target '{target}': {reason}")]
    InvalidTarget {
        target: String,
        reason: url::ParseError,
    },
}

/// Parse one line of the links file.
///
/// Returns `Ok(None)` for blank lines. `line_number` is 1-based and only used
/// to label errors.
pub fn parse_line(line: &str, line_number: usize) -> Result<Option<Entry>, EntryError> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    match fields.as_slice() {
        [] => Ok(None),
        [path, target] => match Url::parse(target) {
            Ok(_) => Ok(Some(Entry {
                path: path.to_string(),
                target: target.to_string(),
            })),
            Err(e) => Err(EntryError::Malformed {
                line: line_number,
                content: target.to_string(),
                reason: MalformedReason::InvalidUrl(e),
            }),
        },
        _ => Err(EntryError::Malformed {
            line: line_number,
            content: line.to_string(),
            reason: MalformedReason::FieldCount(fields.len()),
        }),
    }
}

/// Parse a whole links document.
///
/// Later duplicates of a path overwrite earlier ones. The first malformed
/// line aborts the parse.
pub fn parse_table(text: &str) -> Result<LinkTable, EntryError> {
    let mut table = LinkTable::new();

    for (idx, line) in text.lines().enumerate() {
        if let Some(entry) = parse_line(line, idx + 1)? {
            table.insert(entry.path, entry.target);
        }
    }

    Ok(table)
}

/// Serialize a path and target as a links file line
pub fn format_line(path: &str, target: &str) -> String {
    format!("{} {}\n", path, target)
}

/// The path token of a raw line, if it has one
pub fn line_path(line: &str) -> Option<&str> {
    line.split_whitespace().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_two_fields() {
        let entry = parse_line("foo https://foo.example", 1).unwrap().unwrap();
        assert_eq!(entry.path, "foo");
        assert_eq!(entry.target, "https://foo.example");
    }

    #[test]
    fn test_parse_line_collapses_whitespace() {
        let entry = parse_line("  foo \t  https://foo.example/a/b  ", 3)
            .unwrap()
            .unwrap();
        assert_eq!(entry.path, "foo");
        assert_eq!(entry.target, "https://foo.example/a/b");
    }

    #[test]
    fn test_parse_line_blank() {
        assert_eq!(parse_line("", 1).unwrap(), None);
        assert_eq!(parse_line("   \t ", 2).unwrap(), None);
    }

    #[test]
    fn test_parse_line_single_field() {
        let err = parse_line("onlyonetoken", 4).unwrap_err();
        assert_eq!(
            err,
            EntryError::Malformed {
                line: 4,
                content: "onlyonetoken".to_string(),
                reason: MalformedReason::FieldCount(1),
            }
        );
    }

    #[test]
    fn test_parse_line_three_fields() {
        let err = parse_line("a b c", 7).unwrap_err();
        assert!(matches!(
            err,
            EntryError::Malformed {
                line: 7,
                reason: MalformedReason::FieldCount(3),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_line_bad_url() {
        let err = parse_line("a not-a-url", 2).unwrap_err();
        match err {
            EntryError::Malformed {
                line,
                content,
                reason: MalformedReason::InvalidUrl(_),
            } => {
                assert_eq!(line, 2);
                assert_eq!(content, "not-a-url");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_table_last_duplicate_wins() {
        let table = parse_table("a https://x.example\n\nb https://b.example\na https://y.example\n")
            .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table["a"], "https://y.example");
        assert_eq!(table["b"], "https://b.example");
    }

    #[test]
    fn test_parse_table_reports_line_number() {
        let err = parse_table("a https://a.example\n\nbroken\n").unwrap_err();
        assert!(matches!(err, EntryError::Malformed { line: 3, .. }));
    }

    #[test]
    fn test_entry_new_trims_trailing_slash() {
        let entry = Entry::new("docs/", "https://docs.example").unwrap();
        assert_eq!(entry.path, "docs");
        assert_eq!(entry.to_line(), "docs https://docs.example\n");
    }

    #[test]
    fn test_entry_new_rejects_bad_input() {
        assert!(matches!(
            Entry::new("/", "https://a.example"),
            Err(EntryError::InvalidPath(_))
        ));
        assert!(matches!(
            Entry::new("two words", "https://a.example"),
            Err(EntryError::InvalidPath(_))
        ));
        assert!(matches!(
            Entry::new("ok", "nope"),
            Err(EntryError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn test_line_path() {
        assert_eq!(line_path("foo https://foo.example"), Some("foo"));
        assert_eq!(line_path("  "), None);
    }
}
