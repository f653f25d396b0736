//! Subject patterns.
//!
//! Subjects are dot-separated tokens. In a pattern, `*` matches exactly one
//! token and `>` matches one or more trailing tokens.

use crate::error::{PermsError, Result};

/// Single-token wildcard.
pub const SINGLE_WILDCARD: &str = "*";

/// Trailing multi-token wildcard.
pub const TRAILING_WILDCARD: &str = ">";

/// Check that a subject (or pattern) is well formed.
///
/// Used for export subjects. Permission patterns are deliberately not
/// checked here.
pub fn validate_subject(subject: &str) -> Result<()> {
    let invalid = |reason: &str| PermsError::InvalidSubject {
        subject: subject.to_string(),
        reason: reason.to_string(),
    };

    if subject.is_empty() {
        return Err(invalid("subject cannot be empty"));
    }
    if subject.chars().any(char::is_whitespace) {
        return Err(invalid("subject cannot contain whitespace"));
    }

    let tokens: Vec<&str> = subject.split('.').collect();
    for (i, token) in tokens.iter().enumerate() {
        if token.is_empty() {
            return Err(invalid("subject cannot contain empty tokens"));
        }
        if *token == TRAILING_WILDCARD && i != tokens.len() - 1 {
            return Err(invalid("'>' must be the last token"));
        }
    }
    Ok(())
}

/// Whether `subject` has wildcard tokens.
pub fn has_wildcards(subject: &str) -> bool {
    subject
        .split('.')
        .any(|t| t == SINGLE_WILDCARD || t == TRAILING_WILDCARD)
}

/// Whether every subject matched by `subject` is also matched by `pattern`.
///
/// For a literal `subject` this is ordinary pattern matching:
/// `foo.bar` is contained in `foo.>` and `foo.*`, but not in `foo`.
pub fn is_contained_in(subject: &str, pattern: &str) -> bool {
    let subject: Vec<&str> = subject.split('.').collect();
    let pattern: Vec<&str> = pattern.split('.').collect();

    for (i, p) in pattern.iter().enumerate() {
        let Some(s) = subject.get(i) else {
            return false;
        };
        match *p {
            TRAILING_WILDCARD => return true,
            SINGLE_WILDCARD => {
                if *s == TRAILING_WILDCARD {
                    return false;
                }
            }
            literal => {
                if *s != literal {
                    return false;
                }
            }
        }
    }
    subject.len() == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_subject() {
        assert!(validate_subject("foo.bar").is_ok());
        assert!(validate_subject("foo.*.baz").is_ok());
        assert!(validate_subject("foo.>").is_ok());

        assert!(validate_subject("").is_err());
        assert!(validate_subject("foo..bar").is_err());
        assert!(validate_subject("foo.>.bar").is_err());
        assert!(validate_subject("foo bar").is_err());
    }

    #[test]
    fn test_containment() {
        assert!(is_contained_in("foo.bar", "foo.>"));
        assert!(is_contained_in("foo.bar", "foo.*"));
        assert!(is_contained_in("foo.bar", "foo.bar"));
        assert!(is_contained_in("foo.*", "foo.>"));
        assert!(is_contained_in("foo.bar.baz", ">"));

        assert!(!is_contained_in("foo", "foo.>"));
        assert!(!is_contained_in("foo.bar", "foo"));
        assert!(!is_contained_in("foo.>", "foo.*"));
        assert!(!is_contained_in("foo.bar.baz", "foo.*"));
        assert!(!is_contained_in("bar", "foo.>"));
    }

    #[test]
    fn test_has_wildcards() {
        assert!(has_wildcards("foo.>"));
        assert!(has_wildcards("*.bar"));
        assert!(!has_wildcards("foo.bar"));
        assert!(!has_wildcards("foo*.bar"));
    }
}
