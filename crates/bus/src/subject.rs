//! Subject-pattern grammar.
//!
//! A pattern is a dot-separated list of tokens:
//! - a literal segment matches the same segment exactly;
//! - `*` matches exactly one segment;
//! - `>` matches one or more trailing segments and may only appear last.
//!
//! `graph.>` therefore matches `graph.file` and `graph.file.updated` but not
//! `graph` itself.

use std::fmt;

use crate::BusError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Single,
    Tail,
}

/// A compiled subject pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectPattern {
    raw: String,
    tokens: Vec<Token>,
}

impl SubjectPattern {
    /// Compile `pattern`, rejecting empty segments and a non-final `>`.
    pub fn parse(pattern: &str) -> Result<Self, BusError> {
        let invalid = |reason| BusError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason,
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }

        let segments: Vec<&str> = pattern.split('.').collect();
        let last = segments.len() - 1;
        let mut tokens = Vec::with_capacity(segments.len());

        for (i, segment) in segments.into_iter().enumerate() {
            let token = match segment {
                "" => return Err(invalid("empty segment")),
                "*" => Token::Single,
                ">" if i == last => Token::Tail,
                ">" => return Err(invalid("'>' is only allowed as the final token")),
                literal => Token::Literal(literal.to_owned()),
            };
            tokens.push(token);
        }

        Ok(Self {
            raw: pattern.to_owned(),
            tokens,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Does `subject` match this pattern?
    pub fn matches(&self, subject: &str) -> bool {
        if self.raw == subject {
            return true;
        }

        let mut segments = subject.split('.');
        for token in &self.tokens {
            match token {
                Token::Tail => {
                    return segments.next().is_some_and(|s| !s.is_empty());
                }
                Token::Single => match segments.next() {
                    Some(s) if !s.is_empty() => {}
                    _ => return false,
                },
                Token::Literal(literal) => match segments.next() {
                    Some(s) if s == literal => {}
                    _ => return false,
                },
            }
        }

        segments.next().is_none()
    }
}

impl fmt::Display for SubjectPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One-shot match helper: exact equality first, then the compiled grammar.
pub fn subject_matches(pattern: &str, subject: &str) -> Result<bool, BusError> {
    if pattern == subject {
        return Ok(true);
    }
    Ok(SubjectPattern::parse(pattern)?.matches(subject))
}

/// Check that a subject is publishable: non-empty segments, no wildcards.
pub fn validate_subject(subject: &str) -> Result<(), BusError> {
    let ok = !subject.is_empty()
        && subject
            .split('.')
            .all(|s| !s.is_empty() && s != "*" && s != ">");
    if ok {
        Ok(())
    } else {
        Err(BusError::InvalidSubject(subject.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBJECT: &str = "graph.file.updated";

    #[test]
    fn matching_patterns() {
        for pattern in ["graph.file.updated", "graph.*.*", "*.file.*", "graph.>", ">"] {
            assert!(
                subject_matches(pattern, SUBJECT).unwrap(),
                "{pattern} should match {SUBJECT}"
            );
        }
    }

    #[test]
    fn single_wildcard_is_exactly_one_segment() {
        let p = SubjectPattern::parse("graph.*").unwrap();
        assert!(p.matches("graph.file"));
        assert!(!p.matches("graph.file.updated"));
        assert!(!p.matches("graph"));
    }

    #[test]
    fn single_wildcard_does_not_span_segments_despite_prefix() {
        // `*` stands for one segment; `graph.>` or `graph.*.*` cover this subject.
        assert!(!subject_matches("graph.*", SUBJECT).unwrap());
        assert!(subject_matches("graph.>", SUBJECT).unwrap());
    }

    #[test]
    fn non_matching_patterns() {
        for pattern in ["health.*", "graph.file", "graph.file.updated.more", "*.*"] {
            assert!(
                !subject_matches(pattern, SUBJECT).unwrap(),
                "{pattern} should not match {SUBJECT}"
            );
        }
    }

    #[test]
    fn tail_requires_at_least_one_segment() {
        let p = SubjectPattern::parse("graph.>").unwrap();
        assert!(p.matches("graph.file"));
        assert!(!p.matches("graph"));
    }

    #[test]
    fn tail_must_be_last() {
        assert!(matches!(
            SubjectPattern::parse("graph.>.file"),
            Err(BusError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn empty_segments_are_rejected() {
        assert!(SubjectPattern::parse("").is_err());
        assert!(SubjectPattern::parse("graph..file").is_err());
        assert!(SubjectPattern::parse("graph.").is_err());
    }

    #[test]
    fn publish_subjects_cannot_contain_wildcards() {
        assert!(validate_subject("graph.file.updated").is_ok());
        assert!(validate_subject("graph.*").is_err());
        assert!(validate_subject("graph.>").is_err());
        assert!(validate_subject("graph..x").is_err());
    }
}
