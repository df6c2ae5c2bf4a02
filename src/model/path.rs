//! PathExpression — a parsed reference path: `a.b[0]["k"]`, `maven(1).url`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// Dotted name, with an optional order annotation `name(N)` selecting
    /// the Nth sibling that carries the same name.
    Name { name: String, ordinal: Option<usize> },
    /// List element `[i]`.
    Index(usize),
    /// Map entry `["k"]`.
    Key(String),
}

impl Segment {
    pub fn name(name: impl Into<String>) -> Self {
        Segment::Name { name: name.into(), ordinal: None }
    }

    /// Name-like segments address map entries as well as declarations.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Name { name, ordinal: None } => Some(name),
            Segment::Key(k) => Some(k),
            _ => None,
        }
    }
}

/// A reference path. Always has at least one segment, and the first one
/// is a `Segment::Name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathExpression {
    pub segments: Vec<Segment>,
}

impl PathExpression {
    pub fn simple(name: impl Into<String>) -> Self {
        Self { segments: vec![Segment::name(name)] }
    }

    pub fn first_name(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Name { name, .. }) => Some(name),
            _ => None,
        }
    }

    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1
    }

    /// True when the path ends in a list index, i.e. addresses an element
    /// by position rather than by name.
    pub fn is_positional(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Index(_)))
    }

    /// The path without its first `n` segments, if anything remains.
    pub fn skip(&self, n: usize) -> Option<PathExpression> {
        if n >= self.segments.len() {
            return None;
        }
        match self.segments[n] {
            Segment::Name { .. } => Some(PathExpression { segments: self.segments[n..].to_vec() }),
            _ => None,
        }
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Name { name, ordinal } => {
                    if i > 0 { write!(f, ".")?; }
                    write!(f, "{name}")?;
                    if let Some(n) = ordinal {
                        write!(f, "({n})")?;
                    }
                }
                Segment::Index(idx) => write!(f, "[{idx}]")?,
                Segment::Key(k) => write!(f, "[\"{}\"]", k.replace('"', "\\\""))?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_canonical() {
        let p = PathExpression {
            segments: vec![
                Segment::name("prop1"),
                Segment::Index(0),
                Segment::Key("k".into()),
                Segment::Name { name: "maven".into(), ordinal: Some(1) },
            ],
        };
        assert_eq!(p.to_string(), "prop1[0][\"k\"].maven(1)");
    }

    #[test]
    fn test_positional() {
        let p = PathExpression { segments: vec![Segment::name("a"), Segment::Index(2)] };
        assert!(p.is_positional());
        assert!(!PathExpression::simple("a").is_positional());
    }

    #[test]
    fn test_skip_requires_name_head() {
        let p = PathExpression { segments: vec![Segment::name("ext"), Segment::name("a"), Segment::Index(0)] };
        assert_eq!(p.skip(1).unwrap().to_string(), "a[0]");
        assert!(p.skip(2).is_none());
        assert!(p.skip(3).is_none());
    }
}
