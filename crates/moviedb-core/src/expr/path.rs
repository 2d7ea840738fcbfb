//! Document paths such as `info.actors[0]`.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::ExpressionError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Attr(String),
    Index(usize),
}

/// A path into a document: a top-level attribute followed by any mix of
/// map keys and list indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttrPath {
    segments: Vec<PathSegment>,
}

impl AttrPath {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            segments: vec![PathSegment::Attr(name.into())],
        }
    }

    pub fn key(mut self, name: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Attr(name.into()));
        self
    }

    pub fn index(mut self, i: usize) -> Self {
        self.segments.push(PathSegment::Index(i));
        self
    }

    /// Parse `a.b[2].c`.
    pub fn parse(s: &str) -> Result<Self, ExpressionError> {
        s.parse()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Name of the top-level attribute.
    pub fn root(&self) -> &str {
        match self.segments.first() {
            Some(PathSegment::Attr(name)) => name,
            _ => "",
        }
    }

    /// The path without its last segment, or `None` for a top-level path.
    pub fn parent(&self) -> Option<AttrPath> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(AttrPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn last(&self) -> &PathSegment {
        // Constructors guarantee at least one segment.
        &self.segments[self.segments.len() - 1]
    }

    /// Look the path up in a document.
    pub fn resolve<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        let mut current = doc;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Attr(name), Value::Object(map)) => map.get(name)?,
                (PathSegment::Index(i), Value::Array(list)) => list.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Mutable lookup; same rules as [`AttrPath::resolve`].
    pub fn resolve_mut<'a>(&self, doc: &'a mut Value) -> Option<&'a mut Value> {
        let mut current = doc;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Attr(name), Value::Object(map)) => map.get_mut(name)?,
                (PathSegment::Index(i), Value::Array(list)) => list.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl FromStr for AttrPath {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ExpressionError::InvalidPath {
            path: s.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        for part in s.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if name.is_empty() {
                return Err(invalid("empty attribute name"));
            }
            segments.push(PathSegment::Attr(name.to_string()));

            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| invalid("unclosed '['"))?;
                if !rest.starts_with('[') {
                    return Err(invalid("unexpected characters after index"));
                }
                let index = rest[1..close]
                    .parse::<usize>()
                    .map_err(|_| invalid("list index must be a non-negative integer"))?;
                segments.push(PathSegment::Index(index));
                rest = &rest[close + 1..];
            }
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Attr(name) if i == 0 => write!(f, "{name}")?,
                PathSegment::Attr(name) => write!(f, ".{name}")?,
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for AttrPath {
    /// A single top-level attribute; no parsing of `.` or `[`.
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
