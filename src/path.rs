//! Dot-delimited extraction paths into untyped JSON.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("extraction path is empty")]
    Empty,
    #[error("extraction path '{0}' contains an empty segment")]
    EmptySegment(String),
}

/// Where a descent stopped. Each step of [`ExtractionPath::descend`] yields
/// either the next value or one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Miss {
    /// The object at `depth` has no key `key`.
    MissingKey { depth: usize, key: String },
    /// The value reached after `depth` segments is not an object.
    NotAnObject { depth: usize },
    /// The terminal value exists but is not a string.
    NotAString,
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Miss::MissingKey { depth, key } => write!(f, "missing key '{key}' at depth {depth}"),
            Miss::NotAnObject { depth } => write!(f, "value at depth {depth} is not an object"),
            Miss::NotAString => f.write_str("terminal value is not a string"),
        }
    }
}

/// Ordered, non-empty list of object keys. No wildcards, no array indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtractionPath {
    segments: Vec<String>,
}

impl ExtractionPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(PathError::EmptySegment(raw.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Walk the segments, stopping at the first one that cannot be followed.
    pub fn descend<'a>(&self, root: &'a Value) -> Result<&'a Value, Miss> {
        self.segments
            .iter()
            .enumerate()
            .try_fold(root, |current, (depth, key)| {
                let object = current.as_object().ok_or(Miss::NotAnObject { depth })?;
                object.get(key).ok_or_else(|| Miss::MissingKey {
                    depth,
                    key: key.clone(),
                })
            })
    }

    /// Like [`descend`](Self::descend), but the terminal must be a string.
    pub fn extract_str<'a>(&self, root: &'a Value) -> Result<&'a str, Miss> {
        self.descend(root)?.as_str().ok_or(Miss::NotAString)
    }
}

impl FromStr for ExtractionPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ExtractionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}
