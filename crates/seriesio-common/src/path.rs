//! Structured path values for the metadata namespace.
//!
//! A [`PartialPath`] is the segment-sequence form of a dotted path, root
//! first. It is what tree navigation produces and what the path-parsing
//! and query layers consume. Segment content is not validated here;
//! reserved-character rules belong to the parsing layer.

use crate::constants::PATH_SEPARATOR;
use derive_more::{From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered sequence of path segments, root first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
pub struct PartialPath(Vec<String>);

impl PartialPath {
    /// Create a path from owned segments
    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Create a path from anything yielding segment strings
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Get the segments, root first
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the path has no segments
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, if any
    #[must_use]
    pub fn leaf_name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Path of every segment but the last; `None` for empty or root-only paths
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() < 2 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// New path extended by one segment
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }
}

impl fmt::Display for PartialPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{PATH_SEPARATOR}")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}
