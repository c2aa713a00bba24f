//! Dotted numeric paths
//!
//! Every element in the tree is addressed by the numbers along the walk
//! from the root, written `1.3.2`. The empty path addresses the root
//! sentinel itself.

use ember_core::{EmberError, EmberResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Absolute numeric path of a tree element
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path(Vec<u32>);

impl Path {
    /// The empty path addressing the root sentinel
    pub fn root() -> Self {
        Path(Vec::new())
    }

    /// Create a path from its segments
    pub fn new(segments: Vec<u32>) -> Self {
        Path(segments)
    }

    /// Get the path segments
    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether this is the root path
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Alias for [`Path::is_root`], for iterator-style call sites
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The path of a direct child
    pub fn child(&self, number: u32) -> Path {
        let mut segments = self.0.clone();
        segments.push(number);
        Path(segments)
    }

    /// The parent path, or `None` for the root
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            Some(Path(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// The last segment, or `None` for the root
    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// Check whether `prefix` is an ancestor-or-self of this path
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = EmberError;

    fn from_str(s: &str) -> EmberResult<Self> {
        if s.is_empty() {
            return Ok(Path::root());
        }
        let segments = s
            .split('.')
            .map(|part| {
                part.parse::<u32>().map_err(|_| {
                    EmberError::InvalidRequest(format!("Invalid path segment: {:?}", part))
                })
            })
            .collect::<EmberResult<Vec<u32>>>()?;
        Ok(Path(segments))
    }
}

impl From<&[u32]> for Path {
    fn from(segments: &[u32]) -> Self {
        Path(segments.to_vec())
    }
}

impl From<Vec<u32>> for Path {
    fn from(segments: Vec<u32>) -> Self {
        Path(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path: Path = "1.3.2".parse().unwrap();
        assert_eq!(path.segments(), &[1, 3, 2]);
        assert_eq!(path.to_string(), "1.3.2");

        let root: Path = "".parse().unwrap();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("1.x.2".parse::<Path>().is_err());
        assert!("1..2".parse::<Path>().is_err());
    }

    #[test]
    fn test_parent_child() {
        let path = Path::new(vec![1, 3]);
        assert_eq!(path.child(2).segments(), &[1, 3, 2]);
        assert_eq!(path.parent(), Some(Path::new(vec![1])));
        assert_eq!(Path::root().parent(), None);
        assert_eq!(path.last(), Some(3));
    }

    #[test]
    fn test_starts_with() {
        let path = Path::new(vec![1, 3, 2]);
        assert!(path.starts_with(&Path::new(vec![1, 3])));
        assert!(path.starts_with(&Path::root()));
        assert!(!path.starts_with(&Path::new(vec![2])));
    }
}
