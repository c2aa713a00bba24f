//! Matrix types
//!
//! A matrix is a crossbar: `target_count` x `source_count` crosspoints with
//! the current connection state kept per target.

use crate::path::Path;
use ember_core::{EmberError, EmberResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Matrix connect semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatrixType {
    /// Each target takes at most one source; a new connect replaces
    OneToN = 0,
    /// Sources and targets pair exclusively
    OneToOne = 1,
    /// Any number of sources per target
    NToN = 2,
}

impl MatrixType {
    pub fn from_wire(value: i64) -> EmberResult<Self> {
        match value {
            0 => Ok(MatrixType::OneToN),
            1 => Ok(MatrixType::OneToOne),
            2 => Ok(MatrixType::NToN),
            other => Err(EmberError::Decode(format!(
                "Unknown matrix type value: {}",
                other
            ))),
        }
    }
}

/// How target/source ids map to the declared counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressingMode {
    /// Ids are 0..count
    Linear = 0,
    /// Ids are declared explicitly in the target/source lists
    NonLinear = 1,
}

impl AddressingMode {
    pub fn from_wire(value: i64) -> EmberResult<Self> {
        match value {
            0 => Ok(AddressingMode::Linear),
            1 => Ok(AddressingMode::NonLinear),
            other => Err(EmberError::Decode(format!(
                "Unknown addressing mode value: {}",
                other
            ))),
        }
    }
}

/// Requested or reported crosspoint operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionOperation {
    /// Replace the target's source set
    Absolute = 0,
    /// Add the given sources
    Connect = 1,
    /// Remove the given sources
    Disconnect = 2,
}

impl ConnectionOperation {
    pub fn from_wire(value: i64) -> EmberResult<Self> {
        match value {
            0 => Ok(ConnectionOperation::Absolute),
            1 => Ok(ConnectionOperation::Connect),
            2 => Ok(ConnectionOperation::Disconnect),
            other => Err(EmberError::Decode(format!(
                "Unknown connection operation value: {}",
                other
            ))),
        }
    }
}

/// Provider's verdict on a reported connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionDisposition {
    /// Current state
    Tally = 0,
    /// State changed by the request
    Modified = 1,
    /// Request accepted but not yet effective
    Pending = 2,
    /// Crosspoint is locked
    Locked = 3,
}

impl ConnectionDisposition {
    pub fn from_wire(value: i64) -> EmberResult<Self> {
        match value {
            0 => Ok(ConnectionDisposition::Tally),
            1 => Ok(ConnectionDisposition::Modified),
            2 => Ok(ConnectionDisposition::Pending),
            3 => Ok(ConnectionDisposition::Locked),
            other => Err(EmberError::Decode(format!(
                "Unknown connection disposition value: {}",
                other
            ))),
        }
    }
}

/// Connection state of a single target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixConnection {
    pub target: u32,
    pub sources: Vec<u32>,
    pub operation: Option<ConnectionOperation>,
    pub disposition: Option<ConnectionDisposition>,
}

impl MatrixConnection {
    /// Create a connection record for a target
    pub fn new(target: u32, sources: Vec<u32>) -> Self {
        Self {
            target,
            sources,
            operation: None,
            disposition: None,
        }
    }

    /// Set the requested operation
    pub fn with_operation(mut self, operation: ConnectionOperation) -> Self {
        self.operation = Some(operation);
        self
    }
}

/// Where a matrix keeps its per-crosspoint parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParametersLocation {
    /// Subtree rooted at an absolute path
    BasePath(Path),
    /// Inline node number below the matrix
    Inline(u32),
}

/// Label subtree reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub base_path: Path,
    pub description: String,
}

/// Contents of a matrix element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixContents {
    pub identifier: Option<String>,
    pub description: Option<String>,
    pub matrix_type: Option<MatrixType>,
    pub addressing_mode: Option<AddressingMode>,
    pub target_count: Option<u32>,
    pub source_count: Option<u32>,
    pub maximum_total_connects: Option<u32>,
    pub maximum_connects_per_target: Option<u32>,
    pub parameters_location: Option<ParametersLocation>,
    pub labels: Option<Vec<Label>>,
    /// Explicit target ids (non-linear addressing)
    pub targets: Option<Vec<u32>>,
    /// Explicit source ids (non-linear addressing)
    pub sources: Option<Vec<u32>>,
    /// Current connection state per target id
    pub connections: BTreeMap<u32, MatrixConnection>,
}

impl MatrixContents {
    /// Check whether a target id is valid for this matrix
    pub fn is_valid_target(&self, target: u32) -> bool {
        match (&self.targets, self.target_count) {
            (Some(targets), _) => targets.contains(&target),
            (None, Some(count)) => target <= count,
            (None, None) => true,
        }
    }

    /// Check whether a source id is valid for this matrix
    pub fn is_valid_source(&self, source: u32) -> bool {
        match (&self.sources, self.source_count) {
            (Some(sources), _) => sources.contains(&source),
            (None, Some(count)) => source <= count,
            (None, None) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_range_check() {
        let contents = MatrixContents {
            target_count: Some(4),
            source_count: Some(2),
            ..Default::default()
        };
        assert!(contents.is_valid_target(3));
        assert!(contents.is_valid_source(1));
        assert!(contents.is_valid_source(2));
        assert!(!contents.is_valid_source(5));
    }

    #[test]
    fn test_nonlinear_uses_explicit_lists() {
        let contents = MatrixContents {
            addressing_mode: Some(AddressingMode::NonLinear),
            target_count: Some(2),
            targets: Some(vec![10, 20]),
            ..Default::default()
        };
        assert!(contents.is_valid_target(20));
        assert!(!contents.is_valid_target(1));
    }

    #[test]
    fn test_wire_enums() {
        assert_eq!(MatrixType::from_wire(2).unwrap(), MatrixType::NToN);
        assert!(MatrixType::from_wire(7).is_err());
        assert_eq!(
            ConnectionDisposition::from_wire(3).unwrap(),
            ConnectionDisposition::Locked
        );
    }
}
