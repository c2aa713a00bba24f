//! Scalar value types for Ember+ parameters

use crate::error::{EmberError, EmberResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Container for a parameter's scalar value
///
/// Holds one of the value kinds a parameter (or function argument/result)
/// can carry on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// No value
    Null,
    /// Signed 64-bit integer
    Integer(i64),
    /// IEEE-754 double
    Real(f64),
    /// UTF-8 string
    String(String),
    /// Boolean value
    Boolean(bool),
    /// Raw octets
    Octets(Vec<u8>),
}

impl Value {
    /// Get the integer value, if this is an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the real value, if this is a real
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the string value, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get the boolean value, if this is a boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the octets, if this is an octet string
    pub fn as_octets(&self) -> Option<&[u8]> {
        match self {
            Value::Octets(v) => Some(v),
            _ => None,
        }
    }

    /// Check whether this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Octets(v) => write!(f, "{} octets", v.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

/// Parameter access rights as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Access {
    /// No access
    None = 0,
    /// Read only
    Read = 1,
    /// Write only
    Write = 2,
    /// Read and write
    ReadWrite = 3,
}

impl Access {
    /// Decode from the wire enumeration value
    pub fn from_wire(value: i64) -> EmberResult<Self> {
        match value {
            0 => Ok(Access::None),
            1 => Ok(Access::Read),
            2 => Ok(Access::Write),
            3 => Ok(Access::ReadWrite),
            other => Err(EmberError::Decode(format!(
                "Unknown parameter access value: {}",
                other
            ))),
        }
    }

    /// Whether this access level allows writing
    pub fn is_writable(&self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// Declared type of a parameter or function tuple item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    Null = 0,
    Integer = 1,
    Real = 2,
    String = 3,
    Boolean = 4,
    Trigger = 5,
    Enum = 6,
    Octets = 7,
}

impl ParameterType {
    /// Decode from the wire enumeration value
    pub fn from_wire(value: i64) -> EmberResult<Self> {
        match value {
            0 => Ok(ParameterType::Null),
            1 => Ok(ParameterType::Integer),
            2 => Ok(ParameterType::Real),
            3 => Ok(ParameterType::String),
            4 => Ok(ParameterType::Boolean),
            5 => Ok(ParameterType::Trigger),
            6 => Ok(ParameterType::Enum),
            7 => Ok(ParameterType::Octets),
            other => Err(EmberError::Decode(format!(
                "Unknown parameter type value: {}",
                other
            ))),
        }
    }
}
