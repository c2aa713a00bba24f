//! Function types
//!
//! Functions are remotely invocable operations. An invocation carries a
//! client-allocated id; the provider's result echoes that id, which is the
//! only request/response correlation the protocol offers.

use ember_core::{ParameterType, Value};
use serde::{Deserialize, Serialize};

/// One item of a function's argument or result tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleItem {
    pub item_type: ParameterType,
    pub name: Option<String>,
}

impl TupleItem {
    pub fn new(item_type: ParameterType, name: Option<String>) -> Self {
        Self { item_type, name }
    }
}

/// Contents of a function element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionContents {
    pub identifier: Option<String>,
    pub description: Option<String>,
    pub arguments: Vec<TupleItem>,
    pub result: Vec<TupleItem>,
}

/// Outbound function invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub invocation_id: i64,
    pub arguments: Vec<Value>,
}

impl Invocation {
    pub fn new(invocation_id: i64, arguments: Vec<Value>) -> Self {
        Self {
            invocation_id,
            arguments,
        }
    }
}

/// Provider's reply to an invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub invocation_id: i64,
    pub success: bool,
    pub result: Vec<Value>,
}
