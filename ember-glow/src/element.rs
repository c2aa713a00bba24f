//! Tree elements
//!
//! An [`Element`] is the common envelope of everything that can hang in the
//! tree: the sibling-unique number, the kind-specific contents, and the
//! ordered children. The kind is a tagged variant so that every use site
//! matches exhaustively instead of probing with runtime type checks.

use crate::function::FunctionContents;
use crate::matrix::MatrixContents;
use crate::path::Path;
use crate::stream::StreamDescription;
use ember_core::{Access, EmberError, EmberResult, ParameterType, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind discriminant without payload, used where only the shape matters
/// (request builders, preflight checks)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementCategory {
    Node,
    Parameter,
    Matrix,
    Function,
}

/// Kind-specific contents of an element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElementKind {
    Node(NodeContents),
    Parameter(ParameterContents),
    Matrix(MatrixContents),
    Function(FunctionContents),
}

impl ElementKind {
    /// The payload-free category of this kind
    pub fn category(&self) -> ElementCategory {
        match self {
            ElementKind::Node(_) => ElementCategory::Node,
            ElementKind::Parameter(_) => ElementCategory::Parameter,
            ElementKind::Matrix(_) => ElementCategory::Matrix,
            ElementKind::Function(_) => ElementCategory::Function,
        }
    }
}

/// Contents of a container node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeContents {
    pub identifier: Option<String>,
    pub description: Option<String>,
    pub is_online: Option<bool>,
    pub schema_identifiers: Option<String>,
}

/// Contents of a parameter leaf
///
/// Every field is optional: a decoded fragment only carries what the
/// provider chose to send, and merge must not clobber what it omits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterContents {
    pub identifier: Option<String>,
    pub description: Option<String>,
    pub value: Option<Value>,
    pub minimum: Option<Value>,
    pub maximum: Option<Value>,
    pub access: Option<Access>,
    pub format: Option<String>,
    pub enumeration: Option<String>,
    pub factor: Option<i64>,
    pub is_online: Option<bool>,
    pub formula: Option<String>,
    pub step: Option<i64>,
    pub default: Option<Value>,
    pub parameter_type: Option<ParameterType>,
    pub stream_identifier: Option<i64>,
    pub stream_descriptor: Option<StreamDescription>,
}

/// Ordered children with an O(1) number lookup map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Children {
    items: Vec<Element>,
    by_number: HashMap<u32, usize>,
}

impl Children {
    /// Create an empty child list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child, failing if a sibling already uses its number
    pub fn add(&mut self, element: Element) -> EmberResult<()> {
        if self.by_number.contains_key(&element.number) {
            return Err(EmberError::InvalidRequest(format!(
                "Duplicate child number: {}",
                element.number
            )));
        }
        self.by_number.insert(element.number, self.items.len());
        self.items.push(element);
        Ok(())
    }

    /// Look up a child by number
    pub fn get(&self, number: u32) -> Option<&Element> {
        self.by_number.get(&number).map(|&idx| &self.items[idx])
    }

    /// Look up a child by number, mutably
    pub fn get_mut(&mut self, number: u32) -> Option<&mut Element> {
        match self.by_number.get(&number) {
            Some(&idx) => Some(&mut self.items[idx]),
            None => None,
        }
    }

    /// Get the child with the given number, inserting an empty container
    /// node if it does not exist yet
    pub(crate) fn ensure_node(&mut self, number: u32) -> &mut Element {
        if !self.by_number.contains_key(&number) {
            self.by_number.insert(number, self.items.len());
            self.items
                .push(Element::new_node(number, NodeContents::default()));
        }
        let idx = self.by_number[&number];
        &mut self.items[idx]
    }

    /// Iterate over the children in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.items.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.items.iter_mut()
    }

    /// Number of children
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check whether there are no children
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove all children
    pub fn clear(&mut self) {
        self.items.clear();
        self.by_number.clear();
    }

    /// Clone the children into a plain vector
    pub fn to_vec(&self) -> Vec<Element> {
        self.items.clone()
    }
}

/// A tree element: number, kind-specific contents, children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub(crate) number: u32,
    pub(crate) kind: ElementKind,
    pub(crate) children: Children,
}

impl Element {
    /// Create an element from its parts
    pub fn new(number: u32, kind: ElementKind) -> Self {
        Self {
            number,
            kind,
            children: Children::new(),
        }
    }

    /// Create a container node
    pub fn new_node(number: u32, contents: NodeContents) -> Self {
        Self::new(number, ElementKind::Node(contents))
    }

    /// Create a parameter leaf
    pub fn new_parameter(number: u32, contents: ParameterContents) -> Self {
        Self::new(number, ElementKind::Parameter(contents))
    }

    /// Create a matrix
    pub fn new_matrix(number: u32, contents: MatrixContents) -> Self {
        Self::new(number, ElementKind::Matrix(contents))
    }

    /// Create a function
    pub fn new_function(number: u32, contents: FunctionContents) -> Self {
        Self::new(number, ElementKind::Function(contents))
    }

    /// The sibling-unique number
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The kind-specific contents
    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    /// The payload-free category
    pub fn category(&self) -> ElementCategory {
        self.kind.category()
    }

    /// The identifier, if the contents carry one
    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Node(c) => c.identifier.as_deref(),
            ElementKind::Parameter(c) => c.identifier.as_deref(),
            ElementKind::Matrix(c) => c.identifier.as_deref(),
            ElementKind::Function(c) => c.identifier.as_deref(),
        }
    }

    /// The parameter contents, if this is a parameter
    pub fn as_parameter(&self) -> Option<&ParameterContents> {
        match &self.kind {
            ElementKind::Parameter(c) => Some(c),
            _ => None,
        }
    }

    /// The matrix contents, if this is a matrix
    pub fn as_matrix(&self) -> Option<&MatrixContents> {
        match &self.kind {
            ElementKind::Matrix(c) => Some(c),
            _ => None,
        }
    }

    /// The function contents, if this is a function
    pub fn as_function(&self) -> Option<&FunctionContents> {
        match &self.kind {
            ElementKind::Function(c) => Some(c),
            _ => None,
        }
    }

    /// The children of this element
    pub fn children(&self) -> &Children {
        &self.children
    }

    /// Attach a child, failing on a duplicate number
    pub fn add_child(&mut self, child: Element) -> EmberResult<()> {
        self.children.add(child)
    }

    /// Look up a direct child by number
    pub fn get_child(&self, number: u32) -> Option<&Element> {
        self.children.get(number)
    }

    /// Walk a dotted numeric path relative to this element
    ///
    /// Returns `None` if any segment is missing; never a partial result.
    pub fn get_by_path(&self, path: &Path) -> Option<&Element> {
        let mut current = self;
        for &segment in path.segments() {
            current = current.children.get(segment)?;
        }
        Some(current)
    }
}
