//! Glow layer: the Ember+ tree model and its BER mapping
//!
//! Glow is the DTD Ember+ uses on the wire: a hierarchy of nodes,
//! parameters, matrices and functions, each identified by a number that is
//! unique among its siblings. This crate provides the in-memory mirror of
//! that tree ([`Root`]/[`Element`]), the decoded wire form ([`GlowRoot`]),
//! the update-merge between the two, and builders for every outbound
//! request a consumer issues.

pub mod decode;
pub mod element;
pub mod encode;
pub mod function;
pub mod matrix;
pub mod path;
pub mod request;
pub mod stream;
pub(crate) mod tags;
pub mod tree;

pub use element::{Children, Element, ElementCategory, ElementKind, NodeContents, ParameterContents};
pub use function::{FunctionContents, Invocation, InvocationResult, TupleItem};
pub use matrix::{
    AddressingMode, ConnectionDisposition, ConnectionOperation, Label, MatrixConnection,
    MatrixContents, MatrixType, ParametersLocation,
};
pub use path::Path;
pub use stream::{StreamDescription, StreamEntry, StreamFormat};
pub use tree::{GlowFragment, GlowRoot, Root, ValueChange};
