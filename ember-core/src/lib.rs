//! Core types for the Ember+ protocol stack
//!
//! This crate holds the pieces shared by every layer: the workspace-wide
//! error type, the scalar [`Value`] carried by parameters, and the consumer
//! configuration.

pub mod config;
pub mod error;
pub mod value;

pub use config::{ConsumerConfig, DEFAULT_PORT};
pub use error::{EmberError, EmberResult};
pub use value::{Access, ParameterType, Value};
