//! Ember+ consumer library
//!
//! Ember+ exposes a remote device's configuration as a hierarchical tree of
//! nodes, parameters, matrices and functions carried as BER inside S101
//! frames. This umbrella crate re-exports the public API of the workspace:
//!
//! - `ember-core`: error type, scalar values, configuration
//! - `ember-asn1`: BER codec
//! - `ember-glow`: tree model, update-merge, request builders
//! - `ember-session`: S101 framing
//! - `ember-transport`: byte stream trait and TCP transport
//! - `ember-client`: session task, request pipeline, consumer facade
//!
//! # Usage
//!
//! ```no_run
//! use ember::{Consumer, ConsumerConfig, Path, Value};
//! use std::time::Duration;
//!
//! # async fn demo() -> ember::EmberResult<()> {
//! let mut consumer = Consumer::new(ConsumerConfig::new("10.0.0.20"));
//! consumer.connect(Duration::from_secs(5)).await?;
//!
//! let top_level = consumer.get_directory(&Path::root()).await?;
//! for element in &top_level {
//!     println!("{:?} {:?}", element.number(), element.identifier());
//! }
//!
//! let gain: Path = "1.2.3".parse()?;
//! consumer.set_value(&gain, Value::Real(-3.0)).await?;
//! consumer.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub use ember_core::{
    Access, ConsumerConfig, EmberError, EmberResult, ParameterType, Value, DEFAULT_PORT,
};

pub use ember_glow::{
    AddressingMode, Children, ConnectionDisposition, ConnectionOperation, Element,
    ElementCategory, ElementKind, FunctionContents, GlowFragment, GlowRoot, Invocation,
    InvocationResult, Label, MatrixConnection, MatrixContents, MatrixType, NodeContents,
    ParameterContents, ParametersLocation, Path, Root, StreamDescription, StreamEntry,
    StreamFormat, TupleItem, ValueChange,
};

pub use ember_client::{Consumer, ConsumerEvent, Response};
pub use ember_transport::{ByteStream, TcpByteStream};

/// BER codec layer
pub mod asn1 {
    pub use ember_asn1::{BerReader, BerWriter, Length, Tag, TagClass};
}

/// S101 framing layer
pub mod s101 {
    pub use ember_session::{
        FrameCommand, FrameDeframer, MessageAssembler, S101Frame, S101Statistics,
    };
}

/// Glow encoding entry points
pub mod glow {
    pub use ember_glow::decode::decode_root;
    pub use ember_glow::encode::encode_root;
    pub use ember_glow::request;
}
