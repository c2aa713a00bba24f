//! Transport layer for Ember+
//!
//! The session engine consumes a plain duplex byte stream; this crate
//! defines that contract and ships the TCP implementation providers
//! actually listen on.

pub mod stream;
pub mod tcp;

pub use stream::ByteStream;
pub use tcp::TcpByteStream;
