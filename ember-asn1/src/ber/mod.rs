//! BER (Basic Encoding Rules) codec
//!
//! The writer emits definite-length encodings; the reader accepts definite
//! lengths as well as the indefinite form (`0x80` terminated by an
//! end-of-contents marker) that some Ember+ providers produce.

pub mod reader;
pub mod types;
pub mod writer;

pub use reader::BerReader;
pub use types::{Length, Tag, TagClass};
pub use writer::BerWriter;
