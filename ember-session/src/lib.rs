//! Session layer for Ember+: S101 framing
//!
//! S101 carries BER payloads over a byte stream. Frames are delimited by
//! BOF/EOF markers, high bytes are escaped inside the frame, and a CRC-16
//! protects the unescaped content. Large messages span multiple frames,
//! flagged first/last, and are reassembled before decoding.

pub mod s101;

pub use s101::deframer::{FrameDeframer, MessageAssembler};
pub use s101::frame::{FrameCommand, S101Frame};
pub use s101::statistics::S101Statistics;
