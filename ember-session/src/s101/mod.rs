//! S101 framing
//!
//! Frame layout (before escaping):
//! `BOF | slot | message-type | command | version | flags | dtd |
//! app-bytes-count | app-bytes | payload | CRC-16 (LE) | EOF`.
//! Keep-alive frames stop after the version byte.

pub mod crc;
pub mod deframer;
pub mod frame;
pub mod statistics;

/// Beginning-of-frame marker
pub const BOF: u8 = 0xFE;
/// End-of-frame marker
pub const EOF: u8 = 0xFF;
/// Escape marker
pub const CE: u8 = 0xFD;
/// XOR applied to escaped bytes
pub const ESCAPE_XOR: u8 = 0x20;
/// Every byte at or above this value must be escaped inside a frame
pub const ESCAPE_THRESHOLD: u8 = 0xF8;

/// Fixed slot id for point-to-point sessions
pub const SLOT: u8 = 0x00;
/// Message type for Ember payloads and keep-alives
pub const MSG_EMBER: u8 = 0x0E;
/// Protocol version
pub const VERSION: u8 = 0x01;
/// Glow DTD identifier
pub const DTD_GLOW: u8 = 0x01;
/// Application bytes advertising the Glow DTD version
pub const APP_BYTES: [u8; 2] = [0x02, 0x1F];

/// Flags: this frame starts a message
pub const FLAG_FIRST_PACKET: u8 = 0x80;
/// Flags: this frame ends a message
pub const FLAG_LAST_PACKET: u8 = 0x40;
/// Flags: single-frame message
pub const FLAG_SINGLE_PACKET: u8 = FLAG_FIRST_PACKET | FLAG_LAST_PACKET;
