//! Incremental deframing and message reassembly

use crate::s101::frame::S101Frame;
use crate::s101::statistics::S101Statistics;
use crate::s101::{BOF, CE, EOF, ESCAPE_XOR, FLAG_FIRST_PACKET, FLAG_LAST_PACKET};
use bytes::{BufMut, BytesMut};

/// Incremental S101 deframer
///
/// Feed it raw transport bytes in whatever chunks they arrive; complete,
/// CRC-valid frames come out. Bad frames are counted, logged and dropped;
/// the stream itself stays usable.
#[derive(Debug, Default)]
pub struct FrameDeframer {
    buffer: BytesMut,
    in_frame: bool,
    escaping: bool,
    stats: S101Statistics,
}

impl FrameDeframer {
    /// Create a new deframer
    pub fn new() -> Self {
        Self::default()
    }

    /// Current statistics
    pub fn statistics(&self) -> &S101Statistics {
        &self.stats
    }

    /// Feed raw bytes, returning every complete frame they finish
    pub fn feed(&mut self, data: &[u8]) -> Vec<S101Frame> {
        let mut frames = Vec::new();
        for &byte in data {
            match byte {
                BOF => {
                    if self.in_frame && !self.buffer.is_empty() {
                        log::warn!(
                            "Discarding {} bytes of unterminated frame",
                            self.buffer.len()
                        );
                        self.stats.frames_dropped += 1;
                    }
                    self.buffer.clear();
                    self.in_frame = true;
                    self.escaping = false;
                }
                EOF => {
                    if !self.in_frame {
                        self.stats.stray_bytes += 1;
                        continue;
                    }
                    self.in_frame = false;
                    if self.escaping {
                        log::warn!("Frame ended in the middle of an escape sequence");
                        self.stats.frames_dropped += 1;
                        self.escaping = false;
                        continue;
                    }
                    match S101Frame::decode_unescaped(&self.buffer) {
                        Ok(frame) => {
                            self.stats.frames_received += 1;
                            if frame.is_keepalive() {
                                self.stats.keepalives += 1;
                            }
                            frames.push(frame);
                        }
                        Err(e) => {
                            log::warn!("Dropping invalid frame: {}", e);
                            self.stats.crc_errors += 1;
                        }
                    }
                }
                CE if self.in_frame => {
                    self.escaping = true;
                }
                _ => {
                    if !self.in_frame {
                        self.stats.stray_bytes += 1;
                    } else if self.escaping {
                        self.buffer.put_u8(byte ^ ESCAPE_XOR);
                        self.escaping = false;
                    } else {
                        self.buffer.put_u8(byte);
                    }
                }
            }
        }
        frames
    }
}

/// Reassembles multi-packet messages into one logical payload
///
/// The flags byte of each data frame marks it first and/or last; anything
/// between belongs to the same message.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    partial: Option<Vec<u8>>,
}

impl MessageAssembler {
    /// Create a new assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a data frame; returns the full payload once the message is complete
    pub fn push(&mut self, frame: &S101Frame) -> Option<Vec<u8>> {
        let first = frame.flags & FLAG_FIRST_PACKET != 0;
        let last = frame.flags & FLAG_LAST_PACKET != 0;

        if first {
            if self.partial.is_some() {
                log::warn!("New message started while reassembling; dropping partial");
            }
            self.partial = Some(Vec::new());
        }

        let partial = match &mut self.partial {
            Some(partial) => partial,
            None => {
                log::warn!("Continuation frame without a first packet; dropping");
                return None;
            }
        };
        partial.extend_from_slice(&frame.payload);

        if last {
            self.partial.take()
        } else {
            None
        }
    }

    /// Drop any partially assembled message
    pub fn reset(&mut self) {
        self.partial = None;
    }
}
