//! Framing statistics

/// Receive-side counters maintained by the deframer
///
/// Updated automatically as bytes are fed in; query at any time to
/// monitor link health.
#[derive(Debug, Clone, Copy, Default)]
pub struct S101Statistics {
    /// Frames received and accepted
    pub frames_received: u64,
    /// Frames dropped for CRC mismatch
    pub crc_errors: u64,
    /// Frames dropped for malformed content or bad escaping
    pub frames_dropped: u64,
    /// Keep-alive frames exchanged (both directions)
    pub keepalives: u64,
    /// Bytes discarded outside frame boundaries
    pub stray_bytes: u64,
}

impl S101Statistics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all counters to zero
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
