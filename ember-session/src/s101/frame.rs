//! S101 frame encoding and decoding

use crate::s101::crc::crc16;
use crate::s101::{
    APP_BYTES, BOF, CE, DTD_GLOW, EOF, ESCAPE_THRESHOLD, ESCAPE_XOR, FLAG_SINGLE_PACKET,
    MSG_EMBER, SLOT, VERSION,
};
use ember_core::{EmberError, EmberResult};

/// Frame command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCommand {
    /// Ember payload
    Ember,
    /// Keep-alive request
    KeepAliveRequest,
    /// Keep-alive response
    KeepAliveResponse,
}

impl FrameCommand {
    /// Decode the command byte
    pub fn from_byte(byte: u8) -> EmberResult<Self> {
        match byte {
            0x00 => Ok(FrameCommand::Ember),
            0x01 => Ok(FrameCommand::KeepAliveRequest),
            0x02 => Ok(FrameCommand::KeepAliveResponse),
            other => Err(EmberError::Frame(format!(
                "Unknown frame command: 0x{:02X}",
                other
            ))),
        }
    }

    /// The wire byte for this command
    pub fn to_byte(self) -> u8 {
        match self {
            FrameCommand::Ember => 0x00,
            FrameCommand::KeepAliveRequest => 0x01,
            FrameCommand::KeepAliveResponse => 0x02,
        }
    }
}

/// A single S101 frame
#[derive(Debug, Clone, PartialEq)]
pub struct S101Frame {
    pub slot: u8,
    pub message_type: u8,
    pub command: FrameCommand,
    pub version: u8,
    pub flags: u8,
    pub dtd: u8,
    pub app_bytes: Vec<u8>,
    pub payload: Vec<u8>,
}

impl S101Frame {
    /// Create an Ember data frame
    pub fn ember(flags: u8, payload: Vec<u8>) -> Self {
        Self {
            slot: SLOT,
            message_type: MSG_EMBER,
            command: FrameCommand::Ember,
            version: VERSION,
            flags,
            dtd: DTD_GLOW,
            app_bytes: APP_BYTES.to_vec(),
            payload,
        }
    }

    /// Create a single-packet Ember data frame
    pub fn single(payload: Vec<u8>) -> Self {
        Self::ember(FLAG_SINGLE_PACKET, payload)
    }

    /// Create a keep-alive request frame
    pub fn keepalive_request() -> Self {
        Self::control(FrameCommand::KeepAliveRequest)
    }

    /// Create a keep-alive response frame
    pub fn keepalive_response() -> Self {
        Self::control(FrameCommand::KeepAliveResponse)
    }

    fn control(command: FrameCommand) -> Self {
        Self {
            slot: SLOT,
            message_type: MSG_EMBER,
            command,
            version: VERSION,
            flags: 0,
            dtd: 0,
            app_bytes: Vec::new(),
            payload: Vec::new(),
        }
    }

    /// Check whether this is a keep-alive frame
    pub fn is_keepalive(&self) -> bool {
        matches!(
            self.command,
            FrameCommand::KeepAliveRequest | FrameCommand::KeepAliveResponse
        )
    }

    /// Unescaped frame content between BOF and EOF, without the CRC
    fn content(&self) -> Vec<u8> {
        let mut content = Vec::with_capacity(8 + self.app_bytes.len() + self.payload.len());
        content.push(self.slot);
        content.push(self.message_type);
        content.push(self.command.to_byte());
        content.push(self.version);
        if self.command == FrameCommand::Ember {
            content.push(self.flags);
            content.push(self.dtd);
            content.push(self.app_bytes.len() as u8);
            content.extend_from_slice(&self.app_bytes);
            content.extend_from_slice(&self.payload);
        }
        content
    }

    /// Encode to wire bytes: BOF, escaped content + CRC, EOF
    pub fn encode(&self) -> Vec<u8> {
        let content = self.content();
        let crc = crc16(&content);

        let mut out = Vec::with_capacity(content.len() + 6);
        out.push(BOF);
        for &byte in &content {
            escape_into(&mut out, byte);
        }
        for byte in crc.to_le_bytes() {
            escape_into(&mut out, byte);
        }
        out.push(EOF);
        out
    }

    /// Decode a frame from its de-escaped content (the region between BOF
    /// and EOF), validating the trailing CRC
    pub fn decode_unescaped(content: &[u8]) -> EmberResult<Self> {
        if content.len() < 6 {
            return Err(EmberError::Frame(format!(
                "Frame too short: {} bytes",
                content.len()
            )));
        }
        let (body, crc_bytes) = content.split_at(content.len() - 2);
        let received = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
        let computed = crc16(body);
        if received != computed {
            return Err(EmberError::Frame(format!(
                "CRC mismatch: received 0x{:04X}, computed 0x{:04X}",
                received, computed
            )));
        }

        let slot = body[0];
        let message_type = body[1];
        let command = FrameCommand::from_byte(body[2])?;
        let version = body[3];

        if command != FrameCommand::Ember {
            return Ok(Self {
                slot,
                message_type,
                command,
                version,
                flags: 0,
                dtd: 0,
                app_bytes: Vec::new(),
                payload: Vec::new(),
            });
        }

        if body.len() < 7 {
            return Err(EmberError::Frame(
                "Data frame header truncated".to_string(),
            ));
        }
        let flags = body[4];
        let dtd = body[5];
        let app_count = body[6] as usize;
        if body.len() < 7 + app_count {
            return Err(EmberError::Frame(format!(
                "Frame shorter than its {} application bytes",
                app_count
            )));
        }
        let app_bytes = body[7..7 + app_count].to_vec();
        let payload = body[7 + app_count..].to_vec();

        Ok(Self {
            slot,
            message_type,
            command,
            version,
            flags,
            dtd,
            app_bytes,
            payload,
        })
    }
}

/// Append a byte, escaping it if it falls in the reserved range
fn escape_into(out: &mut Vec<u8>, byte: u8) {
    if byte >= ESCAPE_THRESHOLD {
        out.push(CE);
        out.push(byte ^ ESCAPE_XOR);
    } else {
        out.push(byte);
    }
}
