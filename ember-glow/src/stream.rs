//! Audio-level streams
//!
//! Stream-capable parameters publish their value through stream entries
//! instead of full parameter fragments. A parameter's stream descriptor
//! tells the consumer how to pull its sample out of a multiplexed octet
//! packet: the sample encoding and the byte offset.

use ember_core::{EmberError, EmberResult, Value};
use serde::{Deserialize, Serialize};

/// Sample encoding inside a multiplexed stream packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamFormat {
    Int8 = 0,
    Int16BE = 2,
    Int16LE = 3,
    Int32BE = 4,
    Int32LE = 5,
    Int64BE = 6,
    Int64LE = 7,
    Float32BE = 8,
    Float32LE = 9,
    Float64BE = 10,
    Float64LE = 11,
}

impl StreamFormat {
    pub fn from_wire(value: i64) -> EmberResult<Self> {
        match value {
            0 => Ok(StreamFormat::Int8),
            2 => Ok(StreamFormat::Int16BE),
            3 => Ok(StreamFormat::Int16LE),
            4 => Ok(StreamFormat::Int32BE),
            5 => Ok(StreamFormat::Int32LE),
            6 => Ok(StreamFormat::Int64BE),
            7 => Ok(StreamFormat::Int64LE),
            8 => Ok(StreamFormat::Float32BE),
            9 => Ok(StreamFormat::Float32LE),
            10 => Ok(StreamFormat::Float64BE),
            11 => Ok(StreamFormat::Float64LE),
            other => Err(EmberError::Decode(format!(
                "Unknown stream format value: {}",
                other
            ))),
        }
    }

    /// Sample width in bytes
    pub fn width(&self) -> usize {
        match self {
            StreamFormat::Int8 => 1,
            StreamFormat::Int16BE | StreamFormat::Int16LE => 2,
            StreamFormat::Int32BE | StreamFormat::Int32LE | StreamFormat::Float32BE
            | StreamFormat::Float32LE => 4,
            StreamFormat::Int64BE | StreamFormat::Int64LE | StreamFormat::Float64BE
            | StreamFormat::Float64LE => 8,
        }
    }
}

/// How to locate one parameter's sample in a multiplexed stream packet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamDescription {
    pub format: StreamFormat,
    pub offset: i64,
}

impl StreamDescription {
    pub fn new(format: StreamFormat, offset: i64) -> Self {
        Self { format, offset }
    }

    /// Extract this parameter's sample from a packet
    ///
    /// Returns `None` when the packet is too short for offset + width.
    pub fn extract(&self, packet: &[u8]) -> Option<Value> {
        let offset = usize::try_from(self.offset).ok()?;
        let bytes = packet.get(offset..offset + self.format.width())?;
        let value = match self.format {
            StreamFormat::Int8 => Value::Integer(bytes[0] as i8 as i64),
            StreamFormat::Int16BE => {
                Value::Integer(i16::from_be_bytes([bytes[0], bytes[1]]) as i64)
            }
            StreamFormat::Int16LE => {
                Value::Integer(i16::from_le_bytes([bytes[0], bytes[1]]) as i64)
            }
            StreamFormat::Int32BE => {
                Value::Integer(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64)
            }
            StreamFormat::Int32LE => {
                Value::Integer(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64)
            }
            StreamFormat::Int64BE => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Value::Integer(i64::from_be_bytes(buf))
            }
            StreamFormat::Int64LE => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Value::Integer(i64::from_le_bytes(buf))
            }
            StreamFormat::Float32BE => {
                Value::Real(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64)
            }
            StreamFormat::Float32LE => {
                Value::Real(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64)
            }
            StreamFormat::Float64BE => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Value::Real(f64::from_be_bytes(buf))
            }
            StreamFormat::Float64LE => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Value::Real(f64::from_le_bytes(buf))
            }
        };
        Some(value)
    }
}

/// One entry of an inbound stream collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    pub stream_identifier: i64,
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_wire_values() {
        assert_eq!(StreamFormat::from_wire(4).unwrap(), StreamFormat::Int32BE);
        assert_eq!(StreamFormat::from_wire(0).unwrap(), StreamFormat::Int8);
        assert!(StreamFormat::from_wire(1).is_err());
        assert!(StreamFormat::from_wire(12).is_err());
    }

    #[test]
    fn test_extract_int32be() {
        let desc = StreamDescription::new(StreamFormat::Int32BE, 2);
        let packet = [0xAA, 0xBB, 0x00, 0x00, 0x01, 0x02];
        assert_eq!(desc.extract(&packet), Some(Value::Integer(0x0102)));
    }

    #[test]
    fn test_extract_float32le() {
        let desc = StreamDescription::new(StreamFormat::Float32LE, 0);
        let packet = 1.5f32.to_le_bytes();
        assert_eq!(desc.extract(&packet), Some(Value::Real(1.5)));
    }

    #[test]
    fn test_extract_out_of_range() {
        let desc = StreamDescription::new(StreamFormat::Int64BE, 4);
        assert_eq!(desc.extract(&[0u8; 8]), None);
        assert_eq!(desc.extract(&[0u8; 12]).is_some(), true);
    }
}
