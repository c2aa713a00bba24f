//! BER writer
//!
//! Emits TLV triplets into a growable buffer. Nested sequences are buffered
//! per level and wrapped with a definite length when closed, so no
//! back-patching is needed.

use crate::ber::types::{Length, Tag};
use ember_core::{EmberError, EmberResult};

/// BER writer with support for nested constructed encodings
///
/// `start_sequence`/`end_sequence` calls must pair up; `into_bytes` fails
/// while a sequence is still open.
#[derive(Debug, Default)]
pub struct BerWriter {
    buffer: Vec<u8>,
    /// Open constructed encodings: tag plus the content collected so far
    stack: Vec<(Tag, Vec<u8>)>,
}

impl BerWriter {
    /// Create a new writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new writer with initial buffer capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            stack: Vec::new(),
        }
    }

    fn sink(&mut self) -> &mut Vec<u8> {
        match self.stack.last_mut() {
            Some((_, content)) => content,
            None => &mut self.buffer,
        }
    }

    /// Write a complete TLV triplet
    pub fn write_tlv(&mut self, tag: Tag, value: &[u8]) {
        let sink = self.sink();
        sink.extend_from_slice(&tag.encode());
        sink.extend_from_slice(&Length::Definite(value.len()).encode());
        sink.extend_from_slice(value);
    }

    /// Open a constructed encoding under `tag`
    pub fn start_sequence(&mut self, tag: Tag) {
        self.stack.push((tag, Vec::new()));
    }

    /// Close the innermost constructed encoding
    pub fn end_sequence(&mut self) -> EmberResult<()> {
        let (tag, content) = self.stack.pop().ok_or_else(|| {
            EmberError::Encode("end_sequence without matching start_sequence".to_string())
        })?;
        self.write_tlv(tag, &content);
        Ok(())
    }

    /// Write an INTEGER with the given tag
    pub fn write_integer_tagged(&mut self, tag: Tag, value: i64) {
        self.write_tlv(tag, &integer_bytes(value));
    }

    /// Write a UNIVERSAL INTEGER
    pub fn write_integer(&mut self, value: i64) {
        self.write_integer_tagged(Tag::INTEGER, value);
    }

    /// Write a UNIVERSAL ENUMERATED
    pub fn write_enumerated(&mut self, value: i64) {
        self.write_integer_tagged(Tag::ENUMERATED, value);
    }

    /// Write a UNIVERSAL REAL (X.690 binary encoding, base 2)
    pub fn write_real(&mut self, value: f64) {
        self.write_tlv(Tag::REAL, &real_bytes(value));
    }

    /// Write a UNIVERSAL UTF8String
    pub fn write_utf8(&mut self, value: &str) {
        self.write_tlv(Tag::UTF8_STRING, value.as_bytes());
    }

    /// Write a UNIVERSAL OCTET STRING
    pub fn write_octets(&mut self, value: &[u8]) {
        self.write_tlv(Tag::OCTET_STRING, value);
    }

    /// Write a UNIVERSAL BOOLEAN
    pub fn write_boolean(&mut self, value: bool) {
        self.write_tlv(Tag::BOOLEAN, &[if value { 0xFF } else { 0x00 }]);
    }

    /// Write a UNIVERSAL NULL
    pub fn write_null(&mut self) {
        self.write_tlv(Tag::NULL, &[]);
    }

    /// Write a RELATIVE-OID from its numeric segments
    pub fn write_relative_oid(&mut self, segments: &[u32]) {
        let mut bytes = Vec::with_capacity(segments.len() * 2);
        for &segment in segments {
            let mut groups = Vec::new();
            let mut remaining = segment;
            loop {
                groups.push((remaining & 0x7F) as u8);
                remaining >>= 7;
                if remaining == 0 {
                    break;
                }
            }
            for (i, &byte) in groups.iter().rev().enumerate() {
                if i < groups.len() - 1 {
                    bytes.push(byte | 0x80);
                } else {
                    bytes.push(byte);
                }
            }
        }
        self.write_tlv(Tag::RELATIVE_OID, &bytes);
    }

    /// Consume the writer and return the encoded bytes
    pub fn into_bytes(self) -> EmberResult<Vec<u8>> {
        if !self.stack.is_empty() {
            return Err(EmberError::Encode(format!(
                "{} sequence(s) left open",
                self.stack.len()
            )));
        }
        Ok(self.buffer)
    }
}

/// Minimal two's-complement big-endian encoding of an integer
fn integer_bytes(value: i64) -> Vec<u8> {
    let mut bytes = value.to_be_bytes().to_vec();
    while bytes.len() > 1 {
        let redundant = (bytes[0] == 0x00 && (bytes[1] & 0x80) == 0)
            || (bytes[0] == 0xFF && (bytes[1] & 0x80) != 0);
        if !redundant {
            break;
        }
        bytes.remove(0);
    }
    bytes
}

/// Minimal unsigned big-endian encoding, at least one byte
fn unsigned_bytes(value: u64) -> Vec<u8> {
    let mut bytes = value.to_be_bytes().to_vec();
    while bytes.len() > 1 && bytes[0] == 0 {
        bytes.remove(0);
    }
    bytes
}

/// X.690 REAL content octets for an IEEE-754 double, binary base 2
fn real_bytes(value: f64) -> Vec<u8> {
    if value == 0.0 {
        return if value.is_sign_negative() {
            vec![0x43] // minus zero
        } else {
            Vec::new() // plus zero: empty contents
        };
    }
    if value.is_infinite() {
        return vec![if value > 0.0 { 0x40 } else { 0x41 }];
    }
    if value.is_nan() {
        return vec![0x42];
    }

    let bits = value.to_bits();
    let sign = (bits >> 63) & 1;
    let biased = ((bits >> 52) & 0x7FF) as i32;
    let fraction = bits & 0x000F_FFFF_FFFF_FFFF;

    // Subnormals have an implicit exponent of -1074 and no hidden bit
    let (mut mantissa, mut exponent) = if biased == 0 {
        (fraction, -1074i32)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };
    while mantissa & 1 == 0 {
        mantissa >>= 1;
        exponent += 1;
    }

    let exp_bytes = integer_bytes(exponent as i64);
    debug_assert!(exp_bytes.len() <= 2);

    let mut out = Vec::with_capacity(2 + exp_bytes.len() + 8);
    // binary flag, sign, base 2, scaling 0, exponent length code
    out.push(0x80 | ((sign as u8) << 6) | (exp_bytes.len() as u8 - 1));
    out.extend_from_slice(&exp_bytes);
    out.extend_from_slice(&unsigned_bytes(mantissa));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_integer() {
        let mut writer = BerWriter::new();
        writer.write_integer(127);
        assert_eq!(writer.into_bytes().unwrap(), vec![0x02, 0x01, 0x7F]);
    }

    #[test]
    fn test_integer_minimal_encoding() {
        assert_eq!(integer_bytes(0), vec![0x00]);
        assert_eq!(integer_bytes(127), vec![0x7F]);
        assert_eq!(integer_bytes(128), vec![0x00, 0x80]);
        assert_eq!(integer_bytes(-1), vec![0xFF]);
        assert_eq!(integer_bytes(-128), vec![0x80]);
        assert_eq!(integer_bytes(-129), vec![0xFF, 0x7F]);
        assert_eq!(integer_bytes(i64::MIN), i64::MIN.to_be_bytes().to_vec());
    }

    #[test]
    fn test_write_boolean_and_null() {
        let mut writer = BerWriter::new();
        writer.write_boolean(true);
        writer.write_null();
        assert_eq!(writer.into_bytes().unwrap(), vec![0x01, 0x01, 0xFF, 0x05, 0x00]);
    }

    #[test]
    fn test_write_sequence_nesting() {
        let mut writer = BerWriter::new();
        writer.start_sequence(Tag::context(true, 0));
        writer.write_integer(1);
        writer.end_sequence().unwrap();
        let bytes = writer.into_bytes().unwrap();
        assert_eq!(bytes, vec![0xA0, 0x03, 0x02, 0x01, 0x01]);
    }

    #[test]
    fn test_unbalanced_sequence_fails() {
        let mut writer = BerWriter::new();
        writer.start_sequence(Tag::SEQUENCE);
        assert!(writer.into_bytes().is_err());

        let mut writer = BerWriter::new();
        assert!(writer.end_sequence().is_err());
    }

    #[test]
    fn test_relative_oid() {
        let mut writer = BerWriter::new();
        writer.write_relative_oid(&[1, 3, 200]);
        let bytes = writer.into_bytes().unwrap();
        assert_eq!(bytes, vec![0x0D, 0x04, 0x01, 0x03, 0x81, 0x48]);
    }

    #[test]
    fn test_real_specials() {
        assert_eq!(real_bytes(0.0), Vec::<u8>::new());
        assert_eq!(real_bytes(-0.0), vec![0x43]);
        assert_eq!(real_bytes(f64::INFINITY), vec![0x40]);
        assert_eq!(real_bytes(f64::NEG_INFINITY), vec![0x41]);
        assert_eq!(real_bytes(f64::NAN), vec![0x42]);
    }

    #[test]
    fn test_real_one() {
        // 1.0 = 1 * 2^0: binary flag, exponent 0 in one byte, mantissa 1
        assert_eq!(real_bytes(1.0), vec![0x80, 0x00, 0x01]);
        assert_eq!(real_bytes(-1.0), vec![0xC0, 0x00, 0x01]);
    }
}
