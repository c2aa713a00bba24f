//! BER reader
//!
//! Stateful cursor over a byte buffer. Sequences are entered and exited
//! explicitly; the reader tracks the end of each open scope so that
//! `has_remaining` and the bounds checks are always relative to the
//! innermost constructed value. Both definite and indefinite lengths are
//! accepted on input.

use crate::ber::types::{Length, Tag};
use ember_core::{EmberError, EmberResult};

/// One open constructed value: where its content is allowed to end
#[derive(Debug, Clone, Copy)]
enum Scope {
    /// Definite length: content ends exactly here
    Definite(usize),
    /// Indefinite length: terminated by end-of-contents, which must lie
    /// within the nearest enclosing definite bound
    Indefinite(usize),
}

/// BER reader over a borrowed buffer
pub struct BerReader<'a> {
    buffer: &'a [u8],
    position: usize,
    scopes: Vec<Scope>,
}

impl<'a> BerReader<'a> {
    /// Create a new reader
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
            scopes: Vec::new(),
        }
    }

    /// Current position in the buffer
    pub fn position(&self) -> usize {
        self.position
    }

    /// Hard end of the innermost scope
    ///
    /// An indefinite scope carries the bound it inherited on entry, so a
    /// missing end-of-contents can never walk past an enclosing definite
    /// length.
    fn limit(&self) -> usize {
        match self.scopes.last() {
            Some(Scope::Definite(end)) => *end,
            Some(Scope::Indefinite(bound)) => *bound,
            None => self.buffer.len(),
        }
    }

    fn at_end_of_contents(&self) -> bool {
        self.position + 2 <= self.limit()
            && self.buffer[self.position] == 0x00
            && self.buffer[self.position + 1] == 0x00
    }

    /// Check whether the innermost scope has more values
    pub fn has_remaining(&self) -> bool {
        match self.scopes.last() {
            Some(Scope::Definite(end)) => self.position < *end,
            Some(Scope::Indefinite(_)) => !self.at_end_of_contents(),
            None => self.position < self.buffer.len(),
        }
    }

    /// Decode the tag at the cursor without advancing
    pub fn peek_tag(&self) -> EmberResult<Tag> {
        let (tag, _) = Tag::decode(&self.buffer[self.position..self.limit()])?;
        Ok(tag)
    }

    /// Read a tag and length, advancing the cursor
    fn read_header(&mut self) -> EmberResult<(Tag, Length)> {
        let window = &self.buffer[self.position..self.limit()];
        let (tag, tag_len) = Tag::decode(window)?;
        let (length, len_len) = Length::decode(&window[tag_len..])?;
        self.position += tag_len + len_len;
        Ok((tag, length))
    }

    /// Read a primitive TLV, verifying the tag
    fn read_primitive(&mut self, expected: Tag) -> EmberResult<&'a [u8]> {
        let (tag, length) = self.read_header()?;
        if tag != expected {
            return Err(EmberError::Decode(format!(
                "Unexpected tag: expected {:?}, got {:?}",
                expected, tag
            )));
        }
        let len = length.definite().ok_or_else(|| {
            EmberError::Decode("Invalid length: indefinite form on primitive value".to_string())
        })?;
        if self.position + len > self.limit() {
            return Err(EmberError::Decode(format!(
                "Truncated input: value needs {} bytes, {} remain",
                len,
                self.limit() - self.position
            )));
        }
        let value = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(value)
    }

    /// Enter a constructed value with the expected tag
    pub fn enter_sequence(&mut self, expected: Tag) -> EmberResult<()> {
        let (tag, length) = self.read_header()?;
        if tag != expected {
            return Err(EmberError::Decode(format!(
                "Unexpected tag: expected {:?}, got {:?}",
                expected, tag
            )));
        }
        match length {
            Length::Definite(len) => {
                let end = self.position + len;
                if end > self.limit() {
                    return Err(EmberError::Decode(format!(
                        "Truncated input: sequence needs {} bytes, {} remain",
                        len,
                        self.limit() - self.position
                    )));
                }
                self.scopes.push(Scope::Definite(end));
            }
            Length::Indefinite => {
                let bound = self.limit();
                self.scopes.push(Scope::Indefinite(bound));
            }
        }
        Ok(())
    }

    /// Leave the innermost constructed value
    ///
    /// For definite lengths the content must be fully consumed; for the
    /// indefinite form the end-of-contents marker is consumed here.
    pub fn exit_sequence(&mut self) -> EmberResult<()> {
        match self.scopes.pop() {
            Some(Scope::Definite(end)) => {
                if self.position < end {
                    return Err(EmberError::Decode(format!(
                        "Excess data: {} unread bytes in sequence",
                        end - self.position
                    )));
                }
                if self.position > end {
                    return Err(EmberError::Decode(
                        "Invalid length: sequence content overran its length".to_string(),
                    ));
                }
                Ok(())
            }
            Some(Scope::Indefinite(_)) => {
                if !self.at_end_of_contents() {
                    return Err(EmberError::Decode(
                        "Truncated input: missing end-of-contents".to_string(),
                    ));
                }
                self.position += 2;
                Ok(())
            }
            None => Err(EmberError::Decode(
                "exit_sequence without matching enter_sequence".to_string(),
            )),
        }
    }

    /// Skip one value of any kind (including nested constructed values)
    pub fn skip_value(&mut self) -> EmberResult<()> {
        let (tag, length) = self.read_header()?;
        match length {
            Length::Definite(len) => {
                if self.position + len > self.limit() {
                    return Err(EmberError::Decode(
                        "Truncated input while skipping value".to_string(),
                    ));
                }
                self.position += len;
                Ok(())
            }
            Length::Indefinite => {
                if !tag.is_constructed() {
                    return Err(EmberError::Decode(
                        "Invalid length: indefinite form on primitive value".to_string(),
                    ));
                }
                while !self.at_end_of_contents() {
                    self.skip_value()?;
                }
                self.position += 2;
                Ok(())
            }
        }
    }

    /// Read a UNIVERSAL INTEGER
    pub fn read_integer(&mut self) -> EmberResult<i64> {
        let bytes = self.read_primitive(Tag::INTEGER)?;
        integer_value(bytes)
    }

    /// Read a UNIVERSAL ENUMERATED
    pub fn read_enumerated(&mut self) -> EmberResult<i64> {
        let bytes = self.read_primitive(Tag::ENUMERATED)?;
        integer_value(bytes)
    }

    /// Read a UNIVERSAL REAL
    pub fn read_real(&mut self) -> EmberResult<f64> {
        let bytes = self.read_primitive(Tag::REAL)?;
        real_value(bytes)
    }

    /// Read a UNIVERSAL UTF8String
    pub fn read_utf8(&mut self) -> EmberResult<String> {
        let bytes = self.read_primitive(Tag::UTF8_STRING)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| EmberError::Decode(format!("Invalid UTF-8 string: {}", e)))
    }

    /// Read a UNIVERSAL OCTET STRING
    pub fn read_octets(&mut self) -> EmberResult<Vec<u8>> {
        Ok(self.read_primitive(Tag::OCTET_STRING)?.to_vec())
    }

    /// Read a UNIVERSAL BOOLEAN
    pub fn read_boolean(&mut self) -> EmberResult<bool> {
        let bytes = self.read_primitive(Tag::BOOLEAN)?;
        match bytes {
            [b] => Ok(*b != 0),
            _ => Err(EmberError::Decode(format!(
                "Invalid boolean length: {}",
                bytes.len()
            ))),
        }
    }

    /// Read a UNIVERSAL NULL
    pub fn read_null(&mut self) -> EmberResult<()> {
        let bytes = self.read_primitive(Tag::NULL)?;
        if !bytes.is_empty() {
            return Err(EmberError::Decode(format!(
                "Invalid null length: {}",
                bytes.len()
            )));
        }
        Ok(())
    }

    /// Read a RELATIVE-OID into its numeric segments
    pub fn read_relative_oid(&mut self) -> EmberResult<Vec<u32>> {
        let bytes = self.read_primitive(Tag::RELATIVE_OID)?;
        let mut segments = Vec::new();
        let mut current = 0u32;
        let mut in_segment = false;
        for &byte in bytes {
            if current >> 25 != 0 {
                return Err(EmberError::Decode(
                    "RELATIVE-OID segment overflow".to_string(),
                ));
            }
            current = (current << 7) | (byte & 0x7F) as u32;
            in_segment = true;
            if (byte & 0x80) == 0 {
                segments.push(current);
                current = 0;
                in_segment = false;
            }
        }
        if in_segment {
            return Err(EmberError::Decode(
                "Truncated input in RELATIVE-OID segment".to_string(),
            ));
        }
        Ok(segments)
    }
}

/// Sign-extended value of a big-endian two's-complement encoding
fn integer_value(bytes: &[u8]) -> EmberResult<i64> {
    if bytes.is_empty() {
        return Err(EmberError::Decode("Empty integer encoding".to_string()));
    }
    if bytes.len() > 8 {
        return Err(EmberError::Decode(format!(
            "Integer too large: {} bytes (max 8)",
            bytes.len()
        )));
    }

    let mut value = 0i64;
    for &byte in bytes {
        value = (value << 8) | byte as i64;
    }
    let shift = 64 - bytes.len() * 8;
    Ok((value << shift) >> shift)
}

/// Decode X.690 REAL content octets to an IEEE-754 double
fn real_value(bytes: &[u8]) -> EmberResult<f64> {
    let first = match bytes.first() {
        None => return Ok(0.0),
        Some(b) => *b,
    };

    if (first & 0xC0) == 0x40 {
        // Special values
        return match first {
            0x40 => Ok(f64::INFINITY),
            0x41 => Ok(f64::NEG_INFINITY),
            0x42 => Ok(f64::NAN),
            0x43 => Ok(-0.0),
            other => Err(EmberError::Decode(format!(
                "Unknown REAL special value: 0x{:02X}",
                other
            ))),
        };
    }
    if (first & 0x80) == 0 {
        return Err(EmberError::Decode(
            "Decimal REAL encoding not supported".to_string(),
        ));
    }

    // Binary encoding: base from bits 5-4, scaling factor from bits 3-2,
    // exponent length from bits 1-0
    let base_exp_multiplier = match (first >> 4) & 0x03 {
        0 => 1, // base 2
        1 => 3, // base 8
        2 => 4, // base 16
        _ => {
            return Err(EmberError::Decode(
                "Reserved REAL base encoding".to_string(),
            ))
        }
    };
    let scaling = ((first >> 2) & 0x03) as i32;

    let mut pos = 1;
    let exp_len = match first & 0x03 {
        3 => {
            let len = *bytes.get(pos).ok_or_else(|| {
                EmberError::Decode("Truncated REAL exponent length".to_string())
            })? as usize;
            pos += 1;
            len
        }
        code => code as usize + 1,
    };
    if pos + exp_len > bytes.len() || exp_len == 0 || exp_len > 8 {
        return Err(EmberError::Decode("Invalid REAL exponent".to_string()));
    }
    let exponent = integer_value(&bytes[pos..pos + exp_len])?;
    pos += exp_len;

    let mantissa_bytes = &bytes[pos..];
    if mantissa_bytes.is_empty() || mantissa_bytes.len() > 8 {
        return Err(EmberError::Decode("Invalid REAL mantissa".to_string()));
    }
    let mut mantissa = 0u64;
    for &byte in mantissa_bytes {
        mantissa = (mantissa << 8) | byte as u64;
    }

    let total_exp = exponent
        .checked_mul(base_exp_multiplier)
        .and_then(|e| e.checked_add(scaling as i64))
        .ok_or_else(|| EmberError::Decode("REAL exponent overflow".to_string()))?;
    let mut value = mantissa as f64 * 2f64.powi(total_exp as i32);
    if (first & 0x40) != 0 {
        value = -value;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::writer::BerWriter;

    #[test]
    fn test_integer_round_trip() {
        for value in [0i64, 1, -1, 127, 128, -128, -129, i64::MAX, i64::MIN] {
            let mut writer = BerWriter::new();
            writer.write_integer(value);
            let bytes = writer.into_bytes().unwrap();
            let mut reader = BerReader::new(&bytes);
            assert_eq!(reader.read_integer().unwrap(), value);
        }
    }

    #[test]
    fn test_real_round_trip() {
        for value in [
            0.0,
            1.0,
            -1.0,
            0.5,
            42.25,
            -1234.5678,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::MIN_POSITIVE,
            std::f64::consts::PI,
        ] {
            let mut writer = BerWriter::new();
            writer.write_real(value);
            let bytes = writer.into_bytes().unwrap();
            let mut reader = BerReader::new(&bytes);
            let decoded = reader.read_real().unwrap();
            assert_eq!(decoded.to_bits(), value.to_bits(), "value {}", value);
        }
    }

    #[test]
    fn test_real_nan() {
        let mut writer = BerWriter::new();
        writer.write_real(f64::NAN);
        let bytes = writer.into_bytes().unwrap();
        let mut reader = BerReader::new(&bytes);
        assert!(reader.read_real().unwrap().is_nan());
    }

    #[test]
    fn test_string_and_octets_round_trip() {
        let mut writer = BerWriter::new();
        writer.write_utf8("gänsefüßchen");
        writer.write_octets(&[0x00, 0xFF, 0x7E]);
        let bytes = writer.into_bytes().unwrap();

        let mut reader = BerReader::new(&bytes);
        assert_eq!(reader.read_utf8().unwrap(), "gänsefüßchen");
        assert_eq!(reader.read_octets().unwrap(), vec![0x00, 0xFF, 0x7E]);
        assert!(!reader.has_remaining());
    }

    #[test]
    fn test_relative_oid_round_trip() {
        let segments = vec![1u32, 3, 2, 200, 70000];
        let mut writer = BerWriter::new();
        writer.write_relative_oid(&segments);
        let bytes = writer.into_bytes().unwrap();
        let mut reader = BerReader::new(&bytes);
        assert_eq!(reader.read_relative_oid().unwrap(), segments);
    }

    #[test]
    fn test_unexpected_tag() {
        let mut writer = BerWriter::new();
        writer.write_integer(1);
        let bytes = writer.into_bytes().unwrap();
        let mut reader = BerReader::new(&bytes);
        assert!(matches!(
            reader.read_boolean(),
            Err(ember_core::EmberError::Decode(_))
        ));
    }

    #[test]
    fn test_sequence_scoping() {
        let mut writer = BerWriter::new();
        writer.start_sequence(Tag::context(true, 1));
        writer.write_integer(5);
        writer.end_sequence().unwrap();
        writer.write_integer(6);
        let bytes = writer.into_bytes().unwrap();

        let mut reader = BerReader::new(&bytes);
        reader.enter_sequence(Tag::context(true, 1)).unwrap();
        assert!(reader.has_remaining());
        assert_eq!(reader.read_integer().unwrap(), 5);
        assert!(!reader.has_remaining());
        reader.exit_sequence().unwrap();
        assert_eq!(reader.read_integer().unwrap(), 6);
    }

    #[test]
    fn test_exit_sequence_with_unread_content_fails() {
        let mut writer = BerWriter::new();
        writer.start_sequence(Tag::SEQUENCE);
        writer.write_integer(5);
        writer.end_sequence().unwrap();
        let bytes = writer.into_bytes().unwrap();

        let mut reader = BerReader::new(&bytes);
        reader.enter_sequence(Tag::SEQUENCE).unwrap();
        assert!(reader.exit_sequence().is_err());
    }

    #[test]
    fn test_indefinite_length_sequence() {
        // Hand-built: SEQUENCE (indefinite) { INTEGER 7 } EOC
        let bytes = [0x30, 0x80, 0x02, 0x01, 0x07, 0x00, 0x00];
        let mut reader = BerReader::new(&bytes);
        reader.enter_sequence(Tag::SEQUENCE).unwrap();
        assert!(reader.has_remaining());
        assert_eq!(reader.read_integer().unwrap(), 7);
        assert!(!reader.has_remaining());
        reader.exit_sequence().unwrap();
        assert!(!reader.has_remaining());
    }

    #[test]
    fn test_indefinite_inside_definite() {
        // Definite SEQUENCE (7 bytes) { SEQUENCE (indefinite) { INTEGER 7 } EOC }
        let bytes = [0x30, 0x07, 0x30, 0x80, 0x02, 0x01, 0x07, 0x00, 0x00];
        let mut reader = BerReader::new(&bytes);
        reader.enter_sequence(Tag::SEQUENCE).unwrap();
        reader.enter_sequence(Tag::SEQUENCE).unwrap();
        assert_eq!(reader.read_integer().unwrap(), 7);
        assert!(!reader.has_remaining());
        reader.exit_sequence().unwrap();
        reader.exit_sequence().unwrap();
        assert!(!reader.has_remaining());
    }

    #[test]
    fn test_missing_end_of_contents_stops_at_outer_bound() {
        // Definite SEQUENCE (5 bytes) { SEQUENCE (indefinite) { INTEGER 7 } }
        // with the EOC missing; the pair of zero bytes after the outer
        // sequence's end belongs to other data and must not be consumed
        let bytes = [0x30, 0x05, 0x30, 0x80, 0x02, 0x01, 0x07, 0x00, 0x00];
        let mut reader = BerReader::new(&bytes);
        reader.enter_sequence(Tag::SEQUENCE).unwrap();
        reader.enter_sequence(Tag::SEQUENCE).unwrap();
        assert_eq!(reader.read_integer().unwrap(), 7);
        assert!(reader.exit_sequence().is_err());
        assert_eq!(reader.position(), 7);

        // Skipping the same malformed value fails instead of walking
        // into the trailing bytes
        let mut reader = BerReader::new(&bytes);
        reader.enter_sequence(Tag::SEQUENCE).unwrap();
        assert!(reader.skip_value().is_err());
    }

    #[test]
    fn test_skip_value() {
        let mut writer = BerWriter::new();
        writer.start_sequence(Tag::SEQUENCE);
        writer.write_integer(1);
        writer.end_sequence().unwrap();
        writer.write_boolean(true);
        let bytes = writer.into_bytes().unwrap();

        let mut reader = BerReader::new(&bytes);
        reader.skip_value().unwrap();
        assert!(reader.read_boolean().unwrap());
    }

    #[test]
    fn test_skip_indefinite_value() {
        // SEQUENCE (indefinite) { SEQUENCE (indefinite) {} EOC } EOC, then BOOLEAN
        let bytes = [0x30, 0x80, 0x30, 0x80, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01, 0xFF];
        let mut reader = BerReader::new(&bytes);
        reader.skip_value().unwrap();
        assert!(reader.read_boolean().unwrap());
    }

    #[test]
    fn test_truncated_input() {
        let bytes = [0x02, 0x04, 0x01];
        let mut reader = BerReader::new(&bytes);
        assert!(reader.read_integer().is_err());
    }
}
