//! ASN.1 BER encoding and decoding for Ember+
//!
//! Ember+ payloads are BER (ITU-T X.690) encoded. This crate provides the
//! subset the protocol needs: tag/length primitives, a TLV writer with
//! nested sequences, and a cursor-style reader that accepts both definite
//! and indefinite length encodings.

pub mod ber;

pub use ber::{BerReader, BerWriter, Length, Tag, TagClass};
