//! BER to Glow decoding
//!
//! The decoder produces whichever fragment form the provider sent
//! (positional or qualified); canonicalization happens in the merge.
//! Unknown fields and element kinds are skipped so that newer providers
//! do not break the session.

use crate::element::{Element, ElementCategory, ElementKind, NodeContents, ParameterContents};
use crate::encode::element_tag;
use crate::function::{FunctionContents, InvocationResult, TupleItem};
use crate::matrix::{
    AddressingMode, ConnectionDisposition, ConnectionOperation, Label, MatrixConnection,
    MatrixContents, MatrixType, ParametersLocation,
};
use crate::path::Path;
use crate::stream::{StreamDescription, StreamEntry, StreamFormat};
use crate::tags::{self, ctx};
use ember_asn1::{BerReader, Tag, TagClass};
use ember_core::{Access, EmberError, EmberResult, ParameterType, Value};

/// Decode one BER-encoded Ember+ message root
pub fn decode_root(bytes: &[u8]) -> EmberResult<crate::tree::GlowRoot> {
    let mut reader = BerReader::new(bytes);
    reader.enter_sequence(tags::ROOT)?;

    let tag = reader.peek_tag()?;
    let root = if tag == tags::ROOT_ELEMENT_COLLECTION {
        reader.enter_sequence(tags::ROOT_ELEMENT_COLLECTION)?;
        let mut fragments = Vec::new();
        while reader.has_remaining() {
            reader.enter_sequence(ctx(0))?;
            if let Some(fragment) = decode_fragment(&mut reader)? {
                fragments.push(fragment);
            }
            reader.exit_sequence()?;
        }
        reader.exit_sequence()?;
        crate::tree::GlowRoot::Elements(fragments)
    } else if tag == tags::INVOCATION_RESULT {
        crate::tree::GlowRoot::InvocationResult(decode_invocation_result(&mut reader)?)
    } else if tag == tags::STREAM_COLLECTION {
        reader.enter_sequence(tags::STREAM_COLLECTION)?;
        let mut entries = Vec::new();
        while reader.has_remaining() {
            reader.enter_sequence(ctx(0))?;
            entries.push(decode_stream_entry(&mut reader)?);
            reader.exit_sequence()?;
        }
        reader.exit_sequence()?;
        crate::tree::GlowRoot::Streams(entries)
    } else {
        return Err(EmberError::Decode(format!(
            "Unknown root payload tag: {:?}",
            tag
        )));
    };

    reader.exit_sequence()?;
    if reader.has_remaining() {
        return Err(EmberError::Decode(
            "Excess data after message root".to_string(),
        ));
    }
    Ok(root)
}

fn category_for(tag: Tag) -> Option<(ElementCategory, bool)> {
    if tag == tags::NODE {
        Some((ElementCategory::Node, false))
    } else if tag == tags::PARAMETER {
        Some((ElementCategory::Parameter, false))
    } else if tag == tags::MATRIX {
        Some((ElementCategory::Matrix, false))
    } else if tag == tags::FUNCTION {
        Some((ElementCategory::Function, false))
    } else if tag == tags::QUALIFIED_NODE {
        Some((ElementCategory::Node, true))
    } else if tag == tags::QUALIFIED_PARAMETER {
        Some((ElementCategory::Parameter, true))
    } else if tag == tags::QUALIFIED_MATRIX {
        Some((ElementCategory::Matrix, true))
    } else if tag == tags::QUALIFIED_FUNCTION {
        Some((ElementCategory::Function, true))
    } else {
        None
    }
}

fn empty_kind(category: ElementCategory) -> ElementKind {
    match category {
        ElementCategory::Node => ElementKind::Node(NodeContents::default()),
        ElementCategory::Parameter => ElementKind::Parameter(ParameterContents::default()),
        ElementCategory::Matrix => ElementKind::Matrix(MatrixContents::default()),
        ElementCategory::Function => ElementKind::Function(FunctionContents::default()),
    }
}

fn decode_fragment(reader: &mut BerReader) -> EmberResult<Option<crate::tree::GlowFragment>> {
    let tag = reader.peek_tag()?;
    match category_for(tag) {
        Some((category, false)) => Ok(Some(crate::tree::GlowFragment::Positional(
            decode_element(reader, category)?,
        ))),
        Some((category, true)) => {
            let (path, element) = decode_qualified_element(reader, category)?;
            Ok(Some(crate::tree::GlowFragment::Qualified(path, element)))
        }
        None => {
            log::debug!("Skipping unknown root element tag {:?}", tag);
            reader.skip_value()?;
            Ok(None)
        }
    }
}

fn decode_element(reader: &mut BerReader, category: ElementCategory) -> EmberResult<Element> {
    reader.enter_sequence(element_tag(category, false))?;
    if reader.peek_tag()? != ctx(0) {
        return Err(EmberError::Decode(
            "Element fragment is missing its number".to_string(),
        ));
    }
    let number = field_integer(reader, 0)?;
    let number = u32::try_from(number)
        .map_err(|_| EmberError::Decode(format!("Invalid element number: {}", number)))?;

    let mut element = Element::new(number, empty_kind(category));
    decode_element_fields(reader, &mut element)?;
    reader.exit_sequence()?;
    Ok(element)
}

fn decode_qualified_element(
    reader: &mut BerReader,
    category: ElementCategory,
) -> EmberResult<(Path, Element)> {
    reader.enter_sequence(element_tag(category, true))?;
    if reader.peek_tag()? != ctx(0) {
        return Err(EmberError::Decode(
            "Qualified fragment is missing its path".to_string(),
        ));
    }
    reader.enter_sequence(ctx(0))?;
    let segments = reader.read_relative_oid()?;
    reader.exit_sequence()?;
    let path = Path::new(segments);
    let number = path.last().ok_or_else(|| {
        EmberError::Decode("Qualified fragment has an empty path".to_string())
    })?;

    let mut element = Element::new(number, empty_kind(category));
    decode_element_fields(reader, &mut element)?;
    reader.exit_sequence()?;
    Ok((path, element))
}

fn decode_element_fields(reader: &mut BerReader, element: &mut Element) -> EmberResult<()> {
    while reader.has_remaining() {
        let tag = reader.peek_tag()?;
        if tag.class() != TagClass::ContextSpecific {
            reader.skip_value()?;
            continue;
        }
        match tag.number() {
            1 => decode_contents(reader, element)?,
            2 => decode_children(reader, element)?,
            3 if element.category() == ElementCategory::Matrix => {
                let targets = decode_id_collection(reader, 3, tags::TARGET)?;
                if let ElementKind::Matrix(contents) = &mut element.kind {
                    contents.targets = Some(targets);
                }
            }
            4 if element.category() == ElementCategory::Matrix => {
                let sources = decode_id_collection(reader, 4, tags::SOURCE)?;
                if let ElementKind::Matrix(contents) = &mut element.kind {
                    contents.sources = Some(sources);
                }
            }
            5 if element.category() == ElementCategory::Matrix => {
                decode_connections(reader, element)?;
            }
            _ => reader.skip_value()?,
        }
    }
    Ok(())
}

fn decode_contents(reader: &mut BerReader, element: &mut Element) -> EmberResult<()> {
    reader.enter_sequence(ctx(1))?;
    reader.enter_sequence(Tag::SET)?;
    match &mut element.kind {
        ElementKind::Node(contents) => decode_node_contents(reader, contents)?,
        ElementKind::Parameter(contents) => decode_parameter_contents(reader, contents)?,
        ElementKind::Matrix(contents) => decode_matrix_contents(reader, contents)?,
        ElementKind::Function(contents) => decode_function_contents(reader, contents)?,
    }
    reader.exit_sequence()?;
    reader.exit_sequence()
}

fn decode_node_contents(reader: &mut BerReader, contents: &mut NodeContents) -> EmberResult<()> {
    while reader.has_remaining() {
        let tag = reader.peek_tag()?;
        match field_number(tag) {
            Some(0) => contents.identifier = Some(field_utf8(reader, 0)?),
            Some(1) => contents.description = Some(field_utf8(reader, 1)?),
            Some(3) => contents.is_online = Some(field_boolean(reader, 3)?),
            Some(4) => contents.schema_identifiers = Some(field_utf8(reader, 4)?),
            _ => reader.skip_value()?,
        }
    }
    Ok(())
}

fn decode_parameter_contents(
    reader: &mut BerReader,
    contents: &mut ParameterContents,
) -> EmberResult<()> {
    while reader.has_remaining() {
        let tag = reader.peek_tag()?;
        match field_number(tag) {
            Some(0) => contents.identifier = Some(field_utf8(reader, 0)?),
            Some(1) => contents.description = Some(field_utf8(reader, 1)?),
            Some(2) => contents.value = Some(field_value(reader, 2)?),
            Some(3) => contents.minimum = Some(field_value(reader, 3)?),
            Some(4) => contents.maximum = Some(field_value(reader, 4)?),
            Some(5) => contents.access = Some(Access::from_wire(field_enum(reader, 5)?)?),
            Some(6) => contents.format = Some(field_utf8(reader, 6)?),
            Some(7) => contents.enumeration = Some(field_utf8(reader, 7)?),
            Some(8) => contents.factor = Some(field_integer(reader, 8)?),
            Some(9) => contents.is_online = Some(field_boolean(reader, 9)?),
            Some(10) => contents.formula = Some(field_utf8(reader, 10)?),
            Some(11) => contents.step = Some(field_integer(reader, 11)?),
            Some(12) => contents.default = Some(field_value(reader, 12)?),
            Some(13) => {
                contents.parameter_type =
                    Some(ParameterType::from_wire(field_enum(reader, 13)?)?)
            }
            Some(14) => contents.stream_identifier = Some(field_integer(reader, 14)?),
            Some(16) => {
                reader.enter_sequence(ctx(16))?;
                contents.stream_descriptor = Some(decode_stream_description(reader)?);
                reader.exit_sequence()?;
            }
            _ => reader.skip_value()?,
        }
    }
    Ok(())
}

/// Decode an application-tagged stream description set
pub fn decode_stream_description(reader: &mut BerReader) -> EmberResult<StreamDescription> {
    reader.enter_sequence(tags::STREAM_DESCRIPTION)?;
    let mut format = None;
    let mut offset = None;
    while reader.has_remaining() {
        let tag = reader.peek_tag()?;
        match field_number(tag) {
            Some(0) => format = Some(StreamFormat::from_wire(field_enum(reader, 0)?)?),
            Some(1) => offset = Some(field_integer(reader, 1)?),
            _ => reader.skip_value()?,
        }
    }
    reader.exit_sequence()?;
    match (format, offset) {
        (Some(format), Some(offset)) => Ok(StreamDescription { format, offset }),
        _ => Err(EmberError::Decode(
            "Stream description is missing format or offset".to_string(),
        )),
    }
}

fn decode_matrix_contents(reader: &mut BerReader, contents: &mut MatrixContents) -> EmberResult<()> {
    while reader.has_remaining() {
        let tag = reader.peek_tag()?;
        match field_number(tag) {
            Some(0) => contents.identifier = Some(field_utf8(reader, 0)?),
            Some(1) => contents.description = Some(field_utf8(reader, 1)?),
            Some(2) => contents.matrix_type = Some(MatrixType::from_wire(field_enum(reader, 2)?)?),
            Some(3) => {
                contents.addressing_mode =
                    Some(AddressingMode::from_wire(field_enum(reader, 3)?)?)
            }
            Some(4) => contents.target_count = Some(field_u32(reader, 4)?),
            Some(5) => contents.source_count = Some(field_u32(reader, 5)?),
            Some(6) => contents.maximum_total_connects = Some(field_u32(reader, 6)?),
            Some(7) => contents.maximum_connects_per_target = Some(field_u32(reader, 7)?),
            Some(8) => {
                reader.enter_sequence(ctx(8))?;
                let inner = reader.peek_tag()?;
                contents.parameters_location = Some(if inner == Tag::RELATIVE_OID {
                    ParametersLocation::BasePath(Path::new(reader.read_relative_oid()?))
                } else {
                    let number = reader.read_integer()?;
                    ParametersLocation::Inline(u32::try_from(number).map_err(|_| {
                        EmberError::Decode(format!("Invalid parameters location: {}", number))
                    })?)
                });
                reader.exit_sequence()?;
            }
            Some(10) => {
                reader.enter_sequence(ctx(10))?;
                reader.enter_sequence(Tag::SEQUENCE)?;
                let mut labels = Vec::new();
                while reader.has_remaining() {
                    reader.enter_sequence(ctx(0))?;
                    labels.push(decode_label(reader)?);
                    reader.exit_sequence()?;
                }
                reader.exit_sequence()?;
                reader.exit_sequence()?;
                contents.labels = Some(labels);
            }
            _ => reader.skip_value()?,
        }
    }
    Ok(())
}

fn decode_label(reader: &mut BerReader) -> EmberResult<Label> {
    reader.enter_sequence(tags::LABEL)?;
    let mut base_path = None;
    let mut description = None;
    while reader.has_remaining() {
        let tag = reader.peek_tag()?;
        match field_number(tag) {
            Some(0) => {
                reader.enter_sequence(ctx(0))?;
                base_path = Some(Path::new(reader.read_relative_oid()?));
                reader.exit_sequence()?;
            }
            Some(1) => description = Some(field_utf8(reader, 1)?),
            _ => reader.skip_value()?,
        }
    }
    reader.exit_sequence()?;
    match (base_path, description) {
        (Some(base_path), Some(description)) => Ok(Label {
            base_path,
            description,
        }),
        _ => Err(EmberError::Decode(
            "Label is missing base path or description".to_string(),
        )),
    }
}

fn decode_function_contents(
    reader: &mut BerReader,
    contents: &mut FunctionContents,
) -> EmberResult<()> {
    while reader.has_remaining() {
        let tag = reader.peek_tag()?;
        match field_number(tag) {
            Some(0) => contents.identifier = Some(field_utf8(reader, 0)?),
            Some(1) => contents.description = Some(field_utf8(reader, 1)?),
            Some(2) => contents.arguments = decode_tuple_description(reader, 2)?,
            Some(3) => contents.result = decode_tuple_description(reader, 3)?,
            _ => reader.skip_value()?,
        }
    }
    Ok(())
}

fn decode_tuple_description(reader: &mut BerReader, field: u32) -> EmberResult<Vec<TupleItem>> {
    reader.enter_sequence(ctx(field))?;
    reader.enter_sequence(Tag::SEQUENCE)?;
    let mut items = Vec::new();
    while reader.has_remaining() {
        reader.enter_sequence(ctx(0))?;
        reader.enter_sequence(tags::TUPLE_ITEM)?;
        let mut item_type = None;
        let mut name = None;
        while reader.has_remaining() {
            let tag = reader.peek_tag()?;
            match field_number(tag) {
                Some(0) => item_type = Some(ParameterType::from_wire(field_enum(reader, 0)?)?),
                Some(1) => name = Some(field_utf8(reader, 1)?),
                _ => reader.skip_value()?,
            }
        }
        reader.exit_sequence()?;
        reader.exit_sequence()?;
        let item_type = item_type.ok_or_else(|| {
            EmberError::Decode("Tuple item is missing its type".to_string())
        })?;
        items.push(TupleItem::new(item_type, name));
    }
    reader.exit_sequence()?;
    reader.exit_sequence()?;
    Ok(items)
}

fn decode_children(reader: &mut BerReader, element: &mut Element) -> EmberResult<()> {
    reader.enter_sequence(ctx(2))?;
    reader.enter_sequence(tags::ELEMENT_COLLECTION)?;
    while reader.has_remaining() {
        reader.enter_sequence(ctx(0))?;
        let tag = reader.peek_tag()?;
        match category_for(tag) {
            Some((category, false)) => {
                let child = decode_element(reader, category)?;
                element.add_child(child).map_err(|_| {
                    EmberError::Decode("Duplicate child number in fragment".to_string())
                })?;
            }
            _ => {
                // Commands and qualified forms are not tree children
                log::debug!("Skipping non-child element tag {:?}", tag);
                reader.skip_value()?;
            }
        }
        reader.exit_sequence()?;
    }
    reader.exit_sequence()?;
    reader.exit_sequence()
}

fn decode_id_collection(reader: &mut BerReader, field: u32, entry_tag: Tag) -> EmberResult<Vec<u32>> {
    reader.enter_sequence(ctx(field))?;
    reader.enter_sequence(Tag::SEQUENCE)?;
    let mut ids = Vec::new();
    while reader.has_remaining() {
        reader.enter_sequence(ctx(0))?;
        reader.enter_sequence(entry_tag)?;
        let mut id = None;
        while reader.has_remaining() {
            let tag = reader.peek_tag()?;
            match field_number(tag) {
                Some(0) => id = Some(field_u32(reader, 0)?),
                _ => reader.skip_value()?,
            }
        }
        reader.exit_sequence()?;
        reader.exit_sequence()?;
        ids.push(id.ok_or_else(|| {
            EmberError::Decode("Target/source entry is missing its number".to_string())
        })?);
    }
    reader.exit_sequence()?;
    reader.exit_sequence()?;
    Ok(ids)
}

fn decode_connections(reader: &mut BerReader, element: &mut Element) -> EmberResult<()> {
    reader.enter_sequence(ctx(5))?;
    reader.enter_sequence(Tag::SEQUENCE)?;
    while reader.has_remaining() {
        reader.enter_sequence(ctx(0))?;
        let connection = decode_connection(reader)?;
        if let ElementKind::Matrix(contents) = &mut element.kind {
            contents.connections.insert(connection.target, connection);
        }
        reader.exit_sequence()?;
    }
    reader.exit_sequence()?;
    reader.exit_sequence()
}

fn decode_connection(reader: &mut BerReader) -> EmberResult<MatrixConnection> {
    reader.enter_sequence(tags::CONNECTION)?;
    let mut target = None;
    let mut sources = Vec::new();
    let mut operation = None;
    let mut disposition = None;
    while reader.has_remaining() {
        let tag = reader.peek_tag()?;
        match field_number(tag) {
            Some(0) => target = Some(field_u32(reader, 0)?),
            Some(1) => {
                reader.enter_sequence(ctx(1))?;
                sources = reader.read_relative_oid()?;
                reader.exit_sequence()?;
            }
            Some(2) => {
                operation = Some(ConnectionOperation::from_wire(field_enum(reader, 2)?)?)
            }
            Some(3) => {
                disposition = Some(ConnectionDisposition::from_wire(field_enum(reader, 3)?)?)
            }
            _ => reader.skip_value()?,
        }
    }
    reader.exit_sequence()?;
    let target = target.ok_or_else(|| {
        EmberError::Decode("Connection is missing its target".to_string())
    })?;
    Ok(MatrixConnection {
        target,
        sources,
        operation,
        disposition,
    })
}

fn decode_invocation_result(reader: &mut BerReader) -> EmberResult<InvocationResult> {
    reader.enter_sequence(tags::INVOCATION_RESULT)?;
    let mut invocation_id = None;
    let mut success = true;
    let mut result = Vec::new();
    while reader.has_remaining() {
        let tag = reader.peek_tag()?;
        match field_number(tag) {
            Some(0) => invocation_id = Some(field_integer(reader, 0)?),
            Some(1) => success = field_boolean(reader, 1)?,
            Some(2) => {
                reader.enter_sequence(ctx(2))?;
                reader.enter_sequence(Tag::SEQUENCE)?;
                while reader.has_remaining() {
                    reader.enter_sequence(ctx(0))?;
                    result.push(read_value(reader)?);
                    reader.exit_sequence()?;
                }
                reader.exit_sequence()?;
                reader.exit_sequence()?;
            }
            _ => reader.skip_value()?,
        }
    }
    reader.exit_sequence()?;
    let invocation_id = invocation_id.ok_or_else(|| {
        EmberError::Decode("Invocation result is missing its id".to_string())
    })?;
    Ok(InvocationResult {
        invocation_id,
        success,
        result,
    })
}

fn decode_stream_entry(reader: &mut BerReader) -> EmberResult<StreamEntry> {
    reader.enter_sequence(tags::STREAM_ENTRY)?;
    let mut stream_identifier = None;
    let mut value = None;
    while reader.has_remaining() {
        let tag = reader.peek_tag()?;
        match field_number(tag) {
            Some(0) => stream_identifier = Some(field_integer(reader, 0)?),
            Some(1) => value = Some(field_value(reader, 1)?),
            _ => reader.skip_value()?,
        }
    }
    reader.exit_sequence()?;
    match (stream_identifier, value) {
        (Some(stream_identifier), Some(value)) => Ok(StreamEntry {
            stream_identifier,
            value,
        }),
        _ => Err(EmberError::Decode(
            "Stream entry is missing identifier or value".to_string(),
        )),
    }
}

fn field_number(tag: Tag) -> Option<u32> {
    if tag.class() == TagClass::ContextSpecific {
        Some(tag.number())
    } else {
        None
    }
}

fn field_integer(reader: &mut BerReader, field: u32) -> EmberResult<i64> {
    reader.enter_sequence(ctx(field))?;
    let value = reader.read_integer()?;
    reader.exit_sequence()?;
    Ok(value)
}

fn field_u32(reader: &mut BerReader, field: u32) -> EmberResult<u32> {
    let value = field_integer(reader, field)?;
    u32::try_from(value)
        .map_err(|_| EmberError::Decode(format!("Value out of range for id: {}", value)))
}

fn field_utf8(reader: &mut BerReader, field: u32) -> EmberResult<String> {
    reader.enter_sequence(ctx(field))?;
    let value = reader.read_utf8()?;
    reader.exit_sequence()?;
    Ok(value)
}

fn field_boolean(reader: &mut BerReader, field: u32) -> EmberResult<bool> {
    reader.enter_sequence(ctx(field))?;
    let value = reader.read_boolean()?;
    reader.exit_sequence()?;
    Ok(value)
}

fn field_enum(reader: &mut BerReader, field: u32) -> EmberResult<i64> {
    reader.enter_sequence(ctx(field))?;
    let value = reader.read_enumerated()?;
    reader.exit_sequence()?;
    Ok(value)
}

fn field_value(reader: &mut BerReader, field: u32) -> EmberResult<Value> {
    reader.enter_sequence(ctx(field))?;
    let value = read_value(reader)?;
    reader.exit_sequence()?;
    Ok(value)
}

/// Read a bare value choice by its universal tag
fn read_value(reader: &mut BerReader) -> EmberResult<Value> {
    let tag = reader.peek_tag()?;
    if tag == Tag::INTEGER {
        Ok(Value::Integer(reader.read_integer()?))
    } else if tag == Tag::REAL {
        Ok(Value::Real(reader.read_real()?))
    } else if tag == Tag::UTF8_STRING {
        Ok(Value::String(reader.read_utf8()?))
    } else if tag == Tag::BOOLEAN {
        Ok(Value::Boolean(reader.read_boolean()?))
    } else if tag == Tag::OCTET_STRING {
        Ok(Value::Octets(reader.read_octets()?))
    } else if tag == Tag::NULL {
        reader.read_null()?;
        Ok(Value::Null)
    } else {
        Err(EmberError::Decode(format!(
            "Unexpected tag for value choice: {:?}",
            tag
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{encode_root, write_stream_description};
    use crate::tree::{GlowFragment, GlowRoot, Root};
    use ember_asn1::BerWriter;

    #[test]
    fn test_tree_export_round_trip() {
        let mut root = Root::new();
        let mut node = Element::new_node(
            1,
            NodeContents {
                identifier: Some("audio".into()),
                is_online: Some(true),
                ..Default::default()
            },
        );
        node.add_child(Element::new_parameter(
            2,
            ParameterContents {
                identifier: Some("gain".into()),
                value: Some(Value::Real(-6.5)),
                minimum: Some(Value::Real(-128.0)),
                maximum: Some(Value::Real(15.0)),
                access: Some(Access::ReadWrite),
                ..Default::default()
            },
        ))
        .unwrap();
        node.add_child(Element::new_function(
            3,
            FunctionContents {
                identifier: Some("reset".into()),
                arguments: vec![TupleItem::new(ParameterType::Integer, Some("mode".into()))],
                result: vec![TupleItem::new(ParameterType::Boolean, None)],
                ..Default::default()
            },
        ))
        .unwrap();
        root.add_child(node).unwrap();

        let bytes = encode_root(&root).unwrap();
        let decoded = decode_root(&bytes).unwrap();

        let mut rebuilt = Root::new();
        rebuilt.apply(&decoded);
        assert_eq!(rebuilt, root);
    }

    #[test]
    fn test_matrix_round_trip() {
        let mut root = Root::new();
        let mut connections = std::collections::BTreeMap::new();
        connections.insert(
            3,
            MatrixConnection {
                target: 3,
                sources: vec![1, 2],
                operation: Some(ConnectionOperation::Connect),
                disposition: Some(ConnectionDisposition::Modified),
            },
        );
        root.add_child(Element::new_matrix(
            5,
            MatrixContents {
                identifier: Some("router".into()),
                matrix_type: Some(MatrixType::NToN),
                addressing_mode: Some(AddressingMode::Linear),
                target_count: Some(8),
                source_count: Some(8),
                labels: Some(vec![Label {
                    base_path: Path::new(vec![5, 1]),
                    description: "Primary".into(),
                }]),
                connections,
                ..Default::default()
            },
        ))
        .unwrap();

        let bytes = encode_root(&root).unwrap();
        let decoded = decode_root(&bytes).unwrap();
        let mut rebuilt = Root::new();
        rebuilt.apply(&decoded);
        assert_eq!(rebuilt, root);
    }

    #[test]
    fn test_stream_description_exact_bytes() {
        let mut writer = BerWriter::new();
        write_stream_description(
            &mut writer,
            &StreamDescription::new(StreamFormat::Int32BE, 42),
        )
        .unwrap();
        let bytes = writer.into_bytes().unwrap();

        // Application 12, constructed
        assert_eq!(bytes[0], 0x6C);
        // Context-0 wrapping ENUMERATED 4 (Int32BE)
        assert!(bytes
            .windows(5)
            .any(|w| w == [0xA0, 0x03, 0x0A, 0x01, 0x04]));
        // Context-1 wrapping INTEGER 42
        assert!(bytes
            .windows(5)
            .any(|w| w == [0xA1, 0x03, 0x02, 0x01, 0x2A]));

        let mut reader = BerReader::new(&bytes);
        let decoded = decode_stream_description(&mut reader).unwrap();
        assert_eq!(decoded, StreamDescription::new(StreamFormat::Int32BE, 42));
    }

    #[test]
    fn test_decode_qualified_fragment() {
        let mut writer = BerWriter::new();
        writer.start_sequence(tags::ROOT);
        writer.start_sequence(tags::ROOT_ELEMENT_COLLECTION);
        writer.start_sequence(ctx(0));
        crate::encode::write_qualified_element(
            &mut writer,
            &Path::new(vec![1, 3, 2]),
            &Element::new_parameter(
                2,
                ParameterContents {
                    value: Some(Value::Integer(9)),
                    ..Default::default()
                },
            ),
        )
        .unwrap();
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        let bytes = writer.into_bytes().unwrap();

        let decoded = decode_root(&bytes).unwrap();
        match &decoded {
            GlowRoot::Elements(fragments) => match &fragments[0] {
                GlowFragment::Qualified(path, element) => {
                    assert_eq!(path, &Path::new(vec![1, 3, 2]));
                    assert_eq!(element.number(), 2);
                    assert_eq!(
                        element.as_parameter().unwrap().value,
                        Some(Value::Integer(9))
                    );
                }
                other => panic!("expected qualified fragment, got {:?}", other),
            },
            other => panic!("expected elements, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_trailing_garbage() {
        let mut root = Root::new();
        root.add_child(Element::new_node(1, NodeContents::default()))
            .unwrap();
        let mut bytes = encode_root(&root).unwrap();
        bytes.push(0x00);
        assert!(decode_root(&bytes).is_err());
    }

    #[test]
    fn test_decode_skips_unknown_contents_field() {
        // Node with an unknown context-7 field in its contents set
        let mut writer = BerWriter::new();
        writer.start_sequence(tags::ROOT);
        writer.start_sequence(tags::ROOT_ELEMENT_COLLECTION);
        writer.start_sequence(ctx(0));
        writer.start_sequence(tags::NODE);
        writer.start_sequence(ctx(0));
        writer.write_integer(1);
        writer.end_sequence().unwrap();
        writer.start_sequence(ctx(1));
        writer.start_sequence(Tag::SET);
        writer.start_sequence(ctx(0));
        writer.write_utf8("n");
        writer.end_sequence().unwrap();
        writer.start_sequence(ctx(7));
        writer.write_integer(99);
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        let bytes = writer.into_bytes().unwrap();

        let decoded = decode_root(&bytes).unwrap();
        let mut tree = Root::new();
        tree.apply(&decoded);
        assert_eq!(
            tree.get_child(1).unwrap().identifier(),
            Some("n")
        );
    }

    #[test]
    fn test_decode_invocation_result_root() {
        let mut writer = BerWriter::new();
        writer.start_sequence(tags::ROOT);
        writer.start_sequence(tags::INVOCATION_RESULT);
        writer.start_sequence(ctx(0));
        writer.write_integer(7);
        writer.end_sequence().unwrap();
        writer.start_sequence(ctx(1));
        writer.write_boolean(true);
        writer.end_sequence().unwrap();
        writer.start_sequence(ctx(2));
        writer.start_sequence(Tag::SEQUENCE);
        writer.start_sequence(ctx(0));
        writer.write_integer(123);
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        let bytes = writer.into_bytes().unwrap();

        match decode_root(&bytes).unwrap() {
            GlowRoot::InvocationResult(result) => {
                assert_eq!(result.invocation_id, 7);
                assert!(result.success);
                assert_eq!(result.result, vec![Value::Integer(123)]);
            }
            other => panic!("expected invocation result, got {:?}", other),
        }
    }
}
