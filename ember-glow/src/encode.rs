//! Glow to BER encoding
//!
//! Glow uses explicit tagging throughout: every field is a context tag
//! wrapping the universal encoding of its base type.

use crate::element::{Element, ElementCategory, ElementKind, NodeContents, ParameterContents};
use crate::function::{FunctionContents, Invocation, TupleItem};
use crate::matrix::{Label, MatrixConnection, MatrixContents, ParametersLocation};
use crate::path::Path;
use crate::stream::StreamDescription;
use crate::tags::{self, ctx};
use crate::tree::Root;
use ember_asn1::{BerWriter, Tag};
use ember_core::{EmberResult, Value};

/// Encode the whole tree as a single BER root
///
/// Decoding the produced bytes reconstructs the tree, making this the
/// export half of save/restore.
pub fn encode_root(root: &Root) -> EmberResult<Vec<u8>> {
    let mut writer = BerWriter::new();
    writer.start_sequence(tags::ROOT);
    writer.start_sequence(tags::ROOT_ELEMENT_COLLECTION);
    for element in root.children().iter() {
        writer.start_sequence(ctx(0));
        write_element(&mut writer, element)?;
        writer.end_sequence()?;
    }
    writer.end_sequence()?;
    writer.end_sequence()?;
    writer.into_bytes()
}

pub(crate) fn element_tag(category: ElementCategory, qualified: bool) -> Tag {
    match (category, qualified) {
        (ElementCategory::Node, false) => tags::NODE,
        (ElementCategory::Parameter, false) => tags::PARAMETER,
        (ElementCategory::Matrix, false) => tags::MATRIX,
        (ElementCategory::Function, false) => tags::FUNCTION,
        (ElementCategory::Node, true) => tags::QUALIFIED_NODE,
        (ElementCategory::Parameter, true) => tags::QUALIFIED_PARAMETER,
        (ElementCategory::Matrix, true) => tags::QUALIFIED_MATRIX,
        (ElementCategory::Function, true) => tags::QUALIFIED_FUNCTION,
    }
}

/// Encode a positional element (number header)
pub(crate) fn write_element(writer: &mut BerWriter, element: &Element) -> EmberResult<()> {
    writer.start_sequence(element_tag(element.category(), false));
    writer.start_sequence(ctx(0));
    writer.write_integer(element.number() as i64);
    writer.end_sequence()?;
    write_element_body(writer, element)?;
    writer.end_sequence()
}

/// Encode a qualified element (absolute-path header)
pub(crate) fn write_qualified_element(
    writer: &mut BerWriter,
    path: &Path,
    element: &Element,
) -> EmberResult<()> {
    writer.start_sequence(element_tag(element.category(), true));
    write_path_field(writer, 0, path)?;
    write_element_body(writer, element)?;
    writer.end_sequence()
}

fn write_element_body(writer: &mut BerWriter, element: &Element) -> EmberResult<()> {
    match element.kind() {
        ElementKind::Node(contents) => write_node_contents(writer, contents)?,
        ElementKind::Parameter(contents) => write_parameter_contents(writer, contents)?,
        ElementKind::Matrix(contents) => {
            write_matrix_contents(writer, contents)?;
            write_children(writer, element)?;
            write_matrix_collections(writer, contents)?;
            return Ok(());
        }
        ElementKind::Function(contents) => write_function_contents(writer, contents)?,
    }
    write_children(writer, element)
}

fn write_children(writer: &mut BerWriter, element: &Element) -> EmberResult<()> {
    if element.children().is_empty() {
        return Ok(());
    }
    writer.start_sequence(ctx(2));
    writer.start_sequence(tags::ELEMENT_COLLECTION);
    for child in element.children().iter() {
        writer.start_sequence(ctx(0));
        write_element(writer, child)?;
        writer.end_sequence()?;
    }
    writer.end_sequence()?;
    writer.end_sequence()
}

pub(crate) fn write_path_field(writer: &mut BerWriter, field: u32, path: &Path) -> EmberResult<()> {
    writer.start_sequence(ctx(field));
    writer.write_relative_oid(path.segments());
    writer.end_sequence()
}

fn write_field_utf8(writer: &mut BerWriter, field: u32, value: &str) -> EmberResult<()> {
    writer.start_sequence(ctx(field));
    writer.write_utf8(value);
    writer.end_sequence()
}

fn write_field_integer(writer: &mut BerWriter, field: u32, value: i64) -> EmberResult<()> {
    writer.start_sequence(ctx(field));
    writer.write_integer(value);
    writer.end_sequence()
}

fn write_field_enum(writer: &mut BerWriter, field: u32, value: i64) -> EmberResult<()> {
    writer.start_sequence(ctx(field));
    writer.write_enumerated(value);
    writer.end_sequence()
}

fn write_field_boolean(writer: &mut BerWriter, field: u32, value: bool) -> EmberResult<()> {
    writer.start_sequence(ctx(field));
    writer.write_boolean(value);
    writer.end_sequence()
}

/// Write the bare universal encoding of a value choice
pub(crate) fn write_value(writer: &mut BerWriter, value: &Value) {
    match value {
        Value::Null => writer.write_null(),
        Value::Integer(v) => writer.write_integer(*v),
        Value::Real(v) => writer.write_real(*v),
        Value::String(v) => writer.write_utf8(v),
        Value::Boolean(v) => writer.write_boolean(*v),
        Value::Octets(v) => writer.write_octets(v),
    }
}

fn write_field_value(writer: &mut BerWriter, field: u32, value: &Value) -> EmberResult<()> {
    writer.start_sequence(ctx(field));
    write_value(writer, value);
    writer.end_sequence()
}

fn write_node_contents(writer: &mut BerWriter, contents: &NodeContents) -> EmberResult<()> {
    if *contents == NodeContents::default() {
        return Ok(());
    }
    writer.start_sequence(ctx(1));
    writer.start_sequence(Tag::SET);
    if let Some(identifier) = &contents.identifier {
        write_field_utf8(writer, 0, identifier)?;
    }
    if let Some(description) = &contents.description {
        write_field_utf8(writer, 1, description)?;
    }
    if let Some(is_online) = contents.is_online {
        write_field_boolean(writer, 3, is_online)?;
    }
    if let Some(schema) = &contents.schema_identifiers {
        write_field_utf8(writer, 4, schema)?;
    }
    writer.end_sequence()?;
    writer.end_sequence()
}

fn write_parameter_contents(writer: &mut BerWriter, contents: &ParameterContents) -> EmberResult<()> {
    if *contents == ParameterContents::default() {
        return Ok(());
    }
    writer.start_sequence(ctx(1));
    writer.start_sequence(Tag::SET);
    if let Some(identifier) = &contents.identifier {
        write_field_utf8(writer, 0, identifier)?;
    }
    if let Some(description) = &contents.description {
        write_field_utf8(writer, 1, description)?;
    }
    if let Some(value) = &contents.value {
        write_field_value(writer, 2, value)?;
    }
    if let Some(minimum) = &contents.minimum {
        write_field_value(writer, 3, minimum)?;
    }
    if let Some(maximum) = &contents.maximum {
        write_field_value(writer, 4, maximum)?;
    }
    if let Some(access) = contents.access {
        write_field_enum(writer, 5, access as i64)?;
    }
    if let Some(format) = &contents.format {
        write_field_utf8(writer, 6, format)?;
    }
    if let Some(enumeration) = &contents.enumeration {
        write_field_utf8(writer, 7, enumeration)?;
    }
    if let Some(factor) = contents.factor {
        write_field_integer(writer, 8, factor)?;
    }
    if let Some(is_online) = contents.is_online {
        write_field_boolean(writer, 9, is_online)?;
    }
    if let Some(formula) = &contents.formula {
        write_field_utf8(writer, 10, formula)?;
    }
    if let Some(step) = contents.step {
        write_field_integer(writer, 11, step)?;
    }
    if let Some(default) = &contents.default {
        write_field_value(writer, 12, default)?;
    }
    if let Some(parameter_type) = contents.parameter_type {
        write_field_enum(writer, 13, parameter_type as i64)?;
    }
    if let Some(stream_identifier) = contents.stream_identifier {
        write_field_integer(writer, 14, stream_identifier)?;
    }
    if let Some(descriptor) = &contents.stream_descriptor {
        writer.start_sequence(ctx(16));
        write_stream_description(writer, descriptor)?;
        writer.end_sequence()?;
    }
    writer.end_sequence()?;
    writer.end_sequence()
}

pub(crate) fn write_stream_description(
    writer: &mut BerWriter,
    descriptor: &StreamDescription,
) -> EmberResult<()> {
    writer.start_sequence(tags::STREAM_DESCRIPTION);
    write_field_enum(writer, 0, descriptor.format as i64)?;
    write_field_integer(writer, 1, descriptor.offset)?;
    writer.end_sequence()
}

fn write_matrix_contents(writer: &mut BerWriter, contents: &MatrixContents) -> EmberResult<()> {
    let has_set_fields = contents.identifier.is_some()
        || contents.description.is_some()
        || contents.matrix_type.is_some()
        || contents.addressing_mode.is_some()
        || contents.target_count.is_some()
        || contents.source_count.is_some()
        || contents.maximum_total_connects.is_some()
        || contents.maximum_connects_per_target.is_some()
        || contents.parameters_location.is_some()
        || contents.labels.is_some();
    if !has_set_fields {
        return Ok(());
    }
    writer.start_sequence(ctx(1));
    writer.start_sequence(Tag::SET);
    if let Some(identifier) = &contents.identifier {
        write_field_utf8(writer, 0, identifier)?;
    }
    if let Some(description) = &contents.description {
        write_field_utf8(writer, 1, description)?;
    }
    if let Some(matrix_type) = contents.matrix_type {
        write_field_enum(writer, 2, matrix_type as i64)?;
    }
    if let Some(mode) = contents.addressing_mode {
        write_field_enum(writer, 3, mode as i64)?;
    }
    if let Some(count) = contents.target_count {
        write_field_integer(writer, 4, count as i64)?;
    }
    if let Some(count) = contents.source_count {
        write_field_integer(writer, 5, count as i64)?;
    }
    if let Some(max) = contents.maximum_total_connects {
        write_field_integer(writer, 6, max as i64)?;
    }
    if let Some(max) = contents.maximum_connects_per_target {
        write_field_integer(writer, 7, max as i64)?;
    }
    if let Some(location) = &contents.parameters_location {
        writer.start_sequence(ctx(8));
        match location {
            ParametersLocation::BasePath(path) => writer.write_relative_oid(path.segments()),
            ParametersLocation::Inline(number) => writer.write_integer(*number as i64),
        }
        writer.end_sequence()?;
    }
    if let Some(labels) = &contents.labels {
        writer.start_sequence(ctx(10));
        writer.start_sequence(Tag::SEQUENCE);
        for label in labels {
            writer.start_sequence(ctx(0));
            write_label(writer, label)?;
            writer.end_sequence()?;
        }
        writer.end_sequence()?;
        writer.end_sequence()?;
    }
    writer.end_sequence()?;
    writer.end_sequence()
}

fn write_label(writer: &mut BerWriter, label: &Label) -> EmberResult<()> {
    writer.start_sequence(tags::LABEL);
    write_path_field(writer, 0, &label.base_path)?;
    write_field_utf8(writer, 1, &label.description)?;
    writer.end_sequence()
}

/// Targets, sources and connections are structure-level fields of the
/// matrix, not members of its contents set
fn write_matrix_collections(writer: &mut BerWriter, contents: &MatrixContents) -> EmberResult<()> {
    if let Some(targets) = &contents.targets {
        writer.start_sequence(ctx(3));
        writer.start_sequence(Tag::SEQUENCE);
        for &target in targets {
            writer.start_sequence(ctx(0));
            writer.start_sequence(tags::TARGET);
            write_field_integer(writer, 0, target as i64)?;
            writer.end_sequence()?;
            writer.end_sequence()?;
        }
        writer.end_sequence()?;
        writer.end_sequence()?;
    }
    if let Some(sources) = &contents.sources {
        writer.start_sequence(ctx(4));
        writer.start_sequence(Tag::SEQUENCE);
        for &source in sources {
            writer.start_sequence(ctx(0));
            writer.start_sequence(tags::SOURCE);
            write_field_integer(writer, 0, source as i64)?;
            writer.end_sequence()?;
            writer.end_sequence()?;
        }
        writer.end_sequence()?;
        writer.end_sequence()?;
    }
    if !contents.connections.is_empty() {
        writer.start_sequence(ctx(5));
        writer.start_sequence(Tag::SEQUENCE);
        for connection in contents.connections.values() {
            writer.start_sequence(ctx(0));
            write_connection(writer, connection)?;
            writer.end_sequence()?;
        }
        writer.end_sequence()?;
        writer.end_sequence()?;
    }
    Ok(())
}

pub(crate) fn write_connection(
    writer: &mut BerWriter,
    connection: &MatrixConnection,
) -> EmberResult<()> {
    writer.start_sequence(tags::CONNECTION);
    write_field_integer(writer, 0, connection.target as i64)?;
    writer.start_sequence(ctx(1));
    writer.write_relative_oid(&connection.sources);
    writer.end_sequence()?;
    if let Some(operation) = connection.operation {
        write_field_enum(writer, 2, operation as i64)?;
    }
    if let Some(disposition) = connection.disposition {
        write_field_enum(writer, 3, disposition as i64)?;
    }
    writer.end_sequence()
}

fn write_function_contents(writer: &mut BerWriter, contents: &FunctionContents) -> EmberResult<()> {
    if *contents == FunctionContents::default() {
        return Ok(());
    }
    writer.start_sequence(ctx(1));
    writer.start_sequence(Tag::SET);
    if let Some(identifier) = &contents.identifier {
        write_field_utf8(writer, 0, identifier)?;
    }
    if let Some(description) = &contents.description {
        write_field_utf8(writer, 1, description)?;
    }
    if !contents.arguments.is_empty() {
        writer.start_sequence(ctx(2));
        write_tuple_description(writer, &contents.arguments)?;
        writer.end_sequence()?;
    }
    if !contents.result.is_empty() {
        writer.start_sequence(ctx(3));
        write_tuple_description(writer, &contents.result)?;
        writer.end_sequence()?;
    }
    writer.end_sequence()?;
    writer.end_sequence()
}

fn write_tuple_description(writer: &mut BerWriter, items: &[TupleItem]) -> EmberResult<()> {
    writer.start_sequence(Tag::SEQUENCE);
    for item in items {
        writer.start_sequence(ctx(0));
        writer.start_sequence(tags::TUPLE_ITEM);
        write_field_enum(writer, 0, item.item_type as i64)?;
        if let Some(name) = &item.name {
            write_field_utf8(writer, 1, name)?;
        }
        writer.end_sequence()?;
        writer.end_sequence()?;
    }
    writer.end_sequence()
}

/// Encode a command element with an optional invocation payload
pub(crate) fn write_command(
    writer: &mut BerWriter,
    number: i64,
    invocation: Option<&Invocation>,
) -> EmberResult<()> {
    writer.start_sequence(tags::COMMAND);
    write_field_integer(writer, 0, number)?;
    if let Some(invocation) = invocation {
        writer.start_sequence(ctx(2));
        writer.start_sequence(tags::INVOCATION);
        write_field_integer(writer, 0, invocation.invocation_id)?;
        writer.start_sequence(ctx(1));
        writer.start_sequence(Tag::SEQUENCE);
        for argument in &invocation.arguments {
            writer.start_sequence(ctx(0));
            write_value(writer, argument);
            writer.end_sequence()?;
        }
        writer.end_sequence()?;
        writer.end_sequence()?;
        writer.end_sequence()?;
        writer.end_sequence()?;
    }
    writer.end_sequence()
}
