//! Outbound request builders
//!
//! Every consumer operation is a small tree fragment: a command placed
//! under the element it concerns, or a minimal qualified fragment carrying
//! the mutation. Builders produce the complete BER payload, ready for
//! framing.

use crate::element::ElementCategory;
use crate::encode::{write_command, write_connection, write_path_field, write_value};
use crate::function::Invocation;
use crate::matrix::MatrixConnection;
use crate::path::Path;
use crate::tags::{self, ctx};
use ember_asn1::{BerWriter, Tag};
use ember_core::{EmberResult, Value};

fn qualified_tag(category: ElementCategory) -> Tag {
    crate::encode::element_tag(category, true)
}

/// Open the standard request envelope and run `body` inside the
/// root element collection
fn build_request(
    body: impl FnOnce(&mut BerWriter) -> EmberResult<()>,
) -> EmberResult<Vec<u8>> {
    let mut writer = BerWriter::new();
    writer.start_sequence(tags::ROOT);
    writer.start_sequence(tags::ROOT_ELEMENT_COLLECTION);
    writer.start_sequence(ctx(0));
    body(&mut writer)?;
    writer.end_sequence()?;
    writer.end_sequence()?;
    writer.end_sequence()?;
    writer.into_bytes()
}

/// Emit a command as the sole child of a qualified element
fn build_command_request(
    path: &Path,
    category: ElementCategory,
    command: i64,
    invocation: Option<&Invocation>,
) -> EmberResult<Vec<u8>> {
    build_request(|writer| {
        if path.is_root() {
            return write_command(writer, command, invocation);
        }
        writer.start_sequence(qualified_tag(category));
        write_path_field(writer, 0, path)?;
        writer.start_sequence(ctx(2));
        writer.start_sequence(tags::ELEMENT_COLLECTION);
        writer.start_sequence(ctx(0));
        write_command(writer, command, invocation)?;
        writer.end_sequence()?;
        writer.end_sequence()?;
        writer.end_sequence()?;
        writer.end_sequence()
    })
}

/// Request the direct children of the element at `path`
///
/// The empty path requests the provider's top-level elements.
pub fn get_directory_request(path: &Path, category: ElementCategory) -> EmberResult<Vec<u8>> {
    build_command_request(path, category, tags::COMMAND_GET_DIRECTORY, None)
}

/// Mutate a single parameter value
///
/// The fragment carries only the value so that the merge on the provider
/// side cannot clobber anything else.
pub fn set_value_request(path: &Path, value: &Value) -> EmberResult<Vec<u8>> {
    build_request(|writer| {
        writer.start_sequence(tags::QUALIFIED_PARAMETER);
        write_path_field(writer, 0, path)?;
        writer.start_sequence(ctx(1));
        writer.start_sequence(Tag::SET);
        writer.start_sequence(ctx(2));
        write_value(writer, value);
        writer.end_sequence()?;
        writer.end_sequence()?;
        writer.end_sequence()?;
        writer.end_sequence()
    })
}

/// Invoke the function at `path` with a client-allocated invocation id
pub fn invoke_request(path: &Path, invocation_id: i64, arguments: &[Value]) -> EmberResult<Vec<u8>> {
    let invocation = Invocation::new(invocation_id, arguments.to_vec());
    build_command_request(
        path,
        ElementCategory::Function,
        tags::COMMAND_INVOKE,
        Some(&invocation),
    )
}

/// Request crosspoint changes on the matrix at `path`
pub fn connect_request(path: &Path, connections: &[MatrixConnection]) -> EmberResult<Vec<u8>> {
    build_request(|writer| {
        writer.start_sequence(tags::QUALIFIED_MATRIX);
        write_path_field(writer, 0, path)?;
        writer.start_sequence(ctx(5));
        writer.start_sequence(Tag::SEQUENCE);
        for connection in connections {
            writer.start_sequence(ctx(0));
            write_connection(writer, connection)?;
            writer.end_sequence()?;
        }
        writer.end_sequence()?;
        writer.end_sequence()?;
        writer.end_sequence()
    })
}

/// Subscribe to stream updates of the element at `path`
pub fn subscribe_request(path: &Path, category: ElementCategory) -> EmberResult<Vec<u8>> {
    build_command_request(path, category, tags::COMMAND_SUBSCRIBE, None)
}

/// Cancel a subscription on the element at `path`
pub fn unsubscribe_request(path: &Path, category: ElementCategory) -> EmberResult<Vec<u8>> {
    build_command_request(path, category, tags::COMMAND_UNSUBSCRIBE, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::ConnectionOperation;

    #[test]
    fn test_root_get_directory_is_bare_command() {
        let bytes = get_directory_request(&Path::root(), ElementCategory::Node).unwrap();
        // Root, collection, ctx-0, then directly the command (application 2)
        assert_eq!(bytes[0], 0x60);
        let command_pos = bytes.iter().position(|&b| b == 0x62).unwrap();
        // GetDirectory command number 32 inside a context-0 integer field
        assert!(bytes[command_pos..]
            .windows(5)
            .any(|w| w == [0xA0, 0x03, 0x02, 0x01, 32]));
    }

    #[test]
    fn test_get_directory_wraps_target_path() {
        let bytes =
            get_directory_request(&Path::new(vec![1, 3]), ElementCategory::Node).unwrap();
        // Qualified node application tag 10
        assert!(bytes.contains(&0x6A));
        // Path as RELATIVE-OID 1.3
        assert!(bytes.windows(4).any(|w| w == [0x0D, 0x02, 0x01, 0x03]));
    }

    #[test]
    fn test_set_value_request_is_minimal() {
        let bytes = set_value_request(&Path::new(vec![1, 2]), &Value::Integer(7)).unwrap();
        let decoded = crate::decode::decode_root(&bytes).unwrap();
        let element = decoded.find(&Path::new(vec![1, 2])).unwrap();
        let contents = element.as_parameter().unwrap();
        assert_eq!(contents.value, Some(Value::Integer(7)));
        assert!(contents.identifier.is_none());
        assert!(contents.minimum.is_none());
    }

    #[test]
    fn test_invoke_request_carries_id_and_args() {
        let bytes = invoke_request(
            &Path::new(vec![4, 1]),
            17,
            &[Value::Integer(1), Value::String("x".into())],
        )
        .unwrap();
        // Invocation application tag 22 present
        assert!(bytes.contains(&0x76));
        // Invocation id 17 as context-0 integer
        assert!(bytes.windows(5).any(|w| w == [0xA0, 0x03, 0x02, 0x01, 17]));
    }

    #[test]
    fn test_connect_request_round_trips() {
        let connection = MatrixConnection::new(3, vec![1, 2])
            .with_operation(ConnectionOperation::Connect);
        let bytes = connect_request(&Path::new(vec![5]), &[connection.clone()]).unwrap();
        let decoded = crate::decode::decode_root(&bytes).unwrap();
        let matrix = decoded
            .find(&Path::new(vec![5]))
            .and_then(|el| el.as_matrix())
            .unwrap();
        assert_eq!(matrix.connections.get(&3), Some(&connection));
    }

    #[test]
    fn test_subscribe_command_number() {
        let bytes = subscribe_request(&Path::new(vec![1]), ElementCategory::Parameter).unwrap();
        assert!(bytes.windows(5).any(|w| w == [0xA0, 0x03, 0x02, 0x01, 30]));
        let bytes = unsubscribe_request(&Path::new(vec![1]), ElementCategory::Parameter).unwrap();
        assert!(bytes.windows(5).any(|w| w == [0xA0, 0x03, 0x02, 0x01, 31]));
    }
}
