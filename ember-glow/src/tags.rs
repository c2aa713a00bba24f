//! Glow DTD application tags and command numbers

use ember_asn1::Tag;

pub const ROOT: Tag = Tag::application(true, 0);
pub const PARAMETER: Tag = Tag::application(true, 1);
pub const COMMAND: Tag = Tag::application(true, 2);
pub const NODE: Tag = Tag::application(true, 3);
pub const ELEMENT_COLLECTION: Tag = Tag::application(true, 4);
pub const STREAM_ENTRY: Tag = Tag::application(true, 5);
pub const STREAM_COLLECTION: Tag = Tag::application(true, 6);
pub const QUALIFIED_PARAMETER: Tag = Tag::application(true, 9);
pub const QUALIFIED_NODE: Tag = Tag::application(true, 10);
pub const ROOT_ELEMENT_COLLECTION: Tag = Tag::application(true, 11);
pub const STREAM_DESCRIPTION: Tag = Tag::application(true, 12);
pub const MATRIX: Tag = Tag::application(true, 13);
pub const TARGET: Tag = Tag::application(true, 14);
pub const SOURCE: Tag = Tag::application(true, 15);
pub const CONNECTION: Tag = Tag::application(true, 16);
pub const QUALIFIED_MATRIX: Tag = Tag::application(true, 17);
pub const LABEL: Tag = Tag::application(true, 18);
pub const FUNCTION: Tag = Tag::application(true, 19);
pub const QUALIFIED_FUNCTION: Tag = Tag::application(true, 20);
pub const TUPLE_ITEM: Tag = Tag::application(true, 21);
pub const INVOCATION: Tag = Tag::application(true, 22);
pub const INVOCATION_RESULT: Tag = Tag::application(true, 23);

/// Command numbers
pub const COMMAND_SUBSCRIBE: i64 = 30;
pub const COMMAND_UNSUBSCRIBE: i64 = 31;
pub const COMMAND_GET_DIRECTORY: i64 = 32;
pub const COMMAND_INVOKE: i64 = 33;

/// Context tag shorthand for field wrapping
pub const fn ctx(number: u32) -> Tag {
    Tag::context(true, number)
}
