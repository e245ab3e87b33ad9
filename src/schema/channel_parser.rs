// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Builds a [`ParsedChannel`] from a container's raw `(message_encoding,
//! schema_encoding, schema_data)` triple — the dispatch point where a
//! channel's schema gets parsed once into a cached [`CdrDecoder`] rather
//! than re-parsed on every message.

use std::sync::Arc;

use crate::core::error::{EngineError, Result};
use crate::core::model::ParsedChannel;
use crate::encoding::cdr::CdrDecoder;
use crate::schema::ast::{FieldType, MessageType, PrimitiveType};
use crate::schema::msg_parser::{self, RosVersion};
use crate::schema::omgidl_parser;
use crate::schema::ros2idl_parser;

/// Schema names with a body that is legitimately empty — messages with no
/// fields at all, such as trigger/ack types.
fn is_well_known_empty_type(schema_name: &str) -> bool {
    schema_name.ends_with("/Empty") || schema_name == "Empty"
}

/// Parse a channel's schema and compile a reusable decoder for it.
///
/// Only `message_encoding == "cdr"` is supported; ROS1 bag messages never
/// go through this path — they use [`crate::encoding::ros1`] directly over
/// the connection's own `.msg` definition.
pub fn parse_channel(
    message_encoding: &str,
    schema_encoding: Option<&str>,
    schema_name: &str,
    schema_data: &[u8],
) -> Result<ParsedChannel> {
    if message_encoding != "cdr" {
        return Err(EngineError::unsupported_encoding(
            message_encoding.to_string(),
            schema_encoding.map(str::to_string),
        ));
    }

    let schema_text = std::str::from_utf8(schema_data)
        .map_err(|e| EngineError::parse("schema text", e.to_string()))?;

    if schema_text.trim().is_empty() && !is_well_known_empty_type(schema_name) {
        return Err(EngineError::EmptySchema { schema_name: schema_name.to_string() });
    }

    let mut schema = match schema_encoding.map(str::to_lowercase).as_deref() {
        Some("omgidl") => omgidl_parser::parse(schema_name, schema_text)?,
        Some("ros2idl") => ros2idl_parser::parse(schema_name, schema_text)?,
        Some("ros2msg") => msg_parser::parse_with_version(schema_name, schema_text, RosVersion::Ros2)?,
        other => {
            return Err(EngineError::unsupported_encoding(
                message_encoding.to_string(),
                other.map(str::to_string),
            ));
        }
    };

    let root_type_name = match schema.get_type_variants(schema_name) {
        Some(t) => t.name.clone(),
        None if schema.types.is_empty() && is_well_known_empty_type(schema_name) => {
            schema.add_type(MessageType::new(schema_name.to_string()));
            schema_name.to_string()
        }
        None => return Err(EngineError::invalid_schema(schema_name, "root type not found in parsed schema")),
    };

    let datatypes = schema
        .types
        .values()
        .map(|msg_type| {
            let fields = msg_type
                .fields
                .iter()
                .map(|f| (f.name.clone(), field_type_to_string(&f.type_name)))
                .collect();
            (msg_type.name.clone(), fields)
        })
        .collect();

    let decoder = Arc::new(CdrDecoder::new(schema, root_type_name));
    let deserialize_decoder = Arc::clone(&decoder);
    let deserialize = Box::new(move |bytes: &[u8]| deserialize_decoder.decode(bytes));

    Ok(ParsedChannel { deserialize, datatypes })
}

fn field_type_to_string(field_type: &FieldType) -> String {
    match field_type {
        FieldType::Primitive(p) => primitive_type_name(*p).to_string(),
        FieldType::Array { base_type, size } => match size {
            Some(n) => format!("{}[{n}]", field_type_to_string(base_type)),
            None => format!("{}[]", field_type_to_string(base_type)),
        },
        FieldType::Nested(name) => name.clone(),
    }
}

fn primitive_type_name(p: PrimitiveType) -> &'static str {
    match p {
        PrimitiveType::Bool => "bool",
        PrimitiveType::Int8 => "int8",
        PrimitiveType::Int16 => "int16",
        PrimitiveType::Int32 => "int32",
        PrimitiveType::Int64 => "int64",
        PrimitiveType::UInt8 => "uint8",
        PrimitiveType::UInt16 => "uint16",
        PrimitiveType::UInt32 => "uint32",
        PrimitiveType::UInt64 => "uint64",
        PrimitiveType::Float32 => "float32",
        PrimitiveType::Float64 => "float64",
        PrimitiveType::String => "string",
        PrimitiveType::WString => "wstring",
        PrimitiveType::Byte => "byte",
        PrimitiveType::Char => "char",
        PrimitiveType::Time => "time",
        PrimitiveType::Duration => "duration",
    }
}
