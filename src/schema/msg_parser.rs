// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Parser for classic ROS `.msg` schema text.
//!
//! The format is a flat line-oriented grammar: a root field list, followed
//! by zero or more dependency blocks introduced by a line of `=`
//! characters and a `MSG: <type>` header. Every field line is either a
//! constant (`TYPE NAME=value`, skipped), a comment, or `TYPE NAME` with an
//! optional `[]`/`[N]` array suffix. None of that needs a grammar engine —
//! the whole format is recovered with line splitting, so this parses it
//! directly rather than going through a PEG.

use crate::core::error::{EngineError, Result};
use crate::schema::ast::{Field, FieldType, MessageSchema, MessageType, PrimitiveType};

/// ROS version detected from encoding or type name, which changes how
/// `std_msgs/Header` is shaped on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosVersion {
    /// ROS1 — `ros1msg` encoding, `Header` carries a `seq` field.
    Ros1,
    /// ROS2 — `cdr` encoding, `Header` has no `seq` field.
    Ros2,
    Unknown,
}

impl RosVersion {
    pub fn from_encoding(encoding: &str) -> Self {
        let lower = encoding.to_lowercase();
        if lower.contains("ros1") {
            RosVersion::Ros1
        } else if lower == "cdr" {
            RosVersion::Ros2
        } else {
            RosVersion::Unknown
        }
    }

    /// ROS2 types use `/msg/` in their path (`std_msgs/msg/Header`); ROS1
    /// types use a bare `/` (`std_msgs/Header`).
    pub fn from_type_name(type_name: &str) -> Self {
        if type_name.contains("/msg/") {
            RosVersion::Ros2
        } else if type_name.contains('/') {
            RosVersion::Ros1
        } else {
            RosVersion::Unknown
        }
    }
}

pub fn parse(name: &str, definition: &str) -> Result<MessageSchema> {
    let ros_version = RosVersion::from_type_name(name);
    parse_with_version(name, definition, ros_version)
}

pub fn parse_with_encoding(name: &str, definition: &str, encoding: &str) -> Result<MessageSchema> {
    parse_with_version(name, definition, RosVersion::from_encoding(encoding))
}

/// Convert indented inline nested-type syntax into explicit dependency
/// blocks, e.g.
/// ```text
/// geometry_msgs/Vector3 linear
///   float64 x
/// ```
/// becomes
/// ```text
/// geometry_msgs/Vector3 linear
/// ===
/// MSG: geometry_msgs/Vector3
/// float64 x
/// ```
fn preprocess_indented_schema(definition: &str) -> String {
    let mut root_lines: Vec<String> = Vec::new();
    let mut nested_types: std::collections::HashMap<String, Vec<String>> = std::collections::HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut current_nested_type: Option<String> = None;

    for line in definition.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            if current_nested_type.is_none() {
                root_lines.push(line.to_string());
            }
            continue;
        }

        let is_indented = line.starts_with(' ') || line.starts_with('\t');
        if is_indented {
            if let Some(type_name) = &current_nested_type {
                let entry = nested_types.entry(type_name.clone()).or_default();
                if entry.is_empty() {
                    order.push(type_name.clone());
                }
                entry.push(trimmed.to_string());
            }
        } else {
            current_nested_type = None;
            root_lines.push(line.to_string());
            if let Some(nested) = extract_nested_type(trimmed) {
                current_nested_type = Some(nested);
            }
        }
    }

    let mut result = root_lines.join("\n");
    for type_name in order {
        let fields = &nested_types[&type_name];
        if !fields.is_empty() {
            result.push_str("\n===\nMSG: ");
            result.push_str(&type_name);
            result.push('\n');
            result.push_str(&fields.join("\n"));
            result.push('\n');
        }
    }
    result
}

/// Extract the nested type name from a field declaration, or `None` if the
/// declared type is primitive (or the line is a constant).
fn extract_nested_type(line: &str) -> Option<String> {
    if line.contains('=') {
        return None;
    }
    let type_part = line.split_whitespace().next()?;
    let base_type = type_part.split('[').next().unwrap_or(type_part);

    const PRIMITIVES: &[&str] = &[
        "bool", "boolean", "byte", "char", "int8", "int16", "int32", "int64", "uint8", "uint16", "uint32",
        "uint64", "float32", "float64", "float", "double", "string", "wstring", "time", "duration",
    ];
    if PRIMITIVES.contains(&base_type) {
        None
    } else {
        Some(base_type.to_string())
    }
}

fn is_separator_line(line: &str) -> bool {
    let t = line.trim();
    t.len() >= 3 && t.chars().all(|c| c == '=')
}

/// Split schema text into the root field-line list and a sequence of
/// `(type_name, field_lines)` dependency blocks, in source order.
fn split_blocks(definition: &str) -> (Vec<&str>, Vec<(String, Vec<&str>)>) {
    let mut lines = definition.lines().peekable();
    let mut root_lines = Vec::new();
    while let Some(&line) = lines.peek() {
        if is_separator_line(line) {
            break;
        }
        root_lines.push(line);
        lines.next();
    }

    let mut blocks: Vec<(String, Vec<&str>)> = Vec::new();
    while let Some(line) = lines.next() {
        if !is_separator_line(line) {
            continue;
        }
        let mut header = None;
        while let Some(&next) = lines.peek() {
            if next.trim().is_empty() {
                lines.next();
                continue;
            }
            header = Some(next);
            lines.next();
            break;
        }
        let Some(header_line) = header else { continue };
        let type_name = header_line.trim().strip_prefix("MSG:").unwrap_or(header_line.trim()).trim().to_string();

        let mut field_lines = Vec::new();
        while let Some(&next) = lines.peek() {
            if is_separator_line(next) {
                break;
            }
            field_lines.push(next);
            lines.next();
        }
        if !type_name.is_empty() {
            blocks.push((type_name, field_lines));
        }
    }
    (root_lines, blocks)
}

pub fn parse_with_version(name: &str, definition: &str, ros_version: RosVersion) -> Result<MessageSchema> {
    let definition = if definition.contains("===") {
        definition.to_string()
    } else {
        preprocess_indented_schema(definition)
    };

    let (root_lines, blocks) = split_blocks(&definition);

    let mut schema = MessageSchema::new(name.to_string());
    let mut root = MessageType::new(name.to_string());
    for line in root_lines {
        if let Some(field) = parse_msg_line(line) {
            root.add_field(field);
        }
    }
    schema.add_type(root);

    for (type_name, field_lines) in blocks {
        let mut msg_type = MessageType::new(type_name);
        for line in field_lines {
            if let Some(field) = parse_msg_line(line) {
                msg_type.add_field(field);
            }
        }
        schema.add_type(msg_type);
    }

    if schema.get_type(name).map(|t| t.fields.is_empty()).unwrap_or(true) && schema.types.len() <= 1 {
        return Err(EngineError::invalid_schema(name, "schema produced no fields"));
    }

    if ros_version == RosVersion::Ros1 {
        add_seq_field_to_header_types(&mut schema);
        remove_header_fields_from_ros1_messages(&mut schema);
    }

    Ok(schema)
}

/// Parse one field-declaration line, skipping comments, blanks, and
/// constants (`TYPE NAME=value`).
fn parse_msg_line(line: &str) -> Option<Field> {
    let content = line.trim();
    if content.is_empty() || content.starts_with('#') || content.contains('=') {
        return None;
    }

    let space_pos = content.find(|c: char| c.is_whitespace())?;
    let type_part = &content[..space_pos];

    let (base_type_str, is_array, array_size) = if let Some(bracket_pos) = type_part.find('[') {
        let base = &type_part[..bracket_pos];
        let digits: String = type_part[bracket_pos..].chars().filter(|c| c.is_ascii_digit()).collect();
        (base.to_string(), true, digits.parse().ok())
    } else {
        (type_part.to_string(), false, None)
    };

    let after_type = content[space_pos..].trim_start();
    let field_end = after_type.find(|c: char| c.is_whitespace()).unwrap_or(after_type.len());
    let field_name = after_type[..field_end].to_string();
    if field_name.is_empty() {
        return None;
    }

    Some(Field { name: field_name, type_name: build_field_type(&base_type_str, is_array, array_size) })
}

fn build_field_type(base_type_str: &str, is_array: bool, array_size: Option<usize>) -> FieldType {
    let base_type_str = base_type_str.trim();
    let base = match PrimitiveType::try_from_str(base_type_str) {
        Some(prim) => FieldType::Primitive(prim),
        None => FieldType::Nested(base_type_str.to_string()),
    };
    if is_array {
        FieldType::Array { base_type: Box::new(base), size: array_size }
    } else {
        base
    }
}

/// Insert a `seq: uint32` field after `stamp` in every `Header` variant,
/// matching ROS1's `uint32 seq / time stamp / string frame_id` layout.
fn add_seq_field_to_header_types(schema: &mut MessageSchema) {
    let header_variants: Vec<String> = schema
        .types
        .keys()
        .filter(|k| k.contains("Header") && (k.contains("std_msgs") || k.ends_with("/Header")))
        .cloned()
        .collect();

    for variant_name in &header_variants {
        if let Some(header_type) = schema.types.get_mut(variant_name) {
            if header_type.fields.iter().any(|f| f.name == "seq") {
                continue;
            }
            let seq_field = Field { name: "seq".to_string(), type_name: FieldType::Primitive(PrimitiveType::UInt32) };
            let stamp_idx = header_type.fields.iter().position(|f| f.name == "stamp").unwrap_or(0);
            header_type.fields.insert(stamp_idx + 1, seq_field);
            header_type.max_alignment = header_type.max_alignment.max(4);
        }
    }
}

/// Remove a leading `header` field from the top-level message only — the
/// ROS1 record header already carries that timestamp, but nested types
/// (e.g. a `TransformStamped` inside a `TFMessage` array) still encode
/// their own header bytes on the wire.
fn remove_header_fields_from_ros1_messages(schema: &mut MessageSchema) {
    let top_level_name = schema.name.clone();
    if top_level_name.ends_with("/Header") || top_level_name == "Header" {
        return;
    }

    if let Some(msg_type) = schema.types.get_mut(&top_level_name) {
        let looks_like_header =
            msg_type.fields.iter().any(|f| f.name == "frame_id") && !msg_type.fields.iter().any(|f| f.name == "seq");
        if looks_like_header {
            return;
        }

        if !msg_type.fields.is_empty() && msg_type.fields[0].name == "header" {
            if let FieldType::Nested(nested_type) = &msg_type.fields[0].type_name {
                if nested_type.contains("Header") {
                    msg_type.fields.remove(0);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_field() {
        let schema = parse("TestMsg", "int32 value").unwrap();
        let msg_type = schema.get_type("TestMsg").unwrap();
        assert_eq!(msg_type.fields.len(), 1);
        assert_eq!(msg_type.fields[0].name, "value");
    }

    #[test]
    fn parses_multiple_fields() {
        let schema = parse("TestMsg", "int32 x\nint32 y").unwrap();
        let msg_type = schema.get_type("TestMsg").unwrap();
        assert_eq!(msg_type.fields.len(), 2);
        assert_eq!(msg_type.fields[0].name, "x");
        assert_eq!(msg_type.fields[1].name, "y");
    }

    #[test]
    fn parses_dynamic_array() {
        let schema = parse("TestMsg", "int32[] values").unwrap();
        let msg_type = schema.get_type("TestMsg").unwrap();
        match &msg_type.fields[0].type_name {
            FieldType::Array { size, .. } => assert!(size.is_none()),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn parses_fixed_array() {
        let schema = parse("TestMsg", "float32[3] position").unwrap();
        let msg_type = schema.get_type("TestMsg").unwrap();
        match &msg_type.fields[0].type_name {
            FieldType::Array { size, .. } => assert_eq!(*size, Some(3)),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn parses_nested_type() {
        let schema = parse("TestMsg", "std_msgs/Header header").unwrap();
        let msg_type = schema.get_type("TestMsg").unwrap();
        match &msg_type.fields[0].type_name {
            FieldType::Nested(name) => assert_eq!(name, "std_msgs/Header"),
            _ => panic!("expected nested"),
        }
    }

    #[test]
    fn skips_comments_and_constants() {
        let schema = parse("TestMsg", "# a comment\nbyte DEBUG=10\nint32 value").unwrap();
        let msg_type = schema.get_type("TestMsg").unwrap();
        assert_eq!(msg_type.fields.len(), 1);
        assert_eq!(msg_type.fields[0].name, "value");
    }

    #[test]
    fn parses_dependency_block() {
        let msg = "std_msgs/Header header\n===\nMSG: std_msgs/Header\ntime stamp\nstring frame_id\n";
        let schema = parse_with_encoding("JointState", msg, "ros1msg").unwrap();
        assert!(schema.get_type("std_msgs/Header").is_some());
    }

    #[test]
    fn ros_version_detection() {
        assert_eq!(RosVersion::from_type_name("sensor_msgs/msg/Image"), RosVersion::Ros2);
        assert_eq!(RosVersion::from_type_name("sensor_msgs/Image"), RosVersion::Ros1);
        assert_eq!(RosVersion::from_encoding("ros1msg"), RosVersion::Ros1);
        assert_eq!(RosVersion::from_encoding("CDR"), RosVersion::Ros2);
    }

    #[test]
    fn ros1_header_gets_seq_field() {
        let msg = "std_msgs/Header header\n===\nMSG: std_msgs/Header\ntime stamp\nstring frame_id\n";
        let schema = parse_with_encoding("test/Msg", msg, "ros1msg").unwrap();
        let header = schema.get_type("std_msgs/Header").unwrap();
        assert!(header.fields.iter().any(|f| f.name == "seq"));
    }

    #[test]
    fn ros2_header_has_no_seq_field() {
        let msg = "std_msgs/Header header\n===\nMSG: std_msgs/Header\nbuiltin_interfaces/Time stamp\nstring frame_id\n";
        let schema = parse_with_encoding("sensor_msgs/msg/Image", msg, "cdr").unwrap();
        let header = schema.get_type("std_msgs/Header").unwrap();
        assert!(!header.fields.iter().any(|f| f.name == "seq"));
    }

    #[test]
    fn ros1_top_level_header_field_is_dropped() {
        let msg = "std_msgs/Header header\nfloat64 x\n===\nMSG: std_msgs/Header\ntime stamp\nstring frame_id\n";
        let schema = parse_with_encoding("geometry_msgs/PoseStamped", msg, "ros1msg").unwrap();
        let root = schema.get_type("geometry_msgs/PoseStamped").unwrap();
        assert!(!root.fields.iter().any(|f| f.name == "header"));
        assert!(root.fields.iter().any(|f| f.name == "x"));
    }

    #[test]
    fn preprocess_converts_indented_nested_fields() {
        let msg = "geometry_msgs/Vector3 linear\n  float64 x\n  float64 y\nfloat64 angular";
        let processed = preprocess_indented_schema(msg);
        assert!(processed.contains("MSG: geometry_msgs/Vector3"));
        assert!(processed.contains("float64 x"));
    }
}
