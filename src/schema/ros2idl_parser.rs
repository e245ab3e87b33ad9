// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Parser for the `ros2idl` schema encoding: OMG IDL with `=` separator
//! lines and `IDL: package/Type` headers inserted between concatenated
//! per-type definitions. Strip the headers, then parse the remainder as
//! plain OMG IDL.

use crate::core::error::Result;
use crate::schema::ast::MessageSchema;
use crate::schema::msg_parser::RosVersion;
use crate::schema::omgidl_parser;

fn is_separator_line(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed.len() >= 75 && trimmed.chars().all(|c: char| c == '=')
}

fn is_idl_header_line(line: &str) -> bool {
    line.trim().starts_with("IDL: ")
}

/// Remove `===...` / `IDL: Type` header pairs, leaving pure OMG IDL. A
/// separator line only counts if immediately followed by an IDL header —
/// this avoids mis-stripping a coincidental run of `=` inside IDL content.
pub fn normalize_ros2_idl(definition: &str) -> String {
    let lines: Vec<&str> = definition.lines().collect();
    let mut result = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if is_separator_line(lines[i]) && i + 1 < lines.len() && is_idl_header_line(lines[i + 1]) {
            i += 2;
        } else {
            result.push(lines[i]);
            i += 1;
        }
    }
    result.join("\n")
}

pub fn parse(name: &str, definition: &str) -> Result<MessageSchema> {
    let cleaned = normalize_ros2_idl(definition);
    omgidl_parser::parse(name, &cleaned)
}

pub fn parse_with_encoding(name: &str, definition: &str, encoding: &str) -> Result<MessageSchema> {
    let cleaned = normalize_ros2_idl(definition);
    omgidl_parser::parse_with_version(name, &cleaned, RosVersion::from_encoding(encoding))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_separator_and_header_lines() {
        let ros2_idl = "================================================================================\nIDL: std_msgs/msg/Header\nstruct Header {\n  uint32 seq;\n};\n";
        let normalized = normalize_ros2_idl(ros2_idl);
        assert!(!normalized.contains("====="));
        assert!(!normalized.contains("IDL:"));
        assert!(normalized.contains("struct Header"));
    }

    #[test]
    fn parses_point_struct() {
        let ros2_idl = "================================================================================\nIDL: geometry_msgs/msg/Point\nstruct Point {\n  float x;\n  float y;\n  float z;\n};\n";
        let schema = parse("geometry_msgs/Point", ros2_idl).unwrap();
        let msg_type = schema.get_type("Point").unwrap();
        assert_eq!(msg_type.fields.len(), 3);
    }

    #[test]
    fn parses_multiple_concatenated_messages() {
        let ros2_idl = "================================================================================\nIDL: a/msg/A\nstruct A {\n  int32 value;\n};\n\n================================================================================\nIDL: b/msg/B\nstruct B {\n  float64 value;\n};\n";
        let schema = parse("a/A", ros2_idl).unwrap();
        assert!(schema.get_type("A").is_some());
        assert!(schema.get_type("B").is_some());
    }

    #[test]
    fn empty_body_after_stripping_yields_empty_schema() {
        let ros2_idl = "================================================================================\nIDL: test_msgs/msg/Empty\n";
        let schema = parse("test_msgs/Empty", ros2_idl).unwrap();
        assert!(schema.types.is_empty());
    }
}
