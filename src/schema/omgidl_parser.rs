// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Parser for a practical subset of OMG IDL v4.1 — the subset `rosidl`
//! actually generates: nested `module`/`struct` declarations, `sequence<T>`,
//! bounded/unbounded `string`, fixed-size array declarators, and `@verbatim`
//! annotations to be skipped rather than interpreted.
//!
//! No grammar engine here: the token set is small and flat enough that a
//! hand-rolled scan-then-recursive-descend pass is both simpler and easier
//! to audit than a PEG would be.

use crate::core::error::{EngineError, Result};
use crate::schema::ast::{Field, FieldType, MessageSchema, MessageType, PrimitiveType};
use crate::schema::msg_parser::RosVersion;

pub fn parse(name: &str, definition: &str) -> Result<MessageSchema> {
    parse_with_version(name, definition, RosVersion::Ros2)
}

pub fn parse_with_encoding(name: &str, definition: &str, encoding: &str) -> Result<MessageSchema> {
    parse_with_version(name, definition, RosVersion::from_encoding(encoding))
}

pub fn parse_with_version(name: &str, definition: &str, ros_version: RosVersion) -> Result<MessageSchema> {
    let cleaned = strip_idl_noise(definition);
    let tokens = tokenize(&cleaned);
    let mut schema = MessageSchema::new(name.to_string());
    let mut pos = 0;
    parse_definitions(&tokens, &mut pos, &mut schema, "")?;

    if ros_version == RosVersion::Ros1 {
        add_seq_field_to_header_types(&mut schema);
    }

    Ok(schema)
}

/// Drop `//` line comments, `#include` directives, and `@name(...)`
/// annotations (balancing parens and ignoring delimiters inside quoted
/// strings, since annotation text is free-form and can itself contain
/// `)`/`,`/newlines via string concatenation).
fn strip_idl_noise(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '@' => {
                i += 1;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_whitespace() {
                    i += 1;
                }
                if chars.get(i) == Some(&'(') {
                    let mut depth = 0i32;
                    let mut in_string = false;
                    while i < chars.len() {
                        match chars[i] {
                            '"' => in_string = !in_string,
                            '(' if !in_string => depth += 1,
                            ')' if !in_string => {
                                depth -= 1;
                                if depth == 0 {
                                    i += 1;
                                    break;
                                }
                            }
                            _ => {}
                        }
                        i += 1;
                    }
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if "{};<>,[]".contains(c) {
            tokens.push(c.to_string());
            chars.next();
            continue;
        }
        if c.is_alphanumeric() || c == '_' || c == ':' {
            let mut word = String::new();
            while let Some(&c2) = chars.peek() {
                if c2.is_alphanumeric() || c2 == '_' || c2 == ':' {
                    word.push(c2);
                    chars.next();
                } else {
                    break;
                }
            }
            if !word.is_empty() {
                tokens.push(word);
            }
            continue;
        }
        chars.next();
    }
    tokens
}

fn take(tokens: &[String], pos: &mut usize) -> Result<String> {
    let tok = tokens.get(*pos).cloned().ok_or_else(|| EngineError::parse("IDL schema", "unexpected end of input"))?;
    *pos += 1;
    Ok(tok)
}

fn expect(tokens: &[String], pos: &mut usize, want: &str) -> Result<()> {
    let tok = take(tokens, pos)?;
    if tok != want {
        return Err(EngineError::parse("IDL schema", format!("expected `{want}`, found `{tok}`")));
    }
    Ok(())
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn parse_definitions(tokens: &[String], pos: &mut usize, schema: &mut MessageSchema, module_path: &str) -> Result<()> {
    while pos_tok(tokens, *pos).map(String::as_str) != Some("}") && *pos < tokens.len() {
        match tokens[*pos].as_str() {
            "module" => {
                *pos += 1;
                let name = take(tokens, pos)?;
                expect(tokens, pos, "{")?;
                let nested_path = join_path(module_path, &name);
                parse_definitions(tokens, pos, schema, &nested_path)?;
                expect(tokens, pos, "}")?;
                expect(tokens, pos, ";")?;
            }
            "struct" => {
                *pos += 1;
                let name = take(tokens, pos)?;
                if pos_tok(tokens, *pos).map(String::as_str) == Some(";") {
                    *pos += 1;
                    continue;
                }
                expect(tokens, pos, "{")?;
                let full_name = join_path(module_path, &name);
                let mut msg_type = MessageType::new(full_name);
                parse_members(tokens, pos, &mut msg_type)?;
                expect(tokens, pos, "}")?;
                expect(tokens, pos, ";")?;
                schema.add_type(msg_type);
            }
            _ => {
                *pos += 1;
            }
        }
    }
    Ok(())
}

fn pos_tok<'a>(tokens: &'a [String], pos: usize) -> Option<&'a String> {
    tokens.get(pos)
}

fn parse_members(tokens: &[String], pos: &mut usize, msg_type: &mut MessageType) -> Result<()> {
    while pos_tok(tokens, *pos).map(String::as_str) != Some("}") {
        let base_type = parse_type_spec(tokens, pos)?;
        loop {
            let field_name = take(tokens, pos)?;
            let mut field_type = base_type.clone();
            while pos_tok(tokens, *pos).map(String::as_str) == Some("[") {
                *pos += 1;
                let size_tok = take(tokens, pos)?;
                expect(tokens, pos, "]")?;
                field_type = FieldType::Array { base_type: Box::new(field_type), size: size_tok.parse().ok() };
            }
            msg_type.add_field(Field { name: field_name, type_name: field_type });
            if pos_tok(tokens, *pos).map(String::as_str) == Some(",") {
                *pos += 1;
                continue;
            }
            break;
        }
        expect(tokens, pos, ";")?;
    }
    Ok(())
}

fn skip_bound(tokens: &[String], pos: &mut usize) -> Result<()> {
    if pos_tok(tokens, *pos).map(String::as_str) == Some("<") {
        *pos += 1;
        let mut depth = 1;
        while depth > 0 {
            match take(tokens, pos)?.as_str() {
                "<" => depth += 1,
                ">" => depth -= 1,
                _ => {}
            }
        }
    }
    Ok(())
}

fn parse_type_spec(tokens: &[String], pos: &mut usize) -> Result<FieldType> {
    let tok = take(tokens, pos)?;
    match tok.as_str() {
        "sequence" => {
            expect(tokens, pos, "<")?;
            let inner = parse_type_spec(tokens, pos)?;
            // optional `, bound`
            if pos_tok(tokens, *pos).map(String::as_str) == Some(",") {
                *pos += 1;
                take(tokens, pos)?;
            }
            expect(tokens, pos, ">")?;
            Ok(FieldType::Array { base_type: Box::new(inner), size: None })
        }
        "string" | "wstring" => {
            skip_bound(tokens, pos)?;
            Ok(FieldType::Primitive(PrimitiveType::String))
        }
        "octet" => Ok(FieldType::Primitive(PrimitiveType::UInt8)),
        "unsigned" => match take(tokens, pos)?.as_str() {
            "short" => Ok(FieldType::Primitive(PrimitiveType::UInt16)),
            "long" => {
                if pos_tok(tokens, *pos).map(String::as_str) == Some("long") {
                    *pos += 1;
                    Ok(FieldType::Primitive(PrimitiveType::UInt64))
                } else {
                    Ok(FieldType::Primitive(PrimitiveType::UInt32))
                }
            }
            other => Err(EngineError::parse("IDL schema", format!("unexpected unsigned type `{other}`"))),
        },
        "long" => {
            if pos_tok(tokens, *pos).map(String::as_str) == Some("long") {
                *pos += 1;
                Ok(FieldType::Primitive(PrimitiveType::Int64))
            } else {
                Ok(FieldType::Primitive(PrimitiveType::Int32))
            }
        }
        "short" => Ok(FieldType::Primitive(PrimitiveType::Int16)),
        word => match PrimitiveType::try_from_str(word) {
            Some(prim) => Ok(FieldType::Primitive(prim)),
            None => Ok(FieldType::Nested(word.to_string())),
        },
    }
}

/// ROS1 data carries a `seq` field inside `Header` that ROS2 IDL schemas
/// (generated from CDR-only definitions) omit; mirror `msg_parser`'s fixup
/// here for IDL-sourced schemas fed ROS1 data.
fn add_seq_field_to_header_types(schema: &mut MessageSchema) {
    let header_variants: Vec<String> =
        schema.types.keys().filter(|k| k.contains("Header") && k.contains("std_msgs")).cloned().collect();

    for variant_name in &header_variants {
        if let Some(header_type) = schema.types.get_mut(variant_name) {
            if header_type.fields.iter().any(|f| f.name == "seq") {
                continue;
            }
            let seq_field = Field { name: "seq".to_string(), type_name: FieldType::Primitive(PrimitiveType::UInt32) };
            header_type.fields.insert(1, seq_field);
            header_type.max_alignment = header_type.max_alignment.max(4);
        }
    }
}
