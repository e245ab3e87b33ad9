// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CDR decoder: compiles a [`MessageSchema`] into a flat [`DecodePlan`] once
//! per type, then interprets that plan against a byte buffer on every call.
//! Compiling once and replaying the plan avoids re-walking the schema AST
//! for every message on a channel, which matters when a topic publishes at
//! a few hundred Hz.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::error::{EngineError, Result};
use crate::core::value::{DecodedMessage, PrimitiveType as CoreType, Value};
use crate::encoding::cdr::cursor::CdrCursor;
use crate::encoding::cdr::plan::{DecodeOp, DecodePlan, ElementType};
use crate::schema::ast::{Field, FieldType, MessageSchema, PrimitiveType};

/// Length fields above this are treated as corrupt rather than an attempt
/// to allocate a multi-gigabyte buffer from a bad byte.
const MAX_ARRAY_LENGTH: usize = 10_000_000;

/// Decodes CDR-encoded messages of one schema's types, caching a compiled
/// plan per type name (root type plus any nested types reached through it).
pub struct CdrDecoder {
    schema: MessageSchema,
    root_type: String,
    plan_cache: Mutex<HashMap<String, DecodePlan>>,
}

impl CdrDecoder {
    pub fn new(schema: MessageSchema, root_type: impl Into<String>) -> Self {
        Self { schema, root_type: root_type.into(), plan_cache: Mutex::new(HashMap::new()) }
    }

    pub fn root_type(&self) -> &str {
        &self.root_type
    }

    /// Decode a message that carries the 4-byte CDR encapsulation header.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedMessage> {
        let mut cursor = CdrCursor::new(data)?;
        let plan = self.plan_for(&self.root_type)?;
        self.execute_plan(&plan, &mut cursor)
    }

    /// Decode a message with no encapsulation header — used when the
    /// endianness has already been established out of band.
    pub fn decode_headerless(&self, data: &[u8], little_endian: bool) -> Result<DecodedMessage> {
        let mut cursor = CdrCursor::new_headerless(data, little_endian);
        let plan = self.plan_for(&self.root_type)?;
        self.execute_plan(&plan, &mut cursor)
    }

    fn plan_for(&self, type_name: &str) -> Result<DecodePlan> {
        if let Some(plan) = self.plan_cache.lock().unwrap().get(type_name) {
            return Ok(plan.clone());
        }
        let msg_type = self
            .schema
            .get_type_variants(type_name)
            .ok_or_else(|| EngineError::type_not_found(type_name))?;
        let mut plan = DecodePlan::new(type_name.to_string());
        for field in &msg_type.fields {
            self.generate_field(&mut plan.ops, field)?;
        }
        self.plan_cache.lock().unwrap().insert(type_name.to_string(), plan.clone());
        Ok(plan)
    }

    fn generate_field(&self, ops: &mut Vec<DecodeOp>, field: &Field) -> Result<()> {
        match &field.type_name {
            FieldType::Primitive(p) => {
                self.generate_primitive_field(ops, &field.name, *p);
                Ok(())
            }
            FieldType::Nested(type_name) => self.generate_nested_field(ops, &field.name, type_name),
            FieldType::Array { base_type, size } => {
                self.generate_array_field(ops, &field.name, base_type, *size)
            }
        }
    }

    fn generate_primitive_field(&self, ops: &mut Vec<DecodeOp>, name: &str, p: PrimitiveType) {
        let field_path = name.to_string();
        match p {
            PrimitiveType::String | PrimitiveType::WString => ops.push(DecodeOp::ReadString { field_path }),
            PrimitiveType::Time => ops.push(DecodeOp::ReadTime { field_path }),
            PrimitiveType::Duration => ops.push(DecodeOp::ReadDuration { field_path }),
            other => ops.push(DecodeOp::ReadPrimitive { field_path, type_name: other.to_core() }),
        }
    }

    fn generate_nested_field(&self, ops: &mut Vec<DecodeOp>, name: &str, type_name: &str) -> Result<()> {
        let nested = self
            .schema
            .get_type_variants(type_name)
            .ok_or_else(|| EngineError::type_not_found(type_name))?
            .clone();
        ops.push(DecodeOp::Align { alignment: nested.max_alignment });
        ops.push(DecodeOp::DecodeNested { field_path: name.to_string(), type_name: type_name.to_string() });
        for field in &nested.fields {
            self.generate_field(ops, field)?;
        }
        ops.push(DecodeOp::EndScope);
        Ok(())
    }

    fn generate_array_field(
        &self,
        ops: &mut Vec<DecodeOp>,
        name: &str,
        base_type: &FieldType,
        size: Option<usize>,
    ) -> Result<()> {
        let field_path = name.to_string();
        match base_type {
            FieldType::Primitive(PrimitiveType::Byte | PrimitiveType::UInt8) if size.is_none() => {
                ops.push(DecodeOp::ReadBytes { field_path });
            }
            FieldType::Primitive(p) => {
                ops.push(DecodeOp::ReadArray {
                    field_path,
                    element_type: ElementType::Primitive(p.to_core()),
                    count: size,
                });
            }
            FieldType::Nested(type_name) => {
                let nested = self
                    .schema
                    .get_type_variants(type_name)
                    .ok_or_else(|| EngineError::type_not_found(type_name.clone()))?;
                ops.push(DecodeOp::ReadArray {
                    field_path,
                    element_type: ElementType::Nested {
                        type_name: type_name.clone(),
                        alignment: nested.max_alignment,
                    },
                    count: size,
                });
            }
            FieldType::Array { .. } => {
                return Err(EngineError::invariant_violation("arrays of arrays are not supported"));
            }
        }
        Ok(())
    }

    fn execute_plan(&self, plan: &DecodePlan, cursor: &mut CdrCursor) -> Result<DecodedMessage> {
        let mut root = DecodedMessage::new();
        let mut scope_stack: Vec<(String, DecodedMessage)> = Vec::new();

        for op in &plan.ops {
            match op {
                DecodeOp::Align { alignment } => cursor.align(*alignment as usize)?,
                DecodeOp::ReadPrimitive { field_path, type_name } => {
                    let value = self.read_primitive(cursor, *type_name)?;
                    insert(&mut root, &mut scope_stack, field_path, value);
                }
                DecodeOp::ReadString { field_path } => {
                    let value = Value::String(self.read_string(cursor)?);
                    insert(&mut root, &mut scope_stack, field_path, value);
                }
                DecodeOp::ReadBytes { field_path } => {
                    let value = Value::Bytes(self.read_length_prefixed_bytes(cursor)?);
                    insert(&mut root, &mut scope_stack, field_path, value);
                }
                DecodeOp::ReadTime { field_path } => {
                    let value = self.read_time(cursor)?;
                    insert(&mut root, &mut scope_stack, field_path, value);
                }
                DecodeOp::ReadDuration { field_path } => {
                    let value = self.read_duration(cursor)?;
                    insert(&mut root, &mut scope_stack, field_path, value);
                }
                DecodeOp::ReadArray { field_path, element_type, count } => {
                    let value = self.read_array(cursor, element_type, *count)?;
                    insert(&mut root, &mut scope_stack, field_path, value);
                }
                DecodeOp::DecodeNested { field_path, .. } => {
                    cursor.push_origin();
                    scope_stack.push((field_path.clone(), DecodedMessage::new()));
                }
                DecodeOp::EndScope => {
                    cursor.pop_origin();
                    let (field_path, nested) = scope_stack
                        .pop()
                        .ok_or_else(|| EngineError::invariant_violation("unbalanced decode scope"))?;
                    insert(&mut root, &mut scope_stack, &field_path, Value::Struct(nested));
                }
            }
        }

        if !scope_stack.is_empty() {
            return Err(EngineError::invariant_violation("decode plan left scopes open"));
        }
        Ok(root)
    }

    fn read_primitive(&self, cursor: &mut CdrCursor, type_name: CoreType) -> Result<Value> {
        Ok(match type_name {
            CoreType::Bool => Value::Bool(cursor.read_u8()? != 0),
            CoreType::Int8 => Value::Int8(cursor.read_i8()?),
            CoreType::Int16 => Value::Int16(cursor.read_i16()?),
            CoreType::Int32 => Value::Int32(cursor.read_i32()?),
            CoreType::Int64 => Value::Int64(cursor.read_i64()?),
            CoreType::UInt8 | CoreType::Byte => Value::UInt8(cursor.read_u8()?),
            CoreType::UInt16 => Value::UInt16(cursor.read_u16()?),
            CoreType::UInt32 => Value::UInt32(cursor.read_u32()?),
            CoreType::UInt64 => Value::UInt64(cursor.read_u64()?),
            CoreType::Float32 => Value::Float32(cursor.read_f32()?),
            CoreType::Float64 => Value::Float64(cursor.read_f64()?),
            CoreType::String => Value::String(self.read_string(cursor)?),
        })
    }

    /// Read without the cursor's per-call alignment check — callers use
    /// this only after aligning once ahead of a tight, fixed-stride
    /// element loop.
    fn read_primitive_unaligned(&self, cursor: &mut CdrCursor, type_name: CoreType) -> Result<Value> {
        Ok(match type_name {
            CoreType::Float32 => Value::Float32(cursor.read_f32_unaligned()?),
            CoreType::Float64 => Value::Float64(cursor.read_f64_unaligned()?),
            other => self.read_primitive(cursor, other)?,
        })
    }

    fn read_string(&self, cursor: &mut CdrCursor) -> Result<String> {
        let len = cursor.read_u32()? as usize;
        if len > MAX_ARRAY_LENGTH {
            return Err(EngineError::length_exceeded(len, cursor.position(), 0));
        }
        if len <= 1 {
            cursor.skip(len)?;
            return Ok(String::new());
        }
        let bytes = cursor.read_bytes(len - 1)?;
        let s = String::from_utf8(bytes.to_vec())
            .map_err(|e| EngineError::parse("cdr string", e.to_string()))?;
        cursor.skip(1)?; // null terminator
        Ok(s)
    }

    fn read_length_prefixed_bytes(&self, cursor: &mut CdrCursor) -> Result<Vec<u8>> {
        let len = cursor.read_u32()? as usize;
        if len > MAX_ARRAY_LENGTH {
            return Err(EngineError::length_exceeded(len, cursor.position(), 0));
        }
        Ok(cursor.read_bytes(len)?.to_vec())
    }

    fn read_time(&self, cursor: &mut CdrCursor) -> Result<Value> {
        let sec = cursor.read_i32()? as i64;
        let nsec = cursor.read_u32()? as i64;
        Ok(Value::Timestamp(sec.saturating_mul(1_000_000_000).saturating_add(nsec)))
    }

    fn read_duration(&self, cursor: &mut CdrCursor) -> Result<Value> {
        let sec = cursor.read_i32()? as i64;
        let nsec = cursor.read_u32()? as i64;
        let nanos = if sec < 0 {
            sec.saturating_mul(1_000_000_000).saturating_sub(nsec)
        } else {
            sec.saturating_mul(1_000_000_000).saturating_add(nsec)
        };
        Ok(Value::Duration(nanos))
    }

    fn read_array(
        &self,
        cursor: &mut CdrCursor,
        element_type: &ElementType,
        count: Option<usize>,
    ) -> Result<Value> {
        let len = match count {
            Some(n) => n,
            None => {
                let len = cursor.read_u32()? as usize;
                if len > MAX_ARRAY_LENGTH {
                    return Err(EngineError::length_exceeded(len, cursor.position(), 0));
                }
                len
            }
        };

        match element_type {
            ElementType::Primitive(p) => {
                // Fixed-width scalars read contiguously: align once for the
                // whole run instead of re-checking alignment (a no-op after
                // the first element anyway) on every iteration.
                if let Some(size) = p.size() {
                    if size > 1 && len > 0 {
                        cursor.align(size)?;
                    }
                }
                let mut elements = Vec::with_capacity(len);
                for _ in 0..len {
                    elements.push(self.read_primitive_unaligned(cursor, *p)?);
                }
                if matches!(p, CoreType::UInt8 | CoreType::Byte) {
                    let bytes = elements
                        .into_iter()
                        .map(|v| match v {
                            Value::UInt8(b) => b,
                            _ => 0,
                        })
                        .collect();
                    Ok(Value::Bytes(bytes))
                } else {
                    Ok(Value::Array(elements))
                }
            }
            ElementType::String => {
                let mut elements = Vec::with_capacity(len);
                for _ in 0..len {
                    elements.push(Value::String(self.read_string(cursor)?));
                }
                Ok(Value::Array(elements))
            }
            ElementType::Bytes => {
                let mut elements = Vec::with_capacity(len);
                for _ in 0..len {
                    elements.push(Value::Bytes(self.read_length_prefixed_bytes(cursor)?));
                }
                Ok(Value::Array(elements))
            }
            ElementType::Nested { type_name, alignment } => {
                let nested_plan = self.plan_for(type_name)?;
                let mut elements = Vec::with_capacity(len);
                for _ in 0..len {
                    cursor.align(*alignment as usize)?;
                    cursor.push_origin();
                    let decoded = self.execute_plan(&nested_plan, cursor);
                    cursor.pop_origin();
                    elements.push(Value::Struct(decoded?));
                }
                Ok(Value::Array(elements))
            }
        }
    }
}

fn insert(
    root: &mut DecodedMessage,
    scope_stack: &mut [(String, DecodedMessage)],
    field_path: &str,
    value: Value,
) {
    if let Some((_, map)) = scope_stack.last_mut() {
        map.insert(field_path.to_string(), value);
    } else {
        root.insert(field_path.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ast::{Field, MessageSchema, MessageType};

    fn cdr_header(little_endian: bool) -> Vec<u8> {
        vec![0x00, if little_endian { 1 } else { 0 }, 0x00, 0x00]
    }

    #[test]
    fn decodes_flat_primitive_struct() {
        let mut schema = MessageSchema::new("test/Flat".to_string());
        let mut ty = MessageType::new("test/Flat".to_string());
        ty.add_field(Field { name: "a".into(), type_name: FieldType::Primitive(PrimitiveType::Int32) });
        ty.add_field(Field { name: "b".into(), type_name: FieldType::Primitive(PrimitiveType::Float64) });
        schema.add_type(ty);

        let mut data = cdr_header(true);
        data.extend_from_slice(&7i32.to_le_bytes());
        data.extend_from_slice(&[0, 0, 0, 0]); // padding to align f64
        data.extend_from_slice(&1.5f64.to_le_bytes());

        let decoder = CdrDecoder::new(schema, "test/Flat");
        let decoded = decoder.decode(&data).unwrap();
        assert_eq!(decoded.get("a"), Some(&Value::Int32(7)));
        assert_eq!(decoded.get("b"), Some(&Value::Float64(1.5)));
    }

    #[test]
    fn decodes_nested_struct_field() {
        let mut schema = MessageSchema::new("test/Outer".to_string());
        let mut inner = MessageType::new("test/Inner".to_string());
        inner.add_field(Field { name: "x".into(), type_name: FieldType::Primitive(PrimitiveType::Int32) });
        schema.add_type(inner);

        let mut outer = MessageType::new("test/Outer".to_string());
        outer.add_field(Field { name: "inner".into(), type_name: FieldType::Nested("test/Inner".into()) });
        schema.add_type(outer);

        let mut data = cdr_header(true);
        data.extend_from_slice(&42i32.to_le_bytes());

        let decoder = CdrDecoder::new(schema, "test/Outer");
        let decoded = decoder.decode(&data).unwrap();
        match decoded.get("inner") {
            Some(Value::Struct(inner)) => assert_eq!(inner.get("x"), Some(&Value::Int32(42))),
            other => panic!("expected nested struct, got {other:?}"),
        }
    }

    #[test]
    fn decodes_dynamic_string_field() {
        let mut schema = MessageSchema::new("test/Named".to_string());
        let mut ty = MessageType::new("test/Named".to_string());
        ty.add_field(Field { name: "name".into(), type_name: FieldType::Primitive(PrimitiveType::String) });
        schema.add_type(ty);

        let mut data = cdr_header(true);
        data.extend_from_slice(&4u32.to_le_bytes()); // length incl. null terminator
        data.extend_from_slice(b"abc\0");

        let decoder = CdrDecoder::new(schema, "test/Named");
        let decoded = decoder.decode(&data).unwrap();
        assert_eq!(decoded.get("name"), Some(&Value::String("abc".to_string())));
    }

    #[test]
    fn decodes_dynamic_byte_array_as_bytes() {
        let mut schema = MessageSchema::new("test/Blob".to_string());
        let mut ty = MessageType::new("test/Blob".to_string());
        ty.add_field(Field {
            name: "data".into(),
            type_name: FieldType::Array { base_type: Box::new(FieldType::Primitive(PrimitiveType::UInt8)), size: None },
        });
        schema.add_type(ty);

        let mut data = cdr_header(true);
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&[1, 2, 3]);

        let decoder = CdrDecoder::new(schema, "test/Blob");
        let decoded = decoder.decode(&data).unwrap();
        assert_eq!(decoded.get("data"), Some(&Value::Bytes(vec![1, 2, 3])));
    }

    #[test]
    fn decodes_fixed_primitive_array() {
        let mut schema = MessageSchema::new("test/Fixed".to_string());
        let mut ty = MessageType::new("test/Fixed".to_string());
        ty.add_field(Field {
            name: "values".into(),
            type_name: FieldType::Array {
                base_type: Box::new(FieldType::Primitive(PrimitiveType::Int32)),
                size: Some(3),
            },
        });
        schema.add_type(ty);

        let mut data = cdr_header(true);
        for v in [1i32, 2, 3] {
            data.extend_from_slice(&v.to_le_bytes());
        }

        let decoder = CdrDecoder::new(schema, "test/Fixed");
        let decoded = decoder.decode(&data).unwrap();
        assert_eq!(
            decoded.get("values"),
            Some(&Value::Array(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]))
        );
    }

    #[test]
    fn decodes_ros_time_field() {
        let mut schema = MessageSchema::new("test/Stamped".to_string());
        let mut ty = MessageType::new("test/Stamped".to_string());
        ty.add_field(Field { name: "stamp".into(), type_name: FieldType::Primitive(PrimitiveType::Time) });
        schema.add_type(ty);

        let mut data = cdr_header(true);
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(&500_000_000u32.to_le_bytes());

        let decoder = CdrDecoder::new(schema, "test/Stamped");
        let decoded = decoder.decode(&data).unwrap();
        assert_eq!(decoded.get("stamp"), Some(&Value::Timestamp(1_500_000_000)));
    }

    #[test]
    fn decodes_negative_duration_with_saturating_sub() {
        let mut schema = MessageSchema::new("test/Delta".to_string());
        let mut ty = MessageType::new("test/Delta".to_string());
        ty.add_field(Field { name: "d".into(), type_name: FieldType::Primitive(PrimitiveType::Duration) });
        schema.add_type(ty);

        let mut data = cdr_header(true);
        data.extend_from_slice(&(-2i32).to_le_bytes());
        data.extend_from_slice(&500_000_000u32.to_le_bytes());

        let decoder = CdrDecoder::new(schema, "test/Delta");
        let decoded = decoder.decode(&data).unwrap();
        assert_eq!(decoded.get("d"), Some(&Value::Duration(-2_500_000_000)));
    }

    #[test]
    fn array_of_nested_structs_decodes_each_element() {
        let mut schema = MessageSchema::new("test/Cloud".to_string());
        let mut point = MessageType::new("test/Point".to_string());
        point.add_field(Field { name: "x".into(), type_name: FieldType::Primitive(PrimitiveType::Float32) });
        schema.add_type(point);

        let mut cloud = MessageType::new("test/Cloud".to_string());
        cloud.add_field(Field {
            name: "points".into(),
            type_name: FieldType::Array {
                base_type: Box::new(FieldType::Nested("test/Point".into())),
                size: Some(2),
            },
        });
        schema.add_type(cloud);

        let mut data = cdr_header(true);
        data.extend_from_slice(&1.0f32.to_le_bytes());
        data.extend_from_slice(&2.0f32.to_le_bytes());

        let decoder = CdrDecoder::new(schema, "test/Cloud");
        let decoded = decoder.decode(&data).unwrap();
        match decoded.get("points") {
            Some(Value::Array(points)) => {
                assert_eq!(points.len(), 2);
                assert!(matches!(points[0], Value::Struct(ref m) if m.get("x") == Some(&Value::Float32(1.0))));
            }
            other => panic!("expected array of structs, got {other:?}"),
        }
    }

    #[test]
    fn missing_type_yields_type_not_found() {
        let schema = MessageSchema::new("test/Empty".to_string());
        let decoder = CdrDecoder::new(schema, "test/Missing");
        assert!(decoder.decode(&cdr_header(true)).is_err());
    }

    #[test]
    fn headerless_decode_matches_explicit_endianness() {
        let mut schema = MessageSchema::new("test/Flat".to_string());
        let mut ty = MessageType::new("test/Flat".to_string());
        ty.add_field(Field { name: "a".into(), type_name: FieldType::Primitive(PrimitiveType::UInt32) });
        schema.add_type(ty);

        let data = 99u32.to_le_bytes();
        let decoder = CdrDecoder::new(schema, "test/Flat");
        let decoded = decoder.decode_headerless(&data, true).unwrap();
        assert_eq!(decoded.get("a"), Some(&Value::UInt32(99)));
    }
}
