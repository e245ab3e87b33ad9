// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Decoder for the plain ROS1 wire format.
//!
//! ROS1 serialization has none of CDR's alignment padding: every field is
//! packed back-to-back. Strings and dynamic arrays are a little-endian
//! `uint32` length prefix followed by the raw elements (no null terminator
//! on strings, unlike CDR). This is a from-scratch implementation — bag
//! messages never go through [`crate::encoding::cdr`].

use crate::core::error::{EngineError, Result};
use crate::core::value::{DecodedMessage, Value};
use crate::schema::ast::{Field, FieldType, MessageSchema, PrimitiveType};

const MAX_ARRAY_LENGTH: usize = 10_000_000;

/// A cursor over one ROS1-serialized message body. No alignment, no
/// encapsulation header — just a flat byte offset.
struct Ros1Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Ros1Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        if self.offset + N > self.data.len() {
            return Err(EngineError::buffer_too_short(N, self.remaining(), self.offset as u64));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.offset..self.offset + N]);
        self.offset += N;
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_fixed::<1>()?[0])
    }

    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.read_fixed::<2>().map(u16::from_le_bytes)
    }

    fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.read_fixed::<4>().map(u32::from_le_bytes)
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    fn read_u64(&mut self) -> Result<u64> {
        self.read_fixed::<8>().map(u64::from_le_bytes)
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    fn read_f32(&mut self) -> Result<f32> {
        self.read_fixed::<4>().map(f32::from_le_bytes)
    }

    fn read_f64(&mut self) -> Result<f64> {
        self.read_fixed::<8>().map(f64::from_le_bytes)
    }

    fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if count > self.remaining() {
            return Err(EngineError::buffer_too_short(count, self.remaining(), self.offset as u64));
        }
        let start = self.offset;
        self.offset += count;
        Ok(&self.data[start..self.offset])
    }

    fn read_length_prefix(&mut self) -> Result<usize> {
        let len = self.read_u32()? as usize;
        if len > MAX_ARRAY_LENGTH {
            return Err(EngineError::length_exceeded(len, self.offset, self.data.len()));
        }
        Ok(len)
    }
}

/// Decodes ROS1-serialized messages of one schema's types.
///
/// `.msg` definitions have no recursive-plan payoff the way CDR's alignment
/// rules do — there are no padding bytes to compute — so this decoder walks
/// the schema directly on every call instead of compiling a cached plan.
pub struct Ros1Decoder {
    schema: MessageSchema,
    root_type: String,
}

impl Ros1Decoder {
    pub fn new(schema: MessageSchema, root_type: impl Into<String>) -> Self {
        Self { schema, root_type: root_type.into() }
    }

    pub fn root_type(&self) -> &str {
        &self.root_type
    }

    pub fn decode(&self, data: &[u8]) -> Result<DecodedMessage> {
        let mut cursor = Ros1Cursor::new(data);
        self.decode_type(&self.root_type, &mut cursor)
    }

    fn decode_type(&self, type_name: &str, cursor: &mut Ros1Cursor) -> Result<DecodedMessage> {
        let msg_type = self
            .schema
            .get_type_variants(type_name)
            .ok_or_else(|| EngineError::type_not_found(type_name))?
            .clone();

        let mut message = DecodedMessage::new();
        for field in &msg_type.fields {
            let value = self.decode_field(field, cursor)?;
            message.insert(field.name.clone(), value);
        }
        Ok(message)
    }

    fn decode_field(&self, field: &Field, cursor: &mut Ros1Cursor) -> Result<Value> {
        match &field.type_name {
            FieldType::Primitive(p) => self.decode_primitive(*p, cursor),
            FieldType::Nested(type_name) => {
                Ok(Value::Struct(self.decode_type(type_name, cursor)?))
            }
            FieldType::Array { base_type, size } => self.decode_array(base_type, *size, cursor),
        }
    }

    fn decode_primitive(&self, p: PrimitiveType, cursor: &mut Ros1Cursor) -> Result<Value> {
        Ok(match p {
            PrimitiveType::Bool => Value::Bool(cursor.read_u8()? != 0),
            PrimitiveType::Int8 => Value::Int8(cursor.read_i8()?),
            PrimitiveType::Int16 => Value::Int16(cursor.read_i16()?),
            PrimitiveType::Int32 => Value::Int32(cursor.read_i32()?),
            PrimitiveType::Int64 => Value::Int64(cursor.read_i64()?),
            PrimitiveType::UInt8 | PrimitiveType::Byte | PrimitiveType::Char => Value::UInt8(cursor.read_u8()?),
            PrimitiveType::UInt16 => Value::UInt16(cursor.read_u16()?),
            PrimitiveType::UInt32 => Value::UInt32(cursor.read_u32()?),
            PrimitiveType::UInt64 => Value::UInt64(cursor.read_u64()?),
            PrimitiveType::Float32 => Value::Float32(cursor.read_f32()?),
            PrimitiveType::Float64 => Value::Float64(cursor.read_f64()?),
            PrimitiveType::String | PrimitiveType::WString => Value::String(self.decode_string(cursor)?),
            PrimitiveType::Time => self.decode_time(cursor)?,
            PrimitiveType::Duration => self.decode_duration(cursor)?,
        })
    }

    fn decode_string(&self, cursor: &mut Ros1Cursor) -> Result<String> {
        let len = cursor.read_length_prefix()?;
        let bytes = cursor.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| EngineError::parse("ros1 string", e.to_string()))
    }

    fn decode_time(&self, cursor: &mut Ros1Cursor) -> Result<Value> {
        let sec = cursor.read_i32()? as i64;
        let nsec = cursor.read_u32()? as i64;
        Ok(Value::Timestamp(sec.saturating_mul(1_000_000_000).saturating_add(nsec)))
    }

    fn decode_duration(&self, cursor: &mut Ros1Cursor) -> Result<Value> {
        let sec = cursor.read_i32()? as i64;
        let nsec = cursor.read_u32()? as i64;
        let nanos = if sec < 0 {
            sec.saturating_mul(1_000_000_000).saturating_sub(nsec)
        } else {
            sec.saturating_mul(1_000_000_000).saturating_add(nsec)
        };
        Ok(Value::Duration(nanos))
    }

    fn decode_array(
        &self,
        base_type: &FieldType,
        size: Option<usize>,
        cursor: &mut Ros1Cursor,
    ) -> Result<Value> {
        let len = match size {
            Some(n) => n,
            None => cursor.read_length_prefix()?,
        };

        if let FieldType::Primitive(PrimitiveType::UInt8 | PrimitiveType::Byte) = base_type {
            return Ok(Value::Bytes(cursor.read_bytes(len)?.to_vec()));
        }

        let mut elements = Vec::with_capacity(len);
        for _ in 0..len {
            let value = match base_type {
                FieldType::Primitive(p) => self.decode_primitive(*p, cursor)?,
                FieldType::Nested(type_name) => Value::Struct(self.decode_type(type_name, cursor)?),
                FieldType::Array { .. } => {
                    return Err(EngineError::invariant_violation("arrays of arrays are not supported"))
                }
            };
            elements.push(value);
        }
        Ok(Value::Array(elements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ast::MessageType;

    #[test]
    fn decodes_flat_struct_with_no_padding() {
        let mut schema = MessageSchema::new("test/Flat".to_string());
        let mut ty = MessageType::new("test/Flat".to_string());
        ty.add_field(Field { name: "a".into(), type_name: FieldType::Primitive(PrimitiveType::UInt8) });
        ty.add_field(Field { name: "b".into(), type_name: FieldType::Primitive(PrimitiveType::Int32) });
        schema.add_type(ty);

        let mut data = vec![9u8];
        data.extend_from_slice(&77i32.to_le_bytes());
        // No alignment padding between the u8 and the i32, unlike CDR.
        assert_eq!(data.len(), 5);

        let decoder = Ros1Decoder::new(schema, "test/Flat");
        let decoded = decoder.decode(&data).unwrap();
        assert_eq!(decoded.get("a"), Some(&Value::UInt8(9)));
        assert_eq!(decoded.get("b"), Some(&Value::Int32(77)));
    }

    #[test]
    fn decodes_string_without_null_terminator() {
        let mut schema = MessageSchema::new("test/Named".to_string());
        let mut ty = MessageType::new("test/Named".to_string());
        ty.add_field(Field { name: "name".into(), type_name: FieldType::Primitive(PrimitiveType::String) });
        schema.add_type(ty);

        let mut data = 3u32.to_le_bytes().to_vec();
        data.extend_from_slice(b"abc");

        let decoder = Ros1Decoder::new(schema, "test/Named");
        let decoded = decoder.decode(&data).unwrap();
        assert_eq!(decoded.get("name"), Some(&Value::String("abc".to_string())));
    }

    #[test]
    fn decodes_nested_header_without_seq_for_ros2_but_with_it_for_ros1() {
        let text = "Header header\nint32 value\n";
        let schema = crate::schema::msg_parser::parse_with_version(
            "test/WithHeader",
            text,
            crate::schema::msg_parser::RosVersion::Ros1,
        )
        .unwrap();
        // ROS1 strips the leading top-level `header` field per the message
        // definition convention; only `value` should remain at the root.
        let root = schema.get_type_variants("test/WithHeader").unwrap();
        assert_eq!(root.fields.len(), 1);
        assert_eq!(root.fields[0].name, "value");
    }

    #[test]
    fn dynamic_byte_array_decodes_as_bytes() {
        let mut schema = MessageSchema::new("test/Blob".to_string());
        let mut ty = MessageType::new("test/Blob".to_string());
        ty.add_field(Field {
            name: "data".into(),
            type_name: FieldType::Array { base_type: Box::new(FieldType::Primitive(PrimitiveType::UInt8)), size: None },
        });
        schema.add_type(ty);

        let mut data = 2u32.to_le_bytes().to_vec();
        data.extend_from_slice(&[1, 2]);

        let decoder = Ros1Decoder::new(schema, "test/Blob");
        let decoded = decoder.decode(&data).unwrap();
        assert_eq!(decoded.get("data"), Some(&Value::Bytes(vec![1, 2])));
    }

    #[test]
    fn negative_duration_uses_saturating_sub() {
        let mut schema = MessageSchema::new("test/Delta".to_string());
        let mut ty = MessageType::new("test/Delta".to_string());
        ty.add_field(Field { name: "d".into(), type_name: FieldType::Primitive(PrimitiveType::Duration) });
        schema.add_type(ty);

        let mut data = (-1i32).to_le_bytes().to_vec();
        data.extend_from_slice(&250_000_000u32.to_le_bytes());

        let decoder = Ros1Decoder::new(schema, "test/Delta");
        let decoded = decoder.decode(&data).unwrap();
        assert_eq!(decoded.get("d"), Some(&Value::Duration(-1_250_000_000)));
    }

    #[test]
    fn missing_type_yields_type_not_found() {
        let schema = MessageSchema::new("test/Empty".to_string());
        let decoder = Ros1Decoder::new(schema, "test/Missing");
        assert!(decoder.decode(&[]).is_err());
    }
}
