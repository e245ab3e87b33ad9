// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! AST types for parsed ROS message schemas (`.msg`, ROS2 IDL, OMG IDL all
//! reduce to this same shape before decode-plan generation).

use std::collections::HashMap;

/// A parsed message schema: a root type plus every nested type it (or its
/// dependencies) reference.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageSchema {
    /// Root type name, e.g. `std_msgs/msg/Header` or just `Header`.
    pub name: String,
    pub package: Option<String>,
    pub types: HashMap<String, MessageType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageType {
    pub name: String,
    pub fields: Vec<Field>,
    pub max_alignment: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub type_name: FieldType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Primitive(PrimitiveType),
    Array { base_type: Box<FieldType>, size: Option<usize> },
    Nested(String),
}

/// ROS message primitive types, a superset of `core::value::PrimitiveType`
/// (adds `WString`, `Time`, `Duration`, which have no core wire-value
/// counterpart but still need alignment/size rules during decode-plan
/// generation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    WString,
    Byte,
    Char,
    /// ROS timestamp: sec:int32, nsec:uint32.
    Time,
    /// ROS duration: sec:int32, nsec:uint32.
    Duration,
}

impl PrimitiveType {
    pub fn alignment(self) -> u64 {
        match self {
            PrimitiveType::Bool | PrimitiveType::Int8 | PrimitiveType::UInt8 | PrimitiveType::Byte | PrimitiveType::Char => 1,
            PrimitiveType::Int16 | PrimitiveType::UInt16 => 2,
            PrimitiveType::Int32 | PrimitiveType::UInt32 | PrimitiveType::Float32 => 4,
            PrimitiveType::Int64 | PrimitiveType::UInt64 | PrimitiveType::Float64 => 8,
            PrimitiveType::String | PrimitiveType::WString => 4,
            PrimitiveType::Time | PrimitiveType::Duration => 4,
        }
    }

    pub fn size(self) -> Option<usize> {
        match self {
            PrimitiveType::Bool => Some(1),
            PrimitiveType::Int8 | PrimitiveType::UInt8 | PrimitiveType::Byte | PrimitiveType::Char => Some(1),
            PrimitiveType::Int16 | PrimitiveType::UInt16 => Some(2),
            PrimitiveType::Int32 | PrimitiveType::UInt32 | PrimitiveType::Float32 => Some(4),
            PrimitiveType::Int64 | PrimitiveType::UInt64 | PrimitiveType::Float64 => Some(8),
            PrimitiveType::String | PrimitiveType::WString => None,
            PrimitiveType::Time | PrimitiveType::Duration => Some(8),
        }
    }

    pub fn try_from_str(s: &str) -> Option<Self> {
        match s {
            "bool" | "boolean" => Some(PrimitiveType::Bool),
            "int8" => Some(PrimitiveType::Int8),
            "int16" => Some(PrimitiveType::Int16),
            "int32" => Some(PrimitiveType::Int32),
            "int64" => Some(PrimitiveType::Int64),
            "uint8" => Some(PrimitiveType::UInt8),
            "uint16" => Some(PrimitiveType::UInt16),
            "uint32" => Some(PrimitiveType::UInt32),
            "uint64" => Some(PrimitiveType::UInt64),
            "float32" | "float" => Some(PrimitiveType::Float32),
            "float64" | "double" => Some(PrimitiveType::Float64),
            "string" => Some(PrimitiveType::String),
            "wstring" => Some(PrimitiveType::WString),
            "byte" => Some(PrimitiveType::Byte),
            "char" => Some(PrimitiveType::Char),
            "time" => Some(PrimitiveType::Time),
            "duration" => Some(PrimitiveType::Duration),
            _ => None,
        }
    }

    /// Convert to the wire-value primitive type used by the decode plan
    /// and `Value`. `Time`/`Duration` map to the closest fixed-width
    /// integer core type; actual time/duration decoding uses the
    /// dedicated `ReadTime`/`ReadDuration` decode ops instead of this
    /// conversion, so the fallback here is never observed on the decode
    /// path for those two variants.
    pub fn to_core(self) -> crate::core::value::PrimitiveType {
        use crate::core::value::PrimitiveType as Core;
        match self {
            PrimitiveType::Bool => Core::Bool,
            PrimitiveType::Int8 => Core::Int8,
            PrimitiveType::Int16 => Core::Int16,
            PrimitiveType::Int32 => Core::Int32,
            PrimitiveType::Int64 => Core::Int64,
            PrimitiveType::UInt8 => Core::UInt8,
            PrimitiveType::UInt16 => Core::UInt16,
            PrimitiveType::UInt32 => Core::UInt32,
            PrimitiveType::UInt64 => Core::UInt64,
            PrimitiveType::Float32 => Core::Float32,
            PrimitiveType::Float64 => Core::Float64,
            PrimitiveType::String | PrimitiveType::WString => Core::String,
            PrimitiveType::Byte | PrimitiveType::Char => Core::Byte,
            PrimitiveType::Time | PrimitiveType::Duration => Core::Int64,
        }
    }
}

impl FieldType {
    pub fn alignment(&self) -> u64 {
        match self {
            FieldType::Primitive(p) => p.alignment(),
            FieldType::Array { base_type, .. } => base_type.alignment(),
            FieldType::Nested(_) => 4,
        }
    }

    /// Whether array elements of this type need per-element alignment
    /// (as opposed to the contiguous fast path for fixed-width scalars).
    pub fn is_complex(&self) -> bool {
        !matches!(
            self,
            FieldType::Primitive(
                PrimitiveType::Bool
                    | PrimitiveType::Int8
                    | PrimitiveType::UInt8
                    | PrimitiveType::Byte
                    | PrimitiveType::Char
                    | PrimitiveType::Int16
                    | PrimitiveType::UInt16
                    | PrimitiveType::Int32
                    | PrimitiveType::UInt32
                    | PrimitiveType::Float32
                    | PrimitiveType::Int64
                    | PrimitiveType::UInt64
                    | PrimitiveType::Float64
            )
        )
    }
}

impl MessageSchema {
    pub fn new(name: String) -> Self {
        Self { package: extract_package(&name), name, types: HashMap::new() }
    }

    pub fn add_type(&mut self, msg_type: MessageType) {
        self.types.insert(msg_type.name.clone(), msg_type);
    }

    pub fn get_type(&self, name: &str) -> Option<&MessageType> {
        self.types.get(name)
    }

    /// Look up a type, falling back through the naming variants schema
    /// text actually uses in the wild: `::`-qualified IDL names, the
    /// `/msg/` infix ROS2 sometimes inserts or omits, and bare short names.
    pub fn get_type_variants(&self, name: &str) -> Option<&MessageType> {
        if let Some(t) = self.types.get(name) {
            return Some(t);
        }

        let normalized_name = name.replace("::", "/");
        if let Some(t) = self.types.get(&normalized_name) {
            return Some(t);
        }

        if !normalized_name.contains("/msg/") {
            let with_msg = normalized_name.replace('/', "/msg/");
            if let Some(t) = self.types.get(&with_msg) {
                return Some(t);
            }
        }

        if normalized_name.contains("/msg/") {
            let without_msg = normalized_name.replace("/msg/", "/");
            if let Some(t) = self.types.get(&without_msg) {
                return Some(t);
            }
        }

        if !normalized_name.contains('/') {
            for (full_name, msg_type) in &self.types {
                if full_name.ends_with(&format!("/{normalized_name}"))
                    || full_name.ends_with(&format!("/msg/{normalized_name}"))
                    || full_name.as_str() == normalized_name
                {
                    return Some(msg_type);
                }
            }
        }

        None
    }
}

impl MessageType {
    pub fn new(name: String) -> Self {
        Self { name, fields: Vec::new(), max_alignment: 1 }
    }

    pub fn add_field(&mut self, field: Field) {
        let field_alignment = field.type_name.alignment();
        self.max_alignment = self.max_alignment.max(field_alignment);
        self.fields.push(field);
    }
}

fn extract_package(name: &str) -> Option<String> {
    if name.contains('/') {
        let parts: Vec<&str> = name.split('/').collect();
        if parts.len() >= 2 {
            Some(parts[0].to_string())
        } else {
            None
        }
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_type_from_str() {
        assert_eq!(PrimitiveType::try_from_str("int32"), Some(PrimitiveType::Int32));
        assert_eq!(PrimitiveType::try_from_str("float64"), Some(PrimitiveType::Float64));
        assert_eq!(PrimitiveType::try_from_str("unknown"), None);
    }

    #[test]
    fn primitive_type_alignment() {
        assert_eq!(PrimitiveType::Bool.alignment(), 1);
        assert_eq!(PrimitiveType::Int16.alignment(), 2);
        assert_eq!(PrimitiveType::Int32.alignment(), 4);
        assert_eq!(PrimitiveType::Int64.alignment(), 8);
        assert_eq!(PrimitiveType::String.alignment(), 4);
    }

    #[test]
    fn field_type_is_complex() {
        assert!(!FieldType::Primitive(PrimitiveType::Int32).is_complex());
        assert!(FieldType::Primitive(PrimitiveType::String).is_complex());
        assert!(FieldType::Array { base_type: Box::new(FieldType::Primitive(PrimitiveType::Int32)), size: None }
            .is_complex());
    }

    #[test]
    fn get_type_variants_resolves_msg_infix() {
        let mut schema = MessageSchema::new("std_msgs/Header".to_string());
        schema.add_type(MessageType::new("std_msgs/msg/Header".to_string()));
        assert!(schema.get_type_variants("std_msgs/Header").is_some());
        assert!(schema.get_type_variants("Header").is_some());
    }
}
