// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Decoded value type system.
//!
//! Provides a unified value representation for messages decoded from CDR
//! (ROS2) or the plain ROS1 wire format. All variants are serde-serializable
//! so a decoded message can be emitted as JSON by the CLI or by a caller
//! on the far side of the worker boundary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A decoded message as a field name -> value mapping.
pub type DecodedMessage = HashMap<String, Value>;

/// Unified value type for decoded robotics data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),

    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),

    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),

    Float32(f32),
    Float64(f64),

    String(String),

    /// Binary data (image frames, point clouds, opaque payloads).
    Bytes(Vec<u8>),

    /// Nanoseconds since Unix epoch.
    Timestamp(i64),

    /// Nanoseconds, can be negative.
    Duration(i64),

    Array(Vec<Value>),

    Struct(DecodedMessage),

    /// Used for fields absent from a schema variant.
    Null,
}

impl Value {
    /// True for any numeric variant (integer or float).
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Int8(_)
                | Value::Int16(_)
                | Value::Int32(_)
                | Value::Int64(_)
                | Value::UInt8(_)
                | Value::UInt16(_)
                | Value::UInt32(_)
                | Value::UInt64(_)
                | Value::Float32(_)
                | Value::Float64(_)
        )
    }

    /// True for container variants (array or struct).
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Struct(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to convert this value to f64 (for numeric values only).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int8(v) => Some(*v as f64),
            Value::Int16(v) => Some(*v as f64),
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::UInt8(v) => Some(*v as f64),
            Value::UInt16(v) => Some(*v as f64),
            Value::UInt32(v) => Some(*v as f64),
            Value::UInt64(v) => Some(*v as f64),
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }
}

// =============================================================================
// Primitive type enum
// =============================================================================

/// Primitive type identifiers shared by the schema AST and the decode plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
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
    /// Alias for UInt8 in message definitions.
    Byte,
}

impl PrimitiveType {
    /// Alignment requirement in bytes (CDR alignment rules).
    pub const fn alignment(self) -> u64 {
        match self {
            PrimitiveType::Bool | PrimitiveType::Int8 | PrimitiveType::UInt8 | PrimitiveType::Byte => 1,
            PrimitiveType::Int16 | PrimitiveType::UInt16 => 2,
            PrimitiveType::Int32 | PrimitiveType::UInt32 | PrimitiveType::Float32 => 4,
            PrimitiveType::Int64 | PrimitiveType::UInt64 | PrimitiveType::Float64 => 8,
            PrimitiveType::String => 4,
        }
    }

    /// Fixed size in bytes, or `None` for variable-length types.
    pub const fn size(self) -> Option<usize> {
        match self {
            PrimitiveType::Bool => Some(1),
            PrimitiveType::Int8 | PrimitiveType::UInt8 | PrimitiveType::Byte => Some(1),
            PrimitiveType::Int16 | PrimitiveType::UInt16 => Some(2),
            PrimitiveType::Int32 | PrimitiveType::UInt32 | PrimitiveType::Float32 => Some(4),
            PrimitiveType::Int64 | PrimitiveType::UInt64 | PrimitiveType::Float64 => Some(8),
            PrimitiveType::String => None,
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
            "string" | "wstring" => Some(PrimitiveType::String),
            "byte" | "char" => Some(PrimitiveType::Byte),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrimitiveType::Bool => write!(f, "bool"),
            PrimitiveType::Int8 => write!(f, "int8"),
            PrimitiveType::Int16 => write!(f, "int16"),
            PrimitiveType::Int32 => write!(f, "int32"),
            PrimitiveType::Int64 => write!(f, "int64"),
            PrimitiveType::UInt8 => write!(f, "uint8"),
            PrimitiveType::UInt16 => write!(f, "uint16"),
            PrimitiveType::UInt32 => write!(f, "uint32"),
            PrimitiveType::UInt64 => write!(f, "uint64"),
            PrimitiveType::Float32 => write!(f, "float32"),
            PrimitiveType::Float64 => write!(f, "float64"),
            PrimitiveType::String => write!(f, "string"),
            PrimitiveType::Byte => write!(f, "byte"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_predicate_covers_ints_and_floats() {
        assert!(Value::Int32(1).is_numeric());
        assert!(Value::Float64(1.0).is_numeric());
        assert!(!Value::String("x".into()).is_numeric());
    }

    #[test]
    fn container_predicate() {
        assert!(Value::Array(vec![]).is_container());
        assert!(Value::Struct(DecodedMessage::new()).is_container());
        assert!(!Value::Bool(true).is_container());
    }

    #[test]
    fn primitive_round_trips_through_str() {
        assert_eq!(PrimitiveType::try_from_str("int32"), Some(PrimitiveType::Int32));
        assert_eq!(PrimitiveType::try_from_str("double"), Some(PrimitiveType::Float64));
        assert_eq!(PrimitiveType::try_from_str("unknown"), None);
    }

    #[test]
    fn primitive_alignment_matches_cdr() {
        assert_eq!(PrimitiveType::Bool.alignment(), 1);
        assert_eq!(PrimitiveType::Int64.alignment(), 8);
        assert_eq!(PrimitiveType::String.alignment(), 4);
    }
}
