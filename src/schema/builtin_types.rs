// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Predefined ROS2 types referenced without an explicit definition:
//! `builtin_interfaces/Time`, `builtin_interfaces/Duration`, and
//! `std_msgs/Header`, each under both their flat and `msg/`-qualified name.

use crate::schema::ast::{Field, FieldType, MessageType, PrimitiveType};

/// `{sec: int32, nanosec: uint32}`, shared by `Time` and `Duration`.
fn stamp_like(name: &str) -> MessageType {
    let mut msg_type = MessageType::new(name.to_string());
    msg_type.add_field(Field { name: "sec".to_string(), type_name: FieldType::Primitive(PrimitiveType::Int32) });
    msg_type.add_field(Field { name: "nanosec".to_string(), type_name: FieldType::Primitive(PrimitiveType::UInt32) });
    msg_type
}

/// `std_msgs/Header`-shaped type, parameterized by the `Time` type name its
/// `stamp` field nests (flat vs. `msg/`-qualified naming share everything
/// but that reference). Does not include ROS1's `seq` field.
fn header_like(name: &str, time_name: &str) -> MessageType {
    let mut msg_type = MessageType::new(name.to_string());
    msg_type.add_field(Field { name: "stamp".to_string(), type_name: FieldType::Nested(time_name.to_string()) });
    msg_type.add_field(Field { name: "frame_id".to_string(), type_name: FieldType::Primitive(PrimitiveType::String) });
    msg_type
}

/// All builtin types implicitly available to every schema.
pub fn get_all() -> Vec<MessageType> {
    vec![
        stamp_like("builtin_interfaces/Time"),
        stamp_like("builtin_interfaces/msg/Time"),
        stamp_like("builtin_interfaces/Duration"),
        stamp_like("builtin_interfaces/msg/Duration"),
        header_like("std_msgs/Header", "builtin_interfaces/Time"),
        header_like("std_msgs/msg/Header", "builtin_interfaces/msg/Time"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_like_has_sec_and_nanosec_fields() {
        let time = stamp_like("builtin_interfaces/Time");
        assert_eq!(time.name, "builtin_interfaces/Time");
        assert_eq!(time.fields.len(), 2);
        assert!(matches!(time.fields[0].type_name, FieldType::Primitive(PrimitiveType::Int32)));
        assert!(matches!(time.fields[1].type_name, FieldType::Primitive(PrimitiveType::UInt32)));
    }

    #[test]
    fn header_like_nests_the_given_time_type() {
        let header = header_like("std_msgs/Header", "builtin_interfaces/Time");
        assert_eq!(header.fields[0].name, "stamp");
        assert!(matches!(&header.fields[0].type_name, FieldType::Nested(n) if n == "builtin_interfaces/Time"));
        assert_eq!(header.fields[1].name, "frame_id");
    }

    #[test]
    fn get_all_covers_flat_and_msg_qualified_names() {
        let all = get_all();
        let names: Vec<&str> = all.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), 6);
        for expected in [
            "builtin_interfaces/Time",
            "builtin_interfaces/msg/Time",
            "builtin_interfaces/Duration",
            "builtin_interfaces/msg/Duration",
            "std_msgs/Header",
            "std_msgs/msg/Header",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }
}
