// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Message schema parsing: `.msg`, `ros2idl`, and `omgidl` text all reduce
//! to the same [`ast::MessageSchema`] before a channel's decoder is built.

pub mod ast;
pub mod builtin_types;
pub mod channel_parser;
pub mod msg_parser;
pub mod omgidl_parser;
pub mod ros2idl_parser;

pub use ast::{Field, FieldType, MessageSchema, MessageType, PrimitiveType};
pub use channel_parser::parse_channel;
pub use msg_parser::RosVersion;
