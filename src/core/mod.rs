// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types shared by every layer of the engine:
//! - [`error`] - the error taxonomy and `Result` alias
//! - [`value`] - the unified decoded-value representation
//! - [`time`] - the `Time` type messages are ordered by
//! - [`model`] - container-agnostic data model (topics, channels, messages)

pub mod error;
pub mod model;
pub mod time;
pub mod value;

pub use error::{EngineError, ErrorKind, Result};
pub use model::{
    Channel, Initialization, IteratorResult, MessageEvent, ParsedChannel, Preload, Problem,
    Schema, Severity, Topic, TopicSelection, TopicSelectionEntry, TopicStats,
};
pub use time::Time;
pub use value::{DecodedMessage, PrimitiveType, Value};

/// Message wire encoding identifier. Only `cdr` (ROS 2) channels go through
/// the schema-driven decoder in [`crate::schema`]; ROS1 `.bag` connections
/// are decoded by [`crate::encoding::ros1`] directly, since they carry no
/// `message_encoding` field to dispatch on in the first place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageEncoding {
    Cdr,
}

impl std::str::FromStr for MessageEncoding {
    type Err = error::EngineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cdr" => Ok(MessageEncoding::Cdr),
            other => Err(error::EngineError::unsupported_encoding(other.to_string(), None)),
        }
    }
}

impl MessageEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageEncoding::Cdr => "cdr",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn message_encoding_parses_cdr_only() {
        assert_eq!(MessageEncoding::from_str("cdr").unwrap(), MessageEncoding::Cdr);
        assert!(MessageEncoding::from_str("protobuf").is_err());
    }
}
