// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Container-agnostic data model shared by every source implementation.
//!
//! These types are what a `.bag` reader and an MCAP reader both normalize
//! into, so the cursor, worker boundary, and CLI never need to know which
//! container produced a given message.

use crate::core::time::Time;
use crate::core::value::{DecodedMessage, Value};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A named data stream within a source, optionally typed.
///
/// `schema_name` is `None` for connections whose message definition could
/// not be resolved (the channel's messages still surface, decoded as far
/// as possible, but without a known type name to report).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub schema_name: Option<String>,
}

/// A raw schema record as stored in the container: an id, a name, the
/// encoding of `data` (`ros2msg`, `ros2idl`, `omgidl`), and the schema text
/// itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub id: u16,
    pub name: String,
    pub encoding: String,
    pub data: Bytes,
}

/// A container-level channel: a topic bound to a schema and a message
/// encoding, plus any container-specific metadata (e.g. MCAP channel
/// metadata key/value pairs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: u16,
    pub topic: String,
    pub message_encoding: String,
    pub schema_id: u16,
    pub metadata: HashMap<String, String>,
}

/// A channel whose schema has been parsed into a reusable decode plan.
///
/// Built once per channel (see `channel_parser::parse_channel`) and reused
/// across every message on that channel, rather than re-parsing the schema
/// text on every decode call.
pub struct ParsedChannel {
    /// Decodes one message's raw bytes into a `DecodedMessage`.
    pub deserialize: Box<dyn Fn(&[u8]) -> crate::core::error::Result<DecodedMessage> + Send + Sync>,
    /// Named struct types referenced by the root schema, by fully-qualified name.
    pub datatypes: HashMap<String, Vec<(String, String)>>,
}

impl std::fmt::Debug for ParsedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedChannel")
            .field("datatypes", &self.datatypes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One decoded message, time-stamped and sized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub topic: String,
    pub schema_name: Option<String>,
    /// Time the message was recorded by the container (what ordering uses).
    pub receive_time: Time,
    /// Time embedded in the message header, if the message type carries one.
    pub publish_time: Option<Time>,
    pub message: Value,
    /// `max(wire_size, estimated_size)` — never smaller than the bytes
    /// actually read off the wire, even if the cost estimator undercounts.
    pub size_in_bytes: u64,
}

/// Severity of a non-fatal problem surfaced alongside the message stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warn,
    Info,
}

/// A non-fatal condition encountered while iterating, attributed to a
/// specific connection/channel so a caller can decide whether to ignore it.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub connection_id: u16,
    pub severity: Severity,
    pub message: String,
    pub error: Option<String>,
    pub tip: Option<String>,
}

/// One item yielded by a message iterator: a decoded message, a non-fatal
/// problem, or a bare time stamp used to let a cursor make forward progress
/// without yielding a message (e.g. an empty batch boundary).
#[derive(Debug, Clone, PartialEq)]
pub enum IteratorResult {
    MessageEvent(MessageEvent),
    Problem(Problem),
    Stamp(Time),
}

/// Aggregate statistics for a single topic over the lifetime of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStats {
    pub num_messages: u64,
    pub first: Time,
    pub last: Time,
}

/// The result of `initialize`: everything a caller needs to know about a
/// source before it starts pulling messages.
#[derive(Debug, Clone)]
pub struct Initialization {
    /// Earliest message time across all topics. Equal to `end` iff the
    /// source contains zero messages (both pinned to `Time::ZERO`).
    pub start: Time,
    pub end: Time,
    pub topics: Vec<Topic>,
    /// Named struct types by fully-qualified name, field name -> type name.
    pub datatypes: HashMap<String, Vec<(String, String)>>,
    pub profile: Option<String>,
    pub publishers_by_topic: HashMap<String, HashSet<String>>,
    pub topic_stats: HashMap<String, TopicStats>,
}

impl Initialization {
    pub fn is_empty(&self) -> bool {
        self.start == Time::ZERO && self.end == Time::ZERO && self.topic_stats.is_empty()
    }
}

/// How much of a topic's history to preload before live iteration begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preload {
    Full,
    Partial,
}

/// One entry in a `TopicSelection`: which topic, and how eagerly to preload it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSelectionEntry {
    pub topic: String,
    pub preload: Option<Preload>,
}

/// The set of topics a caller wants, keyed by topic name for O(1) membership
/// checks during filtering.
pub type TopicSelection = HashMap<String, TopicSelectionEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialization_is_empty_iff_start_equals_end_at_zero() {
        let init = Initialization {
            start: Time::ZERO,
            end: Time::ZERO,
            topics: vec![],
            datatypes: HashMap::new(),
            profile: None,
            publishers_by_topic: HashMap::new(),
            topic_stats: HashMap::new(),
        };
        assert!(init.is_empty());
    }

    #[test]
    fn initialization_with_messages_is_not_empty() {
        let mut topic_stats = HashMap::new();
        topic_stats.insert(
            "/a".to_string(),
            TopicStats { num_messages: 1, first: Time::new(1, 0), last: Time::new(1, 0) },
        );
        let init = Initialization {
            start: Time::new(1, 0),
            end: Time::new(1, 0),
            topics: vec![Topic { name: "/a".into(), schema_name: None }],
            datatypes: HashMap::new(),
            profile: None,
            publishers_by_topic: HashMap::new(),
            topic_stats,
        };
        assert!(!init.is_empty());
    }

    #[test]
    fn topic_selection_keyed_by_name() {
        let mut sel: TopicSelection = HashMap::new();
        sel.insert(
            "/a".into(),
            TopicSelectionEntry { topic: "/a".into(), preload: Some(Preload::Full) },
        );
        assert!(sel.contains_key("/a"));
        assert!(!sel.contains_key("/b"));
    }
}
