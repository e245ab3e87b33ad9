// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for the ingestion engine.
//!
//! The taxonomy mirrors the engine's own error classes — configuration,
//! resource limits, state, data integrity, transport, and decode — so a
//! caller can match on `kind()` without string comparison. The main enum
//! stays hand-written because several variants carry structured fields
//! (byte ranges, cursor positions, schema ids) that a `#[error(...)]`
//! format string would have to reconstruct from scratch anyway; small leaf
//! error types elsewhere in the crate use `thiserror` where a derive is a
//! net simplification (see `crate::range::RangeError`).

use std::fmt;

/// Coarse classification of an [`EngineError`], matching the taxonomy of
/// configuration / resource-limit / state / data-integrity / transport /
/// decode errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    ResourceLimit,
    State,
    DataIntegrity,
    Transport,
    Decode,
}

/// Errors that can occur anywhere in the ingestion pipeline.
#[derive(Debug, Clone)]
pub enum EngineError {
    // -- Configuration --
    /// The input descriptor (stream variant, etc.) is not supported.
    UnsupportedInput { reason: String },
    /// A file/url input could not be read at all (missing file, closed
    /// handle, a probe read of the first byte failing).
    NotReadable { reason: String },
    /// The channel's `(message_encoding, schema_encoding)` pair has no decoder.
    UnsupportedEncoding { message_encoding: String, schema_encoding: Option<String> },
    /// Upstream omitted `Content-Length` on an otherwise-successful probe.
    MissingContentLength { url: String },
    /// Upstream did not advertise `Accept-Ranges: bytes`.
    AcceptRangesMissing { url: String },

    // -- Resource limit --
    /// The container exceeds the engine's in-memory size limit.
    FileTooLarge { size: u64, limit: u64 },
    /// A single `read` requested more bytes than the cache can ever hold.
    RequestExceedsCache { requested: u64, cache_size: u64 },
    /// A `read` or range request runs past the end of the file.
    RangeExceedsFile { start: u64, end: u64, file_size: u64 },

    // -- State --
    /// A call was made before `initialize`.
    NotInitialized,
    /// `initialize` was called more than once on the same source.
    AlreadyInitialized,
    /// The operation was cancelled via an abort signal.
    Cancelled,

    // -- Data integrity --
    /// Two schema records share an id but differ byte-for-byte.
    DuplicateSchemaMismatch { schema_id: u16 },
    /// Two channel records share an id but differ byte-for-byte.
    DuplicateChannelMismatch { channel_id: u16 },
    /// A channel referenced a schema id that has not appeared yet.
    ChannelBeforeSchema { channel_id: u16, schema_id: u16 },
    /// A message referenced a channel id that has not appeared yet.
    MessageWithoutChannel { channel_id: u16 },
    /// A schema body was empty and the caller did not opt into that.
    EmptySchema { schema_name: String },

    // -- Transport --
    /// Upstream responded with a non-2xx status.
    HttpStatus { url: String, status: u16 },
    /// The request failed below the HTTP layer (DNS, connect, TLS, reset).
    HttpNetwork { url: String, message: String },
    /// Two readers raced on a single response body.
    StreamLockContention { url: String },
    /// A successful status arrived with no body.
    MissingBody { url: String },

    // -- Decode (quarantined at the channel, not fatal to the source) --
    /// A channel's `deserialize` failed on a specific message.
    DeserializeFailed { channel_id: u16, message: String },

    // -- Parsing / schema / internal plumbing --
    ParseError { context: String, message: String },
    InvalidSchema { schema_name: String, reason: String },
    TypeNotFound { type_name: String },
    BufferTooShort { requested: usize, available: usize, cursor_pos: u64 },
    AlignmentError { expected: u64, actual: u64 },
    LengthExceeded { length: usize, position: usize, buffer_len: usize },
    ContainerError { container: String, message: String },
    InvariantViolation { invariant: String },
    WorkerClosed,
    Io(String),
    Other(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        use EngineError::*;
        match self {
            UnsupportedInput { .. }
            | NotReadable { .. }
            | UnsupportedEncoding { .. }
            | MissingContentLength { .. }
            | AcceptRangesMissing { .. } => ErrorKind::Configuration,

            FileTooLarge { .. } | RequestExceedsCache { .. } | RangeExceedsFile { .. } => {
                ErrorKind::ResourceLimit
            }

            NotInitialized | AlreadyInitialized | Cancelled => ErrorKind::State,

            DuplicateSchemaMismatch { .. }
            | DuplicateChannelMismatch { .. }
            | ChannelBeforeSchema { .. }
            | MessageWithoutChannel { .. }
            | EmptySchema { .. } => ErrorKind::DataIntegrity,

            HttpStatus { .. } | HttpNetwork { .. } | StreamLockContention { .. } | MissingBody { .. } => {
                ErrorKind::Transport
            }

            DeserializeFailed { .. } => ErrorKind::Decode,

            _ => ErrorKind::DataIntegrity,
        }
    }

    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::ParseError { context: context.into(), message: message.into() }
    }

    pub fn invalid_schema(schema_name: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidSchema { schema_name: schema_name.into(), reason: reason.into() }
    }

    pub fn type_not_found(type_name: impl Into<String>) -> Self {
        EngineError::TypeNotFound { type_name: type_name.into() }
    }

    pub fn buffer_too_short(requested: usize, available: usize, cursor_pos: u64) -> Self {
        EngineError::BufferTooShort { requested, available, cursor_pos }
    }

    pub fn alignment_error(expected: u64, actual: u64) -> Self {
        EngineError::AlignmentError { expected, actual }
    }

    pub fn length_exceeded(length: usize, position: usize, buffer_len: usize) -> Self {
        EngineError::LengthExceeded { length, position, buffer_len }
    }

    pub fn container(container: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::ContainerError { container: container.into(), message: message.into() }
    }

    pub fn unsupported_encoding(
        message_encoding: impl Into<String>,
        schema_encoding: Option<String>,
    ) -> Self {
        EngineError::UnsupportedEncoding {
            message_encoding: message_encoding.into(),
            schema_encoding,
        }
    }

    pub fn invariant_violation(invariant: impl Into<String>) -> Self {
        EngineError::InvariantViolation { invariant: invariant.into() }
    }

    /// Structured fields for `tracing` spans/events.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        use EngineError::*;
        match self {
            UnsupportedInput { reason } | NotReadable { reason } => vec![("reason", reason.clone())],
            UnsupportedEncoding { message_encoding, schema_encoding } => vec![
                ("message_encoding", message_encoding.clone()),
                ("schema_encoding", schema_encoding.clone().unwrap_or_default()),
            ],
            MissingContentLength { url } | AcceptRangesMissing { url } => vec![("url", url.clone())],
            FileTooLarge { size, limit } => {
                vec![("size", size.to_string()), ("limit", limit.to_string())]
            }
            RequestExceedsCache { requested, cache_size } => vec![
                ("requested", requested.to_string()),
                ("cache_size", cache_size.to_string()),
            ],
            RangeExceedsFile { start, end, file_size } => vec![
                ("start", start.to_string()),
                ("end", end.to_string()),
                ("file_size", file_size.to_string()),
            ],
            NotInitialized | AlreadyInitialized | Cancelled | WorkerClosed => vec![],
            DuplicateSchemaMismatch { schema_id } => vec![("schema_id", schema_id.to_string())],
            DuplicateChannelMismatch { channel_id } => vec![("channel_id", channel_id.to_string())],
            ChannelBeforeSchema { channel_id, schema_id } => vec![
                ("channel_id", channel_id.to_string()),
                ("schema_id", schema_id.to_string()),
            ],
            MessageWithoutChannel { channel_id } => vec![("channel_id", channel_id.to_string())],
            EmptySchema { schema_name } => vec![("schema", schema_name.clone())],
            HttpStatus { url, status } => vec![("url", url.clone()), ("status", status.to_string())],
            HttpNetwork { url, message } => vec![("url", url.clone()), ("message", message.clone())],
            StreamLockContention { url } | MissingBody { url } => vec![("url", url.clone())],
            DeserializeFailed { channel_id, message } => {
                vec![("channel_id", channel_id.to_string()), ("message", message.clone())]
            }
            ParseError { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            InvalidSchema { schema_name, reason } => {
                vec![("schema", schema_name.clone()), ("reason", reason.clone())]
            }
            TypeNotFound { type_name } => vec![("type", type_name.clone())],
            BufferTooShort { requested, available, cursor_pos } => vec![
                ("requested", requested.to_string()),
                ("available", available.to_string()),
                ("cursor", cursor_pos.to_string()),
            ],
            AlignmentError { expected, actual } => {
                vec![("expected", expected.to_string()), ("actual", actual.to_string())]
            }
            LengthExceeded { length, position, buffer_len } => vec![
                ("length", length.to_string()),
                ("position", position.to_string()),
                ("buffer_len", buffer_len.to_string()),
            ],
            ContainerError { container, message } => {
                vec![("container", container.clone()), ("message", message.clone())]
            }
            InvariantViolation { invariant } => vec![("invariant", invariant.clone())],
            Io(msg) | Other(msg) => vec![("message", msg.clone())],
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use EngineError::*;
        match self {
            UnsupportedInput { reason } => write!(f, "unsupported input: {reason}"),
            NotReadable { reason } => write!(f, "input is not readable: {reason}"),
            UnsupportedEncoding { message_encoding, schema_encoding } => write!(
                f,
                "unsupported encoding: message_encoding={message_encoding}, schema_encoding={:?}",
                schema_encoding
            ),
            MissingContentLength { url } => write!(f, "missing Content-Length from {url}"),
            AcceptRangesMissing { url } => write!(f, "{url} did not advertise Accept-Ranges: bytes"),
            FileTooLarge { size, limit } => write!(f, "file size {size} exceeds limit {limit}"),
            RequestExceedsCache { requested, cache_size } => {
                write!(f, "requested {requested} bytes exceeds cache size {cache_size}")
            }
            RangeExceedsFile { start, end, file_size } => {
                write!(f, "range [{start}, {end}) exceeds file size {file_size}")
            }
            NotInitialized => write!(f, "source has not been initialized"),
            AlreadyInitialized => write!(f, "source has already been initialized"),
            Cancelled => write!(f, "operation cancelled"),
            DuplicateSchemaMismatch { schema_id } => {
                write!(f, "schema id {schema_id} redefined with different bytes")
            }
            DuplicateChannelMismatch { channel_id } => {
                write!(f, "channel id {channel_id} redefined with different bytes")
            }
            ChannelBeforeSchema { channel_id, schema_id } => write!(
                f,
                "channel {channel_id} references schema {schema_id} before it was seen"
            ),
            MessageWithoutChannel { channel_id } => {
                write!(f, "message references unknown channel {channel_id}")
            }
            EmptySchema { schema_name } => write!(f, "schema '{schema_name}' has an empty body"),
            HttpStatus { url, status } => write!(f, "{url} returned HTTP {status}"),
            HttpNetwork { url, message } => write!(f, "network error fetching {url}: {message}"),
            StreamLockContention { url } => write!(f, "lock contention on response body from {url}"),
            MissingBody { url } => write!(f, "{url} returned no body"),
            DeserializeFailed { channel_id, message } => {
                write!(f, "deserialize failed on channel {channel_id}: {message}")
            }
            ParseError { context, message } => write!(f, "parse error in {context}: {message}"),
            InvalidSchema { schema_name, reason } => {
                write!(f, "invalid schema '{schema_name}': {reason}")
            }
            TypeNotFound { type_name } => write!(f, "type not found: '{type_name}'"),
            BufferTooShort { requested, available, cursor_pos } => write!(
                f,
                "buffer too short: requested {requested} bytes at position {cursor_pos}, but only {available} bytes available"
            ),
            AlignmentError { expected, actual } => write!(
                f,
                "alignment error: expected alignment of {expected}, but position is {actual}"
            ),
            LengthExceeded { length, position, buffer_len } => write!(
                f,
                "length {length} exceeds buffer at position {position} (buffer length: {buffer_len})"
            ),
            ContainerError { container, message } => write!(f, "{container} container error: {message}"),
            InvariantViolation { invariant } => write!(f, "invariant violation: {invariant}"),
            WorkerClosed => write!(f, "worker boundary channel closed"),
            Io(msg) => write!(f, "I/O error: {msg}"),
            Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classifies_state_errors() {
        assert_eq!(EngineError::NotInitialized.kind(), ErrorKind::State);
        assert_eq!(EngineError::Cancelled.kind(), ErrorKind::State);
    }

    #[test]
    fn kind_classifies_transport_errors() {
        let e = EngineError::HttpStatus { url: "http://x".into(), status: 500 };
        assert_eq!(e.kind(), ErrorKind::Transport);
    }

    #[test]
    fn display_is_human_readable() {
        let e = EngineError::FileTooLarge { size: 2_000_000_000, limit: 1_073_741_824 };
        assert!(e.to_string().contains("exceeds limit"));
    }
}
