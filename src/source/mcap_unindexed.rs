// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! An MCAP source that materializes the whole container in memory and
//! scans it record-by-record, with no use of the footer's summary index.
//!
//! Record framing follows the public MCAP specification: `op: u8` +
//! `len: u64` little-endian + payload, scanned directly rather than via an
//! external crate's reader. A future indexed reader can sit behind
//! [`crate::source::mcap_facade`] without disturbing this contract — small
//! files are the intended case here, not every file.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, BoxStream};

use crate::core::error::{EngineError, Result};
use crate::core::model::{
    Channel, Initialization, IteratorResult, MessageEvent, ParsedChannel, Schema, Topic, TopicStats,
};
use crate::core::time::Time;
use crate::core::value::DecodedMessage;
use crate::estimate::TopicEstimateCache;
use crate::schema::channel_parser;
use crate::source::{sort_events, topic_selected, within_window, BackfillArgs, BoxFuture, MessageIteratorArgs, Source};

/// Streams larger than this are rejected at `initialize`: every record is
/// held in memory at once, so there is no graceful degradation past this
/// point, only a clear failure.
pub const MAX_STREAM_SIZE: u64 = 1024 * 1024 * 1024;

const OP_HEADER: u8 = 0x01;
const OP_FOOTER: u8 = 0x02;
const OP_SCHEMA: u8 = 0x03;
const OP_CHANNEL: u8 = 0x04;
const OP_MESSAGE: u8 = 0x05;
const OP_CHUNK: u8 = 0x06;

const MCAP_MAGIC: [u8; 8] = [0x89, 0x4D, 0x43, 0x41, 0x50, 0x30, 0x0D, 0x0A];

/// A decompressor: `(compressed, uncompressed_size) -> uncompressed bytes`.
pub type Decompressor = Arc<dyn Fn(&[u8], u64) -> Result<Vec<u8>> + Send + Sync>;

/// Decompression handlers keyed by the MCAP chunk `compression` field.
/// `zstd` is always present; `lz4`/`bz2` are optional per spec, but this
/// crate's default wiring carries all three since it already depends on
/// `zstd`, `lz4_flex`, and `bzip2` for other parts of the ambient stack.
pub struct DecompressorRegistry {
    handlers: HashMap<String, Decompressor>,
}

impl DecompressorRegistry {
    pub fn new() -> Self {
        DecompressorRegistry { handlers: HashMap::new() }
    }

    pub fn register(&mut self, algorithm: impl Into<String>, f: Decompressor) {
        self.handlers.insert(algorithm.into(), f);
    }

    fn decompress(&self, algorithm: &str, data: &[u8], uncompressed_size: u64) -> Result<Vec<u8>> {
        if algorithm.is_empty() {
            return Ok(data.to_vec());
        }
        match self.handlers.get(algorithm) {
            Some(f) => f(data, uncompressed_size),
            None => Err(EngineError::container("mcap", format!("no decompressor registered for '{algorithm}'"))),
        }
    }
}

impl Default for DecompressorRegistry {
    fn default() -> Self {
        let mut registry = DecompressorRegistry::new();
        registry.register(
            "zstd",
            Arc::new(|data, uncompressed_size| {
                zstd::bulk::decompress(data, uncompressed_size as usize)
                    .map_err(|e| EngineError::container("mcap", format!("zstd decompress failed: {e}")))
            }),
        );
        registry.register(
            "lz4",
            Arc::new(|data, uncompressed_size| {
                lz4_flex::decompress(data, uncompressed_size as usize)
                    .map_err(|e| EngineError::container("mcap", format!("lz4 decompress failed: {e}")))
            }),
        );
        registry.register(
            "bz2",
            Arc::new(|data, uncompressed_size| {
                use std::io::Read;
                let mut out = Vec::with_capacity(uncompressed_size as usize);
                bzip2::read::BzDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(|e| EngineError::container("mcap", format!("bz2 decompress failed: {e}")))?;
                Ok(out)
            }),
        );
        registry
    }
}

/// A bounds-checked little-endian cursor over one MCAP record stream.
struct McapCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> McapCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        McapCursor { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(EngineError::buffer_too_short(count, self.remaining(), self.offset as u64));
        }
        let slice = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_bytes(2)?.try_into().unwrap()))
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_bytes(4)?.try_into().unwrap()))
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_bytes(8)?.try_into().unwrap()))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| EngineError::parse("mcap string", e.to_string()))
    }

    /// Reads an MCAP `Map<string, string>`: a byte-length prefix followed by
    /// key/value string pairs consuming exactly that many bytes.
    fn read_string_map(&mut self) -> Result<HashMap<String, String>> {
        let byte_len = self.read_u32()? as usize;
        let end = self.offset + byte_len;
        if end > self.data.len() {
            return Err(EngineError::buffer_too_short(byte_len, self.remaining(), self.offset as u64));
        }
        let mut map = HashMap::new();
        while self.offset < end {
            let key = self.read_string()?;
            let value = self.read_string()?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

struct ChannelState {
    channel: Channel,
    schema_name: Option<String>,
    parsed: Option<Arc<ParsedChannel>>,
    faulty: bool,
}

/// In-progress state built up while scanning records, before being frozen
/// into an [`Initialization`] and the per-topic event lists `initialize`
/// hands back to the caller.
struct ParsedState {
    profile: Option<String>,
    schemas: HashMap<u16, Schema>,
    channels: HashMap<u16, ChannelState>,
    datatypes: HashMap<String, Vec<(String, String)>>,
    publishers_by_topic: HashMap<String, HashSet<String>>,
    events_by_topic: HashMap<String, Vec<MessageEvent>>,
    topic_stats: HashMap<String, TopicStats>,
    start: Option<Time>,
    end: Option<Time>,
}

impl ParsedState {
    fn new() -> Self {
        ParsedState {
            profile: None,
            schemas: HashMap::new(),
            channels: HashMap::new(),
            datatypes: HashMap::new(),
            publishers_by_topic: HashMap::new(),
            events_by_topic: HashMap::new(),
            topic_stats: HashMap::new(),
            start: None,
            end: None,
        }
    }

    fn record_event(&mut self, topic: &str, event: MessageEvent) {
        let stamp = event.receive_time;
        self.start = Some(self.start.map_or(stamp, |s| s.min(stamp)));
        self.end = Some(self.end.map_or(stamp, |e| e.max(stamp)));

        let stats = self.topic_stats.entry(topic.to_string()).or_insert(TopicStats {
            num_messages: 0,
            first: stamp,
            last: stamp,
        });
        stats.num_messages += 1;
        stats.first = stats.first.min(stamp);
        stats.last = stats.last.max(stamp);

        self.events_by_topic.entry(topic.to_string()).or_default().push(event);
    }
}

/// MCAP source that holds its entire container in memory after `initialize`.
pub struct McapUnindexedSource {
    data: Bytes,
    decompressors: DecompressorRegistry,
    estimates: TopicEstimateCache,
    state: Option<ParsedState>,
}

impl McapUnindexedSource {
    pub fn new(data: Bytes) -> Self {
        McapUnindexedSource { data, decompressors: DecompressorRegistry::default(), estimates: TopicEstimateCache::new(), state: None }
    }

    pub fn with_decompressors(data: Bytes, decompressors: DecompressorRegistry) -> Self {
        McapUnindexedSource { data, decompressors, estimates: TopicEstimateCache::new(), state: None }
    }

    fn state(&self) -> Result<&ParsedState> {
        self.state.as_ref().ok_or(EngineError::NotInitialized)
    }

    fn run(&mut self) -> Result<()> {
        if self.data.len() as u64 > MAX_STREAM_SIZE {
            return Err(EngineError::FileTooLarge { size: self.data.len() as u64, limit: MAX_STREAM_SIZE });
        }

        let mut cursor = McapCursor::new(&self.data);
        let magic = cursor.read_bytes(8)?;
        if magic != MCAP_MAGIC {
            return Err(EngineError::container("mcap", "missing MCAP magic header"));
        }

        let mut state = ParsedState::new();
        scan_records(&mut cursor, &self.decompressors, &mut self.estimates, &mut state)?;
        self.state = Some(state);
        Ok(())
    }
}

/// Scans records until exhaustion or a `Footer` is reached (the summary
/// section and trailing magic past the footer are not needed by this
/// unindexed reader).
fn scan_records(
    cursor: &mut McapCursor<'_>,
    decompressors: &DecompressorRegistry,
    estimates: &mut TopicEstimateCache,
    state: &mut ParsedState,
) -> Result<()> {
    while cursor.remaining() >= 9 {
        let op = cursor.read_u8()?;
        let len = cursor.read_u64()? as usize;
        let payload = cursor.read_bytes(len)?;

        match op {
            OP_FOOTER => break,
            OP_HEADER => {
                let mut c = McapCursor::new(payload);
                state.profile = Some(c.read_string()?);
            }
            OP_SCHEMA => handle_schema(payload, state)?,
            OP_CHANNEL => handle_channel(payload, state)?,
            OP_MESSAGE => handle_message(payload, estimates, state)?,
            OP_CHUNK => handle_chunk(payload, decompressors, estimates, state)?,
            _ => {} // message index, attachments, statistics, metadata: not needed by this reader
        }
    }
    Ok(())
}

fn handle_schema(payload: &[u8], state: &mut ParsedState) -> Result<()> {
    let mut c = McapCursor::new(payload);
    let id = c.read_u16()?;
    let name = c.read_string()?;
    let encoding = c.read_string()?;
    let data_len = c.read_u32()? as usize;
    let data = Bytes::copy_from_slice(c.read_bytes(data_len)?);

    if let Some(existing) = state.schemas.get(&id) {
        if existing.data != data {
            return Err(EngineError::DuplicateSchemaMismatch { schema_id: id });
        }
        return Ok(());
    }
    state.schemas.insert(id, Schema { id, name, encoding, data });
    Ok(())
}

fn handle_channel(payload: &[u8], state: &mut ParsedState) -> Result<()> {
    let mut c = McapCursor::new(payload);
    let id = c.read_u16()?;
    let schema_id = c.read_u16()?;
    let topic = c.read_string()?;
    let message_encoding = c.read_string()?;
    let metadata = c.read_string_map()?;

    let channel = Channel { id, topic: topic.clone(), message_encoding: message_encoding.clone(), schema_id, metadata: metadata.clone() };

    if let Some(existing) = state.channels.get(&id) {
        if existing.channel != channel {
            return Err(EngineError::DuplicateChannelMismatch { channel_id: id });
        }
        return Ok(());
    }

    if schema_id != 0 && !state.schemas.contains_key(&schema_id) {
        return Err(EngineError::ChannelBeforeSchema { channel_id: id, schema_id });
    }

    let publisher = metadata.get("callerid").cloned().unwrap_or_else(|| id.to_string());
    state.publishers_by_topic.entry(topic.clone()).or_default().insert(publisher);

    let (schema_name, parsed, faulty) = match state.schemas.get(&schema_id) {
        Some(schema) => match channel_parser::parse_channel(&message_encoding, Some(&schema.encoding), &schema.name, &schema.data) {
            Ok(parsed) => {
                for (name, fields) in &parsed.datatypes {
                    state.datatypes.entry(name.clone()).or_insert_with(|| fields.clone());
                }
                (Some(schema.name.clone()), Some(Arc::new(parsed)), false)
            }
            Err(e) => {
                tracing::warn!(channel_id = id, error = %e, "channel schema failed to parse; messages on this channel will be skipped");
                (Some(schema.name.clone()), None, true)
            }
        },
        None => (None, None, false),
    };

    state.channels.insert(id, ChannelState { channel, schema_name, parsed, faulty });
    Ok(())
}

fn handle_message(payload: &[u8], estimates: &mut TopicEstimateCache, state: &mut ParsedState) -> Result<()> {
    let mut c = McapCursor::new(payload);
    let channel_id = c.read_u16()?;
    let _sequence = c.read_u32()?;
    let log_time = c.read_u64()?;
    let publish_time = c.read_u64()?;
    let data = c.read_bytes(c.remaining())?;

    let Some(channel_state) = state.channels.get(&channel_id) else {
        return Err(EngineError::MessageWithoutChannel { channel_id });
    };
    if channel_state.faulty {
        return Ok(());
    }

    let decoded = match &channel_state.parsed {
        Some(parsed) => match (parsed.deserialize)(data) {
            Ok(value) => crate::core::value::Value::Struct(value),
            Err(e) => {
                tracing::warn!(channel_id, error = %e, "failed to deserialize message; skipping");
                return Ok(());
            }
        },
        None => crate::core::value::Value::Struct(DecodedMessage::new()),
    };

    let topic = channel_state.channel.topic.clone();
    let estimated = estimates.estimate_for(&topic, &decoded);
    let size_in_bytes = (data.len() as u64).max(estimated as u64);

    let event = MessageEvent {
        topic: topic.clone(),
        schema_name: channel_state.schema_name.clone(),
        receive_time: Time::from_nanos(log_time as i64),
        publish_time: Some(Time::from_nanos(publish_time as i64)),
        message: decoded,
        size_in_bytes,
    };
    state.record_event(&topic, event);
    Ok(())
}

fn handle_chunk(
    payload: &[u8],
    decompressors: &DecompressorRegistry,
    estimates: &mut TopicEstimateCache,
    state: &mut ParsedState,
) -> Result<()> {
    let mut c = McapCursor::new(payload);
    let _message_start_time = c.read_u64()?;
    let _message_end_time = c.read_u64()?;
    let uncompressed_size = c.read_u64()?;
    let _uncompressed_crc = c.read_u32()?;
    let compression = c.read_string()?;
    let records = c.read_bytes(c.remaining())?;

    let decompressed = decompressors.decompress(&compression, records, uncompressed_size)?;
    let mut inner = McapCursor::new(&decompressed);
    while inner.remaining() >= 9 {
        let op = inner.read_u8()?;
        let len = inner.read_u64()? as usize;
        let payload = inner.read_bytes(len)?;
        match op {
            OP_SCHEMA => handle_schema(payload, state)?,
            OP_CHANNEL => handle_channel(payload, state)?,
            OP_MESSAGE => handle_message(payload, estimates, state)?,
            _ => {} // message index records inside a chunk are positional metadata, not needed here
        }
    }
    Ok(())
}

impl Source for McapUnindexedSource {
    fn initialize(&mut self) -> BoxFuture<'_, Result<Initialization>> {
        Box::pin(async move {
            self.run()?;
            let state = self.state()?;

            let start = state.start.unwrap_or(Time::ZERO);
            let end = state.end.unwrap_or(Time::ZERO);
            let topics = state
                .channels
                .values()
                .map(|c| Topic { name: c.channel.topic.clone(), schema_name: c.schema_name.clone() })
                .collect();

            Ok(Initialization {
                start,
                end,
                topics,
                datatypes: state.datatypes.clone(),
                profile: state.profile.clone(),
                publishers_by_topic: state.publishers_by_topic.clone(),
                topic_stats: state.topic_stats.clone(),
            })
        })
    }

    fn message_iterator(&self, args: MessageIteratorArgs) -> Result<BoxStream<'static, IteratorResult>> {
        let state = self.state()?;
        let mut matched: Vec<MessageEvent> = Vec::new();
        for (topic, events) in &state.events_by_topic {
            if !topic_selected(&args.topics, topic) {
                continue;
            }
            matched.extend(events.iter().filter(|e| within_window(e.receive_time, args.start, args.end)).cloned());
        }
        let sorted = sort_events(matched, args.reverse);
        let items: Vec<IteratorResult> = sorted.into_iter().map(IteratorResult::MessageEvent).collect();
        Ok(Box::pin(stream::iter(items)))
    }

    fn backfill(&self, args: BackfillArgs) -> BoxFuture<'_, Result<Vec<MessageEvent>>> {
        Box::pin(async move {
            let state = self.state()?;
            let mut results = Vec::new();
            for topic in args.topics.keys() {
                let Some(events) = state.events_by_topic.get(topic) else { continue };
                if let Some(last) = events.iter().filter(|e| e.receive_time <= args.time).max_by_key(|e| e.receive_time) {
                    results.push(last.clone());
                }
            }
            results.sort_by(|a, b| a.receive_time.cmp(&b.receive_time));
            Ok(results)
        })
    }

    fn terminate(&mut self) {
        self.state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn le_u64(v: u64) -> [u8; 8] {
        v.to_le_bytes()
    }

    fn string_field(s: &str) -> Vec<u8> {
        let mut out = (s.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(s.as_bytes());
        out
    }

    fn record(op: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![op];
        out.extend_from_slice(&le_u64(payload.len() as u64));
        out.extend_from_slice(payload);
        out
    }

    fn empty_map() -> Vec<u8> {
        0u32.to_le_bytes().to_vec()
    }

    fn build_mcap(messages: &[(&str, u64)]) -> Bytes {
        let mut out = MCAP_MAGIC.to_vec();

        let schema_name = "test/Empty";
        let mut schema_payload = 1u16.to_le_bytes().to_vec();
        schema_payload.extend_from_slice(&string_field(schema_name));
        schema_payload.extend_from_slice(&string_field("ros2msg"));
        schema_payload.extend_from_slice(&0u32.to_le_bytes()); // empty schema body
        out.extend(record(OP_SCHEMA, &schema_payload));

        let mut channel_payload = 1u16.to_le_bytes().to_vec(); // channel id
        channel_payload.extend_from_slice(&1u16.to_le_bytes()); // schema id
        channel_payload.extend_from_slice(&string_field(messages.first().map(|m| m.0).unwrap_or("/a")));
        channel_payload.extend_from_slice(&string_field("cdr"));
        channel_payload.extend_from_slice(&empty_map());
        out.extend(record(OP_CHANNEL, &channel_payload));

        for (_, log_time) in messages {
            let mut message_payload = 1u16.to_le_bytes().to_vec();
            message_payload.extend_from_slice(&0u32.to_le_bytes());
            message_payload.extend_from_slice(&le_u64(*log_time));
            message_payload.extend_from_slice(&le_u64(*log_time));
            out.extend(record(OP_MESSAGE, &message_payload));
        }

        out.extend(record(OP_FOOTER, &[0u8; 20]));
        Bytes::from(out)
    }

    #[tokio::test]
    async fn initialize_reports_time_range_spanning_all_messages() {
        let data = build_mcap(&[("/a", 5), ("/a", 3), ("/a", 4), ("/a", 2)]);
        let mut source = McapUnindexedSource::new(data);
        let init = source.initialize().await.unwrap();
        assert_eq!(init.start, Time::from_nanos(2));
        assert_eq!(init.end, Time::from_nanos(5));
        assert_eq!(init.topics.len(), 1);
    }

    #[tokio::test]
    async fn message_iterator_sorts_by_receive_time() {
        let data = build_mcap(&[("/a", 5), ("/a", 3), ("/a", 4), ("/a", 2)]);
        let mut source = McapUnindexedSource::new(data);
        source.initialize().await.unwrap();

        let mut topics = crate::core::model::TopicSelection::new();
        topics.insert("/a".to_string(), crate::core::model::TopicSelectionEntry { topic: "/a".to_string(), preload: None });

        let stream = source.message_iterator(MessageIteratorArgs { topics, start: None, end: None, reverse: false }).unwrap();
        let items: Vec<_> = stream.collect().await;
        let times: Vec<i64> = items
            .into_iter()
            .map(|i| match i {
                IteratorResult::MessageEvent(e) => e.receive_time.as_nanos(),
                _ => panic!("expected message event"),
            })
            .collect();
        assert_eq!(times, vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn empty_topic_selection_yields_nothing() {
        let data = build_mcap(&[("/a", 1)]);
        let mut source = McapUnindexedSource::new(data);
        source.initialize().await.unwrap();

        let stream = source
            .message_iterator(MessageIteratorArgs { topics: crate::core::model::TopicSelection::new(), start: None, end: None, reverse: false })
            .unwrap();
        let items: Vec<_> = stream.collect().await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn oversized_stream_is_rejected() {
        let mut source = McapUnindexedSource::new(Bytes::from(vec![0u8; (MAX_STREAM_SIZE + 1) as usize]));
        let err = source.initialize().await.unwrap_err();
        assert!(matches!(err, EngineError::FileTooLarge { .. }));
    }

    #[tokio::test]
    async fn backfill_returns_last_event_at_or_before_time() {
        let data = build_mcap(&[("/a", 1), ("/a", 3), ("/a", 7)]);
        let mut source = McapUnindexedSource::new(data);
        source.initialize().await.unwrap();

        let mut topics = crate::core::model::TopicSelection::new();
        topics.insert("/a".to_string(), crate::core::model::TopicSelectionEntry { topic: "/a".to_string(), preload: None });

        let result = source.backfill(BackfillArgs { topics, time: Time::from_nanos(4) }).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].receive_time, Time::from_nanos(3));
    }
}
