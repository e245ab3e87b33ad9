// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! A ROS1 bag source, built on the `rosbag` crate for container framing:
//! `RosBag::new`, `.chunk_records()`, `ChunkRecord::Chunk`,
//! `chunk.messages()`, `MessageRecord::{Connection, MessageData}` — with
//! one ROS1 decoder built per connection from its `message_definition` text.
//!
//! `rosbag` only opens a local path (it memory-maps the file), so a `url`
//! input is first downloaded in full to a temporary file — there is no
//! streaming bag-reader available to build a lazier path on.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, BoxStream};

use crate::core::error::{EngineError, Result};
use crate::core::model::{Channel, Initialization, IteratorResult, MessageEvent, Topic, TopicStats};
use crate::core::time::Time;
use crate::core::value::Value;
use crate::encoding::ros1::Ros1Decoder;
use crate::estimate::TopicEstimateCache;
use crate::schema::msg_parser::{self, RosVersion};
use crate::source::{sort_events, topic_selected, within_window, BackfillArgs, BoxFuture, MessageIteratorArgs, Source};
use crate::transport::http_reader::HttpRangeReader;

/// A bag's connection, normalized into the shared `Channel` shape plus a
/// compiled decoder (when the connection's message definition parsed).
struct ConnectionState {
    channel: Channel,
    schema_name: String,
    decoder: Option<Arc<Ros1Decoder>>,
}

struct ParsedState {
    connections: HashMap<u32, ConnectionState>,
    events_by_topic: HashMap<String, Vec<MessageEvent>>,
    publishers_by_topic: HashMap<String, HashSet<String>>,
    topic_stats: HashMap<String, TopicStats>,
    datatypes: HashMap<String, Vec<(String, String)>>,
    start: Option<Time>,
    end: Option<Time>,
    /// count of chunks whose start time precedes the running maximum end —
    /// an advisory signal only, see `chunk_overlap_warning`.
    overlapping_chunks: usize,
    chunk_count: usize,
}

/// Where a bag's bytes come from.
pub enum BagInput {
    File(PathBuf),
    Url(String),
    /// Reserved for a future live-stream input; rejected at `initialize`.
    Stream,
}

/// ROS1 `.bag` source.
pub struct BagSource {
    input: BagInput,
    estimates: TopicEstimateCache,
    state: Option<ParsedState>,
    /// Temp file backing a URL input; kept alive for the source's lifetime
    /// so the `rosbag` crate's mmap stays valid, removed on `terminate`.
    downloaded_path: Option<PathBuf>,
}

impl BagSource {
    pub fn new(input: BagInput) -> Self {
        BagSource { input, estimates: TopicEstimateCache::new(), state: None, downloaded_path: None }
    }

    async fn resolve_path(&mut self) -> Result<PathBuf> {
        match &self.input {
            BagInput::File(path) => Ok(path.clone()),
            BagInput::Url(url) => {
                let reader = HttpRangeReader::new(url.as_str());
                let info = reader.open().await?;
                let mut stream = reader.fetch(0, info.size).await?;

                let temp_path = std::env::temp_dir().join(format!("robostream-bag-{}.bag", std::process::id()));
                let mut file = tokio::fs::File::create(&temp_path).await.map_err(EngineError::from)?;
                use futures::StreamExt;
                use tokio::io::AsyncWriteExt;
                while let Some(chunk) = stream.next().await {
                    file.write_all(&chunk?).await.map_err(EngineError::from)?;
                }
                self.downloaded_path = Some(temp_path.clone());
                Ok(temp_path)
            }
            BagInput::Stream => Err(EngineError::UnsupportedInput { reason: "bag sources do not accept a stream input".to_string() }),
        }
    }

    fn run(&mut self, path: &Path) -> Result<()> {
        let bag = rosbag::RosBag::new(path)
            .map_err(|e| EngineError::NotReadable { reason: format!("{}: {e}", path.display()) })?;

        let mut state = ParsedState {
            connections: HashMap::new(),
            events_by_topic: HashMap::new(),
            publishers_by_topic: HashMap::new(),
            topic_stats: HashMap::new(),
            datatypes: HashMap::new(),
            start: None,
            end: None,
            overlapping_chunks: 0,
            chunk_count: 0,
        };

        // Connections are usually recorded in the index section; some
        // writers only emit them inline inside a chunk, so both sections
        // get scanned and later connections of an already-seen id are
        // no-ops (see `register_connection`).
        for record in bag.index_records() {
            let record = record.map_err(|e| EngineError::container("bag", format!("failed to read index record: {e}")))?;
            if let rosbag::IndexRecord::Connection(conn) = record {
                register_connection(&mut state, conn.id, conn.topic, conn.tp, conn.message_definition, conn.caller_id)?;
            }
        }

        let mut chunk_starts: Vec<(u64, u64)> = Vec::new(); // (start, end) per chunk, in file order

        for record in bag.chunk_records() {
            let record = record.map_err(|e| EngineError::container("bag", format!("failed to read chunk record: {e}")))?;
            let rosbag::ChunkRecord::Chunk(chunk) = record else { continue };
            state.chunk_count += 1;

            let mut chunk_start: Option<u64> = None;
            let mut chunk_end: Option<u64> = None;

            for msg_result in chunk.messages() {
                let msg_result = msg_result.map_err(|e| EngineError::container("bag", format!("failed to read message: {e}")))?;
                match msg_result {
                    rosbag::MessageRecord::Connection(conn) => {
                        register_connection(&mut state, conn.id, conn.topic, conn.tp, conn.message_definition, conn.caller_id)?;
                    }
                    rosbag::MessageRecord::MessageData(msg) => {
                        chunk_start = Some(chunk_start.map_or(msg.time, |t: u64| t.min(msg.time)));
                        chunk_end = Some(chunk_end.map_or(msg.time, |t: u64| t.max(msg.time)));
                        record_message(&mut state, &mut self.estimates, msg.conn_id, msg.time, msg.data)?;
                    }
                }
            }

            if let (Some(s), Some(e)) = (chunk_start, chunk_end) {
                chunk_starts.push((s, e));
            }
        }

        state.overlapping_chunks = count_overlapping_chunks(&chunk_starts);
        if state.chunk_count > 0 && state.overlapping_chunks as f64 > 0.25 * state.chunk_count as f64 {
            tracing::warn!(
                overlapping = state.overlapping_chunks,
                total = state.chunk_count,
                "bag chunks are substantially out of time order"
            );
        }

        self.state = Some(state);
        Ok(())
    }

    fn state(&self) -> Result<&ParsedState> {
        self.state.as_ref().ok_or(EngineError::NotInitialized)
    }
}

fn register_connection(state: &mut ParsedState, id: u32, topic: &str, type_name: &str, message_definition: &str, caller_id: &str) -> Result<()> {
    if state.connections.contains_key(&id) {
        return Ok(());
    }

    let topic = topic.to_string();
    let type_name = type_name.to_string();
    let message_definition = message_definition.to_string();
    let caller_id = if caller_id.is_empty() { None } else { Some(caller_id.to_string()) };

    let decoder = match msg_parser::parse_with_version(&type_name, &message_definition, RosVersion::Ros1) {
        Ok(schema) => {
            for (name, fields) in fields_by_type(&schema) {
                state.datatypes.entry(name).or_insert(fields);
            }
            Some(Arc::new(Ros1Decoder::new(schema, type_name.clone())))
        }
        Err(e) => {
            tracing::warn!(connection_id = id, error = %e, "failed to parse connection's message definition");
            None
        }
    };

    let publisher = caller_id.unwrap_or_else(|| id.to_string());
    state.publishers_by_topic.entry(topic.clone()).or_default().insert(publisher);

    let channel = Channel {
        id: id as u16,
        topic: topic.clone(),
        message_encoding: "ros1".to_string(),
        schema_id: id as u16,
        metadata: HashMap::new(),
    };
    state.connections.insert(id, ConnectionState { channel, schema_name: type_name, decoder });
    Ok(())
}

fn fields_by_type(schema: &crate::schema::ast::MessageSchema) -> Vec<(String, Vec<(String, String)>)> {
    schema
        .types
        .values()
        .map(|t| {
            let fields = t.fields.iter().map(|f| (f.name.clone(), format!("{:?}", f.type_name))).collect();
            (t.name.clone(), fields)
        })
        .collect()
}

fn record_message(state: &mut ParsedState, estimates: &mut TopicEstimateCache, conn_id: u32, time: u64, data: &[u8]) -> Result<()> {
    // Spec open question #2: the source of truth returns (terminates the
    // iterator entirely) on a schema-less connection rather than skipping
    // just that message. We deliberately do not reproduce that: a single
    // unparseable connection should not silence every other topic in the
    // bag, so a missing decoder here just skips this connection's messages.
    let Some(conn_state) = state.connections.get(&conn_id) else {
        return Err(EngineError::MessageWithoutChannel { channel_id: conn_id as u16 });
    };
    let Some(decoder) = conn_state.decoder.clone() else {
        return Ok(());
    };

    let topic = conn_state.channel.topic.clone();
    let schema_name = conn_state.schema_name.clone();

    let decoded = match decoder.decode(data) {
        Ok(value) => Value::Struct(value),
        Err(e) => {
            tracing::warn!(connection_id = conn_id, error = %e, "failed to deserialize bag message; skipping");
            return Ok(());
        }
    };

    let estimated = estimates.estimate_for(&topic, &decoded);
    let size_in_bytes = (data.len() as u64).max(estimated as u64);
    let receive_time = Time::from_nanos(time as i64);

    state.start = Some(state.start.map_or(receive_time, |s| s.min(receive_time)));
    state.end = Some(state.end.map_or(receive_time, |e| e.max(receive_time)));

    let stats = state.topic_stats.entry(topic.clone()).or_insert(TopicStats { num_messages: 0, first: receive_time, last: receive_time });
    stats.num_messages += 1;
    stats.first = stats.first.min(receive_time);
    stats.last = stats.last.max(receive_time);

    state.events_by_topic.entry(topic.clone()).or_default().push(MessageEvent {
        topic,
        schema_name: Some(schema_name),
        receive_time,
        publish_time: None,
        message: decoded,
        size_in_bytes,
    });
    Ok(())
}

/// Counts chunks (by file order) whose start time precedes the maximum end
/// time seen so far among earlier chunks — an out-of-order indicator used
/// purely for the advisory chunk-overlap warning, never to reorder data.
fn count_overlapping_chunks(chunk_ranges: &[(u64, u64)]) -> usize {
    let mut max_end_so_far: Option<u64> = None;
    let mut overlaps = 0;
    for &(start, end) in chunk_ranges {
        if let Some(max_end) = max_end_so_far {
            if start < max_end {
                overlaps += 1;
            }
        }
        max_end_so_far = Some(max_end_so_far.map_or(end, |m| m.max(end)));
    }
    overlaps
}

impl Source for BagSource {
    fn initialize(&mut self) -> BoxFuture<'_, Result<Initialization>> {
        Box::pin(async move {
            let path = self.resolve_path().await?;
            self.run(&path)?;
            let state = self.state()?;

            let start = state.start.unwrap_or(Time::ZERO);
            let end = state.end.unwrap_or(Time::ZERO);
            let topics = state
                .connections
                .values()
                .map(|c| Topic { name: c.channel.topic.clone(), schema_name: Some(c.schema_name.clone()) })
                .collect();

            Ok(Initialization {
                start,
                end,
                topics,
                datatypes: state.datatypes.clone(),
                profile: None,
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
            // Each topic is scanned independently in reverse from `args.time`
            // and only its first (i.e. latest) match is kept — per-topic
            // isolation so one noisy topic can't starve another's backfill.
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
        if let Some(path) = self.downloaded_path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_counter_ignores_strictly_increasing_chunks() {
        assert_eq!(count_overlapping_chunks(&[(0, 10), (10, 20), (20, 30)]), 0);
    }

    #[test]
    fn overlap_counter_flags_chunk_starting_before_running_max() {
        assert_eq!(count_overlapping_chunks(&[(0, 10), (5, 8), (20, 30)]), 1);
    }

    #[tokio::test]
    async fn stream_input_is_rejected_at_initialize() {
        let mut source = BagSource::new(BagInput::Stream);
        let err = source.initialize().await.unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedInput { .. }));
    }

    #[test]
    fn open_nonexistent_bag_file_is_not_readable() {
        let mut source = BagSource::new(BagInput::File(PathBuf::from("/nonexistent.bag")));
        let err = source.run(Path::new("/nonexistent.bag")).unwrap_err();
        assert!(matches!(err, EngineError::NotReadable { .. }));
    }
}
