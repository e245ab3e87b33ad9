// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! End-to-end tests driving a file through the factory, worker boundary,
//! and cursor exactly the way the CLI does — the components below this
//! (schema parsing, CDR decoding, chunk scanning) already have focused
//! unit tests next to their own code.

use std::collections::HashMap;
use std::io::Write;

use robostream::core::model::{IteratorResult, TopicSelectionEntry};
use robostream::factory::{ContainerKind, DataSourceInput, RemoteDataSourceFactory};
use robostream::source::MessageIteratorArgs;

const OP_SCHEMA: u8 = 0x03;
const OP_CHANNEL: u8 = 0x04;
const OP_MESSAGE: u8 = 0x05;
const OP_FOOTER: u8 = 0x02;
const MCAP_MAGIC: [u8; 8] = [0x89, 0x4D, 0x43, 0x41, 0x50, 0x30, 0x0D, 0x0A];

fn record(op: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![op];
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

fn string_field(s: &str) -> Vec<u8> {
    let mut out = (s.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(s.as_bytes());
    out
}

/// Builds a minimal, structurally valid one-channel MCAP file with the
/// given `(topic, log_time_nanos)` messages, all sharing one empty-body
/// schema so the channel parses and decodes to an empty struct.
fn build_minimal_mcap(messages: &[(&str, u64)]) -> Vec<u8> {
    let mut out = MCAP_MAGIC.to_vec();

    let mut schema_payload = 1u16.to_le_bytes().to_vec();
    schema_payload.extend_from_slice(&string_field("test/Empty"));
    schema_payload.extend_from_slice(&string_field("ros2msg"));
    schema_payload.extend_from_slice(&0u32.to_le_bytes());
    out.extend(record(OP_SCHEMA, &schema_payload));

    let topic = messages.first().map(|m| m.0).unwrap_or("/a");
    let mut channel_payload = 1u16.to_le_bytes().to_vec();
    channel_payload.extend_from_slice(&1u16.to_le_bytes());
    channel_payload.extend_from_slice(&string_field(topic));
    channel_payload.extend_from_slice(&string_field("cdr"));
    channel_payload.extend_from_slice(&0u32.to_le_bytes());
    out.extend(record(OP_CHANNEL, &channel_payload));

    for (_, log_time) in messages {
        let mut message_payload = 1u16.to_le_bytes().to_vec();
        message_payload.extend_from_slice(&0u32.to_le_bytes());
        message_payload.extend_from_slice(&log_time.to_le_bytes());
        message_payload.extend_from_slice(&log_time.to_le_bytes());
        out.extend(record(OP_MESSAGE, &message_payload));
    }

    out.extend(record(OP_FOOTER, &[0u8; 20]));
    out
}

fn write_temp_mcap(name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(bytes).unwrap();
    path
}

fn topic_selection(names: &[&str]) -> HashMap<String, TopicSelectionEntry> {
    names.iter().map(|n| (n.to_string(), TopicSelectionEntry { topic: n.to_string(), preload: None })).collect()
}

#[tokio::test]
async fn factory_drives_an_mcap_file_through_the_worker_boundary() {
    let path = write_temp_mcap("robostream-pipeline-test.mcap", &build_minimal_mcap(&[("/a", 1), ("/a", 3), ("/a", 2)]));

    let factory = RemoteDataSourceFactory::new();
    let worker = factory.initialize(DataSourceInput::File(path.clone()), Some(ContainerKind::Mcap));

    let init = worker.initialize().await.unwrap();
    assert_eq!(init.topics.len(), 1);
    assert_eq!(init.topic_stats.get("/a").unwrap().num_messages, 3);

    let mut stream = worker.message_iterator(MessageIteratorArgs { topics: topic_selection(&["/a"]), start: None, end: None, reverse: false }).await.unwrap();

    use futures::StreamExt;
    let mut receive_times = Vec::new();
    while let Some(item) = stream.next().await {
        if let IteratorResult::MessageEvent(event) = item {
            receive_times.push(event.receive_time.as_nanos());
        }
    }
    assert_eq!(receive_times, vec![1, 2, 3]);

    worker.terminate();
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn cursor_read_until_stops_at_the_requested_bound_and_resumes_after() {
    let path = write_temp_mcap("robostream-pipeline-test-cursor.mcap", &build_minimal_mcap(&[("/a", 10), ("/a", 20), ("/a", 30)]));

    let factory = RemoteDataSourceFactory::new();
    let worker = factory.initialize(DataSourceInput::File(path.clone()), Some(ContainerKind::Mcap));
    worker.initialize().await.unwrap();

    let mut cursor = worker
        .get_message_cursor(MessageIteratorArgs { topics: topic_selection(&["/a"]), start: None, end: None, reverse: false }, None)
        .await
        .unwrap();

    let first_batch = cursor.read_until(robostream::core::time::Time::from_nanos(20)).await;
    assert_eq!(first_batch.len(), 2);

    let rest = cursor.read_until(robostream::core::time::Time::from_nanos(100)).await;
    assert_eq!(rest.len(), 1);

    cursor.end();
    worker.terminate();
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn missing_file_surfaces_as_a_failed_initialize_rather_than_a_panic() {
    let factory = RemoteDataSourceFactory::new();
    let worker = factory.initialize(DataSourceInput::File("/nonexistent/drive.mcap".into()), None);
    assert!(worker.initialize().await.is_err());
}
