// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! A random-access `read(offset, length) -> bytes` over a remote resource,
//! backed by one active HTTP connection, a bounded virtual cache, and a
//! connection scheduler that decides when to open, extend, or abandon that
//! connection.

use crate::cache::lru_buffer::VirtualLruBuffer;
use crate::core::error::{EngineError, Result};
use crate::range::{self, Range};
use crate::transport::http_reader::{HttpRangeReader, OpenInfo, RangeStream};
use bytes::Bytes;
use futures::StreamExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

const DEFAULT_BLOCK_SIZE: u64 = 100 * 1024 * 1024;
/// How far a drifting connection is allowed to lag before it is abandoned
/// in favor of a fresh one targeting the request directly.
const DRIFT_THRESHOLD: u64 = 5 * 1024 * 1024;
/// Two transport errors closer together than this, with no reconnection
/// callback configured, close the filelike.
const FATAL_ERROR_WINDOW: Duration = Duration::from_millis(100);

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Abstraction over the HTTP range reader so the scheduler can be exercised
/// against a synthetic in-memory source in tests.
pub trait RangeSource: Send + Sync + 'static {
    fn open(&self) -> BoxFuture<'_, Result<OpenInfo>>;
    fn fetch(&self, offset: u64, length: u64) -> BoxFuture<'_, Result<RangeStream>>;
}

impl RangeSource for HttpRangeReader {
    fn open(&self) -> BoxFuture<'_, Result<OpenInfo>> {
        Box::pin(self.open())
    }

    fn fetch(&self, offset: u64, length: u64) -> BoxFuture<'_, Result<RangeStream>> {
        Box::pin(self.fetch(offset, length))
    }
}

/// Invoked with `true` when a transport error is first observed and
/// retried, `false` when data next arrives successfully.
pub type ReconnectCallback = Arc<dyn Fn(bool) + Send + Sync>;

enum Command {
    Read { range: Range, respond: oneshot::Sender<Result<Bytes>> },
}

struct PendingRequest {
    range: Range,
    respond: oneshot::Sender<Result<Bytes>>,
}

struct ActiveConnection {
    remaining: Range,
    stream: RangeStream,
}

/// A cached, range-addressed view over a remote resource.
///
/// `read` enqueues a request and awaits its resolution by the background
/// scheduler task; at most one upstream connection is ever live, matching
/// the "cached filelike never has more than one active upstream
/// connection" invariant.
pub struct CachedFilelike {
    cmd_tx: mpsc::UnboundedSender<Command>,
    file_size: u64,
    cache_size: u64,
}

impl CachedFilelike {
    pub async fn open<S: RangeSource>(
        source: S,
        cache_size_bytes: u64,
        keep_reconnecting_callback: Option<ReconnectCallback>,
    ) -> Result<Self> {
        let info = source.open().await?;
        let file_size = info.size;

        let (block_size, num_blocks) = if cache_size_bytes >= file_size {
            (None, Some(1usize))
        } else {
            let blocks = cache_size_bytes.div_ceil(DEFAULT_BLOCK_SIZE) as usize + 2;
            (Some(DEFAULT_BLOCK_SIZE), Some(blocks))
        };
        let buffer = VirtualLruBuffer::new(file_size, block_size, num_blocks);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(driver_loop(
            source,
            buffer,
            cache_size_bytes,
            file_size,
            keep_reconnecting_callback,
            cmd_rx,
        ));

        Ok(CachedFilelike { cmd_tx, file_size, cache_size: cache_size_bytes })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub async fn read(&self, offset: u64, length: u64) -> Result<Bytes> {
        if length == 0 {
            return Ok(Bytes::new());
        }
        if length > self.cache_size {
            return Err(EngineError::RequestExceedsCache { requested: length, cache_size: self.cache_size });
        }
        if offset + length > self.file_size {
            return Err(EngineError::RangeExceedsFile { start: offset, end: offset + length, file_size: self.file_size });
        }

        let range = Range::new(offset, offset + length).expect("validated above");
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Read { range, respond: tx })
            .map_err(|_| EngineError::WorkerClosed)?;
        rx.await.map_err(|_| EngineError::WorkerClosed)?
    }
}

/// Decide whether a new upstream connection should be opened, and for
/// which range, given the oldest pending request (if any) and the current
/// connection's remaining range (if any).
fn decide_connection(
    oldest: Option<Range>,
    active_remaining: Option<Range>,
    downloaded: &[Range],
    last_resolved_end: Option<u64>,
    cache_size: u64,
    file_size: u64,
) -> Option<Range> {
    if let Some(r) = oldest {
        let missing = range::missing(r, downloaded);
        let Some(first_missing) = missing.first().copied() else {
            // Already fully resident; the scheduler's resolve pass should
            // have consumed this request before reaching here.
            return None;
        };

        let should_open = match active_remaining {
            None => true,
            Some(c) => !range::is_overlapping(c, first_missing) || c.start + DRIFT_THRESHOLD < first_missing.start,
        };
        if !should_open {
            return None;
        }

        let target = if cache_size >= file_size {
            Range::new(first_missing.start, file_size).ok()?
        } else if missing.last().map(|m| m.end) == Some(r.end) {
            Range::new(first_missing.start, (r.start + cache_size).min(file_size)).ok()?
        } else {
            first_missing
        };

        range::missing(target, downloaded).into_iter().next()
    } else if active_remaining.is_some() {
        None
    } else if cache_size >= file_size {
        let start = last_resolved_end.unwrap_or(0);
        let target = if start >= file_size {
            Range::new(0, file_size).ok()?
        } else {
            Range::new(start, file_size).ok()?
        };
        range::missing(target, downloaded).into_iter().next()
    } else if let Some(last_end) = last_resolved_end {
        if last_end >= file_size {
            return None;
        }
        let target = Range::new(last_end, (last_end + cache_size).min(file_size)).ok()?;
        range::missing(target, downloaded).into_iter().next()
    } else {
        None
    }
}

async fn driver_loop<S: RangeSource>(
    source: S,
    mut buffer: VirtualLruBuffer,
    cache_size: u64,
    file_size: u64,
    callback: Option<ReconnectCallback>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut queue: Vec<PendingRequest> = Vec::new();
    let mut active: Option<ActiveConnection> = None;
    let mut last_resolved_end: Option<u64> = None;
    let mut last_error_at: Option<Instant> = None;
    let mut fatal: Option<EngineError> = None;

    loop {
        if let Some(err) = fatal.take() {
            for req in queue.drain(..) {
                let _ = req.respond.send(Err(err.clone()));
            }
            // Keep draining incoming requests with the same fatal error so
            // callers get a prompt answer instead of hanging forever.
            while let Some(Command::Read { respond, .. }) = cmd_rx.recv().await {
                let _ = respond.send(Err(err.clone()));
            }
            return;
        }

        resolve_resident(&mut queue, &buffer, &mut last_resolved_end);

        {
            let downloaded = buffer.ranges_with_data();
            let oldest = queue.first().map(|r| r.range);
            let active_remaining = active.as_ref().map(|c| c.remaining);
            if let Some(target) = decide_connection(oldest, active_remaining, &downloaded, last_resolved_end, cache_size, file_size) {
                if let Some(conn) = active.take() {
                    conn.stream.destroy();
                }
                match source.fetch(target.start, target.len()).await {
                    Ok(stream) => active = Some(ActiveConnection { remaining: target, stream }),
                    Err(e) => {
                        handle_transport_error(e, &callback, &mut last_error_at, &mut fatal);
                    }
                }
            }
        }

        let next_chunk = async {
            match &mut active {
                Some(conn) => conn.stream.next().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Read { range, respond }) => queue.push(PendingRequest { range, respond }),
                    None => return,
                }
            }
            chunk = next_chunk => {
                match chunk {
                    Some(Ok(bytes)) => {
                        if let Some(conn) = &mut active {
                            buffer.copy_from(&bytes, conn.remaining.start);
                            conn.remaining.start += bytes.len() as u64;
                            if conn.remaining.start >= conn.remaining.end {
                                active.take().map(|c| c.stream.destroy());
                            }
                        }
                        if last_error_at.take().is_some() {
                            if let Some(cb) = &callback {
                                cb(false);
                            }
                        }
                        resolve_resident(&mut queue, &buffer, &mut last_resolved_end);
                    }
                    Some(Err(e)) => {
                        if let Some(conn) = active.take() {
                            conn.stream.destroy();
                        }
                        handle_transport_error(e, &callback, &mut last_error_at, &mut fatal);
                    }
                    None => {
                        // Stream ended before covering `remaining`: treat as
                        // a transport failure so the scheduler retries.
                        if let Some(conn) = active.take() {
                            conn.stream.destroy();
                            let e = EngineError::HttpNetwork {
                                url: String::new(),
                                message: "stream ended before range was fully delivered".to_string(),
                            };
                            handle_transport_error(e, &callback, &mut last_error_at, &mut fatal);
                        }
                    }
                }
            }
        }
    }
}

fn resolve_resident(queue: &mut Vec<PendingRequest>, buffer: &VirtualLruBuffer, last_resolved_end: &mut Option<u64>) {
    let mut i = 0;
    while i < queue.len() {
        let range = queue[i].range;
        if buffer.has_data(range.start, range.end) {
            let req = queue.remove(i);
            let bytes = buffer.slice(range.start, range.end).map(Bytes::from);
            *last_resolved_end = Some(range.end);
            let _ = req.respond.send(bytes);
        } else {
            i += 1;
        }
    }
}

fn handle_transport_error(
    e: EngineError,
    callback: &Option<ReconnectCallback>,
    last_error_at: &mut Option<Instant>,
    fatal: &mut Option<EngineError>,
) {
    let now = Instant::now();
    if let Some(cb) = callback {
        if last_error_at.is_none() {
            cb(true);
        }
        *last_error_at = Some(now);
        return;
    }

    match *last_error_at {
        Some(prev) if now.duration_since(prev) < FATAL_ERROR_WINDOW => {
            *fatal = Some(e);
        }
        _ => {
            *last_error_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: u64, end: u64) -> Range {
        Range::new(start, end).unwrap()
    }

    #[test]
    fn opens_connection_when_none_active_and_request_missing() {
        let decision = decide_connection(Some(r(0, 10)), None, &[], None, 100, 1000);
        assert_eq!(decision, Some(r(0, 10)));
    }

    #[test]
    fn reuses_connection_that_already_overlaps_missing_range() {
        let decision = decide_connection(Some(r(0, 10)), Some(r(0, 20)), &[], None, 100, 1000);
        assert_eq!(decision, None);
    }

    #[test]
    fn abandons_connection_that_has_drifted_past_threshold() {
        let active = r(20_000_000, 30_000_000);
        let decision = decide_connection(Some(r(0, 10)), Some(active), &[], None, 100, 1000);
        assert_eq!(decision, Some(r(0, 10)));
    }

    #[test]
    fn no_request_no_connection_and_cache_covers_file_schedules_readahead() {
        let decision = decide_connection(None, None, &[], Some(5), 1000, 1000);
        assert_eq!(decision, Some(r(5, 1000)));
    }

    #[test]
    fn no_request_and_cache_smaller_than_file_uses_cache_window() {
        let decision = decide_connection(None, None, &[], Some(10), 100, 1000);
        assert_eq!(decision, Some(r(10, 110)));
    }

    #[test]
    fn no_request_no_history_opens_nothing() {
        let decision = decide_connection(None, None, &[], None, 100, 1000);
        assert_eq!(decision, None);
    }
}
