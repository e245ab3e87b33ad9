// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Proxies a [`Source`] across a worker-isolation boundary: the source runs
//! on a dedicated background task, and every call from the foreground is a
//! message round trip over an `mpsc` channel. Cancellation crosses the
//! boundary as a [`CancellationToken`] passed alongside a call rather than
//! serialized into it, since the token itself is the cross-task primitive.
//!
//! [`WorkerIterableSource::get_message_cursor`] is the one call that isn't a
//! 1:1 proxy: the foreground pulls [`CURSOR_BATCH_MS`]-sized batches from
//! the worker and re-emits them one at a time through a local
//! [`MessageCursor`], so `next`/`read_until` semantics stay entirely local
//! after the batch lands.

use std::collections::{HashMap, VecDeque};

use futures::stream::BoxStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::core::error::{EngineError, Result};
use crate::core::model::{Initialization, IteratorResult, MessageEvent};
use crate::cursor::MessageCursor;
use crate::source::{BackfillArgs, MessageIteratorArgs, Source};

/// Batch window the foreground uses when draining a worker-backed cursor.
pub const CURSOR_BATCH_MS: u64 = 17;

type IteratorId = u64;

enum Command {
    Initialize(oneshot::Sender<Result<Initialization>>),
    CreateIterator { args: MessageIteratorArgs, respond: oneshot::Sender<Result<IteratorId>> },
    IteratorNext { id: IteratorId, respond: oneshot::Sender<Option<IteratorResult>> },
    CreateCursor { args: MessageIteratorArgs, abort: Option<CancellationToken>, respond: oneshot::Sender<Result<IteratorId>> },
    CursorNextBatch { id: IteratorId, duration_ms: u64, respond: oneshot::Sender<Vec<IteratorResult>> },
    Backfill { args: BackfillArgs, abort: Option<CancellationToken>, respond: oneshot::Sender<Result<Vec<MessageEvent>>> },
    Terminate,
}

/// Runs on the background task: owns the real source and every live
/// iterator/cursor it has handed out handles for.
struct WorkerState {
    source: Box<dyn Source>,
    iterators: HashMap<IteratorId, BoxStream<'static, IteratorResult>>,
    cursors: HashMap<IteratorId, MessageCursor>,
    next_id: IteratorId,
}

impl WorkerState {
    fn alloc_id(&mut self) -> IteratorId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Initialize(respond) => {
                    let result = self.source.initialize().await;
                    let _ = respond.send(result);
                }
                Command::CreateIterator { args, respond } => {
                    let result = self.source.message_iterator(args).map(|stream| {
                        let id = self.alloc_id();
                        self.iterators.insert(id, stream);
                        id
                    });
                    let _ = respond.send(result);
                }
                Command::IteratorNext { id, respond } => {
                    let item = match self.iterators.get_mut(&id) {
                        Some(stream) => {
                            use futures::StreamExt;
                            stream.next().await
                        }
                        None => None,
                    };
                    let _ = respond.send(item);
                }
                Command::CreateCursor { args, abort, respond } => {
                    let result = self.source.message_iterator(args).map(|stream| {
                        let id = self.alloc_id();
                        self.cursors.insert(id, MessageCursor::new(stream, abort));
                        id
                    });
                    let _ = respond.send(result);
                }
                Command::CursorNextBatch { id, duration_ms, respond } => {
                    let batch = match self.cursors.get_mut(&id) {
                        Some(cursor) => cursor.next_batch(duration_ms).await,
                        None => Vec::new(),
                    };
                    let _ = respond.send(batch);
                }
                Command::Backfill { args, abort, respond } => {
                    let result = if abort.as_ref().is_some_and(CancellationToken::is_cancelled) {
                        Err(EngineError::Cancelled)
                    } else {
                        self.source.backfill(args).await
                    };
                    let _ = respond.send(result);
                }
                Command::Terminate => {
                    self.source.terminate();
                    break;
                }
            }
        }
    }
}

/// Foreground handle to a source running behind a worker boundary.
pub struct WorkerIterableSource {
    command_tx: mpsc::UnboundedSender<Command>,
}

impl WorkerIterableSource {
    /// Spawns the background task owning `source` and returns a handle to it.
    pub fn spawn(source: Box<dyn Source>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = WorkerState { source, iterators: HashMap::new(), cursors: HashMap::new(), next_id: 0 };
        tokio::task::spawn(state.run(command_rx));
        WorkerIterableSource { command_tx }
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.command_tx.send(make(tx)).map_err(|_| EngineError::WorkerClosed)?;
        rx.await.map_err(|_| EngineError::WorkerClosed)
    }

    pub async fn initialize(&self) -> Result<Initialization> {
        self.call(Command::Initialize).await?
    }

    /// Each item pulled from the returned stream is its own round trip to
    /// the worker task.
    pub async fn message_iterator(&self, args: MessageIteratorArgs) -> Result<BoxStream<'static, IteratorResult>> {
        let id = self.call(|respond| Command::CreateIterator { args, respond }).await??;
        let command_tx = self.command_tx.clone();
        let stream = futures::stream::unfold((command_tx, id), move |(command_tx, id)| async move {
            let (tx, rx) = oneshot::channel();
            command_tx.send(Command::IteratorNext { id, respond: tx }).ok()?;
            let item = rx.await.ok().flatten()?;
            Some((item, (command_tx, id)))
        });
        Ok(Box::pin(stream))
    }

    /// Returns a locally-driven cursor backed by worker-side batches of
    /// [`CURSOR_BATCH_MS`] duration each. `next`/`read_until` on the result
    /// never cross the boundary themselves — only the batch fetch does.
    pub async fn get_message_cursor(&self, args: MessageIteratorArgs, abort: Option<CancellationToken>) -> Result<MessageCursor> {
        let id = self.call(|respond| Command::CreateCursor { args, abort: abort.clone(), respond }).await??;
        let command_tx = self.command_tx.clone();
        let stream = futures::stream::unfold(
            (command_tx, id, VecDeque::<IteratorResult>::new(), false),
            move |(command_tx, id, mut queue, mut finished)| async move {
                loop {
                    if let Some(item) = queue.pop_front() {
                        return Some((item, (command_tx, id, queue, finished)));
                    }
                    if finished {
                        return None;
                    }
                    let (tx, rx) = oneshot::channel();
                    command_tx.send(Command::CursorNextBatch { id, duration_ms: CURSOR_BATCH_MS, respond: tx }).ok()?;
                    let batch = rx.await.ok()?;
                    if batch.is_empty() {
                        finished = true;
                        continue;
                    }
                    queue.extend(batch);
                }
            },
        );
        Ok(MessageCursor::new(Box::pin(stream), abort))
    }

    pub async fn backfill(&self, args: BackfillArgs, abort: Option<CancellationToken>) -> Result<Vec<MessageEvent>> {
        self.call(|respond| Command::Backfill { args, abort, respond }).await?
    }

    pub fn terminate(&self) {
        let _ = self.command_tx.send(Command::Terminate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Initialization, MessageEvent};
    use crate::core::time::Time;
    use crate::core::value::Value;
    use crate::source::BoxFuture;
    use futures::stream;

    struct FakeSource {
        events: Vec<MessageEvent>,
    }

    impl Source for FakeSource {
        fn initialize(&mut self) -> BoxFuture<'_, Result<Initialization>> {
            Box::pin(async move {
                Ok(Initialization {
                    start: Time::ZERO,
                    end: Time::ZERO,
                    topics: Vec::new(),
                    datatypes: HashMap::new(),
                    profile: None,
                    publishers_by_topic: HashMap::new(),
                    topic_stats: HashMap::new(),
                })
            })
        }

        fn message_iterator(&self, _args: MessageIteratorArgs) -> Result<BoxStream<'static, IteratorResult>> {
            let items: Vec<IteratorResult> = self.events.clone().into_iter().map(IteratorResult::MessageEvent).collect();
            Ok(Box::pin(stream::iter(items)))
        }

        fn backfill(&self, _args: BackfillArgs) -> BoxFuture<'_, Result<Vec<MessageEvent>>> {
            Box::pin(async move { Ok(self.events.clone()) })
        }

        fn terminate(&mut self) {}
    }

    fn event(nanos: i64) -> MessageEvent {
        MessageEvent { topic: "t".to_string(), schema_name: None, receive_time: Time::from_nanos(nanos), publish_time: None, message: Value::Null, size_in_bytes: 0 }
    }

    #[tokio::test]
    async fn initialize_round_trips_through_the_worker() {
        let worker = WorkerIterableSource::spawn(Box::new(FakeSource { events: vec![] }));
        let init = worker.initialize().await.unwrap();
        assert!(init.topics.is_empty());
    }

    #[tokio::test]
    async fn message_iterator_proxies_every_item() {
        use futures::StreamExt;
        let worker = WorkerIterableSource::spawn(Box::new(FakeSource { events: vec![event(1), event(2)] }));
        let mut stream = worker.message_iterator(MessageIteratorArgs::default()).await.unwrap();
        assert_eq!(stream.next().await, Some(IteratorResult::MessageEvent(event(1))));
        assert_eq!(stream.next().await, Some(IteratorResult::MessageEvent(event(2))));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn backfill_round_trips_through_the_worker() {
        let worker = WorkerIterableSource::spawn(Box::new(FakeSource { events: vec![event(1)] }));
        let result = worker.backfill(BackfillArgs { topics: HashMap::new(), time: Time::ZERO }, None).await.unwrap();
        assert_eq!(result, vec![event(1)]);
    }

    #[tokio::test]
    async fn backfill_fails_cancelled_when_aborted_before_dispatch() {
        let worker = WorkerIterableSource::spawn(Box::new(FakeSource { events: vec![] }));
        let token = CancellationToken::new();
        token.cancel();
        let err = worker.backfill(BackfillArgs { topics: HashMap::new(), time: Time::ZERO }, Some(token)).await.unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[tokio::test]
    async fn cursor_drains_all_items_across_batch_boundaries() {
        let worker = WorkerIterableSource::spawn(Box::new(FakeSource { events: vec![event(1), event(2)] }));
        let mut cursor = worker.get_message_cursor(MessageIteratorArgs::default(), None).await.unwrap();
        assert_eq!(cursor.next().await, Some(IteratorResult::MessageEvent(event(1))));
        assert_eq!(cursor.next().await, Some(IteratorResult::MessageEvent(event(2))));
        assert_eq!(cursor.next().await, None);
    }
}
