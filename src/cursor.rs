// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! A pull cursor over a boxed message stream, with batching and a
//! single-slot stash so a caller can read up to a time bound without
//! losing the one item that crossed it.

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::core::model::IteratorResult;
use crate::core::time::Time;

fn time_of(item: &IteratorResult) -> Time {
    match item {
        IteratorResult::MessageEvent(event) => event.receive_time,
        IteratorResult::Problem(_) => Time::ZERO,
        IteratorResult::Stamp(time) => *time,
    }
}

/// Wraps an async message stream with cancellation and a one-item stash.
///
/// The stash exists because the underlying stream is single-pass: once
/// `read_until` pulls an item past its bound, that item still has to be
/// handed back on the *next* call rather than dropped.
pub struct MessageCursor {
    stream: BoxStream<'static, IteratorResult>,
    cancel: Option<CancellationToken>,
    stashed: Option<IteratorResult>,
    done: bool,
}

impl MessageCursor {
    pub fn new(stream: BoxStream<'static, IteratorResult>, cancel: Option<CancellationToken>) -> Self {
        MessageCursor { stream, cancel, stashed: None, done: false }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    async fn pull(&mut self) -> Option<IteratorResult> {
        if let Some(item) = self.stashed.take() {
            return Some(item);
        }
        if self.done || self.is_cancelled() {
            return None;
        }
        let next = self.stream.next().await;
        if next.is_none() {
            self.done = true;
        }
        next
    }

    /// Pulls one item, or `None` if cancelled or exhausted.
    pub async fn next(&mut self) -> Option<IteratorResult> {
        if self.is_cancelled() {
            return None;
        }
        self.pull().await
    }

    /// Pulls items until `duration_ms` have elapsed in message time past the
    /// first item, or a problem is hit, or the stream ends. A `Problem` as
    /// the very first item returns immediately (a batch can't be timed
    /// starting from an item with no meaningful timestamp).
    pub async fn next_batch(&mut self, duration_ms: u64) -> Vec<IteratorResult> {
        let mut batch = Vec::new();

        let Some(first) = self.next().await else { return batch };
        if matches!(first, IteratorResult::Problem(_)) {
            batch.push(first);
            return batch;
        }
        let cutoff = Time::from_nanos(time_of(&first).as_nanos().saturating_add((duration_ms as i64).saturating_mul(1_000_000)));
        batch.push(first);

        loop {
            let Some(item) = self.pull().await else { break };
            if matches!(item, IteratorResult::Problem(_)) {
                batch.push(item);
                break;
            }
            if time_of(&item) > cutoff {
                self.stashed = Some(item);
                break;
            }
            batch.push(item);
        }
        batch
    }

    /// Pulls items up to a time bound: messages and problems at or before
    /// `end`, stamps strictly before `end`. The first item exceeding the
    /// bound is stashed for the following call rather than discarded.
    pub async fn read_until(&mut self, end: Time) -> Vec<IteratorResult> {
        let mut batch = Vec::new();
        loop {
            let Some(item) = self.pull().await else { break };
            let within = match &item {
                IteratorResult::MessageEvent(e) => e.receive_time <= end,
                IteratorResult::Problem(_) => true,
                IteratorResult::Stamp(t) => *t < end,
            };
            if !within {
                self.stashed = Some(item);
                break;
            }
            batch.push(item);
        }
        batch
    }

    /// Best-effort resource release: cancels the underlying source (if a
    /// token was supplied) so any background work it's driving can stop.
    pub fn end(&mut self) {
        if let Some(token) = &self.cancel {
            token.cancel();
        }
        self.done = true;
    }
}
