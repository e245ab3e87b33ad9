// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The polymorphic source layer: normalizes MCAP and ROS1 bag containers
//! into one message stream with topic/time filtering and backfill.
//!
//! [`mcap_unindexed`] and [`bag`] hold the two container-specific readers;
//! [`mcap_facade`] picks a concrete MCAP strategy (indexed vs. unindexed)
//! behind one stable interface. Every source implements [`Source`].

pub mod bag;
pub mod mcap_facade;
pub mod mcap_unindexed;

use std::future::Future;
use std::pin::Pin;

use futures::stream::BoxStream;

use crate::core::error::Result;
use crate::core::model::{Initialization, IteratorResult, MessageEvent, TopicSelection};
use crate::core::time::Time;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Arguments to [`Source::message_iterator`].
#[derive(Debug, Clone, Default)]
pub struct MessageIteratorArgs {
    pub topics: TopicSelection,
    pub start: Option<Time>,
    pub end: Option<Time>,
    pub reverse: bool,
}

/// Arguments to [`Source::backfill`].
#[derive(Debug, Clone)]
pub struct BackfillArgs {
    pub topics: TopicSelection,
    pub time: Time,
}

/// A container-agnostic message source.
///
/// Mirrors the lifecycle described for the worker boundary: `initialize`
/// exactly once, then any number of `message_iterator`/`backfill` calls,
/// then `terminate`. Both implementations in this crate (`mcap_unindexed`,
/// `bag`) build their entire event set during `initialize` and serve
/// `message_iterator`/`backfill` out of that in-memory set, so neither
/// needs to be polled lazily — the stream they return is already fully
/// formed, just gated behind `initialize` having run.
pub trait Source: Send + Sync {
    fn initialize(&mut self) -> BoxFuture<'_, Result<Initialization>>;

    fn message_iterator(&self, args: MessageIteratorArgs) -> Result<BoxStream<'static, IteratorResult>>;

    fn backfill(&self, args: BackfillArgs) -> BoxFuture<'_, Result<Vec<MessageEvent>>>;

    fn terminate(&mut self);
}

/// Sorts `events` by `receive_time`, reversing afterward when `reverse` is
/// set, matching invariant 1: forward iteration is non-decreasing, reverse
/// is non-increasing. The sort itself is stable, so ties keep insertion
/// order for `reverse = false`; under `reverse = true` the trailing
/// `.reverse()` also reverses relative order among tied elements.
pub(crate) fn sort_events(mut events: Vec<MessageEvent>, reverse: bool) -> Vec<MessageEvent> {
    events.sort_by(|a, b| a.receive_time.cmp(&b.receive_time));
    if reverse {
        events.reverse();
    }
    events
}

/// `true` if `topic` was requested — an empty selection always yields `false`.
pub(crate) fn topic_selected(topics: &TopicSelection, topic: &str) -> bool {
    topics.contains_key(topic)
}

/// `true` if `time` falls in the inclusive `[start, end]` window, treating a
/// missing bound as unconstrained on that side.
pub(crate) fn within_window(time: Time, start: Option<Time>, end: Option<Time>) -> bool {
    let after_start = match start {
        Some(s) => time >= s,
        None => true,
    };
    let before_end = match end {
        Some(e) => time <= e,
        None => true,
    };
    after_start && before_end
}
