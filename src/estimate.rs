// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! In-heap footprint estimation for decoded message values.
//!
//! Deliberately approximate: the number exists to bound playback memory
//! and drive cache eviction, not to account for every allocator byte.
//! Callers cache the first estimate per topic and reuse it for every later
//! message on that topic (see `source::mcap_unindexed` and `source::bag`).

use crate::core::value::Value;

const POINTER_TAGGED_SIZE: u32 = 4;
const SMALL_NUMBER_SIZE: u32 = 4;
const BOXED_NUMBER_SIZE: u32 = 12;
const STRING_BASE: u32 = 4 + 12;
const BYTES_BASE: u32 = 100;
const LIST_BASE: u32 = 4 + 24;
const STRUCT_BASE: u32 = 12;

/// Field count past which the dictionary-style overhead for an object
/// starts growing, matching V8's property-backing-store growth curve.
const STRUCT_OVERHEAD_GROWTH_THRESHOLD: usize = 1020;

/// Estimate the in-heap size, in bytes, of a decoded value.
pub fn estimate(value: &Value) -> u32 {
    match value {
        Value::Null | Value::Bool(_) => POINTER_TAGGED_SIZE,

        Value::Int8(_) | Value::Int16(_) | Value::Int32(_) | Value::UInt8(_) | Value::UInt16(_) => {
            SMALL_NUMBER_SIZE
        }

        Value::Int64(_) | Value::UInt32(_) | Value::UInt64(_) | Value::Float32(_) | Value::Float64(_)
        | Value::Timestamp(_) | Value::Duration(_) => BOXED_NUMBER_SIZE,

        Value::String(s) => {
            let len = s.len() as u32;
            STRING_BASE + 4 * len.div_ceil(4)
        }

        Value::Bytes(b) => BYTES_BASE + b.len() as u32,

        Value::Array(items) => {
            LIST_BASE + items.iter().map(estimate).sum::<u32>()
        }

        Value::Struct(fields) => {
            STRUCT_BASE + struct_overhead(fields.len()) + fields.values().map(estimate).sum::<u32>()
        }
    }
}

/// Approximate per-property dictionary overhead, growing once a struct's
/// field count passes the threshold where it would spill into a slower
/// backing representation.
fn struct_overhead(field_count: usize) -> u32 {
    const PER_FIELD: u32 = 12;
    if field_count <= STRUCT_OVERHEAD_GROWTH_THRESHOLD {
        field_count as u32 * PER_FIELD
    } else {
        let overflow = (field_count - STRUCT_OVERHEAD_GROWTH_THRESHOLD) as u32;
        STRUCT_OVERHEAD_GROWTH_THRESHOLD as u32 * PER_FIELD + overflow * (PER_FIELD + overflow.ilog2().max(1))
    }
}

/// A per-topic cache of a single estimate, populated on the first message
/// seen for that topic and reused thereafter.
#[derive(Debug, Default)]
pub struct TopicEstimateCache {
    estimates: std::collections::HashMap<String, u32>,
}

impl TopicEstimateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached estimate for `topic`, computing and storing it
    /// from `value` on first use.
    pub fn estimate_for(&mut self, topic: &str, value: &Value) -> u32 {
        if let Some(&cached) = self.estimates.get(topic) {
            return cached;
        }
        let computed = estimate(value);
        self.estimates.insert(topic.to_string(), computed);
        computed
    }
}
