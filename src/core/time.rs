// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Wall-clock timestamp type shared by every component that orders messages.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// A point in time as seconds + nanoseconds since the Unix epoch.
///
/// Distinct from `std::time::Duration`/`SystemTime` because messages carry
/// signed, possibly-pre-epoch log timestamps (recorded clocks can be wrong),
/// and because the wire formats this crate decodes (ROS time/duration) are
/// naturally `(i64, u32)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Time {
    pub secs: i64,
    pub nanos: u32,
}

impl Time {
    pub const ZERO: Time = Time { secs: 0, nanos: 0 };

    /// Construct from seconds and nanoseconds, normalizing nanosecond overflow.
    pub fn new(secs: i64, nanos: u32) -> Self {
        let extra_secs = (nanos / NANOS_PER_SEC) as i64;
        Time {
            secs: secs.saturating_add(extra_secs),
            nanos: nanos % NANOS_PER_SEC,
        }
    }

    /// Construct from a single nanosecond count since the epoch.
    pub fn from_nanos(total_nanos: i64) -> Self {
        let secs = total_nanos.div_euclid(NANOS_PER_SEC as i64);
        let nanos = total_nanos.rem_euclid(NANOS_PER_SEC as i64) as u32;
        Time { secs, nanos }
    }

    /// Total nanoseconds since the epoch, saturating on overflow.
    pub fn as_nanos(&self) -> i64 {
        self.secs
            .saturating_mul(NANOS_PER_SEC as i64)
            .saturating_add(self.nanos as i64)
    }

    pub fn checked_add_nanos(&self, delta: i64) -> Option<Time> {
        self.as_nanos().checked_add(delta).map(Time::from_nanos)
    }

    pub fn saturating_add_millis(&self, millis: u64) -> Time {
        Time::from_nanos(self.as_nanos().saturating_add(millis as i64 * 1_000_000))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.secs, self.nanos).cmp(&(other.secs, other.nanos))
    }
}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_nanosecond_overflow_into_seconds() {
        let t = Time::new(1, 1_500_000_000);
        assert_eq!(t.secs, 2);
        assert_eq!(t.nanos, 500_000_000);
    }

    #[test]
    fn ordering_compares_seconds_then_nanos() {
        let a = Time::new(1, 0);
        let b = Time::new(1, 1);
        let c = Time::new(2, 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn from_nanos_round_trips() {
        let t = Time::from_nanos(1_234_567_890_123);
        assert_eq!(t.as_nanos(), 1_234_567_890_123);
    }

    #[test]
    fn from_nanos_handles_negative_values() {
        let t = Time::from_nanos(-1_500_000_000);
        assert_eq!(t.secs, -2);
        assert_eq!(t.nanos, 500_000_000);
    }
}
