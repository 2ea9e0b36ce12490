//! Rate windows: "N operations per `count` `unit`s".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Granularity of a rate window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[serde(alias = "nanosecond")]
    Nanoseconds,
    #[serde(alias = "microsecond")]
    Microseconds,
    #[serde(alias = "millisecond")]
    Milliseconds,
    #[serde(alias = "second")]
    Seconds,
    #[serde(alias = "minute")]
    Minutes,
    #[serde(alias = "hour")]
    Hours,
    #[serde(alias = "day")]
    Days,
}

impl TimeUnit {
    /// Length of one unit in nanoseconds.
    pub fn as_nanos(self) -> u128 {
        const NANOS_PER_SEC: u128 = 1_000_000_000;
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => NANOS_PER_SEC,
            TimeUnit::Minutes => 60 * NANOS_PER_SEC,
            TimeUnit::Hours => 3_600 * NANOS_PER_SEC,
            TimeUnit::Days => 86_400 * NANOS_PER_SEC,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        };
        f.write_str(s)
    }
}

/// The span of time a request limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateWindow {
    unit: TimeUnit,
    count: u32,
}

impl RateWindow {
    /// A window of `count` units. A zero count is rejected when a gate is built.
    pub fn new(unit: TimeUnit, count: u32) -> Self {
        Self { unit, count }
    }

    /// A window of exactly one unit.
    pub fn per(unit: TimeUnit) -> Self {
        Self::new(unit, 1)
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Window length in nanoseconds.
    pub fn as_nanos(&self) -> u128 {
        self.unit.as_nanos() * u128::from(self.count)
    }

    /// Window length, saturating at `u64::MAX` nanoseconds.
    pub fn duration(&self) -> Duration {
        Duration::from_nanos(clamp_u64(self.as_nanos()))
    }

    /// Period between single-permit refills for a pool of `capacity` permits.
    ///
    /// Floored to one nanosecond so the refill timer never gets a zero period.
    pub fn refill_interval(&self, capacity: usize) -> Duration {
        let capacity = (capacity as u128).max(1);
        let nanos = (self.as_nanos() / capacity).max(1);
        Duration::from_nanos(clamp_u64(nanos))
    }
}

impl fmt::Display for RateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.count, self.unit)
    }
}

/// Saturating `u128` to `u64` narrowing for nanosecond and millisecond counts.
#[inline]
pub(crate) fn clamp_u64(val: u128) -> u64 {
    val.min(u128::from(u64::MAX)) as u64
}
