//! Core types for the temporal layer
//!
//! - `TimedValue`: a single sample in an irregular time series
//! - `Window`: a half-open time interval for aggregation
//!
//! A time series is an ordered slice of `TimedValue` whose timestamps are
//! strictly increasing. Producing ordered series is the caller's job; the
//! aggregator assumes the invariant and does not check it (see
//! [`series_is_ordered`] and the `check_monotonic` configuration switch).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single time-series sample
///
/// Boolean points keep their flag alongside a 0/1 numeric projection so
/// numeric and boolean series flow through the same aggregation code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedValue {
    /// Sample timestamp
    pub timestamp: DateTime<Utc>,
    /// Numeric value (0/1 for boolean points)
    pub value: f64,
    /// Set when the point is boolean
    #[serde(default)]
    pub bool_value: Option<bool>,
    /// Validity flag; invalid points carry a value that should not be
    /// trusted by downstream consumers
    #[serde(default = "default_ok")]
    pub ok: bool,
}

fn default_ok() -> bool {
    true
}

impl TimedValue {
    /// A numeric sample
    pub fn numeric(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            bool_value: None,
            ok: true,
        }
    }

    /// A boolean sample
    pub fn boolean(timestamp: DateTime<Utc>, value: bool) -> Self {
        Self {
            timestamp,
            value: if value { 1.0 } else { 0.0 },
            bool_value: Some(value),
            ok: true,
        }
    }

    /// Builder method: mark the point invalid
    pub fn invalid(mut self) -> Self {
        self.ok = false;
        self
    }

    /// The value used for interpolation: booleans project to 0/1
    pub fn numeric_value(&self) -> f64 {
        match self.bool_value {
            Some(true) => 1.0,
            Some(false) => 0.0,
            None => self.value,
        }
    }
}

/// Half-open aggregation window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Start timestamp (inclusive)
    pub start: DateTime<Utc>,
    /// End timestamp (exclusive)
    pub end: DateTime<Utc>,
}

impl Window {
    /// Create a window; `start` must not be after `end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start <= end, "Window: start must not be after end");
        Self { start, end }
    }

    /// The trailing window of `duration` ending at `end`
    pub fn trailing(end: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            start: end - duration,
            end,
        }
    }

    /// Check whether a timestamp falls within this window
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Window length
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Window length in milliseconds
    pub fn duration_millis(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64
    }
}

/// Check the strictly-ascending-timestamp invariant of a series
///
/// The aggregator itself never calls this; callers opt in through
/// `TemporalConfig::check_monotonic`.
pub fn series_is_ordered(series: &[TimedValue]) -> bool {
    series
        .windows(2)
        .all(|pair| pair[0].timestamp < pair[1].timestamp)
}
