//! Temporal Aggregation
//!
//! Time-weighted statistics over ordered, irregular time series:
//!
//! - **types**: `TimedValue` samples and half-open `Window`s
//! - **aggregate**: trapezoidal averages, duty cycles, interpolated
//!   min/max, delta, slope, forecast
//! - **math**: regression and deviation helpers
//!
//! Boundary handling is the point of this module: a window edge that
//! falls between two samples is resolved by linear interpolation, both
//! for integration and for the extremum search.
//!
//! # Example
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use twinscript::temporal::{average, TimedValue, Window};
//!
//! let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
//! let series = vec![
//!     TimedValue::numeric(t0, 5.0),
//!     TimedValue::numeric(t0 + Duration::seconds(1), 15.0),
//!     TimedValue::numeric(t0 + Duration::seconds(2), 10.0),
//! ];
//! let window = Window::new(t0, t0 + Duration::seconds(2));
//! assert_eq!(average(&series, window, f64::NAN), 11.25);
//! ```

pub mod aggregate;
pub mod math;
pub mod types;

pub use aggregate::{
    average, average_true, count_leading_edges, delta, duration_above_zero, forecast, max, min,
    slope, standard_deviation,
};
pub use math::{standard_deviation as values_standard_deviation, LinearRegression};
pub use types::{series_is_ordered, TimedValue, Window};
