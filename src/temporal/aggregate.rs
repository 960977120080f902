//! Time-weighted aggregation over irregular time series
//!
//! All statistics treat a series as a piecewise-linear curve rather than a
//! bag of equally-weighted samples: averages integrate trapezoids, and
//! extrema consider the linearly interpolated value at a window boundary
//! that falls between two samples, not just the nearest real sample.
//!
//! Precondition: timestamps are strictly increasing. The functions here do
//! not validate that; violating it gives undefined (but non-panicking)
//! numeric results. See `series_is_ordered` for the opt-in check.

use chrono::{DateTime, Duration, Utc};

use crate::temporal::math::{standard_deviation as sd, LinearRegression};
use crate::temporal::types::{TimedValue, Window};

/// One consecutive-sample segment clipped to the window, with boundary
/// values interpolated where the window cuts through it
#[derive(Debug, Clone, Copy)]
struct Segment {
    start_value: f64,
    start_time: DateTime<Utc>,
    end_value: f64,
    end_time: DateTime<Utc>,
}

impl Segment {
    fn duration_millis(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64
    }

    /// Trapezoid area under the segment, in value-milliseconds
    fn area(&self) -> f64 {
        (self.start_value + self.end_value) / 2.0 * self.duration_millis()
    }
}

fn linear_interpolate(
    v1: f64,
    v2: f64,
    t1: DateTime<Utc>,
    t2: DateTime<Utc>,
    at: DateTime<Utc>,
) -> f64 {
    let millis = (t2 - t1).num_milliseconds() as f64;
    if millis == 0.0 {
        return (v1 + v2) / 2.0;
    }
    let gradient = (v2 - v1) / millis;
    v1 + gradient * (at - t1).num_milliseconds() as f64
}

/// Clip the piecewise-linear curve through `series` to `window`
fn clipped_segments<'a, F>(
    series: &'a [TimedValue],
    window: Window,
    value: F,
) -> impl Iterator<Item = Segment> + 'a
where
    F: Fn(&TimedValue) -> f64 + 'a,
{
    series.windows(2).filter_map(move |pair| {
        let (previous, current) = (&pair[0], &pair[1]);
        if current.timestamp < window.start || previous.timestamp > window.end {
            return None;
        }

        let v1 = value(previous);
        let v2 = value(current);
        let mut segment = Segment {
            start_value: v1,
            start_time: previous.timestamp,
            end_value: v2,
            end_time: current.timestamp,
        };

        if previous.timestamp <= window.start {
            segment.start_value =
                linear_interpolate(v1, v2, previous.timestamp, current.timestamp, window.start);
            segment.start_time = window.start;
        }
        if current.timestamp > window.end {
            segment.end_value =
                linear_interpolate(v1, v2, previous.timestamp, current.timestamp, window.end);
            segment.end_time = window.end;
        }

        Some(segment)
    })
}

/// Time-weighted average: the trapezoidal integral of the interpolated
/// curve divided by the covered time. Returns `default` when the series
/// does not overlap the window.
pub fn average(series: &[TimedValue], window: Window, default: f64) -> f64 {
    let mut integral = 0.0;
    let mut total_millis = 0.0;
    let mut last_value = None;

    for segment in clipped_segments(series, window, TimedValue::numeric_value) {
        integral += segment.area();
        total_millis += segment.duration_millis();
        last_value = Some(segment.end_value);
    }

    match last_value {
        None => default,
        // A degenerate window still lands on a point value
        Some(value) if total_millis == 0.0 => value,
        _ => integral / total_millis,
    }
}

/// Boolean duty cycle: the fraction of the window during which the value
/// is true, integrating the 0/1 curve over the full window length
pub fn average_true(series: &[TimedValue], window: Window, default: f64) -> f64 {
    let mut integral = 0.0;
    let mut overlapped = false;

    for segment in clipped_segments(series, window, TimedValue::numeric_value) {
        integral += segment.area();
        overlapped = true;
    }

    if !overlapped || window.duration_millis() == 0.0 {
        return default;
    }
    integral / window.duration_millis()
}

/// Minimum over the window, widening the search to the interpolated value
/// at each boundary that cuts between two samples
pub fn min(series: &[TimedValue], window: Window, default: f64) -> f64 {
    let mut result: Option<f64> = None;
    for segment in clipped_segments(series, window, TimedValue::numeric_value) {
        let low = segment.start_value.min(segment.end_value);
        result = Some(result.map_or(low, |r: f64| r.min(low)));
    }
    result.unwrap_or(default)
}

/// Maximum over the window, boundary-interpolated like [`min`]
pub fn max(series: &[TimedValue], window: Window, default: f64) -> f64 {
    let mut result: Option<f64> = None;
    for segment in clipped_segments(series, window, TimedValue::numeric_value) {
        let high = segment.start_value.max(segment.end_value);
        result = Some(result.map_or(high, |r: f64| r.max(high)));
    }
    result.unwrap_or(default)
}

/// Change across the window: last interpolated value minus first
pub fn delta(series: &[TimedValue], window: Window) -> f64 {
    let mut first = None;
    let mut last = 0.0;
    for segment in clipped_segments(series, window, TimedValue::numeric_value) {
        if first.is_none() {
            first = Some(segment.start_value);
        }
        last = segment.end_value;
    }
    match first {
        Some(first) => last - first,
        None => 0.0,
    }
}

/// Slope of the least-squares line through the interpolated curve, per day
pub fn slope(series: &[TimedValue], window: Window) -> f64 {
    const MILLIS_PER_DAY: f64 = 86_400_000.0;

    let mut points: Vec<(f64, f64)> = Vec::new();
    let mut origin: Option<DateTime<Utc>> = None;
    for segment in clipped_segments(series, window, TimedValue::numeric_value) {
        let origin = *origin.get_or_insert(segment.start_time);
        if points.is_empty() {
            points.push((0.0, segment.start_value));
        }
        points.push((
            (segment.end_time - origin).num_milliseconds() as f64 / MILLIS_PER_DAY,
            segment.end_value,
        ));
    }

    LinearRegression::fit(points).map_or(0.0, |fit| fit.slope)
}

/// Forecast the value `period` past the last sample by extrapolating a
/// least-squares fit over the whole series
pub fn forecast(series: &[TimedValue], period: Duration) -> f64 {
    let Some(last) = series.last() else {
        return f64::NAN;
    };
    if series.len() == 1 {
        return last.numeric_value();
    }

    let origin = series[0].timestamp;
    let points = series.iter().map(|point| {
        (
            (point.timestamp - origin).num_milliseconds() as f64,
            point.numeric_value(),
        )
    });
    match LinearRegression::fit(points) {
        Some(fit) => {
            let at = (last.timestamp + period - origin).num_milliseconds() as f64;
            fit.extrapolate(at)
        }
        None => last.numeric_value(),
    }
}

/// Standard deviation of the raw sample values (not time-weighted)
pub fn standard_deviation(series: &[TimedValue]) -> f64 {
    sd(series.iter().map(TimedValue::numeric_value))
}

/// Count of false-to-true transitions of a boolean series inside the
/// window; the value held before the window seeds the edge detector
pub fn count_leading_edges(series: &[TimedValue], window: Window) -> f64 {
    let mut count = 0u32;
    let mut current = false;

    for point in series {
        let value = point.numeric_value() > 0.0;
        if point.timestamp < window.start {
            current = value;
            continue;
        }
        if point.timestamp > window.end {
            break;
        }
        if value {
            if !current {
                count += 1;
            }
            current = true;
        } else {
            current = false;
        }
    }

    count as f64
}

/// Total time within the window during which the interpolated curve is
/// above zero
pub fn duration_above_zero(series: &[TimedValue], window: Window) -> Duration {
    let mut total = Duration::zero();
    for segment in clipped_segments(series, window, TimedValue::numeric_value) {
        if segment.start_value > 0.0 || segment.end_value > 0.0 {
            total = total + (segment.end_time - segment.start_time);
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: f64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + (seconds * 1000.0) as i64)
            .unwrap()
    }

    fn numeric(points: &[(f64, f64)]) -> Vec<TimedValue> {
        points
            .iter()
            .map(|&(s, v)| TimedValue::numeric(at(s), v))
            .collect()
    }

    #[test]
    fn test_trapezoidal_average_full_window() {
        let series = numeric(&[(0.0, 5.0), (1.0, 15.0), (2.0, 10.0)]);
        let result = average(&series, Window::new(at(0.0), at(2.0)), f64::NAN);
        assert!((result - 11.25).abs() < 1e-9, "got {}", result);
    }

    #[test]
    fn test_trapezoidal_average_cut_between_samples() {
        let series = numeric(&[(0.0, 5.0), (1.0, 15.0), (2.0, 10.0)]);
        let result = average(&series, Window::new(at(0.5), at(1.5)), f64::NAN);
        assert!((result - 13.125).abs() < 1e-9, "got {}", result);
    }

    #[test]
    fn test_average_no_overlap_returns_default() {
        let series = numeric(&[(0.0, 5.0), (1.0, 15.0)]);
        let result = average(&series, Window::new(at(100.0), at(200.0)), -1.0);
        assert_eq!(result, -1.0);
        assert_eq!(average(&[], Window::new(at(0.0), at(1.0)), -1.0), -1.0);
    }

    #[test]
    fn test_boolean_duty_cycle() {
        let series = vec![
            TimedValue::boolean(at(0.0), false),
            TimedValue::boolean(at(1.0), true),
            TimedValue::boolean(at(2.0), false),
        ];
        let result = average_true(&series, Window::new(at(0.5), at(1.5)), f64::NAN);
        assert!((result - 0.75).abs() < 1e-9, "got {}", result);
    }

    #[test]
    fn test_min_uses_interpolated_boundary() {
        let series = numeric(&[(0.0, 1.0), (10.0, 20.0), (20.0, 19.0)]);
        let result = min(&series, Window::new(at(5.0), at(30.0)), f64::NAN);
        assert!((result - 10.5).abs() < 1e-9, "got {}", result);
    }

    #[test]
    fn test_max_uses_interpolated_boundary() {
        let series = numeric(&[(0.0, 100.0), (10.0, 20.0), (20.0, 19.0)]);
        let result = max(&series, Window::new(at(5.0), at(30.0)), f64::NAN);
        assert!((result - 60.0).abs() < 1e-9, "got {}", result);
    }

    #[test]
    fn test_min_max_default_when_empty() {
        assert_eq!(min(&[], Window::new(at(0.0), at(1.0)), 42.0), 42.0);
        assert_eq!(max(&[], Window::new(at(0.0), at(1.0)), 42.0), 42.0);
    }

    #[test]
    fn test_delta_interpolates_both_ends() {
        let series = numeric(&[(0.0, 0.0), (10.0, 10.0)]);
        let result = delta(&series, Window::new(at(2.0), at(8.0)));
        assert!((result - 6.0).abs() < 1e-9, "got {}", result);
    }

    #[test]
    fn test_slope_of_linear_series() {
        // 1 unit per second = 86400 units per day
        let series = numeric(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        let result = slope(&series, Window::new(at(0.0), at(2.0)));
        assert!((result - 86_400.0).abs() < 1e-3, "got {}", result);
    }

    #[test]
    fn test_forecast_extrapolates() {
        let series = numeric(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        let result = forecast(&series, Duration::seconds(3));
        assert!((result - 5.0).abs() < 1e-9, "got {}", result);

        assert!(forecast(&[], Duration::seconds(1)).is_nan());
        let single = numeric(&[(0.0, 7.0)]);
        assert_eq!(forecast(&single, Duration::seconds(1)), 7.0);
    }

    #[test]
    fn test_standard_deviation_of_series() {
        let series = numeric(&[(0.0, 2.0), (1.0, 4.0), (2.0, 4.0), (3.0, 4.0),
                               (4.0, 5.0), (5.0, 5.0), (6.0, 7.0), (7.0, 9.0)]);
        assert!((standard_deviation(&series) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_count_leading_edges() {
        let series = vec![
            TimedValue::boolean(at(-1.0), true),
            TimedValue::boolean(at(1.0), false),
            TimedValue::boolean(at(2.0), true),
            TimedValue::boolean(at(3.0), true),
            TimedValue::boolean(at(4.0), false),
            TimedValue::boolean(at(5.0), true),
        ];
        // The point before the window seeds the detector as true, so only
        // the rises at t=2 and t=5 count
        let result = count_leading_edges(&series, Window::new(at(0.0), at(10.0)));
        assert_eq!(result, 2.0);
    }

    #[test]
    fn test_duration_above_zero() {
        let series = numeric(&[(0.0, 1.0), (10.0, 1.0), (20.0, 0.0), (30.0, 0.0)]);
        let result = duration_above_zero(&series, Window::new(at(0.0), at(30.0)));
        assert_eq!(result, Duration::seconds(20));
    }
}
