//! Trailing-window indicator computation.
//!
//! Indicators are pure functions over an ascending-by-date observation
//! sequence. The `precompute` entry point re-sorts its input defensively
//! (upstream fetch order is not guaranteed) and evaluates every configured
//! window over the same sorted sequence, one value series per window.
//!
//! Undefined values are NaN: a window of size W produces its first defined
//! value at index W-1, and no value before that. Windows count observations,
//! not calendar days — gaps in the date sequence get no special handling.

pub mod trailing;

pub use trailing::TrailingAverage;

use crate::domain::PriceObservation;

/// A single-series indicator evaluated over an ascending-by-date sequence.
pub trait Indicator {
    /// Series name, e.g. `sma_50`.
    fn name(&self) -> &str;

    /// Number of leading observations with no defined value.
    fn lookback(&self) -> usize;

    /// Compute one value per observation; NaN where undefined.
    ///
    /// Input must already be sorted ascending by date (see [`precompute`]).
    fn compute(&self, observations: &[PriceObservation]) -> Vec<f64>;
}

/// Return a copy of the observations sorted ascending by date.
pub fn sorted_by_date(observations: &[PriceObservation]) -> Vec<PriceObservation> {
    let mut sorted = observations.to_vec();
    sorted.sort_by(|a, b| a.date.cmp(&b.date));
    sorted
}

/// Evaluate a trailing average for every window over one sorted pass.
///
/// Returns the sorted observation sequence alongside one value series per
/// window (in window order), each aligned index-for-index with the sorted
/// sequence.
pub fn precompute(
    observations: &[PriceObservation],
    windows: &[usize],
) -> (Vec<PriceObservation>, Vec<Vec<f64>>) {
    let sorted = sorted_by_date(observations);
    let series = windows
        .iter()
        .map(|&w| TrailingAverage::new(w).compute(&sorted))
        .collect();
    (sorted, series)
}

/// One window over a defensively re-sorted series.
///
/// Value at index i is defined iff i >= window-1 and equals the mean of
/// the closes over [i-window+1, i]; NaN otherwise.
pub fn trailing_average(observations: &[PriceObservation], window: usize) -> Vec<f64> {
    let (_, mut series) = precompute(observations, &[window]);
    series.pop().unwrap_or_default()
}

/// Create synthetic observations from close prices for testing.
///
/// Generates plausible OHLV: open = prev close (or close for the first
/// observation), high/low bracket open and close, volume = 1000.
#[cfg(test)]
pub fn make_observations(closes: &[f64]) -> Vec<PriceObservation> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceObservation {
                entity_id: "TEST".to_string(),
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precompute_resorts_unordered_input() {
        let mut obs = make_observations(&[10.0, 11.0, 12.0, 13.0]);
        obs.reverse();

        let (sorted, series) = precompute(&obs, &[2]);

        assert_eq!(sorted[0].close, 10.0);
        assert_eq!(sorted[3].close, 13.0);
        assert!(series[0][0].is_nan());
        assert_approx(series[0][1], 10.5, DEFAULT_EPSILON);
        assert_approx(series[0][3], 12.5, DEFAULT_EPSILON);
    }

    #[test]
    fn trailing_average_single_window() {
        let mut obs = make_observations(&[12.0, 10.0, 14.0]);
        obs.reverse(); // unordered on purpose
        let values = trailing_average(&obs, 3);
        assert!(values[0].is_nan());
        assert!(values[1].is_nan());
        assert_approx(values[2], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn precompute_one_series_per_window() {
        let obs = make_observations(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let (_, series) = precompute(&obs, &[2, 3, 5]);
        assert_eq!(series.len(), 3);
        for s in &series {
            assert_eq!(s.len(), 5);
        }
        // Final values: mean of the trailing 2, 3, and 5 closes.
        assert_approx(series[0][4], 13.5, DEFAULT_EPSILON);
        assert_approx(series[1][4], 13.0, DEFAULT_EPSILON);
        assert_approx(series[2][4], 12.0, DEFAULT_EPSILON);
    }
}
