//! Trailing average (simple moving average).
//!
//! Rolling mean of close values over a lookback window.
//! Lookback: window - 1 (first defined value at index window-1).

use crate::domain::PriceObservation;
use crate::indicators::Indicator;

#[derive(Debug, Clone)]
pub struct TrailingAverage {
    window: usize,
    name: String,
}

impl TrailingAverage {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "trailing average window must be >= 1");
        Self {
            window,
            name: format!("sma_{window}"),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Indicator for TrailingAverage {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window.saturating_sub(1)
    }

    fn compute(&self, observations: &[PriceObservation]) -> Vec<f64> {
        let n = observations.len();
        let mut result = vec![f64::NAN; n];

        if n < self.window {
            return result;
        }

        // Initial window sum
        let mut sum = 0.0;
        for obs in observations.iter().take(self.window) {
            sum += obs.close;
        }
        result[self.window - 1] = sum / self.window as f64;

        // Roll the window forward
        for i in self.window..n {
            sum = sum - observations[i - self.window].close + observations[i].close;
            result[i] = sum / self.window as f64;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_observations, DEFAULT_EPSILON};

    #[test]
    fn trailing_5_basic() {
        let obs = make_observations(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
        let sma = TrailingAverage::new(5);
        let result = sma.compute(&obs);

        assert_eq!(result.len(), 7);
        for i in 0..4 {
            assert!(result[i].is_nan(), "expected NaN at index {i}");
        }
        // mean(10..14) = 12.0
        assert_approx(result[4], 12.0, DEFAULT_EPSILON);
        // mean(11..15) = 13.0
        assert_approx(result[5], 13.0, DEFAULT_EPSILON);
        // mean(12..16) = 14.0
        assert_approx(result[6], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn trailing_1_is_close() {
        let obs = make_observations(&[100.0, 200.0, 300.0]);
        let sma = TrailingAverage::new(1);
        let result = sma.compute(&obs);
        assert_approx(result[0], 100.0, DEFAULT_EPSILON);
        assert_approx(result[1], 200.0, DEFAULT_EPSILON);
        assert_approx(result[2], 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn trailing_lookback() {
        assert_eq!(TrailingAverage::new(20).lookback(), 19);
        assert_eq!(TrailingAverage::new(1).lookback(), 0);
    }

    #[test]
    fn window_larger_than_series_yields_no_values() {
        let obs = make_observations(&[10.0, 11.0]);
        let sma = TrailingAverage::new(5);
        let result = sma.compute(&obs);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn defined_count_matches_window_arithmetic() {
        // N = 210, W = 50 -> exactly N - W + 1 = 161 defined values.
        let closes: Vec<f64> = (0..210).map(|i| 100.0 + i as f64).collect();
        let obs = make_observations(&closes);
        let result = TrailingAverage::new(50).compute(&obs);
        let defined = result.iter().filter(|v| !v.is_nan()).count();
        assert_eq!(defined, 161);

        let result200 = TrailingAverage::new(200).compute(&obs);
        let defined200 = result200.iter().filter(|v| !v.is_nan()).count();
        assert_eq!(defined200, 11);
    }
}
