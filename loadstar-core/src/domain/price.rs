//! Price observations — the raw and derived market data units.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Daily OHLCV observation for a single entity on a single date.
///
/// Natural key: (entity_id, date). At most one observation exists per key;
/// values may be retroactively corrected by upserting the same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObservation {
    pub entity_id: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceObservation {
    /// Returns true if any price field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Basic OHLC sanity check: high >= low, high bounds open/close, positive prices.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}

/// Derived row persisted to the analyzed table.
///
/// Natural key: (entity_id, date). Carries one trailing-average value per
/// configured window, in window order; every value is defined (the
/// data-quality filter excludes partially-defined rows before they reach
/// the writer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedObservation {
    pub entity_id: String,
    pub date: NaiveDate,
    pub close: f64,
    pub averages: Vec<f64>,
    pub load_timestamp: DateTime<Utc>,
}
