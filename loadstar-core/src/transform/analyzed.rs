//! Analyzed-row construction with the data-quality filter.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::domain::{AnalyzedObservation, PriceObservation};
use crate::indicators::precompute;

/// Data-shape errors raised while transforming a single entity's series.
///
/// These fail the entity's Transform stage; they never abort the whole run.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("no indicator windows configured")]
    NoWindows,

    #[error("indicator window must be positive")]
    ZeroWindow,

    #[error("non-finite close for '{entity_id}' on {date}")]
    NonFiniteClose { entity_id: String, date: NaiveDate },

    #[error("duplicate observation for '{entity_id}' on {date}")]
    DuplicateObservation { entity_id: String, date: NaiveDate },
}

/// Compute trailing averages over one entity's series and keep only rows
/// where every configured window is defined.
///
/// The input is re-sorted ascending by date before computation. Rows whose
/// window values are still undefined (fewer than `window` prior
/// observations) are excluded from the output — never emitted with NULLs —
/// so the writer only ever sees fully-populated rows.
pub fn analyze_prices(
    observations: &[PriceObservation],
    windows: &[usize],
    load_timestamp: DateTime<Utc>,
) -> Result<Vec<AnalyzedObservation>, TransformError> {
    if windows.is_empty() {
        return Err(TransformError::NoWindows);
    }
    if windows.contains(&0) {
        return Err(TransformError::ZeroWindow);
    }

    for obs in observations {
        if !obs.close.is_finite() {
            return Err(TransformError::NonFiniteClose {
                entity_id: obs.entity_id.clone(),
                date: obs.date,
            });
        }
    }

    let (sorted, series) = precompute(observations, windows);

    for pair in sorted.windows(2) {
        if pair[0].date == pair[1].date {
            return Err(TransformError::DuplicateObservation {
                entity_id: pair[0].entity_id.clone(),
                date: pair[0].date,
            });
        }
    }

    let rows = sorted
        .iter()
        .enumerate()
        .filter_map(|(i, obs)| {
            let averages: Vec<f64> = series.iter().map(|s| s[i]).collect();
            if averages.iter().any(|v| v.is_nan()) {
                return None;
            }
            Some(AnalyzedObservation {
                entity_id: obs.entity_id.clone(),
                date: obs.date,
                close: obs.close,
                averages,
                load_timestamp,
            })
        })
        .collect();

    Ok(rows)
}
