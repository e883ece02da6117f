//! Price feed collaborators.
//!
//! The `PriceFeed` trait is the extraction boundary: implementations
//! supply ordered daily observations per entity and date range. The
//! in-repo implementation is deterministic synthetic data; a networked
//! provider would implement the same trait elsewhere.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use loadstar_core::domain::PriceObservation;
use loadstar_core::store::Store;

/// Errors from a price feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed unavailable: {0}")]
    Unavailable(String),

    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

/// A source of raw price observations for one entity over a date range.
pub trait PriceFeed {
    /// Human-readable name of this feed.
    fn name(&self) -> &str;

    /// Fetch daily observations for `entity_id` in `[start, end]`.
    fn fetch(
        &self,
        entity_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceObservation>, FeedError>;
}

/// Deterministic synthetic feed: a seeded random walk per entity.
///
/// The seed is derived from the entity id alone, so the same entity and
/// date range always produce the same series. Weekends are skipped.
pub struct SyntheticFeed {
    start_price: f64,
}

impl SyntheticFeed {
    pub fn new() -> Self {
        Self { start_price: 100.0 }
    }
}

impl Default for SyntheticFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceFeed for SyntheticFeed {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        entity_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceObservation>, FeedError> {
        if start > end {
            return Err(FeedError::InvalidRange { start, end });
        }

        let seed: [u8; 32] = *blake3::hash(entity_id.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let mut observations = Vec::new();
        let mut price = self.start_price;
        let mut current = start;

        while current <= end {
            if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                current += chrono::Duration::days(1);
                continue;
            }

            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            let open = price;
            let close = price * (1.0 + daily_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(500_000..5_000_000u64);

            observations.push(PriceObservation {
                entity_id: entity_id.to_string(),
                date: current,
                open,
                high,
                low,
                close,
                volume,
            });

            price = close;
            current += chrono::Duration::days(1);
        }

        Ok(observations)
    }
}

/// Outcome of staging raw prices for a set of entities.
#[derive(Debug, Default)]
pub struct FetchSummary {
    pub rows_loaded: usize,
    pub errors: Vec<(String, String)>,
}

impl FetchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Fetch every entity from the feed and upsert into the raw price table.
///
/// One entity's failure (feed or store) is recorded and the rest continue;
/// re-fetching an overlapping range corrects rows in place via upsert.
pub fn fetch_and_store(
    feed: &dyn PriceFeed,
    store: &mut Store,
    entities: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> FetchSummary {
    let mut summary = FetchSummary::default();

    for entity_id in entities {
        log::info!("fetching {entity_id} from {start} to {end} via {}", feed.name());
        let observations = match feed.fetch(entity_id, start, end) {
            Ok(obs) => obs,
            Err(e) => {
                log::warn!("fetch failed for {entity_id}: {e}");
                summary.errors.push((entity_id.clone(), e.to_string()));
                continue;
            }
        };
        match store.upsert_prices(&observations) {
            Ok(applied) => {
                log::info!("staged {applied} observations for {entity_id}");
                summary.rows_loaded += applied;
            }
            Err(e) => {
                log::warn!("staging failed for {entity_id}: {e}");
                summary.errors.push((entity_id.clone(), e.to_string()));
            }
        }
    }

    summary
}
