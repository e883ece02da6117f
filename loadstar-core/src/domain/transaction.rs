//! Raw transaction records from the ingest stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A flat transactional record staged for warehouse loading.
///
/// Natural key: transaction_id (globally unique). Immutable once ingested;
/// re-ingesting a known transaction_id is a no-op, never an error.
/// Quantity and unit price are validated positive at ingest time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    pub transaction_id: String,
    pub user_ref: String,
    pub product_ref: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub occurred_at: DateTime<Utc>,
}
