//! Synthetic transaction interchange generation.
//!
//! Produces the JSON interchange file the ingester consumes: master data
//! (users, products) first, then transactions referencing it. Records
//! deliberately carry an upstream `total_amount`; the fact assembler
//! recomputes totals and ignores it, and tests rely on that.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// One flat record in the interchange file (JSON array or CSV rows).
///
/// `timestamp` stays a string here: the ingester owns parsing and rejects
/// records it cannot interpret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub price: f64,
    #[serde(default)]
    pub total_amount: Option<f64>,
    pub timestamp: String,
}

/// Knobs for the generator.
#[derive(Debug, Clone, Copy)]
pub struct GenSettings {
    pub transactions: usize,
    pub users: usize,
    pub products: usize,
    pub seed: u64,
}

impl Default for GenSettings {
    fn default() -> Self {
        Self {
            transactions: 100,
            users: 50,
            products: 20,
            seed: 7,
        }
    }
}

/// Deterministic pseudo-identifier: hash of (seed, kind, index).
fn make_id(seed: u64, kind: &str, index: usize) -> String {
    let text = format!("{seed}:{kind}:{index}");
    let hash = blake3::hash(text.as_bytes()).to_hex();
    format!("{kind}-{}", &hash.as_str()[..12])
}

/// Generate interchange records: `users` x `products` master data, then
/// `transactions` records referencing random pairs of it.
///
/// Fully deterministic for a given settings value. Timestamps walk forward
/// from a fixed base instant, one per record.
pub fn generate_records(settings: &GenSettings) -> Vec<TransactionRecord> {
    let mut rng = StdRng::seed_from_u64(settings.seed);

    let user_ids: Vec<String> = (0..settings.users.max(1))
        .map(|i| make_id(settings.seed, "user", i))
        .collect();
    let product_ids: Vec<String> = (0..settings.products.max(1))
        .map(|i| make_id(settings.seed, "prod", i))
        .collect();
    let product_prices: Vec<f64> = product_ids
        .iter()
        .map(|_| (rng.gen_range(5.0..500.0f64) * 100.0).round() / 100.0)
        .collect();

    let base: DateTime<Utc> = Utc
        .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    (0..settings.transactions)
        .map(|i| {
            let user = rng.gen_range(0..user_ids.len());
            let product = rng.gen_range(0..product_ids.len());
            let quantity = rng.gen_range(1..=5u32);
            let price = product_prices[product];
            let total = (quantity as f64 * price * 100.0).round() / 100.0;
            TransactionRecord {
                transaction_id: make_id(settings.seed, "txn", i),
                user_id: user_ids[user].clone(),
                product_id: product_ids[product].clone(),
                quantity,
                price,
                total_amount: Some(total),
                timestamp: (base + chrono::Duration::seconds(i as i64 * 36)).to_rfc3339(),
            }
        })
        .collect()
}

/// Write records as a pretty-printed JSON array.
pub fn write_json(records: &[TransactionRecord], path: &Path) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, records)?;
    Ok(())
}
