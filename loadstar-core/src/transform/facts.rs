//! Fact assembly: surrogate-key lookup and measure derivation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{FactRow, RawTransaction};

/// A raw row that could not be turned into a fact, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionFailure {
    pub transaction_id: String,
    pub reason: String,
}

/// Output of fact assembly: resolved facts in input order, plus every row
/// that failed key resolution.
#[derive(Debug, Default)]
pub struct FactBatch {
    pub facts: Vec<FactRow>,
    pub unresolved: Vec<ResolutionFailure>,
}

impl FactBatch {
    /// True when the batch produced nothing but resolution failures.
    /// This is the only case where resolution failures escalate to an
    /// entity-level failure.
    pub fn all_unresolved(&self) -> bool {
        self.facts.is_empty() && !self.unresolved.is_empty()
    }
}

/// Assemble fact rows from raw transactions and resolved surrogate keys.
///
/// A row whose user or product reference has no surrogate key is excluded
/// and reported — the batch carries on. `computed_total` is derived as
/// quantity x unit price here, rounded to cents; any total supplied
/// upstream is ignored.
pub fn assemble_facts(
    rows: &[RawTransaction],
    user_keys: &HashMap<String, i64>,
    product_keys: &HashMap<String, i64>,
) -> FactBatch {
    let mut batch = FactBatch::default();

    for row in rows {
        let user_key = match user_keys.get(&row.user_ref) {
            Some(&k) => k,
            None => {
                batch.unresolved.push(ResolutionFailure {
                    transaction_id: row.transaction_id.clone(),
                    reason: format!("no dimension row for user_ref '{}'", row.user_ref),
                });
                continue;
            }
        };
        let product_key = match product_keys.get(&row.product_ref) {
            Some(&k) => k,
            None => {
                batch.unresolved.push(ResolutionFailure {
                    transaction_id: row.transaction_id.clone(),
                    reason: format!("no dimension row for product_ref '{}'", row.product_ref),
                });
                continue;
            }
        };

        let total = row.quantity as f64 * row.unit_price;
        batch.facts.push(FactRow {
            transaction_id: row.transaction_id.clone(),
            user_key,
            product_key,
            quantity: row.quantity,
            computed_total: (total * 100.0).round() / 100.0,
            occurred_at: row.occurred_at,
        });
    }

    batch
}
