//! Dimension resolution: batch dedup, candidate synthesis, surrogate keys.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::{ProductDimension, RawTransaction, UserDimension};
use crate::store::{Store, StoreError};

/// What to do with a natural key the extraction stage supplied no
/// descriptive attributes for (the staging table is flat, so that is every
/// key not already present in a dimension).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingDimensionPolicy {
    /// Insert a placeholder row derived from the natural key
    /// (see [`UserDimension::placeholder`] / [`ProductDimension::placeholder`]).
    Synthesize,
    /// Insert nothing; the affected transactions surface as resolution
    /// failures during fact assembly.
    Reject,
}

/// Surrogate keys for every natural key seen in the batch, plus how many
/// dimension rows this resolution newly created.
#[derive(Debug, Default)]
pub struct ResolvedKeys {
    pub users: HashMap<String, i64>,
    pub products: HashMap<String, i64>,
    pub new_users: usize,
    pub new_products: usize,
}

/// Distinct natural keys in first-seen order.
fn distinct<'a>(refs: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for r in refs {
        if seen.insert(r) {
            out.push(r.to_string());
        }
    }
    out
}

/// Resolve user and product dimensions for a batch of raw transactions.
///
/// Deduplicates natural keys within the batch before any store round-trip,
/// inserts candidates with skip-on-conflict (a concurrent or prior insert
/// of the same key is not an error), then reads surrogate keys back for
/// every key seen — including ones that already existed. Under
/// [`MissingDimensionPolicy::Reject`] no candidates are inserted and only
/// pre-existing keys resolve.
pub fn resolve_dimensions(
    store: &mut Store,
    rows: &[RawTransaction],
    policy: MissingDimensionPolicy,
) -> Result<ResolvedKeys, StoreError> {
    let user_refs = distinct(rows.iter().map(|r| r.user_ref.as_str()));
    let product_refs = distinct(rows.iter().map(|r| r.product_ref.as_str()));

    let mut resolved = ResolvedKeys::default();

    if policy == MissingDimensionPolicy::Synthesize {
        let users: Vec<UserDimension> = user_refs
            .iter()
            .map(|r| UserDimension::placeholder(r))
            .collect();
        let products: Vec<ProductDimension> = product_refs
            .iter()
            .map(|r| ProductDimension::placeholder(r))
            .collect();
        resolved.new_users = store.insert_users_if_absent(&users)?;
        resolved.new_products = store.insert_products_if_absent(&products)?;
        if resolved.new_users > 0 || resolved.new_products > 0 {
            log::info!(
                "dimensions: {} new users, {} new products",
                resolved.new_users,
                resolved.new_products
            );
        }
    }

    resolved.users = store.user_keys(&user_refs)?;
    resolved.products = store.product_keys(&product_refs)?;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn tx(id: &str, user: &str, product: &str) -> RawTransaction {
        RawTransaction {
            transaction_id: id.to_string(),
            user_ref: user.to_string(),
            product_ref: product.to_string(),
            quantity: 1,
            unit_price: 2.0,
            occurred_at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
        }
    }

    fn test_store() -> Store {
        let store = Store::open_in_memory(&[50, 200]).unwrap();
        store.init_schema().unwrap();
        store
    }

    #[test]
    fn shared_refs_resolve_to_a_single_dimension_row() {
        let mut store = test_store();
        let rows = vec![tx("t1", "u1", "P1"), tx("t2", "u2", "P1")];

        let resolved =
            resolve_dimensions(&mut store, &rows, MissingDimensionPolicy::Synthesize).unwrap();

        assert_eq!(resolved.new_users, 2);
        assert_eq!(resolved.new_products, 1);
        assert_eq!(resolved.products.len(), 1);
        // Both transactions see the same surrogate key.
        assert!(resolved.products.contains_key("P1"));
    }

    #[test]
    fn resolution_is_stable_across_batches() {
        let mut store = test_store();
        let first =
            resolve_dimensions(&mut store, &[tx("t1", "u1", "p1")], MissingDimensionPolicy::Synthesize)
                .unwrap();
        let second =
            resolve_dimensions(&mut store, &[tx("t9", "u1", "p1")], MissingDimensionPolicy::Synthesize)
                .unwrap();

        assert_eq!(first.users["u1"], second.users["u1"]);
        assert_eq!(first.products["p1"], second.products["p1"]);
        assert_eq!(second.new_users, 0);
        assert_eq!(second.new_products, 0);
    }

    #[test]
    fn existing_keys_resolve_even_when_nothing_is_inserted() {
        let mut store = test_store();
        resolve_dimensions(&mut store, &[tx("t1", "u1", "p1")], MissingDimensionPolicy::Synthesize)
            .unwrap();

        let rows = vec![tx("t2", "u1", "p1"), tx("t3", "u2", "p2")];
        let resolved =
            resolve_dimensions(&mut store, &rows, MissingDimensionPolicy::Reject).unwrap();

        assert_eq!(resolved.users.len(), 1);
        assert_eq!(resolved.products.len(), 1);
        assert!(!resolved.users.contains_key("u2"));
        assert_eq!(resolved.new_users, 0);
    }

    #[test]
    fn policy_serde_names() {
        assert_eq!(
            serde_json::to_string(&MissingDimensionPolicy::Synthesize).unwrap(),
            "\"synthesize\""
        );
        let p: MissingDimensionPolicy = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(p, MissingDimensionPolicy::Reject);
    }
}
