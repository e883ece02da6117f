//! Star-schema rows: dimensions and facts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Fixed registration date used for synthesized user rows.
///
/// Placeholder rule: attributes are derived deterministically from the
/// natural key so that re-deriving a candidate always produces the same row.
const PLACEHOLDER_REGISTRATION: (i32, u32, u32) = (2025, 1, 1);

/// User dimension candidate keyed by the upstream user reference.
///
/// The surrogate key is assigned by the store on first insert and never
/// appears on the candidate itself; resolution reads it back after the
/// conflict-skip insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDimension {
    pub user_ref: String,
    pub name: String,
    pub email: String,
    pub registration_date: NaiveDate,
}

impl UserDimension {
    /// Build a placeholder candidate from the natural key alone.
    ///
    /// Rule: `User_<first 8 chars>`, `u_<first 8 chars>@example.com`, fixed
    /// registration date. Documented placeholder generation, not invented
    /// per-run data.
    pub fn placeholder(user_ref: &str) -> Self {
        let prefix: String = user_ref.chars().take(8).collect();
        let (y, m, d) = PLACEHOLDER_REGISTRATION;
        Self {
            user_ref: user_ref.to_string(),
            name: format!("User_{prefix}"),
            email: format!("u_{prefix}@example.com"),
            registration_date: NaiveDate::from_ymd_opt(y, m, d)
                .unwrap_or(NaiveDate::MIN),
        }
    }
}

/// Product dimension candidate keyed by the upstream product reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDimension {
    pub product_ref: String,
    pub name: String,
    pub category: String,
    pub unit_price: f64,
}

impl ProductDimension {
    /// Build a placeholder candidate from the natural key alone.
    ///
    /// Rule: `Prod_<first 8 chars>`, category `Category_A`, unit price 10.0.
    pub fn placeholder(product_ref: &str) -> Self {
        let prefix: String = product_ref.chars().take(8).collect();
        Self {
            product_ref: product_ref.to_string(),
            name: format!("Prod_{prefix}"),
            category: "Category_A".to_string(),
            unit_price: 10.0,
        }
    }
}

/// Fact row referencing dimensions by surrogate key.
///
/// Natural key: transaction_id. `computed_total` is always recomputed as
/// quantity x unit price at assembly time; an upstream-supplied total is
/// never trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRow {
    pub transaction_id: String,
    pub user_key: i64,
    pub product_key: i64,
    pub quantity: u32,
    pub computed_total: f64,
    pub occurred_at: DateTime<Utc>,
}
