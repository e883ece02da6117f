//! SQL definitions for the warehouse schema.
//!
//! One canonical schema: a raw price staging table, a per-window analyzed
//! table, a raw transaction staging table, two dimension tables with
//! store-assigned surrogate keys, and one fact table. All DDL is
//! `IF NOT EXISTS` so schema initialization is idempotent.
//!
//! The analyzed table carries one `sma_<window>` column per configured
//! window, so its DDL and DML are generated from the window set rather than
//! fixed here.

/// DDL: raw price staging table. Natural key (entity_id, date).
pub const CREATE_RAW_PRICES: &str = "\
CREATE TABLE IF NOT EXISTS raw_prices (
    entity_id  TEXT NOT NULL,
    date       TEXT NOT NULL,
    open       REAL NOT NULL,
    high       REAL NOT NULL,
    low        REAL NOT NULL,
    close      REAL NOT NULL,
    volume     INTEGER NOT NULL,
    PRIMARY KEY (entity_id, date)
)";

/// DDL: raw transaction staging table. Natural key transaction_id.
pub const CREATE_RAW_TRANSACTIONS: &str = "\
CREATE TABLE IF NOT EXISTS raw_transactions (
    transaction_id  TEXT PRIMARY KEY,
    user_ref        TEXT NOT NULL,
    product_ref     TEXT NOT NULL,
    quantity        INTEGER NOT NULL CHECK (quantity > 0),
    unit_price      REAL NOT NULL CHECK (unit_price > 0.0),
    occurred_at     TEXT NOT NULL
)";

/// DDL: user dimension. AUTOINCREMENT keeps surrogate keys from ever being
/// reused, even after deletes by external tooling.
pub const CREATE_DIM_USERS: &str = "\
CREATE TABLE IF NOT EXISTS dim_users (
    user_key           INTEGER PRIMARY KEY AUTOINCREMENT,
    user_ref           TEXT NOT NULL UNIQUE,
    name               TEXT NOT NULL,
    email              TEXT NOT NULL,
    registration_date  TEXT NOT NULL
)";

/// DDL: product dimension.
pub const CREATE_DIM_PRODUCTS: &str = "\
CREATE TABLE IF NOT EXISTS dim_products (
    product_key  INTEGER PRIMARY KEY AUTOINCREMENT,
    product_ref  TEXT NOT NULL UNIQUE,
    name         TEXT NOT NULL,
    category     TEXT NOT NULL,
    unit_price   REAL NOT NULL
)";

/// DDL: order fact table. Natural key transaction_id.
pub const CREATE_FACT_ORDERS: &str = "\
CREATE TABLE IF NOT EXISTS fact_orders (
    transaction_id  TEXT PRIMARY KEY,
    user_key        INTEGER NOT NULL,
    product_key     INTEGER NOT NULL,
    quantity        INTEGER NOT NULL CHECK (quantity > 0),
    computed_total  REAL NOT NULL,
    occurred_at     TEXT NOT NULL
)";

/// DML: last-write-wins upsert of a raw price observation.
pub const UPSERT_RAW_PRICE: &str = "\
INSERT INTO raw_prices (entity_id, date, open, high, low, close, volume)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT (entity_id, date) DO UPDATE SET
    open = excluded.open,
    high = excluded.high,
    low = excluded.low,
    close = excluded.close,
    volume = excluded.volume";

/// DML: conflict-skip insert of a raw transaction (duplicate id = no-op).
pub const INSERT_RAW_TRANSACTION: &str = "\
INSERT INTO raw_transactions (transaction_id, user_ref, product_ref, quantity, unit_price, occurred_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT (transaction_id) DO NOTHING";

/// DML: conflict-skip insert of a user dimension candidate. An existing
/// row keeps its attributes and its surrogate key.
pub const INSERT_DIM_USER: &str = "\
INSERT INTO dim_users (user_ref, name, email, registration_date)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (user_ref) DO NOTHING";

/// DML: conflict-skip insert of a product dimension candidate.
pub const INSERT_DIM_PRODUCT: &str = "\
INSERT INTO dim_products (product_ref, name, category, unit_price)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (product_ref) DO NOTHING";

/// DML: last-write-wins upsert of a fact row.
pub const UPSERT_FACT_ORDER: &str = "\
INSERT INTO fact_orders (transaction_id, user_key, product_key, quantity, computed_total, occurred_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT (transaction_id) DO UPDATE SET
    user_key = excluded.user_key,
    product_key = excluded.product_key,
    quantity = excluded.quantity,
    computed_total = excluded.computed_total,
    occurred_at = excluded.occurred_at";

/// Query: one entity's raw prices in ascending date order (ISO dates sort
/// lexicographically).
pub const SELECT_PRICES_FOR_ENTITY: &str = "\
SELECT entity_id, date, open, high, low, close, volume
FROM raw_prices WHERE entity_id = ?1 ORDER BY date ASC";

/// Query: all staged transactions in occurrence order.
pub const SELECT_ALL_TRANSACTIONS: &str = "\
SELECT transaction_id, user_ref, product_ref, quantity, unit_price, occurred_at
FROM raw_transactions ORDER BY occurred_at ASC, transaction_id ASC";

/// Query: surrogate key for one user natural key.
pub const SELECT_USER_KEY: &str = "SELECT user_key FROM dim_users WHERE user_ref = ?1";

/// Query: surrogate key for one product natural key.
pub const SELECT_PRODUCT_KEY: &str = "SELECT product_key FROM dim_products WHERE product_ref = ?1";

/// Column name for one window's trailing average.
pub fn sma_column(window: usize) -> String {
    format!("sma_{window}")
}

/// DDL for the analyzed table, one average column per configured window.
pub fn create_analyzed_table(windows: &[usize]) -> String {
    let columns: String = windows
        .iter()
        .map(|&w| format!("    {}  REAL NOT NULL,\n", sma_column(w)))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS analyzed_prices (\n\
         \x20   entity_id       TEXT NOT NULL,\n\
         \x20   date            TEXT NOT NULL,\n\
         \x20   close           REAL NOT NULL,\n\
         {columns}\
         \x20   load_timestamp  TEXT NOT NULL,\n\
         \x20   PRIMARY KEY (entity_id, date)\n\
         )"
    )
}

/// DML: last-write-wins upsert of an analyzed row for the given window set.
pub fn upsert_analyzed(windows: &[usize]) -> String {
    let sma_cols: Vec<String> = windows.iter().map(|&w| sma_column(w)).collect();
    let columns = sma_cols.join(", ");
    let placeholders: Vec<String> = (0..windows.len()).map(|i| format!("?{}", i + 4)).collect();
    let updates: Vec<String> = sma_cols
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    format!(
        "INSERT INTO analyzed_prices (entity_id, date, close, {columns}, load_timestamp)\n\
         VALUES (?1, ?2, ?3, {}, ?{})\n\
         ON CONFLICT (entity_id, date) DO UPDATE SET\n\
         \x20   close = excluded.close,\n\
         \x20   {},\n\
         \x20   load_timestamp = excluded.load_timestamp",
        placeholders.join(", "),
        windows.len() + 4,
        updates.join(",\n    "),
    )
}

/// Query: one entity's analyzed rows in ascending date order.
pub fn select_analyzed(windows: &[usize]) -> String {
    let sma_cols: Vec<String> = windows.iter().map(|&w| sma_column(w)).collect();
    format!(
        "SELECT entity_id, date, close, {}, load_timestamp\n\
         FROM analyzed_prices WHERE entity_id = ?1 ORDER BY date ASC",
        sma_cols.join(", ")
    )
}
