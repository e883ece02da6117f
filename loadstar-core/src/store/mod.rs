//! SQLite-backed warehouse store — the idempotent writer.
//!
//! Every batch method applies its rows inside a single transaction: either
//! all rows of the batch are durably applied, or none are. Upserts are
//! last-write-wins on every non-key column; conflict-skip inserts leave the
//! existing row (and its surrogate key) untouched. Counts returned are rows
//! actually applied, so a conflict-skip insert of known rows returns 0.
//!
//! One connection, one writer: the coordinator serializes entity batches.
//! WAL mode keeps concurrent readers (a dashboard) unblocked during writes.

pub mod schema;

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, ToSql, Transaction};
use thiserror::Error;

use crate::domain::{
    AnalyzedObservation, FactRow, PriceObservation, ProductDimension, RawTransaction,
    UserDimension,
};

/// Store-level failures, split so callers can tell transient conditions
/// (retry-worthy, entity-batch scoped) from real SQL errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened or reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The database is locked by another writer.
    #[error("store busy: {0}")]
    Busy(String),

    /// A row did not match the configured table layout.
    #[error("row shape mismatch: {0}")]
    RowShape(String),

    /// Any other SQL-level failure.
    #[error("sql error: {0}")]
    Sql(rusqlite::Error),
}

impl StoreError {
    /// True for conditions the scheduler may retry at the run level.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Busy(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(
                    err.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) =>
            {
                StoreError::Busy(e.to_string())
            }
            rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::CannotOpen => {
                StoreError::Unavailable(e.to_string())
            }
            _ => StoreError::Sql(e),
        }
    }
}

/// Handle over the warehouse database.
///
/// The analyzed-table layout depends on the configured window set, so the
/// store is opened with it and keeps it for DDL/DML generation.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
    windows: Vec<usize>,
}

impl Store {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path, windows: &[usize]) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        // Readers keep querying while a batch commits.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn,
            windows: windows.to_vec(),
        })
    }

    /// Open a private in-memory database (tests, dry runs).
    pub fn open_in_memory(windows: &[usize]) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            windows: windows.to_vec(),
        })
    }

    /// Window set this store's analyzed table is laid out for.
    pub fn windows(&self) -> &[usize] {
        &self.windows
    }

    /// Create every warehouse table. Idempotent.
    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute(schema::CREATE_RAW_PRICES, [])?;
        self.conn
            .execute(&schema::create_analyzed_table(&self.windows), [])?;
        self.conn.execute(schema::CREATE_RAW_TRANSACTIONS, [])?;
        self.conn.execute(schema::CREATE_DIM_USERS, [])?;
        self.conn.execute(schema::CREATE_DIM_PRODUCTS, [])?;
        self.conn.execute(schema::CREATE_FACT_ORDERS, [])?;
        log::debug!("warehouse schema initialized");
        Ok(())
    }

    /// Run `f` inside one transaction; commit on success, roll back on error.
    fn in_transaction<T>(
        &mut self,
        f: impl FnOnce(&Transaction) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let tx = self.conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    // ── Prices ───────────────────────────────────────────────────────

    /// Upsert a batch of raw price observations. Returns rows applied.
    pub fn upsert_prices(&mut self, rows: &[PriceObservation]) -> Result<usize, StoreError> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare_cached(schema::UPSERT_RAW_PRICE)?;
            let mut applied = 0;
            for row in rows {
                applied += stmt.execute(params![
                    row.entity_id,
                    row.date,
                    row.open,
                    row.high,
                    row.low,
                    row.close,
                    row.volume as i64,
                ])?;
            }
            Ok(applied)
        })
    }

    /// One entity's raw prices, ascending by date.
    pub fn load_prices(&self, entity_id: &str) -> Result<Vec<PriceObservation>, StoreError> {
        let mut stmt = self.conn.prepare_cached(schema::SELECT_PRICES_FOR_ENTITY)?;
        let rows = stmt.query_map([entity_id], |row| {
            Ok(PriceObservation {
                entity_id: row.get(0)?,
                date: row.get(1)?,
                open: row.get(2)?,
                high: row.get(3)?,
                low: row.get(4)?,
                close: row.get(5)?,
                volume: row.get::<_, i64>(6)? as u64,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Analyzed rows ────────────────────────────────────────────────

    /// Upsert a batch of analyzed rows. Returns rows applied.
    ///
    /// Every row must carry exactly one average per configured window; the
    /// transform stage's data-quality filter guarantees this, and the check
    /// here refuses the whole batch otherwise.
    pub fn upsert_analyzed(&mut self, rows: &[AnalyzedObservation]) -> Result<usize, StoreError> {
        let sql = schema::upsert_analyzed(&self.windows);
        let expected = self.windows.len();
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare_cached(&sql)?;
            let mut applied = 0;
            for row in rows {
                if row.averages.len() != expected {
                    return Err(StoreError::RowShape(format!(
                        "analyzed row for '{}' on {} has {} averages, table has {}",
                        row.entity_id,
                        row.date,
                        row.averages.len(),
                        expected
                    )));
                }
                let mut values: Vec<Box<dyn ToSql>> = Vec::with_capacity(expected + 4);
                values.push(Box::new(row.entity_id.clone()));
                values.push(Box::new(row.date));
                values.push(Box::new(row.close));
                for v in &row.averages {
                    values.push(Box::new(*v));
                }
                values.push(Box::new(row.load_timestamp));
                applied +=
                    stmt.execute(rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())))?;
            }
            Ok(applied)
        })
    }

    /// One entity's analyzed rows, ascending by date.
    pub fn load_analyzed(&self, entity_id: &str) -> Result<Vec<AnalyzedObservation>, StoreError> {
        let sql = schema::select_analyzed(&self.windows);
        let n = self.windows.len();
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map([entity_id], |row| {
            let mut averages = Vec::with_capacity(n);
            for i in 0..n {
                averages.push(row.get(3 + i)?);
            }
            Ok(AnalyzedObservation {
                entity_id: row.get(0)?,
                date: row.get(1)?,
                close: row.get(2)?,
                averages,
                load_timestamp: row.get(3 + n)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Transactions ─────────────────────────────────────────────────

    /// Insert staged transactions, skipping known transaction_ids.
    /// Returns the number of rows newly inserted.
    pub fn insert_transactions(&mut self, rows: &[RawTransaction]) -> Result<usize, StoreError> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare_cached(schema::INSERT_RAW_TRANSACTION)?;
            let mut inserted = 0;
            for row in rows {
                inserted += stmt.execute(params![
                    row.transaction_id,
                    row.user_ref,
                    row.product_ref,
                    row.quantity,
                    row.unit_price,
                    row.occurred_at,
                ])?;
            }
            Ok(inserted)
        })
    }

    /// All staged transactions in occurrence order.
    pub fn load_transactions(&self) -> Result<Vec<RawTransaction>, StoreError> {
        let mut stmt = self.conn.prepare_cached(schema::SELECT_ALL_TRANSACTIONS)?;
        let rows = stmt.query_map([], |row| {
            Ok(RawTransaction {
                transaction_id: row.get(0)?,
                user_ref: row.get(1)?,
                product_ref: row.get(2)?,
                quantity: row.get::<_, i64>(3)? as u32,
                unit_price: row.get(4)?,
                occurred_at: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Dimensions ───────────────────────────────────────────────────

    /// Insert user dimension candidates, skipping natural keys already
    /// present. Returns the number of rows newly inserted.
    pub fn insert_users_if_absent(&mut self, rows: &[UserDimension]) -> Result<usize, StoreError> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare_cached(schema::INSERT_DIM_USER)?;
            let mut inserted = 0;
            for row in rows {
                inserted += stmt.execute(params![
                    row.user_ref,
                    row.name,
                    row.email,
                    row.registration_date,
                ])?;
            }
            Ok(inserted)
        })
    }

    /// Insert product dimension candidates, skipping natural keys already
    /// present. Returns the number of rows newly inserted.
    pub fn insert_products_if_absent(
        &mut self,
        rows: &[ProductDimension],
    ) -> Result<usize, StoreError> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare_cached(schema::INSERT_DIM_PRODUCT)?;
            let mut inserted = 0;
            for row in rows {
                inserted += stmt.execute(params![
                    row.product_ref,
                    row.name,
                    row.category,
                    row.unit_price,
                ])?;
            }
            Ok(inserted)
        })
    }

    /// Surrogate keys for the given user natural keys. Keys absent from the
    /// dimension are simply missing from the map.
    pub fn user_keys(&self, refs: &[String]) -> Result<HashMap<String, i64>, StoreError> {
        let mut stmt = self.conn.prepare_cached(schema::SELECT_USER_KEY)?;
        let mut keys = HashMap::with_capacity(refs.len());
        for user_ref in refs {
            if let Some(key) = stmt
                .query_row([user_ref], |row| row.get::<_, i64>(0))
                .optional()?
            {
                keys.insert(user_ref.clone(), key);
            }
        }
        Ok(keys)
    }

    /// Surrogate keys for the given product natural keys.
    pub fn product_keys(&self, refs: &[String]) -> Result<HashMap<String, i64>, StoreError> {
        let mut stmt = self.conn.prepare_cached(schema::SELECT_PRODUCT_KEY)?;
        let mut keys = HashMap::with_capacity(refs.len());
        for product_ref in refs {
            if let Some(key) = stmt
                .query_row([product_ref], |row| row.get::<_, i64>(0))
                .optional()?
            {
                keys.insert(product_ref.clone(), key);
            }
        }
        Ok(keys)
    }

    // ── Facts ────────────────────────────────────────────────────────

    /// Upsert a batch of fact rows. Returns rows applied.
    pub fn upsert_facts(&mut self, rows: &[FactRow]) -> Result<usize, StoreError> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare_cached(schema::UPSERT_FACT_ORDER)?;
            let mut applied = 0;
            for row in rows {
                applied += stmt.execute(params![
                    row.transaction_id,
                    row.user_key,
                    row.product_key,
                    row.quantity,
                    row.computed_total,
                    row.occurred_at,
                ])?;
            }
            Ok(applied)
        })
    }

    // ── Counts ───────────────────────────────────────────────────────

    pub fn transaction_count(&self) -> Result<i64, StoreError> {
        self.scalar("SELECT COUNT(*) FROM raw_transactions")
    }

    pub fn fact_count(&self) -> Result<i64, StoreError> {
        self.scalar("SELECT COUNT(*) FROM fact_orders")
    }

    pub fn analyzed_count(&self) -> Result<i64, StoreError> {
        self.scalar("SELECT COUNT(*) FROM analyzed_prices")
    }

    fn scalar(&self, sql: &str) -> Result<i64, StoreError> {
        Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn test_store() -> Store {
        let store = Store::open_in_memory(&[2, 3]).unwrap();
        store.init_schema().unwrap();
        store
    }

    fn obs(entity: &str, day: u32, close: f64) -> PriceObservation {
        PriceObservation {
            entity_id: entity.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
        }
    }

    fn tx_row(id: &str, quantity: u32) -> RawTransaction {
        RawTransaction {
            transaction_id: id.to_string(),
            user_ref: "u1".into(),
            product_ref: "p1".into(),
            quantity,
            unit_price: 4.5,
            occurred_at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn price_upsert_overwrites_on_same_key() {
        let mut store = test_store();
        store.upsert_prices(&[obs("AAPL", 2, 100.0)]).unwrap();
        store.upsert_prices(&[obs("AAPL", 2, 101.5)]).unwrap();

        let loaded = store.load_prices("AAPL").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].close, 101.5);
    }

    #[test]
    fn prices_load_in_ascending_date_order() {
        let mut store = test_store();
        store
            .upsert_prices(&[obs("AAPL", 5, 103.0), obs("AAPL", 2, 100.0), obs("AAPL", 3, 101.0)])
            .unwrap();

        let loaded = store.load_prices("AAPL").unwrap();
        let days: Vec<u32> = loaded
            .iter()
            .map(|o| chrono::Datelike::day(&o.date))
            .collect();
        assert_eq!(days, vec![2, 3, 5]);
    }

    #[test]
    fn duplicate_transaction_insert_is_a_noop() {
        let mut store = test_store();
        assert_eq!(store.insert_transactions(&[tx_row("t1", 1)]).unwrap(), 1);
        assert_eq!(store.insert_transactions(&[tx_row("t1", 9)]).unwrap(), 0);

        let rows = store.load_transactions().unwrap();
        assert_eq!(rows.len(), 1);
        // Original row untouched.
        assert_eq!(rows[0].quantity, 1);
    }

    #[test]
    fn transaction_batch_rolls_back_on_constraint_violation() {
        let mut store = test_store();
        // quantity 0 violates the CHECK constraint mid-batch.
        let batch = vec![tx_row("t1", 1), tx_row("t2", 0), tx_row("t3", 2)];
        let result = store.insert_transactions(&batch);
        assert!(result.is_err());
        assert_eq!(store.transaction_count().unwrap(), 0);
    }

    #[test]
    fn dimension_insert_preserves_existing_row_and_key() {
        let mut store = test_store();
        let first = UserDimension::placeholder("user-aaaa-bbbb");
        assert_eq!(store.insert_users_if_absent(&[first.clone()]).unwrap(), 1);

        let keys1 = store.user_keys(&["user-aaaa-bbbb".to_string()]).unwrap();

        let mut rederived = first.clone();
        rederived.name = "User_rewritten".into();
        assert_eq!(store.insert_users_if_absent(&[rederived]).unwrap(), 0);

        let keys2 = store.user_keys(&["user-aaaa-bbbb".to_string()]).unwrap();
        assert_eq!(keys1["user-aaaa-bbbb"], keys2["user-aaaa-bbbb"]);

        // Attributes kept from the first insert.
        let name: String = store
            .conn
            .query_row(
                "SELECT name FROM dim_users WHERE user_ref = ?1",
                ["user-aaaa-bbbb"],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(name, first.name);
    }

    #[test]
    fn missing_keys_are_absent_from_lookup() {
        let store = test_store();
        let keys = store.user_keys(&["nobody".to_string()]).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn fact_upsert_is_idempotent() {
        let mut store = test_store();
        store
            .insert_users_if_absent(&[UserDimension::placeholder("u1")])
            .unwrap();
        store
            .insert_products_if_absent(&[ProductDimension::placeholder("p1")])
            .unwrap();

        let fact = FactRow {
            transaction_id: "t1".into(),
            user_key: 1,
            product_key: 1,
            quantity: 2,
            computed_total: 9.0,
            occurred_at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
        };
        store.upsert_facts(&[fact.clone()]).unwrap();
        store.upsert_facts(&[fact]).unwrap();
        assert_eq!(store.fact_count().unwrap(), 1);
    }

    #[test]
    fn analyzed_roundtrip_with_window_columns() {
        let mut store = test_store();
        let row = AnalyzedObservation {
            entity_id: "AAPL".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
            close: 102.0,
            averages: vec![101.0, 100.5],
            load_timestamp: Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap(),
        };
        assert_eq!(store.upsert_analyzed(&[row.clone()]).unwrap(), 1);

        // Second application with updated values: same row count, new values.
        let mut updated = row.clone();
        updated.averages = vec![105.0, 104.0];
        assert_eq!(store.upsert_analyzed(&[updated]).unwrap(), 1);

        let loaded = store.load_analyzed("AAPL").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].averages, vec![105.0, 104.0]);
        assert_eq!(store.analyzed_count().unwrap(), 1);
    }

    #[test]
    fn analyzed_rejects_row_with_wrong_average_count() {
        let mut store = test_store();
        let row = AnalyzedObservation {
            entity_id: "AAPL".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
            close: 102.0,
            averages: vec![101.0], // table expects two
            load_timestamp: Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap(),
        };
        let result = store.upsert_analyzed(&[row]);
        assert!(matches!(result, Err(StoreError::RowShape(_))));
        assert_eq!(store.analyzed_count().unwrap(), 0);
    }

    #[test]
    fn open_on_unreachable_path_is_unavailable() {
        let err = Store::open(
            Path::new("/nonexistent-dir/deeper/warehouse.db"),
            &[50, 200],
        )
        .unwrap_err();
        assert!(err.is_transient());
    }
}
