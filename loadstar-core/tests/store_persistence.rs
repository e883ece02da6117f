//! On-disk store behavior across separate opens.
//!
//! Surrogate-key stability and upsert idempotence must hold across
//! process-lifetime boundaries, not just within one connection, so these
//! tests reopen a real database file between steps.

use chrono::{NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use loadstar_core::domain::{AnalyzedObservation, RawTransaction};
use loadstar_core::store::Store;
use loadstar_core::transform::{resolve_dimensions, MissingDimensionPolicy};

const WINDOWS: [usize; 2] = [50, 200];

fn tx(id: &str, user: &str, product: &str) -> RawTransaction {
    RawTransaction {
        transaction_id: id.to_string(),
        user_ref: user.to_string(),
        product_ref: product.to_string(),
        quantity: 2,
        unit_price: 3.25,
        occurred_at: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
    }
}

#[test]
fn surrogate_keys_are_stable_across_runs() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("warehouse.db");

    let first = {
        let mut store = Store::open(&db_path, &WINDOWS).unwrap();
        store.init_schema().unwrap();
        resolve_dimensions(
            &mut store,
            &[tx("t1", "user-one", "prod-one")],
            MissingDimensionPolicy::Synthesize,
        )
        .unwrap()
    };

    // A second run over the same natural keys resolves to the same
    // surrogate keys and creates nothing new.
    let second = {
        let mut store = Store::open(&db_path, &WINDOWS).unwrap();
        store.init_schema().unwrap();
        resolve_dimensions(
            &mut store,
            &[tx("t2", "user-one", "prod-one")],
            MissingDimensionPolicy::Synthesize,
        )
        .unwrap()
    };

    assert_eq!(first.users["user-one"], second.users["user-one"]);
    assert_eq!(first.products["prod-one"], second.products["prod-one"]);
    assert_eq!(second.new_users, 0);
    assert_eq!(second.new_products, 0);
}

#[test]
fn analyzed_upserts_merge_across_runs() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("warehouse.db");
    let loaded_at = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();

    let row = |day: u32, close: f64| AnalyzedObservation {
        entity_id: "AAPL".to_string(),
        date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
        close,
        averages: vec![close - 1.0, close - 2.0],
        load_timestamp: loaded_at,
    };

    {
        let mut store = Store::open(&db_path, &WINDOWS).unwrap();
        store.init_schema().unwrap();
        store.upsert_analyzed(&[row(1, 100.0), row(2, 101.0)]).unwrap();
    }

    // Second run: one overlapping key (updated close) and one new date.
    {
        let mut store = Store::open(&db_path, &WINDOWS).unwrap();
        store.init_schema().unwrap();
        store.upsert_analyzed(&[row(2, 105.0), row(3, 102.0)]).unwrap();
    }

    let store = Store::open(&db_path, &WINDOWS).unwrap();
    let rows = store.load_analyzed("AAPL").unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].close, 105.0); // overwritten, not duplicated
    assert_eq!(store.analyzed_count().unwrap(), 3);
}

#[test]
fn duplicate_ingest_across_runs_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("warehouse.db");

    {
        let mut store = Store::open(&db_path, &WINDOWS).unwrap();
        store.init_schema().unwrap();
        assert_eq!(store.insert_transactions(&[tx("t1", "u", "p")]).unwrap(), 1);
    }

    let mut store = Store::open(&db_path, &WINDOWS).unwrap();
    store.init_schema().unwrap();
    assert_eq!(store.insert_transactions(&[tx("t1", "u", "p")]).unwrap(), 0);
    assert_eq!(store.transaction_count().unwrap(), 1);
}
