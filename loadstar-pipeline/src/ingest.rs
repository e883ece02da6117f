//! Transaction interchange ingestion.
//!
//! Reads a `.json` or `.csv` interchange file, validates each record's
//! shape, and stages the valid rows with a conflict-skip insert. Known
//! transaction_ids are no-ops, counted as duplicates. Invalid records are
//! rejected per-row with a reason — one bad record never aborts the file.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use loadstar_core::domain::RawTransaction;
use loadstar_core::store::{Store, StoreError};

use crate::gen::TransactionRecord;

/// File-level ingestion errors. Per-record problems are not errors; they
/// land in [`IngestReport::rejected`].
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot read interchange file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse JSON interchange: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot parse CSV interchange: {0}")]
    Csv(#[from] csv::Error),

    #[error("unsupported interchange format '{0}' (expected .json or .csv)")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A record that failed shape validation.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedRecord {
    pub transaction_id: String,
    pub reason: String,
}

/// What happened to one interchange file.
#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    pub read: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: Vec<RejectedRecord>,
}

/// Read interchange records, dispatching on the file extension.
pub fn read_records(path: &Path) -> Result<Vec<TransactionRecord>, IngestError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "json" => {
            let file = std::fs::File::open(path)?;
            Ok(serde_json::from_reader(file)?)
        }
        "csv" => {
            let mut reader = csv::Reader::from_path(path)?;
            let mut records = Vec::new();
            for record in reader.deserialize() {
                records.push(record?);
            }
            Ok(records)
        }
        other => Err(IngestError::UnsupportedFormat(other.to_string())),
    }
}

/// Validate one record's shape; the upstream `total_amount` is ignored
/// here and everywhere downstream.
fn validate(record: &TransactionRecord) -> Result<RawTransaction, String> {
    if record.transaction_id.is_empty() {
        return Err("empty transaction_id".to_string());
    }
    if record.user_id.is_empty() {
        return Err("empty user_id".to_string());
    }
    if record.product_id.is_empty() {
        return Err("empty product_id".to_string());
    }
    if record.quantity == 0 {
        return Err("quantity must be positive".to_string());
    }
    if !(record.price.is_finite() && record.price > 0.0) {
        return Err(format!("unit price must be positive, got {}", record.price));
    }
    let occurred_at: DateTime<Utc> = record
        .timestamp
        .parse::<DateTime<chrono::FixedOffset>>()
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("unparseable timestamp '{}': {e}", record.timestamp))?;

    Ok(RawTransaction {
        transaction_id: record.transaction_id.clone(),
        user_ref: record.user_id.clone(),
        product_ref: record.product_id.clone(),
        quantity: record.quantity,
        unit_price: record.price,
        occurred_at,
    })
}

/// Ingest one interchange file into the raw transaction table.
///
/// Valid rows are staged as a single batch (all-or-nothing); the report
/// names every rejected record and counts duplicate ids that were skipped.
pub fn ingest_file(store: &mut Store, path: &Path) -> Result<IngestReport, IngestError> {
    let records = read_records(path)?;
    let mut report = IngestReport {
        read: records.len(),
        ..Default::default()
    };

    let mut valid = Vec::with_capacity(records.len());
    for record in &records {
        match validate(record) {
            Ok(row) => valid.push(row),
            Err(reason) => {
                log::warn!("rejecting record '{}': {reason}", record.transaction_id);
                report.rejected.push(RejectedRecord {
                    transaction_id: record.transaction_id.clone(),
                    reason,
                });
            }
        }
    }

    report.inserted = store.insert_transactions(&valid)?;
    report.duplicates = valid.len() - report.inserted;

    log::info!(
        "ingested {}: {} read, {} inserted, {} duplicates, {} rejected",
        path.display(),
        report.read,
        report.inserted,
        report.duplicates,
        report.rejected.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gen::{generate_records, write_json, GenSettings};
    use tempfile::TempDir;

    fn test_store() -> Store {
        let store = Store::open_in_memory(&[50, 200]).unwrap();
        store.init_schema().unwrap();
        store
    }

    fn record(id: &str) -> TransactionRecord {
        TransactionRecord {
            transaction_id: id.to_string(),
            user_id: "u1".to_string(),
            product_id: "p1".to_string(),
            quantity: 2,
            price: 9.99,
            total_amount: Some(19.98),
            timestamp: "2025-06-01T08:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn json_roundtrip_ingests_everything() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transactions.json");
        let records = generate_records(&GenSettings {
            transactions: 25,
            ..Default::default()
        });
        write_json(&records, &path).unwrap();

        let mut store = test_store();
        let report = ingest_file(&mut store, &path).unwrap();

        assert_eq!(report.read, 25);
        assert_eq!(report.inserted, 25);
        assert_eq!(report.duplicates, 0);
        assert!(report.rejected.is_empty());
        assert_eq!(store.transaction_count().unwrap(), 25);
    }

    #[test]
    fn re_ingest_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transactions.json");
        let records = generate_records(&GenSettings {
            transactions: 10,
            ..Default::default()
        });
        write_json(&records, &path).unwrap();

        let mut store = test_store();
        ingest_file(&mut store, &path).unwrap();
        let second = ingest_file(&mut store, &path).unwrap();

        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 10);
        assert_eq!(store.transaction_count().unwrap(), 10);
    }

    #[test]
    fn invalid_records_are_rejected_with_reasons() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transactions.json");

        let mut bad_quantity = record("t-bad-qty");
        bad_quantity.quantity = 0;
        let mut bad_price = record("t-bad-price");
        bad_price.price = -1.0;
        let mut bad_time = record("t-bad-time");
        bad_time.timestamp = "yesterday".to_string();

        write_json(&[record("t-ok"), bad_quantity, bad_price, bad_time], &path).unwrap();

        let mut store = test_store();
        let report = ingest_file(&mut store, &path).unwrap();

        assert_eq!(report.read, 4);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.rejected.len(), 3);
        let reasons: Vec<&str> = report.rejected.iter().map(|r| r.reason.as_str()).collect();
        assert!(reasons.iter().any(|r| r.contains("quantity")));
        assert!(reasons.iter().any(|r| r.contains("unit price")));
        assert!(reasons.iter().any(|r| r.contains("timestamp")));
    }

    #[test]
    fn csv_interchange_is_supported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transactions.csv");
        let mut writer = csv::Writer::from_path(&path).unwrap();
        writer.serialize(record("t-csv-1")).unwrap();
        writer.serialize(record("t-csv-2")).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let mut store = test_store();
        let report = ingest_file(&mut store, &path).unwrap();
        assert_eq!(report.inserted, 2);
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let mut store = test_store();
        let result = ingest_file(&mut store, Path::new("transactions.parquet"));
        assert!(matches!(result, Err(IngestError::UnsupportedFormat(_))));
    }
}
