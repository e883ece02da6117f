//! Loadstar Pipeline — orchestration around `loadstar-core`.
//!
//! This crate builds on the core engine to provide:
//! - TOML configuration with validation and a content-hash run id
//! - Bounded-retry store bootstrap
//! - Price feed trait with a deterministic synthetic implementation
//! - Transaction interchange generation and ingestion (JSON/CSV)
//! - The per-entity coordinator and its run summary

pub mod config;
pub mod feed;
pub mod gen;
pub mod ingest;
pub mod retry;
pub mod run;

pub use config::{ConfigError, PipelineConfig};
pub use feed::{fetch_and_store, FeedError, FetchSummary, PriceFeed, SyntheticFeed};
pub use gen::{generate_records, write_json, GenSettings, TransactionRecord};
pub use ingest::{ingest_file, IngestError, IngestReport};
pub use retry::RetryPolicy;
pub use run::{
    open_configured_store, run_pipeline, run_with_store, EntityFailure, PipelineError, RunSummary,
    Stage,
};
