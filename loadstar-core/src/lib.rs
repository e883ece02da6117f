//! Loadstar Core — domain types, indicators, star-schema transforms, store.
//!
//! This crate contains the heart of the ETL engine:
//! - Domain types (price observations, transactions, dimensions, facts)
//! - Trailing-window indicator computation
//! - Pure transformation stages (analyzed rows, dimension resolution,
//!   fact assembly)
//! - The SQLite store with transactional upsert / insert-if-absent batches
//!
//! Orchestration (configuration, collaborators, the per-entity coordinator)
//! lives in `loadstar-pipeline`.

pub mod domain;
pub mod indicators;
pub mod store;
pub mod transform;
