//! Pipeline coordinator — sequences transform stages into writer calls per
//! logical batch and aggregates a run summary.
//!
//! Each entity (one ticker, or the single warehouse batch) moves through
//! Pending -> Extracted -> Transformed -> Loaded, or lands in Failed with a
//! stage and reason. Failures are entity-scoped: one entity's bad data or
//! store hiccup never halts the others. The coordinator itself raises only
//! for conditions that make the whole run meaningless (store unreachable
//! before any entity was attempted); partial success is a normal outcome
//! reported through the summary, not an exception.
//!
//! There is no Retrying state here — run-level retry belongs to the
//! external scheduler.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use loadstar_core::store::{Store, StoreError};
use loadstar_core::transform::{
    analyze_prices, assemble_facts, resolve_dimensions, ResolutionFailure,
};

use crate::config::{ConfigError, PipelineConfig};
use crate::retry::RetryPolicy;

/// Logical batch name for the star-schema load.
const WAREHOUSE_ENTITY: &str = "transactions";

/// Conditions that abort the run before any entity is attempted.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store unavailable at startup: {0}")]
    Bootstrap(#[source] StoreError),
}

/// Stage at which an entity batch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extract,
    Transform,
    Load,
}

/// Lifecycle of one entity batch within a run.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityState {
    Pending,
    Extracted,
    Transformed,
    Loaded { rows: usize },
    Failed { stage: Stage, reason: String },
}

/// One entity's terminal failure, named in the run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFailure {
    pub entity_id: String,
    pub stage: Stage,
    pub reason: String,
}

/// Aggregate outcome of one pipeline invocation — the sole contract with
/// the caller. Inspect both `rows_loaded` and `failures`: partial success
/// is expected, not exceptional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub entities_processed: usize,
    pub rows_loaded: usize,
    pub failures: Vec<EntityFailure>,
    /// Fact rows dropped by surrogate-key resolution, counted and named.
    pub unresolved: Vec<ResolutionFailure>,
}

impl RunSummary {
    fn new(run_id: String) -> Self {
        Self {
            run_id,
            entities_processed: 0,
            rows_loaded: 0,
            failures: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Open the configured store with bounded retry and idempotent schema
/// initialization. Exhaustion is fatal: nothing has been attempted yet.
pub fn open_configured_store(config: &PipelineConfig) -> Result<Store, PipelineError> {
    let policy = RetryPolicy::new(
        config.retry.max_attempts,
        Duration::from_millis(config.retry.base_delay_ms),
    );
    let store = policy
        .open_store(&config.pipeline.db_path, &config.pipeline.windows)
        .map_err(PipelineError::Bootstrap)?;
    store.init_schema().map_err(PipelineError::Bootstrap)?;
    Ok(store)
}

/// Run the full configured pipeline: one batch per entity, then the
/// warehouse batch. This is the high-level entry point used by the CLI.
pub fn run_pipeline(config: &PipelineConfig) -> Result<RunSummary, PipelineError> {
    let mut store = open_configured_store(config)?;
    Ok(run_with_store(&mut store, config))
}

/// Run against an already-open store — no bootstrap.
pub fn run_with_store(store: &mut Store, config: &PipelineConfig) -> RunSummary {
    let mut summary = RunSummary::new(config.run_id());
    log::info!(
        "run {} starting: {} entities, windows {:?}",
        &summary.run_id[..12],
        config.pipeline.entities.len(),
        config.pipeline.windows
    );

    for entity_id in &config.pipeline.entities {
        summary.entities_processed += 1;
        match process_entity(store, entity_id, &config.pipeline.windows) {
            Ok(rows) => {
                log::info!("{entity_id}: loaded {rows} analyzed rows");
                summary.rows_loaded += rows;
            }
            Err(failure) => {
                let state = EntityState::Failed {
                    stage: failure.stage,
                    reason: failure.reason.clone(),
                };
                log::warn!("{entity_id}: {state:?}");
                summary.failures.push(failure);
            }
        }
    }

    summary.entities_processed += 1;
    match process_warehouse(store, config) {
        Ok((rows, unresolved)) => {
            log::info!("{WAREHOUSE_ENTITY}: loaded {rows} warehouse rows");
            summary.rows_loaded += rows;
            summary.unresolved = unresolved;
        }
        Err(failure) => {
            let state = EntityState::Failed {
                stage: failure.stage,
                reason: failure.reason.clone(),
            };
            log::warn!("{WAREHOUSE_ENTITY}: {state:?}");
            summary.failures.push(failure);
        }
    }

    log::info!(
        "run {} finished: {} entities, {} rows loaded, {} failed, {} unresolved",
        &summary.run_id[..12],
        summary.entities_processed,
        summary.rows_loaded,
        summary.failures.len(),
        summary.unresolved.len()
    );
    summary
}

fn fail(entity_id: &str, stage: Stage, reason: impl ToString) -> EntityFailure {
    EntityFailure {
        entity_id: entity_id.to_string(),
        stage,
        reason: reason.to_string(),
    }
}

/// One price entity: raw prices -> trailing averages -> analyzed upsert.
fn process_entity(
    store: &mut Store,
    entity_id: &str,
    windows: &[usize],
) -> Result<usize, EntityFailure> {
    let mut state = EntityState::Pending;
    log::debug!("{entity_id}: {state:?}");

    let observations = store
        .load_prices(entity_id)
        .map_err(|e| fail(entity_id, Stage::Extract, e))?;
    state = EntityState::Extracted;
    log::debug!("{entity_id}: {state:?} ({} observations)", observations.len());

    if observations.is_empty() {
        log::warn!("{entity_id}: no raw observations staged, skipping");
        return Ok(0);
    }

    let rows = analyze_prices(&observations, windows, Utc::now())
        .map_err(|e| fail(entity_id, Stage::Transform, e))?;
    state = EntityState::Transformed;
    log::debug!("{entity_id}: {state:?} ({} rows survive the filter)", rows.len());

    if rows.is_empty() {
        log::info!(
            "{entity_id}: not enough history for windows {windows:?}, nothing to load"
        );
        return Ok(0);
    }

    let applied = store
        .upsert_analyzed(&rows)
        .map_err(|e| fail(entity_id, Stage::Load, e))?;
    state = EntityState::Loaded { rows: applied };
    log::debug!("{entity_id}: {state:?}");
    Ok(applied)
}

/// The warehouse batch: staged transactions -> dimensions -> facts.
///
/// Dimension resolution strictly precedes fact assembly; the fact upsert is
/// one transaction. Per-row resolution failures are reported, and escalate
/// to a batch failure only when every row failed.
fn process_warehouse(
    store: &mut Store,
    config: &PipelineConfig,
) -> Result<(usize, Vec<ResolutionFailure>), EntityFailure> {
    let rows = store
        .load_transactions()
        .map_err(|e| fail(WAREHOUSE_ENTITY, Stage::Extract, e))?;

    if rows.is_empty() {
        log::info!("{WAREHOUSE_ENTITY}: nothing staged, skipping");
        return Ok((0, Vec::new()));
    }

    let resolved = resolve_dimensions(store, &rows, config.warehouse.missing_dimensions)
        .map_err(|e| fail(WAREHOUSE_ENTITY, Stage::Transform, e))?;

    let batch = assemble_facts(&rows, &resolved.users, &resolved.products);
    if batch.all_unresolved() {
        return Err(fail(
            WAREHOUSE_ENTITY,
            Stage::Transform,
            format!(
                "all {} rows failed dimension resolution",
                batch.unresolved.len()
            ),
        ));
    }
    for failure in &batch.unresolved {
        log::warn!(
            "{WAREHOUSE_ENTITY}: dropping {}: {}",
            failure.transaction_id,
            failure.reason
        );
    }

    let applied = store
        .upsert_facts(&batch.facts)
        .map_err(|e| fail(WAREHOUSE_ENTITY, Stage::Load, e))?;

    Ok((
        applied + resolved.new_users + resolved.new_products,
        batch.unresolved,
    ))
}
