//! Serializable pipeline configuration.
//!
//! Everything the original hard-coded at module scope — ticker lists,
//! window sizes, lookback horizon — arrives here as an explicit structure
//! passed into the coordinator at invocation time.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use loadstar_core::transform::MissingDimensionPolicy;

/// Errors from loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no entities configured")]
    NoEntities,

    #[error("no indicator windows configured")]
    NoWindows,

    #[error("window sizes must be positive")]
    ZeroWindow,

    #[error("duplicate window size {0}")]
    DuplicateWindow(usize),

    #[error("lookback_days must be >= 1")]
    ZeroLookback,
}

/// Configuration for one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub warehouse: WarehouseSection,

    #[serde(default)]
    pub retry: RetrySection,
}

/// Core section: store location, entity universe, indicator windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSection {
    /// SQLite database file.
    pub db_path: PathBuf,

    /// Entities (tickers) to process, one batch each.
    pub entities: Vec<String>,

    /// Trailing-average window sizes; an ordered set, one analyzed-table
    /// column per entry.
    pub windows: Vec<usize>,

    /// How far back the fetch stage reaches, in days.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

/// Warehouse (star schema) section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseSection {
    /// Policy for natural keys without descriptive attributes.
    #[serde(default = "default_missing_dimensions")]
    pub missing_dimensions: MissingDimensionPolicy,
}

impl Default for WarehouseSection {
    fn default() -> Self {
        Self {
            missing_dimensions: default_missing_dimensions(),
        }
    }
}

/// Bounded-retry settings for opening the store at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_lookback_days() -> u32 {
    730
}

fn default_missing_dimensions() -> MissingDimensionPolicy {
    MissingDimensionPolicy::Synthesize
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

impl PipelineConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse and validate a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.entities.is_empty() {
            return Err(ConfigError::NoEntities);
        }
        if self.pipeline.windows.is_empty() {
            return Err(ConfigError::NoWindows);
        }
        if self.pipeline.windows.contains(&0) {
            return Err(ConfigError::ZeroWindow);
        }
        for (i, &w) in self.pipeline.windows.iter().enumerate() {
            if self.pipeline.windows[..i].contains(&w) {
                return Err(ConfigError::DuplicateWindow(w));
            }
        }
        if self.pipeline.lookback_days == 0 {
            return Err(ConfigError::ZeroLookback);
        }
        Ok(())
    }

    /// Deterministic content hash of the effective configuration.
    ///
    /// Recorded in run summaries and logs so two runs can be compared by
    /// what they were configured to do.
    pub fn run_id(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
