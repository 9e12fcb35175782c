//! Engine configuration.
//!
//! All options recognized by the quantification engine live here, together
//! with the validation that must pass before any sample is processed.
//! Invalid thresholds are rejected up front so a bad configuration can
//! never partially process a batch of samples.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::normalization::Unit;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{option} must lie in [0, 1], got {value}")]
    OutOfUnitRange { option: &'static str, value: f64 },

    #[error("{option} must be non-negative, got {value}")]
    Negative { option: &'static str, value: f64 },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Options controlling a full per-sample quantification run.
///
/// The same configuration is shared by every sample in a batch; it is
/// validated once, then treated as read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum alignment identity (fraction, 0-1) for a hit to survive ingestion.
    pub identity_threshold: f64,

    /// Minimum alignment length (bases) for a hit to survive ingestion.
    pub length_threshold: usize,

    /// Reporting unit for the gene-family abundance table.
    pub normalization_unit: Unit,

    /// Treat uncovered optional reactions as covered when computing pathway coverage.
    pub gapfill_enabled: bool,

    /// Coverage fraction at or above which a structure node counts as covered.
    pub min_coverage_threshold: f64,

    /// Score distance from the per-read best hit within which hits are tied.
    pub score_tie_tolerance: f64,

    /// Also produce per-organism stratified tables.
    pub stratify: bool,

    /// Drop pathways with zero abundance from the output table.
    pub omit_zero_pathways: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            identity_threshold: 0.5,
            length_threshold: 20,
            normalization_unit: Unit::Rpk,
            gapfill_enabled: true,
            min_coverage_threshold: 0.5,
            score_tie_tolerance: 0.0,
            stratify: false,
            omit_zero_pathways: false,
        }
    }
}

impl EngineConfig {
    /// Loads a configuration from a JSON file. Unspecified fields fall back
    /// to their defaults; the result is validated before being returned.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every threshold for its documented range. Called once before
    /// any sample runs; a failure here is fatal for the whole batch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.identity_threshold) {
            return Err(ConfigError::OutOfUnitRange {
                option: "identity_threshold",
                value: self.identity_threshold,
            });
        }
        if !(0.0..=1.0).contains(&self.min_coverage_threshold) {
            return Err(ConfigError::OutOfUnitRange {
                option: "min_coverage_threshold",
                value: self.min_coverage_threshold,
            });
        }
        if self.score_tie_tolerance < 0.0 || !self.score_tie_tolerance.is_finite() {
            return Err(ConfigError::Negative {
                option: "score_tie_tolerance",
                value: self.score_tie_tolerance,
            });
        }
        Ok(())
    }
}
