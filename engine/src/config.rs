//! Migration settings.

use crate::checkpoint::DEFAULT_CHECKPOINT_FILE;
use crate::checksums::ChecksumAlgorithm;
use crate::error::EngineError;
use crate::filter::PathFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Successful copies between two periodic checkpoint saves.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 100;

/// Settings for a `Migrator`. Missing keys in a config file take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Where the checkpoint lives
    pub checkpoint_path: PathBuf,
    /// Save the checkpoint every N successful copies
    pub checkpoint_interval: usize,
    /// Digest used when verification is requested
    pub checksum_algorithm: ChecksumAlgorithm,
    /// Include tokens added to the defaults
    pub additional_include: Vec<String>,
    /// Exclude tokens added to the defaults
    pub additional_exclude: Vec<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_FILE),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            checksum_algorithm: ChecksumAlgorithm::default(),
            additional_include: Vec::new(),
            additional_exclude: Vec::new(),
        }
    }
}

impl MigrationConfig {
    /// Load settings from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let raw = fs::read_to_string(path).map_err(|e| EngineError::InvalidConfig {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let config: MigrationConfig =
            serde_json::from_str(&raw).map_err(|e| EngineError::InvalidConfig {
                message: format!("cannot parse {}: {}", path.display(), e),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.checkpoint_interval == 0 {
            return Err(EngineError::InvalidConfig {
                message: "checkpoint_interval must be at least 1".to_string(),
            });
        }
        if self.checkpoint_path.as_os_str().is_empty() {
            return Err(EngineError::InvalidConfig {
                message: "checkpoint_path must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Filter with the configured extra tokens on top of the defaults.
    pub fn build_filter(&self) -> PathFilter {
        PathFilter::with_patterns(
            self.additional_include.iter().cloned(),
            self.additional_exclude.iter().cloned(),
        )
    }
}
