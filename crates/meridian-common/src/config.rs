//! Meridian Config - Configuration Structures
//!
//! Configuration types for the storage engine and for the datasets it
//! serves. Dataset configuration is resolved elsewhere (an admin service or
//! a file) and handed to the engines as plain data; nothing here fetches it.
//!
//! Key Features:
//! - Storage tuning (save retry budget, record size limit)
//! - Per-dataset settings (cap size, queryability, freshness bound)
//! - TOML loading with sensible defaults
//!
//! @version 0.1.0
//! @author Meridian Development Team

use crate::error::{MeridianError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// Storage Configuration
// =============================================================================

/// Configuration for the storage engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Total number of attempts for a save, including the first one.
    pub save_attempts: u32,
    pub max_record_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            save_attempts: 3,
            max_record_size: 16 * 1024 * 1024, // 16MB
        }
    }
}

// =============================================================================
// Dataset Configuration
// =============================================================================

/// Resolved configuration for a single dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    #[serde(default)]
    pub capped_size: Option<u64>,
    #[serde(default = "default_true")]
    pub queryable: bool,
    #[serde(default)]
    pub realtime: bool,
    /// Seconds after which a dataset without new writes counts as stale.
    #[serde(default)]
    pub max_age_expected: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl DatasetConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capped_size: None,
            queryable: true,
            realtime: false,
            max_age_expected: None,
        }
    }

    pub fn capped(mut self, size: u64) -> Self {
        self.capped_size = Some(size);
        self
    }

    pub fn queryable(mut self, queryable: bool) -> Self {
        self.queryable = queryable;
        self
    }

    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn max_age_expected(mut self, seconds: u64) -> Self {
        self.max_age_expected = Some(seconds);
        self
    }

    /// Cap size in bytes as understood by the storage engine (0 = uncapped).
    pub fn cap_size_bytes(&self) -> u64 {
        self.capped_size.unwrap_or(0)
    }

    /// Realtime datasets hold a rolling window and must be capped.
    pub fn validate(&self) -> Result<()> {
        if self.realtime && self.cap_size_bytes() == 0 {
            return Err(MeridianError::Configuration(format!(
                "realtime dataset '{}' needs a capped_size",
                self.name
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Top-level Configuration
// =============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeridianConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
}

impl MeridianConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MeridianError::Configuration(e.to_string()))
    }

    /// Look up a dataset by name.
    pub fn dataset(&self, name: &str) -> Option<&DatasetConfig> {
        self.datasets.iter().find(|d| d.name == name)
    }
}

// =============================================================================
// Tests
// =============================================================================
