//! Effective migration settings, loaded from an optional JSON file

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::MigrationError;

/// Weights for the final confidence aggregation. Must each be non-negative
/// and sum to at most 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceWeights {
    pub symbol: f64,
    pub footprint: f64,
    pub fields: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        ConfidenceWeights {
            symbol: 0.4,
            footprint: 0.4,
            fields: 0.2,
        }
    }
}

impl ConfidenceWeights {
    pub fn sum(&self) -> f64 {
        self.symbol + self.footprint + self.fields
    }
}

fn default_database_name() -> String {
    "components.db".to_string()
}

fn default_dblib_name() -> String {
    "components.kicad_dbl".to_string()
}

fn default_batch_size() -> usize {
    1000
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_connect_timeout() -> u64 {
    30
}

/// Recognized migration options (§ configuration file)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    /// Where target files are written
    pub output_directory: PathBuf,
    /// File name of the target relational store
    pub database_name: String,
    /// File name of the target library descriptor
    pub dblib_name: String,

    pub enable_parallel_processing: bool,
    pub max_worker_threads: usize,
    /// Rows per extractor batch
    pub batch_size: usize,

    pub enable_caching: bool,
    pub cache_directory: Option<PathBuf>,

    /// When set, overrides both per-stage fuzzy acceptance defaults
    /// (0.8 for symbols, 0.7 for footprints)
    pub fuzzy_threshold: Option<f64>,
    /// Triggers the ML stage and drives report banding
    pub confidence_threshold: f64,

    pub validate_symbols: bool,
    pub validate_footprints: bool,

    pub create_views: bool,
    pub vacuum_database: bool,
    pub create_indexes: bool,

    /// Additional source → target field mappings; override the built-ins
    pub custom_field_mappings: HashMap<String, String>,
    /// Source fields to drop before mapping
    pub excluded_fields: Vec<String>,

    pub confidence_weights: ConfidenceWeights,

    /// Keep partial target files after a cancelled run
    pub keep_partial_output: bool,

    /// Per-connection open timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        MigrationSettings {
            output_directory: PathBuf::from("."),
            database_name: default_database_name(),
            dblib_name: default_dblib_name(),
            enable_parallel_processing: true,
            max_worker_threads: default_workers(),
            batch_size: default_batch_size(),
            enable_caching: true,
            cache_directory: None,
            fuzzy_threshold: None,
            confidence_threshold: default_confidence_threshold(),
            validate_symbols: true,
            validate_footprints: true,
            create_views: true,
            vacuum_database: true,
            create_indexes: true,
            custom_field_mappings: HashMap::new(),
            excluded_fields: Vec::new(),
            confidence_weights: ConfidenceWeights::default(),
            keep_partial_output: false,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl MigrationSettings {
    /// Load settings from a JSON file, falling back to defaults for absent keys
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MigrationError::FileAccessError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let settings: MigrationSettings =
            serde_json::from_str(&content).map_err(|e| MigrationError::ConfigError {
                message: format!("invalid settings file {}: {}", path.display(), e),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate effective settings; called on every load
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.batch_size == 0 {
            return Err(MigrationError::ConfigError {
                message: "batch_size must be at least 1".to_string(),
            });
        }
        if self.max_worker_threads == 0 {
            return Err(MigrationError::ConfigError {
                message: "max_worker_threads must be at least 1".to_string(),
            });
        }
        if let Some(threshold) = self.fuzzy_threshold {
            if !(0.0..=1.0).contains(&threshold) || threshold == 0.0 {
                return Err(MigrationError::ConfigError {
                    message: format!("fuzzy_threshold must be in (0, 1], got {}", threshold),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(MigrationError::ConfigError {
                message: format!(
                    "confidence_threshold must be in [0, 1], got {}",
                    self.confidence_threshold
                ),
            });
        }
        let w = &self.confidence_weights;
        if w.symbol < 0.0 || w.footprint < 0.0 || w.fields < 0.0 {
            return Err(MigrationError::ConfigError {
                message: "confidence_weights must be non-negative".to_string(),
            });
        }
        if w.sum() > 1.0 + f64::EPSILON {
            return Err(MigrationError::ConfigError {
                message: format!("confidence_weights must sum to at most 1.0, got {}", w.sum()),
            });
        }
        if self.database_name.trim().is_empty() || self.dblib_name.trim().is_empty() {
            return Err(MigrationError::ConfigError {
                message: "database_name and dblib_name must be non-empty".to_string(),
            });
        }
        Ok(())
    }

    /// Fuzzy acceptance threshold for the symbol resolver
    pub fn symbol_fuzzy_threshold(&self) -> f64 {
        self.fuzzy_threshold.unwrap_or(0.8)
    }

    /// Fuzzy acceptance threshold for the footprint resolver
    pub fn footprint_fuzzy_threshold(&self) -> f64 {
        self.fuzzy_threshold.unwrap_or(0.7)
    }

    pub fn store_path(&self) -> PathBuf {
        self.output_directory.join(&self.database_name)
    }

    pub fn dbl_path(&self) -> PathBuf {
        self.output_directory.join(&self.dblib_name)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_directory.join("migration_report.json")
    }
}
