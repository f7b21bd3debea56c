//! Configuration structures for the atlas-trends system.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reconciler configuration.
    pub reconcile: ReconcileConfig,
    /// Rtt band thresholds.
    pub bands: BandThresholds,
    /// Window validation configuration.
    pub validation: ValidationConfig,
    /// Batch execution configuration.
    pub batch: BatchConfig,
}

impl Config {
    /// Parse a TOML document. Missing sections fall back to defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Reconciler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Log a per-run glyph line at trace level.
    pub emit_trace: bool,
}

/// Upper bounds (exclusive, milliseconds) of the rtt bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BandThresholds {
    pub small_ms: f64,
    pub medium_ms: f64,
    pub large_ms: f64,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            small_ms: 10.0,
            medium_ms: 50.0,
            large_ms: 100.0,
        }
    }
}

/// Validation of measurements and requested windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum number of ticks needed for trends.
    pub min_ticks: u32,
    /// Longest window that may be requested, in days.
    pub max_window_days: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_ticks: 100,
            max_window_days: 31,
        }
    }
}

/// Batch execution configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of parallel workers (0 = auto).
    pub workers: u32,
}
