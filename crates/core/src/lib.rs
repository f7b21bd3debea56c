//! Core types and configuration for the atlas-trends system.
//!
//! This crate provides shared types used across all other crates:
//! - Observation and tick types (raw reports, candidates, resolved ticks)
//! - Shared status and rtt band tables
//! - Measurement metadata and eligibility checks
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod measurement;
pub mod types;

pub use config::{BandThresholds, Config};
pub use error::{Error, Result};
pub use measurement::{check_window, MeasurementMeta, Rejection};
pub use types::*;
