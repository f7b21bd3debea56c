//! Data ingestion and normalization for the atlas-trends system.
//!
//! This crate handles:
//! - Storage rows, row keys and row sources
//! - Observation decoding
//! - Row transformation onto the tick grid
//! - Extrema tracking over valid observations

pub mod extrema;
pub mod rows;
pub mod source;
pub mod transduce;
pub mod transformer;

pub use extrema::{track, ExtremaTracker};
pub use rows::{row_key, ColumnVersion, RawRow, RowScan};
pub use source::{MemoryRowSource, RowSource, SqliteRowSource};
pub use transduce::{transduce, transduce_observations, Transduced};
pub use transformer::transform;
