//! State summaries and the end-to-end pipeline for the atlas-trends system.
//!
//! This crate handles:
//! - State classification behind an injectable classifier
//! - Per-state rtt statistics, segments and coverage ranking
//! - The JSON response record
//! - Single-probe and batch pipeline runs

pub mod classifier;
pub mod pipeline;
pub mod response;
pub mod summary;

pub use classifier::{classify_or_degrade, RttBandClassifier, StateClassifier, StateLabel};
pub use pipeline::{ProbeInput, ProbeOutcome, TrendsPipeline};
pub use response::{ReportKind, ResponseMetadata, TrendsResponse, TrendsResults};
pub use summary::{summarize, RttSummary, Segment, StateSummary, SummaryReport};
