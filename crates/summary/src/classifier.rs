//! State classification of reconciled ticks.
//!
//! The production classifier is an external HMM routine. It is injected
//! through [`StateClassifier`] so tests and replays can substitute a
//! deterministic one.

use serde::{Serialize, Serializer};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;
use trends_core::{BandThresholds, Result, RttBand, TickStatus};
use trends_reconcile::TickViews;

/// Label assigned to one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateLabel {
    /// A classifier state.
    State(u16),
    /// Classification was unavailable for this tick.
    Error,
}

impl fmt::Display for StateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateLabel::State(n) => write!(f, "{n}"),
            StateLabel::Error => write!(f, "error"),
        }
    }
}

impl Serialize for StateLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            StateLabel::State(n) => serializer.serialize_u16(*n),
            StateLabel::Error => serializer.serialize_str("error"),
        }
    }
}

/// Assigns a state label to every tick.
pub trait StateClassifier: Send + Sync {
    /// Label each tick. The output must have the same length as the inputs.
    fn fit(&self, timestamps: &[u32], rtt: &[f64], status: &[u8]) -> Result<Vec<StateLabel>>;
}

/// Run a classifier, degrading to uniform error labels if it fails.
///
/// Failure covers an error result, a panic, or output of the wrong length.
pub fn classify_or_degrade(classifier: &dyn StateClassifier, views: &TickViews) -> Vec<StateLabel> {
    let n = views.len();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        classifier.fit(&views.timestamps, &views.rtt, &views.status)
    }));
    match outcome {
        Ok(Ok(labels)) if labels.len() == n => labels,
        Ok(Ok(labels)) => {
            warn!(expected = n, got = labels.len(), "classifier returned wrong number of labels");
            vec![StateLabel::Error; n]
        }
        Ok(Err(e)) => {
            warn!(error = %e, "classifier failed");
            vec![StateLabel::Error; n]
        }
        Err(_) => {
            warn!("classifier panicked");
            vec![StateLabel::Error; n]
        }
    }
}

/// Deterministic classifier labelling ticks by rtt band.
///
/// Ok ticks get their band ordinal (0..=3); other ticks get `4 + status code`.
#[derive(Debug, Clone, Default)]
pub struct RttBandClassifier {
    bands: BandThresholds,
}

impl RttBandClassifier {
    pub fn new(bands: BandThresholds) -> Self {
        Self { bands }
    }
}

impl StateClassifier for RttBandClassifier {
    fn fit(&self, _timestamps: &[u32], rtt: &[f64], status: &[u8]) -> Result<Vec<StateLabel>> {
        Ok(rtt
            .iter()
            .zip(status)
            .map(|(&r, &s)| match TickStatus::from_code(s) {
                Some(TickStatus::Ok) if r.is_finite() => {
                    StateLabel::State(u16::from(RttBand::of(r, &self.bands).ordinal()))
                }
                _ => StateLabel::State(4 + u16::from(s)),
            })
            .collect())
    }
}
