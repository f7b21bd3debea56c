//! Tick reconciliation for the atlas-trends system.
//!
//! This crate handles:
//! - Gap filling and duplicate resolution onto a fixed tick grid
//! - Per-run reconciliation statistics
//! - Numeric views over reconciled ticks for classifiers

pub mod reconciler;
pub mod views;

pub use reconciler::{reconcile, ReconcileStats, Reconciled, TickReconciler};
pub use views::TickViews;
