//! End-to-end trends pipeline: rows in, response out.
//!
//! One probe runs single-threaded. A batch fans probes out over a rayon
//! pool; each probe's failure stays in its own [`ProbeOutcome`].

use crate::classifier::{classify_or_degrade, StateClassifier};
use crate::response::{ReportKind, ResponseMetadata, TrendsResponse, TrendsResults};
use crate::summary::summarize;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use trends_core::config::ValidationConfig;
use trends_core::{check_window, Config, Error, MeasurementParameters, RawObservation, Result};
use trends_ingestion::{transduce, transduce_observations, RawRow, RowScan, RowSource, Transduced};
use trends_reconcile::{TickReconciler, TickViews};

/// Rows for one probe.
#[derive(Debug, Clone)]
pub struct ProbeInput {
    pub probe_id: i64,
    pub rows: Vec<RawRow>,
}

/// Result for one probe of a batch.
#[derive(Debug)]
pub struct ProbeOutcome {
    pub probe_id: i64,
    pub result: Result<TrendsResponse>,
}

pub struct TrendsPipeline {
    reconciler: TickReconciler,
    classifier: Box<dyn StateClassifier>,
    validation: ValidationConfig,
    workers: usize,
}

impl TrendsPipeline {
    pub fn new(config: &Config, classifier: Box<dyn StateClassifier>) -> Self {
        Self {
            reconciler: TickReconciler::new(config),
            classifier,
            validation: config.validation.clone(),
            workers: config.batch.workers as usize,
        }
    }

    /// Run one probe from storage rows.
    ///
    /// Fails before reading any row if the window is too long or spans too
    /// few ticks.
    pub fn run_probe(
        &self,
        probe_id: i64,
        rows: &[RawRow],
        params: &MeasurementParameters,
        kind: ReportKind,
    ) -> Result<TrendsResponse> {
        check_window(params, &self.validation)?;
        let transduced = transduce(rows, params)?;
        self.finish(probe_id, transduced, params, kind)
    }

    /// Run one probe from already decoded observations.
    pub fn run_observations(
        &self,
        probe_id: i64,
        observations: &[RawObservation],
        params: &MeasurementParameters,
        kind: ReportKind,
    ) -> Result<TrendsResponse> {
        check_window(params, &self.validation)?;
        let transduced = transduce_observations(observations, params)?;
        self.finish(probe_id, transduced, params, kind)
    }

    /// Scan a row source and run the probe named by the scan.
    pub fn run_scan(
        &self,
        source: &dyn RowSource,
        scan: &RowScan,
        params: &MeasurementParameters,
        kind: ReportKind,
    ) -> Result<TrendsResponse> {
        let rows = source.scan(scan)?;
        self.run_probe(scan.probe_id, &rows, params, kind)
    }

    /// Run many probes in parallel. Output order follows input order.
    pub fn run_batch(
        &self,
        inputs: Vec<ProbeInput>,
        params: &MeasurementParameters,
        kind: ReportKind,
    ) -> Vec<ProbeOutcome> {
        let run = || {
            inputs
                .par_iter()
                .map(|input| ProbeOutcome {
                    probe_id: input.probe_id,
                    result: self.run_probe(input.probe_id, &input.rows, params, kind),
                })
                .collect::<Vec<_>>()
        };

        let outcomes = if self.workers == 0 {
            run()
        } else {
            match rayon::ThreadPoolBuilder::new().num_threads(self.workers).build() {
                Ok(pool) => pool.install(run),
                Err(e) => {
                    warn!(error = %e, workers = self.workers, "falling back to global rayon pool");
                    run()
                }
            }
        };

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(probes = outcomes.len(), failed, "batch complete");
        outcomes
    }

    fn finish(
        &self,
        probe_id: i64,
        transduced: Transduced,
        params: &MeasurementParameters,
        kind: ReportKind,
    ) -> Result<TrendsResponse> {
        if transduced.candidates.is_empty() {
            return Err(Error::insufficient_data(format!("No data for probe {probe_id}")));
        }

        let reconciled = self.reconciler.reconcile(&transduced.candidates, params)?;
        let ticks_no = reconciled.ticks.len();

        let results = match kind {
            ReportKind::Raw => TrendsResults::Ticks(reconciled.ticks),
            ReportKind::Summary => {
                let views = TickViews::from_ticks(&reconciled.ticks)?;
                let labels = classify_or_degrade(self.classifier.as_ref(), &views);
                TrendsResults::Summary(summarize(&reconciled.ticks, &labels, &transduced.extrema)?)
            }
        };

        debug!(probe_id, ticks = ticks_no, report = %kind, "probe complete");

        let metadata = ResponseMetadata {
            probe_id,
            report: kind,
            parameters: params.clone(),
            reconcile: reconciled.stats,
        };
        Ok(TrendsResponse::new(results, metadata, ticks_no, &transduced.extrema))
    }
}
