//! PyO3 bindings for atlas-trends Rust components.
//!
//! Exposes the tick pipeline to Python:
//! - Observation decoding and reconciliation
//! - Numeric views for classifiers
//! - State summaries, optionally driven by a Python classifier

use pyo3::exceptions::{PyLookupError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;

use trends_core::{
    Error as CoreError, ExtremaResult, MeasurementParameters as RustParameters, RawObservation,
    ResolvedTick as RustResolvedTick, StatusTag, TickStatus,
};
use trends_ingestion::transduce_observations;
use trends_reconcile::{reconcile, TickViews};
use trends_summary::{classify_or_degrade, summarize, StateClassifier, StateLabel};

fn to_py_err(e: CoreError) -> PyErr {
    match e {
        CoreError::InsufficientData(_) => PyLookupError::new_err(e.to_string()),
        CoreError::Config(_) | CoreError::Data(_) | CoreError::Parse(_) | CoreError::Json(_) => {
            PyValueError::new_err(e.to_string())
        }
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// Tick grid parameters for one measurement window.
#[pyclass]
#[derive(Clone)]
pub struct MeasurementParameters {
    #[pyo3(get, set)]
    pub interval_seconds: i64,
    #[pyo3(get, set)]
    pub start_epoch: i64,
    #[pyo3(get, set)]
    pub spread_seconds: f64,
    #[pyo3(get, set)]
    pub jitter_seconds: f64,
    #[pyo3(get, set)]
    pub seek_start_epoch: i64,
    #[pyo3(get, set)]
    pub requested_tick_count: u32,
}

#[pymethods]
impl MeasurementParameters {
    #[new]
    fn new(
        interval_seconds: i64,
        start_epoch: i64,
        spread_seconds: f64,
        jitter_seconds: f64,
        seek_start_epoch: i64,
        requested_tick_count: u32,
    ) -> Self {
        MeasurementParameters {
            interval_seconds,
            start_epoch,
            spread_seconds,
            jitter_seconds,
            seek_start_epoch,
            requested_tick_count,
        }
    }

    /// Raise ValueError if the parameters cannot describe a tick grid.
    fn validate(&self) -> PyResult<()> {
        RustParameters::from(self.clone()).validate().map_err(to_py_err)
    }

    /// Number of ticks a reconciliation produces.
    #[getter]
    fn output_len(&self) -> usize {
        RustParameters::from(self.clone()).output_len()
    }

    fn __repr__(&self) -> String {
        format!(
            "MeasurementParameters(interval={}, start={}, seek_start={}, ticks={})",
            self.interval_seconds,
            self.start_epoch,
            self.seek_start_epoch,
            self.requested_tick_count
        )
    }
}

impl From<MeasurementParameters> for RustParameters {
    fn from(p: MeasurementParameters) -> Self {
        RustParameters {
            interval_seconds: p.interval_seconds,
            start_epoch: p.start_epoch,
            spread_seconds: p.spread_seconds,
            jitter_seconds: p.jitter_seconds,
            seek_start_epoch: p.seek_start_epoch,
            requested_tick_count: p.requested_tick_count,
        }
    }
}

/// One reconciled tick.
#[pyclass]
#[derive(Clone)]
pub struct ResolvedTick {
    #[pyo3(get, set)]
    pub timestamp: i64,
    #[pyo3(get, set)]
    pub tick_index: i64,
    #[pyo3(get, set)]
    pub min_rtt: Option<f64>,
    /// Status code: 0 ok, 1 timeout, 2 missing, 3 error.
    #[pyo3(get, set)]
    pub status: u8,
    #[pyo3(get, set)]
    pub status_detail: Option<String>,
    #[pyo3(get, set)]
    pub drift: i64,
    #[pyo3(get, set)]
    pub out_of_band: bool,
    #[pyo3(get, set)]
    pub status_tag: Option<String>,
}

#[pymethods]
impl ResolvedTick {
    #[getter]
    fn is_synthetic(&self) -> bool {
        self.status == TickStatus::Missing.code() && self.status_tag.is_some()
    }

    fn __repr__(&self) -> String {
        format!(
            "ResolvedTick(tick={}, ts={}, rtt={:?}, status={}, tag={:?})",
            self.tick_index, self.timestamp, self.min_rtt, self.status, self.status_tag
        )
    }
}

impl From<RustResolvedTick> for ResolvedTick {
    fn from(t: RustResolvedTick) -> Self {
        ResolvedTick {
            timestamp: t.timestamp,
            tick_index: t.tick_index,
            min_rtt: t.min_rtt,
            status: t.status.code(),
            status_detail: t.status_detail,
            drift: t.drift,
            out_of_band: t.out_of_band,
            status_tag: t.status_tag.map(|tag| tag.as_str().to_string()),
        }
    }
}

impl TryFrom<&ResolvedTick> for RustResolvedTick {
    type Error = PyErr;

    fn try_from(t: &ResolvedTick) -> PyResult<Self> {
        let status = TickStatus::from_code(t.status)
            .ok_or_else(|| PyValueError::new_err(format!("invalid status code {}", t.status)))?;
        let status_tag = t
            .status_tag
            .as_deref()
            .map(str::parse::<StatusTag>)
            .transpose()
            .map_err(to_py_err)?;
        Ok(RustResolvedTick {
            timestamp: t.timestamp,
            tick_index: t.tick_index,
            min_rtt: t.min_rtt,
            status,
            status_detail: t.status_detail.clone(),
            drift: t.drift,
            out_of_band: t.out_of_band,
            status_tag,
        })
    }
}

fn ticks_to_rust(ticks: &[ResolvedTick]) -> PyResult<Vec<RustResolvedTick>> {
    ticks.iter().map(RustResolvedTick::try_from).collect()
}

/// Accepts an int state or "error" / None.
fn label_from_py(obj: &Bound<'_, PyAny>) -> PyResult<StateLabel> {
    if obj.is_none() {
        return Ok(StateLabel::Error);
    }
    if let Ok(n) = obj.extract::<u16>() {
        return Ok(StateLabel::State(n));
    }
    match obj.extract::<String>() {
        Ok(s) if s == "error" => Ok(StateLabel::Error),
        _ => Err(PyValueError::new_err(format!("invalid state label: {obj}"))),
    }
}

/// A Python callable `(timestamps, rtt, status) -> labels` used as a classifier.
struct PyStateClassifier {
    callable: Py<PyAny>,
}

impl StateClassifier for PyStateClassifier {
    fn fit(
        &self,
        timestamps: &[u32],
        rtt: &[f64],
        status: &[u8],
    ) -> trends_core::Result<Vec<StateLabel>> {
        Python::with_gil(|py| -> PyResult<Vec<StateLabel>> {
            let out = self
                .callable
                .bind(py)
                .call1((timestamps.to_vec(), rtt.to_vec(), status.to_vec()))?;
            let mut labels = Vec::with_capacity(timestamps.len());
            for item in out.iter()? {
                labels.push(label_from_py(&item?)?);
            }
            Ok(labels)
        })
        .map_err(|e| CoreError::classifier(e.to_string()))
    }
}

// ============================================================================
// Python-exposed Functions
// ============================================================================

/// Decode JSON observation blobs and reconcile them onto the tick grid.
///
/// Returns `(ticks, min_timestamp, max_timestamp)`.
#[pyfunction]
fn reconcile_blobs(
    blobs: Vec<Bound<'_, PyBytes>>,
    params: MeasurementParameters,
) -> PyResult<(Vec<ResolvedTick>, Option<i64>, Option<i64>)> {
    let params = RustParameters::from(params);
    let observations = blobs
        .iter()
        .enumerate()
        .map(|(n, blob)| {
            serde_json::from_slice::<RawObservation>(blob.as_bytes())
                .map_err(|e| PyValueError::new_err(format!("blob {n}: {e}")))
        })
        .collect::<PyResult<Vec<_>>>()?;

    let transduced = transduce_observations(&observations, &params).map_err(to_py_err)?;
    let ticks = reconcile(&transduced.candidates, &params).map_err(to_py_err)?;

    Ok((
        ticks.into_iter().map(Into::into).collect(),
        transduced.extrema.min_timestamp,
        transduced.extrema.max_timestamp,
    ))
}

/// Parallel `(timestamps, rtt, status)` lists for a classifier.
#[pyfunction]
fn tick_views(ticks: Vec<ResolvedTick>) -> PyResult<(Vec<u32>, Vec<f64>, Vec<u8>)> {
    let views = TickViews::from_ticks(&ticks_to_rust(&ticks)?).map_err(to_py_err)?;
    Ok((views.timestamps, views.rtt, views.status))
}

/// Summarize labelled ticks, returned as a JSON string.
#[pyfunction]
#[pyo3(signature = (ticks, labels, min_ts=None, max_ts=None))]
fn summarize_json(
    ticks: Vec<ResolvedTick>,
    labels: Vec<Bound<'_, PyAny>>,
    min_ts: Option<i64>,
    max_ts: Option<i64>,
) -> PyResult<String> {
    let ticks = ticks_to_rust(&ticks)?;
    let labels = labels.iter().map(label_from_py).collect::<PyResult<Vec<_>>>()?;
    let extrema = ExtremaResult {
        min_timestamp: min_ts,
        max_timestamp: max_ts,
    };
    let report = summarize(&ticks, &labels, &extrema).map_err(to_py_err)?;
    serde_json::to_string(&report).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

/// Classify ticks with a Python callable and summarize, returned as a JSON string.
///
/// A classifier that raises or returns the wrong number of labels degrades
/// to uniform "error" labels.
#[pyfunction]
#[pyo3(signature = (ticks, classifier, min_ts=None, max_ts=None))]
fn classify_and_summarize(
    ticks: Vec<ResolvedTick>,
    classifier: Py<PyAny>,
    min_ts: Option<i64>,
    max_ts: Option<i64>,
) -> PyResult<String> {
    let ticks = ticks_to_rust(&ticks)?;
    let views = TickViews::from_ticks(&ticks).map_err(to_py_err)?;
    let labels = classify_or_degrade(&PyStateClassifier { callable: classifier }, &views);
    let extrema = ExtremaResult {
        min_timestamp: min_ts,
        max_timestamp: max_ts,
    };
    let report = summarize(&ticks, &labels, &extrema).map_err(to_py_err)?;
    serde_json::to_string(&report).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

// ============================================================================
// Module Definition
// ============================================================================

/// Atlas Trends - ping tick reconciliation and state summaries.
#[pymodule]
fn atlas_trends(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<MeasurementParameters>()?;
    m.add_class::<ResolvedTick>()?;

    // Functions
    m.add_function(wrap_pyfunction!(reconcile_blobs, m)?)?;
    m.add_function(wrap_pyfunction!(tick_views, m)?)?;
    m.add_function(wrap_pyfunction!(summarize_json, m)?)?;
    m.add_function(wrap_pyfunction!(classify_and_summarize, m)?)?;

    Ok(())
}
