//! JSON response record returned for one probe.

use crate::summary::SummaryReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use trends_core::{EpochSecs, ExtremaResult, MeasurementParameters, ResolvedTick};
use trends_reconcile::ReconcileStats;

/// Which representation `results` carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// The reconciled tick array.
    Raw,
    /// The per-state summary.
    #[default]
    Summary,
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(ReportKind::Raw),
            "summary" => Ok(ReportKind::Summary),
            other => Err(format!("unknown report kind '{other}' (expected raw or summary)")),
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Raw => write!(f, "raw"),
            ReportKind::Summary => write!(f, "summary"),
        }
    }
}

/// Payload of a response, serialized without a tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrendsResults {
    /// The reconciled tick array.
    Ticks(Vec<ResolvedTick>),
    /// The per-state summary.
    Summary(SummaryReport),
}

/// How a response was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Probe the ticks belong to.
    pub probe_id: i64,
    /// Representation carried in `results`.
    pub report: ReportKind,
    /// Tick grid the run used.
    pub parameters: MeasurementParameters,
    /// Reconciliation counters.
    pub reconcile: ReconcileStats,
}

/// Response for one probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendsResponse {
    /// Raw ticks or summary.
    pub results: TrendsResults,
    /// Run metadata.
    pub metadata: ResponseMetadata,
    /// Number of reconciled ticks.
    pub ticks_no: usize,
    /// Earliest timestamp with an rtt, if any.
    pub min_time_stamp: Option<DateTime<Utc>>,
    /// Latest timestamp with an rtt, if any.
    pub max_time_stamp: Option<DateTime<Utc>>,
}

impl TrendsResponse {
    pub fn new(
        results: TrendsResults,
        metadata: ResponseMetadata,
        ticks_no: usize,
        extrema: &ExtremaResult,
    ) -> Self {
        Self {
            results,
            metadata,
            ticks_no,
            min_time_stamp: extrema.min_timestamp.and_then(to_datetime),
            max_time_stamp: extrema.max_timestamp.and_then(to_datetime),
        }
    }
}

fn to_datetime(ts: EpochSecs) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_metadata() -> ResponseMetadata {
        ResponseMetadata {
            probe_id: 6001,
            report: ReportKind::Raw,
            parameters: MeasurementParameters {
                interval_seconds: 240,
                start_epoch: 0,
                spread_seconds: 120.0,
                jitter_seconds: 3.0,
                seek_start_epoch: 0,
                requested_tick_count: 2,
            },
            reconcile: ReconcileStats::default(),
        }
    }

    #[test]
    fn test_report_kind_parse() {
        assert_eq!("raw".parse::<ReportKind>().unwrap(), ReportKind::Raw);
        assert_eq!("Summary".parse::<ReportKind>().unwrap(), ReportKind::Summary);
        assert!("bars".parse::<ReportKind>().is_err());
    }

    #[test]
    fn test_response_json() {
        let extrema = ExtremaResult {
            min_timestamp: Some(1_546_503_240),
            max_timestamp: None,
        };
        let response =
            TrendsResponse::new(TrendsResults::Ticks(vec![]), make_metadata(), 0, &extrema);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["ticksNo"], 0);
        assert_eq!(json["minTimeStamp"], "2019-01-03T08:14:00Z");
        assert!(json["maxTimeStamp"].is_null());
        assert_eq!(json["metadata"]["report"], "raw");
        assert_eq!(json["metadata"]["probeId"], 6001);
        assert!(json["results"].as_array().unwrap().is_empty());
    }
}
