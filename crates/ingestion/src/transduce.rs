//! Single pass from storage rows to an ordered candidate array plus extrema.

use crate::extrema::ExtremaTracker;
use crate::rows::RawRow;
use crate::transformer::transform;
use tracing::debug;
use trends_core::{
    CandidateTick, Error, ExtremaResult, MeasurementParameters, RawObservation, Result,
};

/// Output of [`transduce`].
#[derive(Debug, Clone)]
pub struct Transduced {
    /// Candidates sorted by tick index, ready for reconciliation.
    pub candidates: Vec<CandidateTick>,
    /// Extrema over candidates with an rtt.
    pub extrema: ExtremaResult,
}

/// Decode, transform and order every version of every row.
///
/// A version that fails to decode aborts the whole run.
pub fn transduce(rows: &[RawRow], params: &MeasurementParameters) -> Result<Transduced> {
    params.validate()?;

    let mut candidates = Vec::with_capacity(rows.iter().map(|r| r.versions.len()).sum());
    let mut extrema = ExtremaTracker::new();

    for row in rows {
        for version in &row.versions {
            let raw = version.decode().map_err(|e| match e {
                Error::Parse(msg) => {
                    Error::parse(format!("row {} version {}: {msg}", row.key, version.version))
                }
                other => other,
            })?;
            let candidate = transform(&raw, params);
            extrema.observe(&candidate);
            candidates.push(candidate);
        }
    }

    // Versions come back newest first; order chronologically within a tick.
    candidates.sort_by_key(|c| (c.tick_index, c.timestamp));

    debug!(
        rows = rows.len(),
        candidates = candidates.len(),
        "transduced observation rows"
    );

    Ok(Transduced {
        candidates,
        extrema: extrema.result(),
    })
}

/// Transform already-decoded observations (e.g. from a JSON-lines replay).
pub fn transduce_observations(
    observations: &[RawObservation],
    params: &MeasurementParameters,
) -> Result<Transduced> {
    params.validate()?;

    let mut extrema = ExtremaTracker::new();
    let mut candidates: Vec<CandidateTick> = observations
        .iter()
        .map(|raw| {
            let candidate = transform(raw, params);
            extrema.observe(&candidate);
            candidate
        })
        .collect();
    candidates.sort_by_key(|c| (c.tick_index, c.timestamp));

    Ok(Transduced {
        candidates,
        extrema: extrema.result(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::ColumnVersion;
    use trends_core::TickStatus;

    fn params() -> MeasurementParameters {
        MeasurementParameters {
            interval_seconds: 240,
            start_epoch: 1000,
            spread_seconds: 120.0,
            jitter_seconds: 3.0,
            seek_start_epoch: 1000,
            requested_tick_count: 10,
        }
    }

    fn version(version: i64, json: &str) -> ColumnVersion {
        ColumnVersion {
            version,
            value: json.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_rows_to_sorted_candidates() {
        let rows = vec![
            RawRow {
                key: "msm:1|ts:a".to_string(),
                versions: vec![
                    version(2, r#"{"timestamp":1485,"prb_id":7,"result":[{"x":"*"}]}"#),
                    version(1, r#"{"timestamp":1002,"prb_id":7,"result":[{"rtt":4.0}]}"#),
                ],
            },
            RawRow {
                key: "msm:1|ts:b".to_string(),
                versions: vec![version(
                    1,
                    r#"{"timestamp":1238,"prb_id":7,"result":[{"rtt":6.0}]}"#,
                )],
            },
        ];

        let out = transduce(&rows, &params()).unwrap();
        let ticks: Vec<i64> = out.candidates.iter().map(|c| c.tick_index).collect();
        assert_eq!(ticks, vec![0, 1, 2]);
        assert_eq!(out.candidates[2].status, TickStatus::Timeout);
        assert_eq!(out.extrema.min_timestamp, Some(1002));
        assert_eq!(out.extrema.max_timestamp, Some(1238));
    }

    #[test]
    fn test_duplicates_ordered_by_timestamp() {
        let rows = vec![RawRow {
            key: "k".to_string(),
            versions: vec![
                version(2, r#"{"timestamp":1010,"prb_id":7,"result":[{"rtt":9.0}]}"#),
                version(1, r#"{"timestamp":1001,"prb_id":7,"result":[{"x":"*"}]}"#),
            ],
        }];
        let out = transduce(&rows, &params()).unwrap();
        assert_eq!(out.candidates[0].timestamp, 1001);
        assert_eq!(out.candidates[1].timestamp, 1010);
    }

    #[test]
    fn test_parse_failure_aborts() {
        let rows = vec![RawRow {
            key: "msm:1|ts:bad".to_string(),
            versions: vec![version(1, "{\"timestamp\": oops}")],
        }];
        let err = transduce(&rows, &params()).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        let msg = err.to_string();
        assert!(msg.starts_with("Parse error: row msm:1|ts:bad version 1: "));
        assert_eq!(msg.matches("Parse error").count(), 1);
    }

    #[test]
    fn test_invalid_parameters() {
        let mut p = params();
        p.interval_seconds = -240;
        assert!(matches!(transduce(&[], &p), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_rows() {
        let out = transduce(&[], &params()).unwrap();
        assert!(out.candidates.is_empty());
        assert_eq!(out.extrema, ExtremaResult::default());
    }

    #[test]
    fn test_observations_path() {
        let observations: Vec<RawObservation> = vec![
            serde_json::from_str(r#"{"timestamp":1240,"prb_id":7,"result":[{"rtt":2.0}]}"#)
                .unwrap(),
            serde_json::from_str(r#"{"timestamp":1000,"prb_id":7,"result":[{"rtt":1.0}]}"#)
                .unwrap(),
        ];
        let out = transduce_observations(&observations, &params()).unwrap();
        assert_eq!(out.candidates[0].timestamp, 1000);
        assert_eq!(out.extrema.max_timestamp, Some(1240));
    }
}
