//! Per-state summary of a labelled tick sequence.
//!
//! Groups ticks by label, computes rtt statistics per group, splits the
//! sequence into runs of equal labels and ranks labels by time coverage.

use crate::classifier::StateLabel;
use ordered_float::OrderedFloat;
use serde::Serialize;
use statrs::statistics::{Data, Max, Median, Min};
use std::cmp::Ordering;
use std::collections::HashMap;
use trends_core::{EpochSecs, Error, ExtremaResult, ResolvedTick, Result};

/// Rtt statistics over the finite rtt values of one state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RttSummary {
    /// Smallest rtt (ms).
    pub min: f64,
    /// Largest rtt (ms).
    pub max: f64,
    /// Median rtt (ms).
    pub median: f64,
}

impl RttSummary {
    /// `None` when there are no values.
    pub fn from_values(values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let data = Data::new(values);
        Some(Self {
            min: data.min(),
            max: data.max(),
            median: data.median(),
        })
    }
}

/// Summary of one state label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSummary {
    /// The state label.
    pub id: StateLabel,
    /// Null when no tick in this state carries an rtt.
    pub rtt_summary: Option<RttSummary>,
    /// Seconds covered by this state's segments.
    pub summed_duration: i64,
    /// Null when the extrema span is unknown or not positive.
    pub summed_duration_as_percentage_of_total: Option<f64>,
}

/// Maximal run of equal consecutive labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Label shared by every tick in the run.
    pub state: StateLabel,
    /// First tick position.
    pub start: usize,
    /// Tick position after the run (exclusive).
    pub stop: usize,
    /// Timestamp at `start`.
    pub start_time: EpochSecs,
    /// Timestamp at `stop`, or of the last tick for the final run.
    pub stop_time: EpochSecs,
}

impl Segment {
    pub fn duration(&self) -> i64 {
        self.stop_time - self.start_time
    }
}

/// Per-state summary of one tick sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    /// Number of distinct labels.
    pub states_count: usize,
    /// Sorted by coverage, highest first.
    pub states: Vec<StateSummary>,
    /// Runs of equal labels in tick order.
    pub segments: Vec<Segment>,
}

/// Build the summary report for a labelled tick sequence.
pub fn summarize(
    ticks: &[ResolvedTick],
    labels: &[StateLabel],
    extrema: &ExtremaResult,
) -> Result<SummaryReport> {
    if ticks.len() != labels.len() {
        return Err(Error::data(format!(
            "label count {} does not match tick count {}",
            labels.len(),
            ticks.len()
        )));
    }

    let groups = group_by_label(labels);
    let segments = segments(ticks, labels);

    let mut durations: HashMap<StateLabel, i64> = HashMap::new();
    for segment in &segments {
        *durations.entry(segment.state).or_default() += segment.duration();
    }

    let span = extrema.span().filter(|&s| s > 0);

    let mut states: Vec<StateSummary> = groups
        .into_iter()
        .map(|(label, positions)| {
            let values = positions
                .iter()
                .filter_map(|&p| ticks[p].min_rtt)
                .filter(|r| r.is_finite())
                .collect();
            let summed_duration = durations.get(&label).copied().unwrap_or(0);
            StateSummary {
                id: label,
                rtt_summary: RttSummary::from_values(values),
                summed_duration,
                summed_duration_as_percentage_of_total: span
                    .map(|s| summed_duration as f64 / s as f64 * 100.0),
            }
        })
        .collect();

    // Stable, so equal coverage keeps first-seen order.
    states.sort_by(|a, b| {
        compare_coverage(
            a.summed_duration_as_percentage_of_total,
            b.summed_duration_as_percentage_of_total,
        )
    });

    Ok(SummaryReport {
        states_count: states.len(),
        states,
        segments,
    })
}

/// Tick positions per label, labels in first-seen order.
fn group_by_label(labels: &[StateLabel]) -> Vec<(StateLabel, Vec<usize>)> {
    let mut groups: Vec<(StateLabel, Vec<usize>)> = Vec::new();
    let mut slot: HashMap<StateLabel, usize> = HashMap::new();
    for (pos, &label) in labels.iter().enumerate() {
        let idx = *slot.entry(label).or_insert_with(|| {
            groups.push((label, Vec::new()));
            groups.len() - 1
        });
        groups[idx].1.push(pos);
    }
    groups
}

fn segments(ticks: &[ResolvedTick], labels: &[StateLabel]) -> Vec<Segment> {
    let n = labels.len();
    let mut out = Vec::new();
    let mut start = 0;
    while start < n {
        let state = labels[start];
        let mut stop = start + 1;
        while stop < n && labels[stop] == state {
            stop += 1;
        }
        let stop_time = if stop < n {
            ticks[stop].timestamp
        } else {
            ticks[n - 1].timestamp
        };
        out.push(Segment {
            state,
            start,
            stop,
            start_time: ticks[start].timestamp,
            stop_time,
        });
        start = stop;
    }
    out
}

/// Descending, with absent coverage last.
fn compare_coverage(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => OrderedFloat(y).cmp(&OrderedFloat(x)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use trends_core::TickStatus;

    const S0: StateLabel = StateLabel::State(0);
    const S1: StateLabel = StateLabel::State(1);

    fn make_tick(i: i64, rtt: Option<f64>) -> ResolvedTick {
        ResolvedTick {
            timestamp: 1000 + 100 * i,
            tick_index: i,
            min_rtt: rtt,
            status: if rtt.is_some() {
                TickStatus::Ok
            } else {
                TickStatus::Missing
            },
            status_detail: None,
            drift: 0,
            out_of_band: false,
            status_tag: None,
        }
    }

    fn extrema(min: i64, max: i64) -> ExtremaResult {
        ExtremaResult {
            min_timestamp: Some(min),
            max_timestamp: Some(max),
        }
    }

    #[test]
    fn test_segments_and_durations() {
        let ticks: Vec<_> = (0..5).map(|i| make_tick(i, Some(10.0 + i as f64))).collect();
        let labels = [S0, S0, S1, S1, S0];

        let report = summarize(&ticks, &labels, &extrema(1000, 1400)).unwrap();

        assert_eq!(report.segments.len(), 3);
        assert_eq!(
            report.segments[0],
            Segment {
                state: S0,
                start: 0,
                stop: 2,
                start_time: 1000,
                stop_time: 1200,
            }
        );
        assert_eq!(
            report.segments[1],
            Segment {
                state: S1,
                start: 2,
                stop: 4,
                start_time: 1200,
                stop_time: 1400,
            }
        );
        // Final segment ends at the last tick's timestamp.
        assert_eq!(
            report.segments[2],
            Segment {
                state: S0,
                start: 4,
                stop: 5,
                start_time: 1400,
                stop_time: 1400,
            }
        );

        assert_eq!(report.states_count, 2);
        let s0 = report.states.iter().find(|s| s.id == S0).unwrap();
        let s1 = report.states.iter().find(|s| s.id == S1).unwrap();
        assert_eq!(s0.summed_duration, 200);
        assert_eq!(s1.summed_duration, 200);
        assert_relative_eq!(s0.summed_duration_as_percentage_of_total.unwrap(), 50.0);
    }

    #[test]
    fn test_rtt_statistics() {
        let ticks = vec![
            make_tick(0, Some(4.0)),
            make_tick(1, Some(1.0)),
            make_tick(2, None),
            make_tick(3, Some(9.0)),
            make_tick(4, Some(2.0)),
        ];
        let labels = [S0; 5];

        let report = summarize(&ticks, &labels, &extrema(1000, 1400)).unwrap();
        let rtt = report.states[0].rtt_summary.unwrap();

        assert_relative_eq!(rtt.min, 1.0);
        assert_relative_eq!(rtt.max, 9.0);
        assert_relative_eq!(rtt.median, 3.0);
    }

    #[test]
    fn test_group_without_rtt() {
        let ticks = vec![make_tick(0, Some(5.0)), make_tick(1, None), make_tick(2, None)];
        let labels = [S0, StateLabel::Error, StateLabel::Error];

        let report = summarize(&ticks, &labels, &extrema(1000, 1000)).unwrap();
        let err = report.states.iter().find(|s| s.id == StateLabel::Error).unwrap();

        assert!(err.rtt_summary.is_none());
        // Zero span: coverage is unknown.
        assert!(err.summed_duration_as_percentage_of_total.is_none());
    }

    #[test]
    fn test_sorted_by_coverage() {
        let ticks: Vec<_> = (0..6).map(|i| make_tick(i, Some(1.0))).collect();
        let labels = [S0, S1, S1, S1, S1, StateLabel::Error];

        let report = summarize(&ticks, &labels, &extrema(1000, 1500)).unwrap();
        let order: Vec<_> = report.states.iter().map(|s| s.id).collect();

        // S1 covers 400s, S0 100s, error 0s.
        assert_eq!(order, vec![S1, S0, StateLabel::Error]);
    }

    #[test]
    fn test_null_coverage_keeps_first_seen_order() {
        let ticks: Vec<_> = (0..3).map(|i| make_tick(i, None)).collect();
        let labels = [S1, S0, S1];

        let report = summarize(&ticks, &labels, &ExtremaResult::default()).unwrap();
        let order: Vec<_> = report.states.iter().map(|s| s.id).collect();

        assert_eq!(order, vec![S1, S0]);
    }

    #[test]
    fn test_length_mismatch() {
        let ticks = vec![make_tick(0, Some(1.0))];
        assert!(matches!(
            summarize(&ticks, &[S0, S1], &ExtremaResult::default()),
            Err(Error::Data(_))
        ));
    }

    #[test]
    fn test_empty() {
        let report = summarize(&[], &[], &ExtremaResult::default()).unwrap();
        assert_eq!(report.states_count, 0);
        assert!(report.segments.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let ticks = vec![make_tick(0, None)];
        let report = summarize(&ticks, &[StateLabel::Error], &ExtremaResult::default()).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["statesCount"], 1);
        assert_eq!(json["states"][0]["id"], "error");
        assert!(json["states"][0]["rtt_summary"].is_null());
        assert_eq!(json["segments"][0]["startTime"], 1000);
    }
}
