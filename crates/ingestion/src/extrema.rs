//! Running earliest/latest timestamp over candidates that carry an rtt.

use trends_core::{CandidateTick, EpochSecs, ExtremaResult};

/// Extrema accumulator, fed in the same pass that builds the candidates.
#[derive(Debug, Clone, Default)]
pub struct ExtremaTracker {
    min: Option<EpochSecs>,
    max: Option<EpochSecs>,
}

impl ExtremaTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one candidate. Candidates without a finite rtt are ignored.
    pub fn observe(&mut self, candidate: &CandidateTick) {
        if !candidate.has_rtt() {
            return;
        }
        let ts = candidate.timestamp;
        self.min = Some(self.min.map_or(ts, |m| m.min(ts)));
        self.max = Some(self.max.map_or(ts, |m| m.max(ts)));
    }

    /// Current extrema.
    pub fn result(&self) -> ExtremaResult {
        ExtremaResult {
            min_timestamp: self.min,
            max_timestamp: self.max,
        }
    }
}

/// Extrema of a complete candidate list.
pub fn track(candidates: &[CandidateTick]) -> ExtremaResult {
    let mut tracker = ExtremaTracker::new();
    for candidate in candidates {
        tracker.observe(candidate);
    }
    tracker.result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trends_core::TickStatus;

    fn candidate(timestamp: i64, min_rtt: Option<f64>) -> CandidateTick {
        CandidateTick {
            timestamp,
            tick_index: timestamp / 240,
            min_rtt,
            status: if min_rtt.is_some() { TickStatus::Ok } else { TickStatus::Timeout },
            status_detail: None,
            drift: 0,
            out_of_band: false,
        }
    }

    #[test]
    fn test_only_rtt_candidates_count() {
        let candidates = vec![
            candidate(0, None),
            candidate(480, Some(12.0)),
            candidate(240, Some(3.0)),
            candidate(960, None),
        ];
        let result = track(&candidates);
        assert_eq!(result.min_timestamp, Some(240));
        assert_eq!(result.max_timestamp, Some(480));
    }

    #[test]
    fn test_all_without_rtt() {
        let candidates = vec![candidate(0, None), candidate(240, None)];
        assert_eq!(track(&candidates), ExtremaResult::default());
    }

    #[test]
    fn test_empty() {
        let result = ExtremaTracker::new().result();
        assert_eq!(result.min_timestamp, None);
        assert_eq!(result.max_timestamp, None);
    }
}
