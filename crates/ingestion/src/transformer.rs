//! Row transformation: one raw observation to one candidate tick.
//!
//! Picks the smallest finite rtt among the attempts, derives a status, and
//! places the observation on the measurement's tick grid.

use trends_core::{CandidateTick, MeasurementParameters, RawObservation, TickStatus};

/// Separator between joined error markers in `status_detail`.
const DETAIL_SEPARATOR: &str = "; ";

/// Transform a raw observation into a candidate tick.
pub fn transform(raw: &RawObservation, params: &MeasurementParameters) -> CandidateTick {
    let mut min_rtt: Option<f64> = None;
    let mut timed_out = false;
    let mut markers: Vec<&str> = Vec::new();

    // Keep scanning after the first rtt: a later attempt may be faster.
    for attempt in &raw.attempts {
        if let Some(rtt) = attempt.finite_rtt() {
            min_rtt = Some(match min_rtt {
                Some(current) => current.min(rtt),
                None => rtt,
            });
        }
        if let Some(marker) = attempt.timeout.as_deref() {
            timed_out = true;
            if !marker.is_empty() {
                markers.push(marker);
            }
        }
        if let Some(text) = attempt.error.as_deref() {
            if !text.is_empty() {
                markers.push(text);
            }
        }
    }

    let (status, status_detail) = match min_rtt {
        Some(_) => (TickStatus::Ok, None),
        None if timed_out => (TickStatus::Timeout, None),
        None if markers.is_empty() => (TickStatus::Error, None),
        None => (TickStatus::Error, Some(markers.join(DETAIL_SEPARATOR))),
    };

    let tick_index = params.tick_index_of(raw.timestamp);
    let drift = raw.timestamp - params.nominal_timestamp(tick_index);
    let out_of_band = drift.unsigned_abs() as f64 + params.jitter_seconds > params.spread_seconds;

    CandidateTick {
        timestamp: raw.timestamp,
        tick_index,
        min_rtt,
        status,
        status_detail,
        drift,
        out_of_band,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use trends_core::Attempt;

    fn params() -> MeasurementParameters {
        MeasurementParameters {
            interval_seconds: 240,
            start_epoch: 0,
            spread_seconds: 120.0,
            jitter_seconds: 3.0,
            seek_start_epoch: 0,
            requested_tick_count: 10,
        }
    }

    fn rtt(v: f64) -> Attempt {
        Attempt {
            rtt: Some(v),
            ..Default::default()
        }
    }

    fn timeout() -> Attempt {
        Attempt {
            timeout: Some("*".to_string()),
            ..Default::default()
        }
    }

    fn error(text: &str) -> Attempt {
        Attempt {
            error: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn obs(timestamp: i64, attempts: Vec<Attempt>) -> RawObservation {
        RawObservation {
            timestamp,
            probe_id: 116,
            attempts,
        }
    }

    #[test]
    fn test_min_rtt_over_all_attempts() {
        let c = transform(&obs(480, vec![rtt(12.0), timeout(), rtt(7.5), rtt(9.0)]), &params());
        assert_eq!(c.status, TickStatus::Ok);
        assert_relative_eq!(c.min_rtt.unwrap(), 7.5);
        assert_eq!(c.status_detail, None);
        assert_eq!(c.tick_index, 2);
        assert_eq!(c.drift, 0);
    }

    #[test]
    fn test_non_finite_rtt_ignored() {
        let c = transform(&obs(0, vec![rtt(f64::NAN), rtt(f64::INFINITY), rtt(30.0)]), &params());
        assert_relative_eq!(c.min_rtt.unwrap(), 30.0);
    }

    #[test]
    fn test_timeout_beats_error() {
        let c = transform(&obs(0, vec![error("Network unreachable"), timeout()]), &params());
        assert_eq!(c.status, TickStatus::Timeout);
        assert_eq!(c.min_rtt, None);
    }

    #[test]
    fn test_error_detail_joined_in_order() {
        let c = transform(
            &obs(0, vec![error("Network unreachable"), error(""), error("No route")]),
            &params(),
        );
        assert_eq!(c.status, TickStatus::Error);
        assert_eq!(c.status_detail.as_deref(), Some("Network unreachable; No route"));
    }

    #[test]
    fn test_no_attempts_is_error() {
        let c = transform(&obs(0, vec![]), &params());
        assert_eq!(c.status, TickStatus::Error);
        assert_eq!(c.min_rtt, None);
        assert_eq!(c.status_detail, None);
    }

    #[test]
    fn test_tick_and_drift() {
        // 250s past start: nearest tick is 1, drift +10
        let c = transform(&obs(250, vec![rtt(1.0)]), &params());
        assert_eq!(c.tick_index, 1);
        assert_eq!(c.drift, 10);

        // 350s past start: nearest tick is 1, drift +110
        let c = transform(&obs(350, vec![rtt(1.0)]), &params());
        assert_eq!(c.tick_index, 1);
        assert_eq!(c.drift, 110);

        // exactly half an interval rounds up
        let c = transform(&obs(360, vec![rtt(1.0)]), &params());
        assert_eq!(c.tick_index, 2);
        assert_eq!(c.drift, -120);
    }

    #[test]
    fn test_out_of_band_boundary() {
        // |drift| + jitter == spread -> in band
        let c = transform(&obs(240 + 117, vec![rtt(1.0)]), &params());
        assert_eq!(c.drift, 117);
        assert!(!c.out_of_band);

        // one second more -> out of band
        let c = transform(&obs(240 - 118, vec![rtt(1.0)]), &params());
        assert_eq!(c.drift, -118);
        assert!(c.out_of_band);
    }
}
