//! Core data types for the atlas-trends system.

use crate::config::BandThresholds;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Timestamp in seconds since Unix epoch (UTC).
pub type EpochSecs = i64;

/// Nominal interval number, counted from the measurement start.
pub type TickIndex = i64;

/// A reconciled, gapless run of ticks.
pub type TickSequence = Vec<ResolvedTick>;

/// Integer division rounded half toward positive infinity.
///
/// Matches `floor(num / den + 0.5)` without going through floating point.
#[inline]
pub fn round_div(num: i64, den: i64) -> i64 {
    debug_assert!(den > 0);
    (2 * num + den).div_euclid(2 * den)
}

/// One ping attempt inside an observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// Round-trip time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtt: Option<f64>,
    /// Timeout marker (`"*"` on the wire).
    #[serde(default, rename = "x", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Error text reported by the probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Attempt {
    /// The rtt, if it is a usable finite number.
    #[inline]
    pub fn finite_rtt(&self) -> Option<f64> {
        self.rtt.filter(|r| r.is_finite())
    }

    /// Whether this attempt timed out.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        self.timeout.is_some()
    }
}

/// A single measurement report from a probe (one row version).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    /// Report timestamp (seconds).
    pub timestamp: EpochSecs,
    /// Reporting probe.
    #[serde(rename = "prb_id")]
    pub probe_id: i64,
    /// Attempts in the order the probe sent them.
    #[serde(rename = "result", default)]
    pub attempts: Vec<Attempt>,
}

/// Measurement parameters for one reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementParameters {
    /// Expected spacing between reports (seconds).
    pub interval_seconds: i64,
    /// Nominal measurement start.
    pub start_epoch: EpochSecs,
    /// Allowed scheduling variance (seconds).
    pub spread_seconds: f64,
    /// Extra slack added to the spread.
    pub jitter_seconds: f64,
    /// Requested window start.
    pub seek_start_epoch: EpochSecs,
    /// Number of ticks requested. The output holds one fewer.
    pub requested_tick_count: u32,
}

impl MeasurementParameters {
    /// Check the parameter invariants.
    pub fn validate(&self) -> Result<()> {
        if self.interval_seconds <= 0 {
            return Err(Error::config(format!(
                "interval must be positive, got {}",
                self.interval_seconds
            )));
        }
        if self.requested_tick_count == 0 {
            return Err(Error::config("requested tick count must be positive"));
        }
        if !(self.spread_seconds.is_finite() && self.spread_seconds > 0.0) {
            return Err(Error::config(format!(
                "spread must be a positive number, got {}",
                self.spread_seconds
            )));
        }
        if !(self.jitter_seconds.is_finite() && self.jitter_seconds >= 0.0) {
            return Err(Error::config(format!(
                "jitter must be a non-negative number, got {}",
                self.jitter_seconds
            )));
        }
        Ok(())
    }

    /// Tick index nearest to a timestamp.
    #[inline]
    pub fn tick_index_of(&self, ts: EpochSecs) -> TickIndex {
        round_div(ts - self.start_epoch, self.interval_seconds)
    }

    /// Nominal timestamp of a tick.
    #[inline]
    pub fn nominal_timestamp(&self, tick: TickIndex) -> EpochSecs {
        self.start_epoch + self.interval_seconds * tick
    }

    /// First tick index of the requested window.
    #[inline]
    pub fn start_tick_index(&self) -> TickIndex {
        self.tick_index_of(self.seek_start_epoch)
    }

    /// Number of slots in a reconciled sequence.
    #[inline]
    pub fn output_len(&self) -> usize {
        self.requested_tick_count.saturating_sub(1) as usize
    }

    /// One-past-the-end tick index of the output window.
    #[inline]
    pub fn end_tick_index(&self) -> TickIndex {
        self.start_tick_index() + self.output_len() as TickIndex
    }
}

/// Status of a tick. The discriminant is the wire status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum TickStatus {
    /// At least one attempt returned an rtt.
    Ok = 0,
    /// No rtt, at least one attempt timed out.
    Timeout = 1,
    /// No observation for this tick.
    Missing = 2,
    /// No rtt and no timeout.
    Error = 3,
}

impl TickStatus {
    /// Status code used in the numeric views.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a status code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TickStatus::Ok),
            1 => Some(TickStatus::Timeout),
            2 => Some(TickStatus::Missing),
            3 => Some(TickStatus::Error),
            _ => None,
        }
    }
}

/// How a resolved tick came to be, when it is not a plain aligned observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusTag {
    /// Duplicate; the first had an rtt.
    #[serde(rename = "doubletick1")]
    DoubleTick1,
    /// Duplicate; only the second had an rtt.
    #[serde(rename = "doubletick2")]
    DoubleTick2,
    /// Duplicate; neither had an rtt, first kept.
    #[serde(rename = "doubletick3")]
    DoubleTick3,
    /// Synthesized for a hole between observations.
    #[serde(rename = "missingGap")]
    MissingGap,
    /// Synthesized after dropping input that lagged the window.
    #[serde(rename = "missingFront")]
    MissingFront,
    /// Synthesized after the input ran out.
    #[serde(rename = "missingEnd")]
    MissingEnd,
}

impl StatusTag {
    /// Whether this tag marks a synthesized tick.
    #[inline]
    pub fn is_synthetic(self) -> bool {
        matches!(
            self,
            StatusTag::MissingGap | StatusTag::MissingFront | StatusTag::MissingEnd
        )
    }

    /// Progress glyph used in reconcile traces.
    pub fn glyph(self) -> char {
        match self {
            StatusTag::DoubleTick1 | StatusTag::DoubleTick2 | StatusTag::DoubleTick3 => 'd',
            StatusTag::MissingGap => 'm',
            StatusTag::MissingFront => 'f',
            StatusTag::MissingEnd => 'e',
        }
    }

    /// Wire name of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            StatusTag::DoubleTick1 => "doubletick1",
            StatusTag::DoubleTick2 => "doubletick2",
            StatusTag::DoubleTick3 => "doubletick3",
            StatusTag::MissingGap => "missingGap",
            StatusTag::MissingFront => "missingFront",
            StatusTag::MissingEnd => "missingEnd",
        }
    }
}

impl std::str::FromStr for StatusTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [
            StatusTag::DoubleTick1,
            StatusTag::DoubleTick2,
            StatusTag::DoubleTick3,
            StatusTag::MissingGap,
            StatusTag::MissingFront,
            StatusTag::MissingEnd,
        ]
        .into_iter()
        .find(|tag| tag.as_str() == s)
        .ok_or_else(|| Error::parse(format!("unknown status tag '{s}'")))
    }
}

/// Coarse rtt band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RttBand {
    S,
    M,
    L,
    Xl,
}

impl RttBand {
    /// Band for an rtt value.
    pub fn of(rtt: f64, thresholds: &BandThresholds) -> Self {
        if rtt < thresholds.small_ms {
            RttBand::S
        } else if rtt < thresholds.medium_ms {
            RttBand::M
        } else if rtt < thresholds.large_ms {
            RttBand::L
        } else {
            RttBand::Xl
        }
    }

    /// Ordinal, 0 for the fastest band.
    #[inline]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Progress glyph used in reconcile traces.
    pub fn glyph(self) -> char {
        match self {
            RttBand::S => '.',
            RttBand::M => ',',
            RttBand::L => '-',
            RttBand::Xl => '+',
        }
    }
}

/// One observation mapped onto the tick grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTick {
    /// Actual report timestamp.
    pub timestamp: EpochSecs,
    /// Nearest nominal tick.
    #[serde(rename = "tick")]
    pub tick_index: TickIndex,
    /// Smallest finite rtt across attempts.
    pub min_rtt: Option<f64>,
    /// Ok, timeout or error.
    pub status: TickStatus,
    /// Joined error text, for error ticks.
    pub status_detail: Option<String>,
    /// Offset from the nominal tick boundary.
    pub drift: i64,
    /// Outside the spread + jitter band.
    pub out_of_band: bool,
}

impl CandidateTick {
    /// Whether this candidate carries a finite rtt.
    #[inline]
    pub fn has_rtt(&self) -> bool {
        self.min_rtt.is_some_and(f64::is_finite)
    }
}

/// A tick in the reconciled output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTick {
    /// Observation time, or the nominal slot time when synthesized.
    pub timestamp: EpochSecs,
    /// Slot on the tick grid.
    #[serde(rename = "tick")]
    pub tick_index: TickIndex,
    /// Smallest finite rtt (ms), if any.
    pub min_rtt: Option<f64>,
    /// Tick status.
    pub status: TickStatus,
    /// Joined error markers for error ticks.
    pub status_detail: Option<String>,
    /// Seconds between the timestamp and the nominal slot time.
    pub drift: i64,
    /// Whether the drift plus jitter exceeds the spread.
    pub out_of_band: bool,
    /// `None` for a plain aligned observation.
    pub status_tag: Option<StatusTag>,
}

impl ResolvedTick {
    /// Carry a candidate through unchanged.
    pub fn from_candidate(candidate: &CandidateTick, tag: Option<StatusTag>) -> Self {
        Self {
            timestamp: candidate.timestamp,
            tick_index: candidate.tick_index,
            min_rtt: candidate.min_rtt,
            status: candidate.status,
            status_detail: candidate.status_detail.clone(),
            drift: candidate.drift,
            out_of_band: candidate.out_of_band,
            status_tag: tag,
        }
    }

    /// A placeholder for a tick with no usable observation.
    pub fn synthetic(tick: TickIndex, params: &MeasurementParameters, tag: StatusTag) -> Self {
        Self {
            timestamp: params.nominal_timestamp(tick),
            tick_index: tick,
            min_rtt: None,
            status: TickStatus::Missing,
            status_detail: None,
            drift: 0,
            out_of_band: false,
            status_tag: Some(tag),
        }
    }

    /// Whether this tick carries a finite rtt.
    #[inline]
    pub fn has_rtt(&self) -> bool {
        self.min_rtt.is_some_and(f64::is_finite)
    }

    /// Whether this tick was synthesized by the reconciler.
    #[inline]
    pub fn is_synthetic(&self) -> bool {
        self.status_tag.is_some_and(StatusTag::is_synthetic)
    }
}

/// Earliest and latest timestamps among ticks that carry an rtt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtremaResult {
    pub min_timestamp: Option<EpochSecs>,
    pub max_timestamp: Option<EpochSecs>,
}

impl ExtremaResult {
    /// Span between the extrema, if both are known.
    pub fn span(&self) -> Option<i64> {
        match (self.min_timestamp, self.max_timestamp) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> MeasurementParameters {
        MeasurementParameters {
            interval_seconds: 240,
            start_epoch: 1_546_503_240,
            spread_seconds: 120.0,
            jitter_seconds: 3.0,
            seek_start_epoch: 1_546_503_240 + 240 * 10,
            requested_tick_count: 5,
        }
    }

    #[test]
    fn test_round_div_half_up() {
        assert_eq!(round_div(119, 240), 0);
        assert_eq!(round_div(120, 240), 1);
        assert_eq!(round_div(-120, 240), 0);
        assert_eq!(round_div(-121, 240), -1);
        assert_eq!(round_div(-360, 240), -1);
        assert_eq!(round_div(480, 240), 2);
    }

    #[test]
    fn test_parameters_window() {
        let p = params();
        assert!(p.validate().is_ok());
        assert_eq!(p.start_tick_index(), 10);
        assert_eq!(p.output_len(), 4);
        assert_eq!(p.end_tick_index(), 14);
        assert_eq!(p.nominal_timestamp(11), 1_546_503_240 + 240 * 11);
    }

    #[test]
    fn test_parameters_reject_bad_interval() {
        let mut p = params();
        p.interval_seconds = 0;
        assert!(matches!(p.validate(), Err(Error::Config(_))));

        let mut p = params();
        p.requested_tick_count = 0;
        assert!(p.validate().is_err());

        let mut p = params();
        p.jitter_seconds = -1.0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(TickStatus::Ok.code(), 0);
        assert_eq!(TickStatus::Timeout.code(), 1);
        assert_eq!(TickStatus::Missing.code(), 2);
        assert_eq!(TickStatus::Error.code(), 3);
        assert_eq!(TickStatus::from_code(2), Some(TickStatus::Missing));
        assert_eq!(TickStatus::from_code(9), None);
    }

    #[test]
    fn test_rtt_bands() {
        let t = BandThresholds::default();
        assert_eq!(RttBand::of(3.2, &t), RttBand::S);
        assert_eq!(RttBand::of(10.0, &t), RttBand::M);
        assert_eq!(RttBand::of(99.9, &t), RttBand::L);
        assert_eq!(RttBand::of(250.0, &t), RttBand::Xl);
        assert_eq!(RttBand::Xl.glyph(), '+');
    }

    #[test]
    fn test_observation_wire_format() {
        let json = r#"{"timestamp":1546503241,"prb_id":116,"result":[{"rtt":12.5},{"x":"*"},{"error":"Network unreachable"}],"msm_id":18725407}"#;
        let obs: RawObservation = serde_json::from_str(json).unwrap();
        assert_eq!(obs.probe_id, 116);
        assert_eq!(obs.attempts.len(), 3);
        assert_eq!(obs.attempts[0].finite_rtt(), Some(12.5));
        assert!(obs.attempts[1].is_timeout());
        assert_eq!(obs.attempts[2].error.as_deref(), Some("Network unreachable"));
    }

    #[test]
    fn test_synthetic_tick() {
        let p = params();
        let tick = ResolvedTick::synthetic(12, &p, StatusTag::MissingGap);
        assert_eq!(tick.timestamp, p.nominal_timestamp(12));
        assert_eq!(tick.status, TickStatus::Missing);
        assert!(tick.is_synthetic());
        assert!(!tick.has_rtt());
    }

    #[test]
    fn test_tag_serialization() {
        let json = serde_json::to_string(&StatusTag::DoubleTick2).unwrap();
        assert_eq!(json, "\"doubletick2\"");
        let json = serde_json::to_string(&StatusTag::MissingFront).unwrap();
        assert_eq!(json, "\"missingFront\"");
        assert_eq!("missingEnd".parse::<StatusTag>().unwrap(), StatusTag::MissingEnd);
        assert_eq!(StatusTag::DoubleTick3.as_str(), "doubletick3");
        assert!("missing".parse::<StatusTag>().is_err());
    }

    #[test]
    fn test_extrema_span() {
        let e = ExtremaResult {
            min_timestamp: Some(100),
            max_timestamp: Some(580),
        };
        assert_eq!(e.span(), Some(480));
        assert_eq!(ExtremaResult::default().span(), None);
    }
}
