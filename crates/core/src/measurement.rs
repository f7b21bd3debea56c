//! Measurement metadata and trend eligibility checks.
//!
//! Trends only make sense for recurring ping measurements that have been
//! running long enough to produce a useful number of ticks.

use crate::config::ValidationConfig;
use crate::error::{Error, Result};
use crate::types::{EpochSecs, MeasurementParameters};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Measurement metadata as supplied by the metadata service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementMeta {
    pub msm_id: i64,
    /// Measurement type, e.g. `"ping"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub is_oneoff: bool,
    /// Measurement start (seconds).
    pub start_time: EpochSecs,
    /// Interval between results (seconds).
    pub interval: i64,
    /// Scheduling spread (seconds).
    pub spread: f64,
    /// Per-probe jitter (seconds).
    #[serde(default)]
    pub probe_jitter: f64,
}

/// Why a measurement cannot be used for trends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    OneOff,
    NotPing,
    TooFewResults { min_ticks: u32 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::OneOff => write!(
                f,
                "Not a recurring measurement. Trends are only available for recurring measurements."
            ),
            Rejection::NotPing => write!(
                f,
                "Not a ping measurement. Trends are only available for ping measurements."
            ),
            Rejection::TooFewResults { min_ticks } => write!(
                f,
                "Not enough measurement results to calculate trends. Trends need at least {min_ticks} non-empty measurement results ('ticks')."
            ),
        }
    }
}

impl MeasurementMeta {
    /// Collect every reason this measurement is not eligible. Empty means eligible.
    pub fn check_eligibility(&self, now: DateTime<Utc>, min_ticks: u32) -> Vec<Rejection> {
        let mut rejections = Vec::new();
        if self.is_oneoff {
            rejections.push(Rejection::OneOff);
        }
        if self.kind != "ping" {
            rejections.push(Rejection::NotPing);
        }
        if !self.is_oneoff {
            let min_duration = Duration::seconds(i64::from(min_ticks) * self.interval);
            let started = DateTime::from_timestamp(self.start_time, 0).unwrap_or(now);
            if now - min_duration <= started {
                rejections.push(Rejection::TooFewResults { min_ticks });
            }
        }
        rejections
    }

    /// Reconciliation parameters for a window starting at `seek_start`.
    pub fn parameters(
        &self,
        seek_start: EpochSecs,
        requested_tick_count: u32,
    ) -> Result<MeasurementParameters> {
        let params = MeasurementParameters {
            interval_seconds: self.interval,
            start_epoch: self.start_time,
            spread_seconds: self.spread,
            jitter_seconds: self.probe_jitter,
            seek_start_epoch: seek_start,
            requested_tick_count,
        };
        params.validate()?;
        Ok(params)
    }
}

/// Number of whole intervals between two instants.
pub fn window_tick_count(start: DateTime<Utc>, stop: DateTime<Utc>, interval: i64) -> i64 {
    if interval <= 0 {
        return 0;
    }
    (stop - start).num_seconds().div_euclid(interval)
}

/// Fail unless the window spans at least `min_ticks` intervals.
pub fn check_enough_ticks(
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
    interval: i64,
    min_ticks: u32,
) -> Result<i64> {
    let ticks = window_tick_count(start, stop, interval);
    if ticks >= i64::from(min_ticks) {
        return Ok(ticks);
    }
    let duration = (stop - start).num_seconds();
    let missing_hours = (i64::from(min_ticks) * interval - duration) as f64 / 3600.0;
    Err(Error::insufficient_data(format!(
        "Not enough ticks in specified time range. Trends need at least {min_ticks} non-empty results ('ticks'). \
         Found {ticks} ticks. Enlarging time range with {missing_hours} hours will probably yield results."
    )))
}

/// Whether the window is strictly shorter than `max`.
pub fn check_max_duration(start: DateTime<Utc>, stop: DateTime<Utc>, max: Duration) -> bool {
    stop - start < max
}

/// Check the window a run over `params` covers against the validation limits.
///
/// The window runs from `seek_start_epoch` for `requested_tick_count`
/// intervals. Too long is a config error; too few ticks is insufficient data.
pub fn check_window(params: &MeasurementParameters, validation: &ValidationConfig) -> Result<i64> {
    params.validate()?;
    let seconds = params.interval_seconds * i64::from(params.requested_tick_count);
    let start = DateTime::from_timestamp(params.seek_start_epoch, 0).ok_or_else(|| {
        Error::config(format!("window start {} out of range", params.seek_start_epoch))
    })?;
    let stop = start + Duration::seconds(seconds);

    let max_days = validation.max_window_days;
    if !check_max_duration(start, stop, Duration::days(i64::from(max_days))) {
        return Err(Error::config(format!(
            "Requested time range is too long. Maximum is {max_days} days."
        )));
    }
    check_enough_ticks(start, stop, params.interval_seconds, validation.min_ticks)
}
