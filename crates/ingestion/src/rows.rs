//! Raw storage rows and row-key ranges.
//!
//! Results are stored one row per measurement and minute, keyed
//! `msm:{msm_id}|ts:{yyyy-mm-dd}T{HH:MM}`, with one column per probe. Every
//! version of a probe's column is one JSON-encoded observation.

use chrono::{DateTime, Utc};
use trends_core::{EpochSecs, Error, RawObservation, Result};

/// Date prefix used in row keys.
const DATE_KEY_FORMAT: &str = "%Y-%m-%dT";

/// Full minute-resolution timestamp used in row keys.
const ROW_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// One stored version of a probe column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnVersion {
    /// Store-assigned version (write timestamp).
    pub version: i64,
    /// JSON-encoded observation.
    pub value: Vec<u8>,
}

impl ColumnVersion {
    /// Decode the stored observation.
    pub fn decode(&self) -> Result<RawObservation> {
        serde_json::from_slice(&self.value).map_err(|e| Error::parse(e.to_string()))
    }
}

/// One storage row with all versions of the scanned probe column.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub key: String,
    pub versions: Vec<ColumnVersion>,
}

/// Row key for a measurement at a given instant.
pub fn row_key(msm_id: i64, ts: EpochSecs) -> Result<String> {
    let dt = DateTime::<Utc>::from_timestamp(ts, 0)
        .ok_or_else(|| Error::data(format!("timestamp {ts} out of range")))?;
    Ok(format!("msm:{msm_id}|ts:{}", dt.format(ROW_KEY_FORMAT)))
}

/// A scan over one probe column and a row-key range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowScan {
    pub msm_id: i64,
    pub probe_id: i64,
    /// Inclusive start row.
    pub start_row: String,
    /// Exclusive stop row.
    pub stop_row: String,
}

impl RowScan {
    /// Scan from the start of `start`'s day through the end of `stop`'s day.
    pub fn for_window(
        msm_id: i64,
        probe_id: i64,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Self {
        Self {
            msm_id,
            probe_id,
            start_row: format!("msm:{msm_id}|ts:{}", start.format(DATE_KEY_FORMAT)),
            stop_row: format!("msm:{msm_id}|ts:{}~", stop.format(DATE_KEY_FORMAT)),
        }
    }

    /// Whether a row key falls inside the scan range.
    pub fn contains(&self, key: &str) -> bool {
        key >= self.start_row.as_str() && key < self.stop_row.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_row_key() {
        // 2019-02-04T23:50:12Z
        let ts = Utc.with_ymd_and_hms(2019, 2, 4, 23, 50, 12).unwrap().timestamp();
        assert_eq!(row_key(5151, ts).unwrap(), "msm:5151|ts:2019-02-04T23:50");
    }

    #[test]
    fn test_scan_range() {
        let start = Utc.with_ymd_and_hms(2019, 2, 4, 13, 0, 0).unwrap();
        let stop = Utc.with_ymd_and_hms(2019, 2, 5, 2, 0, 0).unwrap();
        let scan = RowScan::for_window(18725407, 50208, start, stop);
        assert_eq!(scan.start_row, "msm:18725407|ts:2019-02-04T");
        assert_eq!(scan.stop_row, "msm:18725407|ts:2019-02-05T~");

        assert!(scan.contains("msm:18725407|ts:2019-02-04T00:04"));
        assert!(scan.contains("msm:18725407|ts:2019-02-05T23:56"));
        assert!(!scan.contains("msm:18725407|ts:2019-02-03T23:56"));
        assert!(!scan.contains("msm:18725407|ts:2019-02-06T00:00"));
        assert!(!scan.contains("msm:5151|ts:2019-02-04T12:00"));
    }

    #[test]
    fn test_decode_version() {
        let version = ColumnVersion {
            version: 1,
            value: br#"{"timestamp":1549324212,"prb_id":50208,"result":[{"rtt":4.2}]}"#.to_vec(),
        };
        let obs = version.decode().unwrap();
        assert_eq!(obs.timestamp, 1549324212);
        assert_eq!(obs.probe_id, 50208);

        let broken = ColumnVersion {
            version: 2,
            value: b"{\"timestamp\":".to_vec(),
        };
        assert!(matches!(broken.decode(), Err(Error::Parse(_))));
    }
}
