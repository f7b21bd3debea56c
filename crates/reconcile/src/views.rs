//! Fixed-width numeric views over a tick sequence, as consumed by classifiers.

use trends_core::{Error, ResolvedTick, Result};

/// Three parallel columns, one entry per tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickViews {
    /// Tick timestamps (seconds).
    pub timestamps: Vec<u32>,
    /// Minimum rtt, NaN where absent.
    pub rtt: Vec<f64>,
    /// Status codes.
    pub status: Vec<u8>,
}

impl TickViews {
    /// Build the views. Fails if a timestamp does not fit in 32 bits.
    pub fn from_ticks(ticks: &[ResolvedTick]) -> Result<Self> {
        let mut views = Self {
            timestamps: Vec::with_capacity(ticks.len()),
            rtt: Vec::with_capacity(ticks.len()),
            status: Vec::with_capacity(ticks.len()),
        };
        for tick in ticks {
            let ts = u32::try_from(tick.timestamp).map_err(|_| {
                Error::data(format!(
                    "tick {} timestamp {} does not fit in u32",
                    tick.tick_index, tick.timestamp
                ))
            })?;
            views.timestamps.push(ts);
            views.rtt.push(tick.min_rtt.unwrap_or(f64::NAN));
            views.status.push(tick.status.code());
        }
        Ok(views)
    }

    /// Number of ticks.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether there are no ticks.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
