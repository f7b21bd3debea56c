//! Tick reconciliation.
//!
//! Merges an ordered candidate stream into a gapless, duplicate-free,
//! fixed-stride tick sequence covering the requested window. One cursor walks
//! the output tick index, the other walks the candidates:
//!
//! ```text
//!   output  i:  10   11   12   13   14   15
//!   input   j:  10   10   12   13             (15 never arrives)
//!               \dup/  gap  ok   ok   end  end
//! ```
//!
//! The window holds `requested_tick_count - 1` slots, starting at the tick
//! nearest to `seek_start_epoch`.

use serde::Serialize;
use tracing::{debug, trace};
use trends_core::{
    BandThresholds, CandidateTick, Config, MeasurementParameters, ResolvedTick, Result, RttBand,
    StatusTag, TickIndex, TickSequence, TickStatus,
};

/// Counters describing one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Candidates emitted as-is.
    pub aligned: u32,
    /// Duplicate pairs resolved.
    pub duplicates: u32,
    /// Slots synthesized between observations.
    pub gaps: u32,
    /// Slots synthesized after dropping lagging input.
    pub front: u32,
    /// Slots synthesized after the input ran out.
    pub end: u32,
    /// Candidates dropped because they lagged the output cursor.
    pub stale: u32,
}

impl ReconcileStats {
    /// Number of synthesized slots.
    pub fn missing(&self) -> u32 {
        self.gaps + self.front + self.end
    }
}

/// Reconciled sequence and its run statistics.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub ticks: TickSequence,
    pub stats: ReconcileStats,
}

/// Tick reconciler.
#[derive(Debug, Clone, Default)]
pub struct TickReconciler {
    /// Log a glyph line per run at trace level.
    emit_trace: bool,
    /// Band thresholds used for trace glyphs.
    bands: BandThresholds,
}

impl TickReconciler {
    /// Create a reconciler from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            emit_trace: config.reconcile.emit_trace,
            bands: config.bands.clone(),
        }
    }

    /// Reconcile candidates sorted ascending by tick index.
    ///
    /// Empty input yields an empty sequence; the caller treats that as "no data".
    pub fn reconcile(
        &self,
        candidates: &[CandidateTick],
        params: &MeasurementParameters,
    ) -> Result<Reconciled> {
        params.validate()?;
        debug_assert!(
            candidates.windows(2).all(|w| w[0].tick_index <= w[1].tick_index),
            "candidates must be sorted by tick index"
        );

        let mut stats = ReconcileStats::default();
        if candidates.is_empty() {
            return Ok(Reconciled {
                ticks: Vec::new(),
                stats,
            });
        }

        let start = params.start_tick_index();
        let end = params.end_tick_index();
        let mut ticks: TickSequence = Vec::with_capacity(params.output_len());

        let mut i: TickIndex = start;
        let mut j: usize = 0;

        while i < end {
            let Some(current) = candidates.get(j) else {
                ticks.push(ResolvedTick::synthetic(i, params, StatusTag::MissingEnd));
                stats.end += 1;
                i += 1;
                continue;
            };

            if current.tick_index < i {
                // Input lags the window: drop everything behind the cursor. If
                // slot i is then matched it is handled on the next pass.
                while candidates.get(j).is_some_and(|c| c.tick_index < i) {
                    j += 1;
                    stats.stale += 1;
                }
                if candidates.get(j).is_some_and(|c| c.tick_index == i) {
                    continue;
                }
                ticks.push(ResolvedTick::synthetic(i, params, StatusTag::MissingFront));
                stats.front += 1;
                i += 1;
                continue;
            }

            if current.tick_index > i {
                ticks.push(ResolvedTick::synthetic(i, params, StatusTag::MissingGap));
                stats.gaps += 1;
                i += 1;
                continue;
            }

            match candidates.get(j + 1).filter(|n| n.tick_index == i) {
                Some(next) => {
                    ticks.push(resolve_duplicate(current, next));
                    stats.duplicates += 1;
                    j += 2;
                }
                None => {
                    ticks.push(ResolvedTick::from_candidate(current, None));
                    stats.aligned += 1;
                    j += 1;
                }
            }
            i += 1;
        }

        if self.emit_trace {
            let glyphs: String = ticks.iter().map(|t| self.glyph(t)).collect();
            trace!(trace = %glyphs, "reconcile trace");
        }
        debug!(
            start_tick = start,
            slots = ticks.len(),
            candidates = candidates.len(),
            aligned = stats.aligned,
            duplicates = stats.duplicates,
            gaps = stats.gaps,
            front = stats.front,
            end = stats.end,
            stale = stats.stale,
            "reconciled ticks"
        );

        Ok(Reconciled { ticks, stats })
    }

    fn glyph(&self, tick: &ResolvedTick) -> char {
        if let Some(tag) = tick.status_tag {
            return tag.glyph();
        }
        match (tick.status, tick.min_rtt) {
            (TickStatus::Ok, Some(rtt)) => RttBand::of(rtt, &self.bands).glyph(),
            (TickStatus::Timeout, _) => 'x',
            _ => '!',
        }
    }
}

/// Pick one of two candidates sharing a tick index.
///
/// First with an rtt wins, then second with an rtt, then first anyway.
fn resolve_duplicate(current: &CandidateTick, next: &CandidateTick) -> ResolvedTick {
    if current.has_rtt() {
        ResolvedTick::from_candidate(current, Some(StatusTag::DoubleTick1))
    } else if next.has_rtt() {
        ResolvedTick::from_candidate(next, Some(StatusTag::DoubleTick2))
    } else {
        ResolvedTick::from_candidate(current, Some(StatusTag::DoubleTick3))
    }
}

/// Reconcile with default settings.
pub fn reconcile(
    candidates: &[CandidateTick],
    params: &MeasurementParameters,
) -> Result<TickSequence> {
    TickReconciler::default()
        .reconcile(candidates, params)
        .map(|r| r.ticks)
}
