// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The presentation loop.
//!
//! [`run`] drives a session the way a display host would: one compositing
//! cycle, then one vertical-blank wait, repeated. Recoverable errors are
//! logged and the loop carries on with the next cycle; a fatal error ends
//! the run.

use std::time::Instant;

use flipbook_core::backend::{DisplayPipeline, GpuDevice, KeyedMutex};
use flipbook_core::cursor::PointerState;
use flipbook_core::error::SessionError;
use flipbook_core::session::{CycleOutcome, Session};
use flipbook_core::trace::Tracer;
use tracing::{error, warn};

use crate::pacing::{PacingReport, PacingSample, PacingTracker};

/// Totals for a finished run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunStats {
    /// Cycles run.
    pub cycles: u64,
    /// Cycles that queued a frame for scanout.
    pub presented: u64,
    /// Cycles skipped because the producer held the shared frame.
    pub busy: u64,
    /// Vertical blanks skipped across the run.
    pub skipped_vblanks: u64,
    /// Recoverable errors the loop carried on from.
    pub recoverable_errors: u64,
    /// Pacing report after the last cycle.
    pub report: Option<PacingReport>,
}

/// Runs `cycles` presentation cycles.
///
/// `pointer` is asked for the pointer state before each cycle, given the
/// zero-based index of the cycle.
pub fn run<D, P, M, const N: usize>(
    session: &mut Session<D, P, M>,
    cycles: u64,
    mut pointer: impl FnMut(u64) -> PointerState,
    tracer: &mut Tracer<'_>,
    tracker: &mut PacingTracker<N>,
) -> Result<RunStats, SessionError>
where
    D: GpuDevice,
    P: DisplayPipeline,
    M: KeyedMutex,
{
    let mut stats = RunStats::default();
    for i in 0..cycles {
        let started = Instant::now();
        let mut sample = PacingSample::default();

        match session.update_application_window(&pointer(i), tracer) {
            Ok(CycleOutcome::Busy) => {
                stats.busy += 1;
                sample.busy = true;
            }
            Ok(CycleOutcome::Presented { .. }) => {
                stats.presented += 1;
                sample.presented = true;
            }
            Err(err) => recover(session.cycle(), err, &mut stats)?,
        }

        match session.wait_next_vblank(tracer) {
            Ok(tick) => {
                stats.skipped_vblanks += tick.skipped;
                sample.skipped_vblanks = tick.skipped;
            }
            Err(err) => recover(session.cycle(), err, &mut stats)?,
        }

        stats.cycles += 1;
        sample.cycle_ms = started.elapsed().as_secs_f64() * 1000.0;
        stats.report = Some(tracker.observe(sample));
    }
    Ok(stats)
}

fn recover(cycle: u64, err: SessionError, stats: &mut RunStats) -> Result<(), SessionError> {
    if err.is_fatal() {
        error!(target: "flipbook", cycle, error = %err, "presentation stopped");
        return Err(err);
    }
    warn!(target: "flipbook", cycle, error = %err, "cycle failed; continuing");
    stats.recoverable_errors += 1;
    Ok(())
}
