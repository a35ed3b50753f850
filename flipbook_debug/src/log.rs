// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Forwarding of cycle events to [`tracing`].
//!
//! [`LogSink`] turns each event into a structured `tracing` record under the
//! `flipbook` target. Steady-state events log at `DEBUG`; busy cycles,
//! skipped vertical blanks and recoverable errors at `WARN`; fatal errors at
//! `ERROR`. At the end of every cycle a [`CycleSummary`] with per-phase
//! durations is logged at `DEBUG` and kept for inspection. The
//! vertical-blank wait follows the cycle's end event, so its duration is
//! folded into the kept summary once the wait finishes.

use flipbook_core::error::Severity;
use flipbook_core::trace::{
    AcquireEvent, CursorEvent, CursorKind, CycleBeginEvent, CycleEndEvent, CycleSummary,
    CycleSummaryBuilder, CycleKind, ErrorEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, SubmitEvent,
    TraceSink, VblankEvent,
};
use tracing::{debug, error, warn};

use crate::clock::{Clock, MonotonicClock};

/// A [`TraceSink`] that forwards events to the `tracing` ecosystem.
pub struct LogSink<C: Clock = MonotonicClock> {
    clock: C,
    builder: Option<CycleSummaryBuilder>,
    /// Set once the builder's cycle has ended.
    ended: Option<CycleKind>,
    last_summary: Option<CycleSummary>,
}

impl<C: Clock> std::fmt::Debug for LogSink<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("last_summary", &self.last_summary)
            .finish_non_exhaustive()
    }
}

impl LogSink {
    /// Creates a sink timing phases with the wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> LogSink<C> {
    /// Creates a sink timing phases with `clock`.
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            builder: None,
            ended: None,
            last_summary: None,
        }
    }

    /// Summary of the most recently finished cycle.
    #[must_use]
    pub fn last_summary(&self) -> Option<&CycleSummary> {
        self.last_summary.as_ref()
    }

    fn builder_for(&mut self, cycle: u64) -> Option<&mut CycleSummaryBuilder> {
        self.builder.as_mut().filter(|b| b.cycle() == cycle)
    }
}

impl<C: Clock> TraceSink for LogSink<C> {
    fn on_cycle_begin(&mut self, e: &CycleBeginEvent) {
        self.builder = Some(CycleSummaryBuilder::new(e.cycle));
        self.ended = None;
        debug!(target: "flipbook", cycle = e.cycle, slot = e.slot, "cycle started");
    }

    fn on_acquire(&mut self, e: &AcquireEvent) {
        if e.acquired {
            debug!(target: "flipbook", cycle = e.cycle, "shared frame acquired");
        } else {
            warn!(target: "flipbook", cycle = e.cycle, "producer still holds the shared frame; skipping cycle");
        }
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let now = self.clock.now_nanos();
        if let Some(builder) = self.builder_for(e.cycle) {
            builder.phase_begin(e.phase, now);
        }
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let now = self.clock.now_nanos();
        let ended = self.ended;
        let Some(builder) = self.builder_for(e.cycle) else {
            return;
        };
        builder.phase_end(e.phase, now);
        if let (PhaseKind::VblankWait, Some(kind)) = (e.phase, ended) {
            let summary = builder.clone().finish(kind);
            debug!(
                target: "flipbook",
                cycle = summary.cycle,
                vblank_wait_ns = summary.phase(PhaseKind::VblankWait),
                total_ns = summary.total_nanos(),
                "vertical-blank wait finished"
            );
            self.last_summary = Some(summary);
        }
    }

    fn on_cursor(&mut self, e: &CursorEvent) {
        if let Some(builder) = self.builder_for(e.cycle) {
            builder.set_cursor(e.kind);
        }
        match e.kind {
            CursorKind::Dropped => {
                warn!(target: "flipbook", cycle = e.cycle, "cursor shape could not be resolved");
            }
            kind => debug!(
                target: "flipbook",
                cycle = e.cycle,
                ?kind,
                left = e.left,
                top = e.top,
                width = e.width,
                height = e.height,
                "cursor"
            ),
        }
    }

    fn on_submit(&mut self, e: &SubmitEvent) {
        if let Some(builder) = self.builder_for(e.cycle) {
            builder.set_submit(e.render_fence_value, e.slot);
        }
        debug!(
            target: "flipbook",
            cycle = e.cycle,
            render_fence_value = e.render_fence_value,
            slot = e.slot,
            "frame submitted for scanout"
        );
    }

    fn on_vblank(&mut self, e: &VblankEvent) {
        if e.skipped > 0 {
            warn!(
                target: "flipbook",
                cycle = e.cycle,
                expected = e.expected,
                completed = e.completed,
                skipped = e.skipped,
                "missed vertical blanks"
            );
        } else {
            debug!(target: "flipbook", cycle = e.cycle, completed = e.completed, "vertical blank");
        }
    }

    fn on_cycle_end(&mut self, e: &CycleEndEvent) {
        let Some(builder) = self.builder_for(e.cycle) else {
            return;
        };
        let summary = builder.clone().finish(e.kind);
        self.ended = Some(e.kind);
        debug!(
            target: "flipbook",
            cycle = summary.cycle,
            kind = ?summary.kind,
            acquire_ns = summary.phase(PhaseKind::Acquire),
            draw_frame_ns = summary.phase(PhaseKind::DrawFrame),
            draw_cursor_ns = summary.phase(PhaseKind::DrawCursor),
            release_ns = summary.phase(PhaseKind::Release),
            present_ns = summary.phase(PhaseKind::Present),
            total_ns = summary.total_nanos(),
            "cycle finished"
        );
        self.last_summary = Some(summary);
    }

    fn on_error(&mut self, e: &ErrorEvent) {
        match e.severity() {
            Severity::Recoverable => {
                warn!(target: "flipbook", cycle = e.cycle, error = %e.error, "cycle aborted");
            }
            Severity::Fatal => {
                error!(target: "flipbook", cycle = e.cycle, error = %e.error, "session lost");
            }
        }
    }
}
