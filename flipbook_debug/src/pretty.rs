// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Phase ends
//! carry the phase duration measured with the sink's [`Clock`].

use std::io::Write;

use flipbook_core::trace::{
    AcquireEvent, CursorEvent, CursorKind, CycleBeginEvent, CycleEndEvent, ErrorEvent,
    PhaseBeginEvent, PhaseEndEvent, PhaseKind, SubmitEvent, TraceSink, VblankEvent,
};

use crate::clock::{Clock, MonotonicClock};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>, C: Clock = MonotonicClock> {
    writer: W,
    clock: C,
    phase_starts: [Option<u64>; 6],
}

impl<W: Write, C: Clock> std::fmt::Debug for PrettyPrintSink<W, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self::with_writer(writer, MonotonicClock::new())
    }
}

impl<W: Write, C: Clock> PrettyPrintSink<W, C> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, clock: C) -> Self {
        Self {
            writer,
            clock,
            phase_starts: [None; 6],
        }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn slot(phase: PhaseKind) -> usize {
        PhaseKind::ALL
            .iter()
            .position(|p| *p == phase)
            .unwrap_or_default()
    }
}

fn nanos_to_us(nanos: u64) -> f64 {
    nanos as f64 / 1000.0
}

impl<W: Write, C: Clock> TraceSink for PrettyPrintSink<W, C> {
    fn on_cycle_begin(&mut self, e: &CycleBeginEvent) {
        let _ = writeln!(self.writer, "[cycle] #{} slot={}", e.cycle, e.slot);
    }

    fn on_acquire(&mut self, e: &AcquireEvent) {
        let state = if e.acquired { "acquired" } else { "BUSY" };
        let _ = writeln!(self.writer, "[acquire] #{} {state}", e.cycle);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.phase_starts[Self::slot(e.phase)] = Some(self.clock.now_nanos());
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let now = self.clock.now_nanos();
        let elapsed = self.phase_starts[Self::slot(e.phase)]
            .take()
            .map_or(0, |start| now.saturating_sub(start));
        let _ = writeln!(
            self.writer,
            "[phase] #{} {} {:.1}µs",
            e.cycle,
            e.phase.name(),
            nanos_to_us(elapsed),
        );
    }

    fn on_cursor(&mut self, e: &CursorEvent) {
        let _ = match e.kind {
            CursorKind::Drawn => writeln!(
                self.writer,
                "[cursor] #{} drawn at {},{} {}x{}",
                e.cycle, e.left, e.top, e.width, e.height,
            ),
            kind => writeln!(self.writer, "[cursor] #{} {kind:?}", e.cycle),
        };
    }

    fn on_submit(&mut self, e: &SubmitEvent) {
        let _ = writeln!(
            self.writer,
            "[submit] #{} fence={} slot={}",
            e.cycle, e.render_fence_value, e.slot,
        );
    }

    fn on_vblank(&mut self, e: &VblankEvent) {
        let skipped = if e.skipped > 0 { " SKIPPED" } else { "" };
        let _ = writeln!(
            self.writer,
            "[vblank] #{} expected={} completed={}{skipped}",
            e.cycle, e.expected, e.completed,
        );
    }

    fn on_cycle_end(&mut self, e: &CycleEndEvent) {
        let _ = writeln!(self.writer, "[end] #{} {:?}", e.cycle, e.kind);
    }

    fn on_error(&mut self, e: &ErrorEvent) {
        let _ = writeln!(
            self.writer,
            "[error] #{} {:?}: {}",
            e.cycle,
            e.severity(),
            e.error,
        );
    }
}
