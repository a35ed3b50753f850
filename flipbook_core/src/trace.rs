// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the presentation cycle.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! [`Session`](crate::session::Session) calls at each stage of a cycle. All
//! method bodies default to no-ops, so implementing only the events you care
//! about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! The core has no clock, so events carry no timestamps. Sinks stamp events
//! on arrival; [`CycleSummaryBuilder`] turns those stamps into per-phase
//! durations.
//!
//! # Crate features
//!
//! - `trace` enables the `Tracer` method bodies (one branch per call).

use crate::compositor::CursorOutcome;
use crate::error::{Severity, SessionError};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of the cycle is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Waiting for the producer to release the shared frame.
    Acquire,
    /// Copying the shared frame into the render target.
    DrawFrame,
    /// Resolving and drawing the cursor.
    DrawCursor,
    /// Handing the shared frame back to the producer.
    Release,
    /// Signalling the render fence and queueing the scanout.
    Present,
    /// Blocking until the next vertical blank.
    VblankWait,
}

impl PhaseKind {
    /// All phases in cycle order.
    pub const ALL: [Self; 6] = [
        Self::Acquire,
        Self::DrawFrame,
        Self::DrawCursor,
        Self::Release,
        Self::Present,
        Self::VblankWait,
    ];

    /// Short name for log and trace output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Acquire => "acquire",
            Self::DrawFrame => "draw-frame",
            Self::DrawCursor => "draw-cursor",
            Self::Release => "release",
            Self::Present => "present",
            Self::VblankWait => "vblank-wait",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Acquire => 0,
            Self::DrawFrame => 1,
            Self::DrawCursor => 2,
            Self::Release => 3,
            Self::Present => 4,
            Self::VblankWait => 5,
        }
    }
}

/// How a cycle ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CycleKind {
    /// The producer held the shared frame; nothing was presented.
    Busy,
    /// A frame was submitted for scanout.
    Presented,
    /// The cycle was aborted by an error.
    Failed,
}

/// Cursor disposition for a cycle, without the payload of [`CursorOutcome`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CursorKind {
    /// The pointer was not visible.
    NotVisible,
    /// The cursor lay entirely off the desktop.
    Hidden,
    /// The cursor was drawn.
    Drawn,
    /// The shape could not be resolved.
    Dropped,
}

impl From<&CursorOutcome> for CursorKind {
    fn from(outcome: &CursorOutcome) -> Self {
        match outcome {
            CursorOutcome::NotVisible => Self::NotVisible,
            CursorOutcome::Hidden => Self::Hidden,
            CursorOutcome::Drawn { .. } => Self::Drawn,
            CursorOutcome::Dropped(_) => Self::Dropped,
        }
    }
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a compositing cycle starts.
#[derive(Clone, Copy, Debug)]
pub struct CycleBeginEvent {
    /// Cycle counter, starting at 1.
    pub cycle: u64,
    /// Slot that will be rendered into.
    pub slot: u32,
}

/// Emitted after the shared-frame acquire attempt.
#[derive(Clone, Copy, Debug)]
pub struct AcquireEvent {
    /// Cycle counter.
    pub cycle: u64,
    /// `false` if the producer still held the frame.
    pub acquired: bool,
}

/// Marks the beginning of a cycle phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Cycle counter.
    pub cycle: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
}

/// Marks the end of a cycle phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Cycle counter.
    pub cycle: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
}

/// Emitted after the cursor draw.
#[derive(Clone, Copy, Debug)]
pub struct CursorEvent {
    /// Cycle counter.
    pub cycle: u64,
    /// What happened to the cursor.
    pub kind: CursorKind,
    /// Left edge of the drawn rectangle (0 unless drawn).
    pub left: i32,
    /// Top edge of the drawn rectangle (0 unless drawn).
    pub top: i32,
    /// Width of the drawn rectangle (0 unless drawn).
    pub width: u32,
    /// Height of the drawn rectangle (0 unless drawn).
    pub height: u32,
}

impl CursorEvent {
    /// Creates an event for `outcome` in `cycle`.
    #[must_use]
    pub fn new(cycle: u64, outcome: &CursorOutcome) -> Self {
        let (left, top, width, height) = match *outcome {
            CursorOutcome::Drawn {
                left,
                top,
                width,
                height,
            } => (left, top, width, height),
            _ => (0, 0, 0, 0),
        };
        Self {
            cycle,
            kind: outcome.into(),
            left,
            top,
            width,
            height,
        }
    }
}

/// Emitted when a frame is submitted for scanout.
#[derive(Clone, Copy, Debug)]
pub struct SubmitEvent {
    /// Cycle counter.
    pub cycle: u64,
    /// Render-fence value the scanout waits for.
    pub render_fence_value: u64,
    /// Slot submitted for scanout.
    pub slot: u32,
}

/// Emitted after a vertical-blank wait completes.
#[derive(Clone, Copy, Debug)]
pub struct VblankEvent {
    /// Cycle counter at the time of the wait.
    pub cycle: u64,
    /// Fence value that was waited for.
    pub expected: u64,
    /// Fence value observed after the wait.
    pub completed: u64,
    /// Vertical blanks that passed beyond the one waited for.
    pub skipped: u64,
}

/// Emitted when a cycle ends.
#[derive(Clone, Copy, Debug)]
pub struct CycleEndEvent {
    /// Cycle counter.
    pub cycle: u64,
    /// How the cycle ended.
    pub kind: CycleKind,
}

/// Emitted when a session operation fails.
#[derive(Clone, Copy, Debug)]
pub struct ErrorEvent {
    /// Cycle counter.
    pub cycle: u64,
    /// The failure.
    pub error: SessionError,
}

impl ErrorEvent {
    /// Severity of the failure.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.error.severity()
    }
}

/// Per-cycle summary produced by [`CycleSummaryBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleSummary {
    /// Cycle counter.
    pub cycle: u64,
    /// How the cycle ended.
    pub kind: CycleKind,
    /// Cursor disposition, if the cursor phase ran.
    pub cursor: Option<CursorKind>,
    /// Submitted render-fence value, if presented.
    pub render_fence_value: Option<u64>,
    /// Submitted slot, if presented.
    pub slot: Option<u32>,
    /// Per-phase durations in nanoseconds, indexed like [`PhaseKind::ALL`]
    /// (0 if not measured).
    pub phase_nanos: [u64; 6],
}

impl CycleSummary {
    /// Duration of `phase` in nanoseconds.
    #[must_use]
    pub const fn phase(&self, phase: PhaseKind) -> u64 {
        self.phase_nanos[phase.index()]
    }

    /// Sum of all measured phases.
    #[must_use]
    pub fn total_nanos(&self) -> u64 {
        self.phase_nanos.iter().sum()
    }
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the presentation cycle.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a cycle starts.
    fn on_cycle_begin(&mut self, e: &CycleBeginEvent) {
        _ = e;
    }

    /// Called after the acquire attempt.
    fn on_acquire(&mut self, e: &AcquireEvent) {
        _ = e;
    }

    /// Called at the beginning of a phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called after the cursor draw.
    fn on_cursor(&mut self, e: &CursorEvent) {
        _ = e;
    }

    /// Called when a frame is submitted for scanout.
    fn on_submit(&mut self, e: &SubmitEvent) {
        _ = e;
    }

    /// Called after a vertical-blank wait.
    fn on_vblank(&mut self, e: &VblankEvent) {
        _ = e;
    }

    /// Called when a cycle ends.
    fn on_cycle_end(&mut self, e: &CycleEndEvent) {
        _ = e;
    }

    /// Called when a session operation fails.
    fn on_error(&mut self, e: &ErrorEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($(#[$doc:meta] $name:ident => $method:ident($ty:ty);)*) => {
        $(
            #[$doc]
            #[inline]
            pub fn $name(&mut self, e: &$ty) {
                #[cfg(feature = "trace")]
                if let Some(s) = &mut self.sink {
                    s.$method(e);
                }
                #[cfg(not(feature = "trace"))]
                {
                    _ = e;
                }
            }
        )*
    };
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&mut self, cycle: u64, phase: PhaseKind) {
        self.phase_begin_event(&PhaseBeginEvent { cycle, phase });
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&mut self, cycle: u64, phase: PhaseKind) {
        self.phase_end_event(&PhaseEndEvent { cycle, phase });
    }

    dispatch! {
        /// Emits a [`CycleBeginEvent`].
        cycle_begin => on_cycle_begin(CycleBeginEvent);
        /// Emits an [`AcquireEvent`].
        acquire => on_acquire(AcquireEvent);
        /// Emits a [`PhaseBeginEvent`].
        phase_begin_event => on_phase_begin(PhaseBeginEvent);
        /// Emits a [`PhaseEndEvent`].
        phase_end_event => on_phase_end(PhaseEndEvent);
        /// Emits a [`CursorEvent`].
        cursor => on_cursor(CursorEvent);
        /// Emits a [`SubmitEvent`].
        submit => on_submit(SubmitEvent);
        /// Emits a [`VblankEvent`].
        vblank => on_vblank(VblankEvent);
        /// Emits a [`CycleEndEvent`].
        cycle_end => on_cycle_end(CycleEndEvent);
        /// Emits an [`ErrorEvent`].
        error => on_error(ErrorEvent);
    }
}

// ---------------------------------------------------------------------------
// CycleSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects phase timestamps during a cycle and produces a [`CycleSummary`].
///
/// Timestamps are nanoseconds on any monotonic clock the caller chooses.
#[derive(Clone, Debug)]
pub struct CycleSummaryBuilder {
    cycle: u64,
    cursor: Option<CursorKind>,
    submit: Option<(u64, u32)>,
    phase_starts: [Option<u64>; 6],
    phase_ends: [Option<u64>; 6],
}

impl CycleSummaryBuilder {
    /// Starts building a summary for `cycle`.
    #[must_use]
    pub const fn new(cycle: u64) -> Self {
        Self {
            cycle,
            cursor: None,
            submit: None,
            phase_starts: [None; 6],
            phase_ends: [None; 6],
        }
    }

    /// Cycle being summarized.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, t_nanos: u64) {
        self.phase_starts[phase.index()] = Some(t_nanos);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, t_nanos: u64) {
        self.phase_ends[phase.index()] = Some(t_nanos);
    }

    /// Records the cursor disposition.
    pub fn set_cursor(&mut self, kind: CursorKind) {
        self.cursor = Some(kind);
    }

    /// Records the submission.
    pub fn set_submit(&mut self, render_fence_value: u64, slot: u32) {
        self.submit = Some((render_fence_value, slot));
    }

    /// Consumes the builder and produces the final [`CycleSummary`].
    #[must_use]
    pub fn finish(self, kind: CycleKind) -> CycleSummary {
        let mut phase_nanos = [0; 6];
        for (i, nanos) in phase_nanos.iter_mut().enumerate() {
            if let (Some(start), Some(end)) = (self.phase_starts[i], self.phase_ends[i]) {
                *nanos = end.saturating_sub(start);
            }
        }
        CycleSummary {
            cycle: self.cycle,
            kind,
            cursor: self.cursor,
            render_fence_value: self.submit.map(|(value, _)| value),
            slot: self.submit.map(|(_, slot)| slot),
            phase_nanos,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
