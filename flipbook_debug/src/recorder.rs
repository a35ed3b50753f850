// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as little-endian records, each stamped with the recorder's
//! [`Clock`]. [`decode`] reads them back as an iterator of [`Record`].
//!
//! Errors are stored as their severity and display text; the structured
//! [`SessionError`](flipbook_core::error::SessionError) is not recoverable
//! from a recording.

use flipbook_core::error::Severity;
use flipbook_core::trace::{
    AcquireEvent, CursorEvent, CursorKind, CycleBeginEvent, CycleEndEvent, CycleKind,
    ErrorEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, SubmitEvent, TraceSink,
    VblankEvent,
};

use crate::clock::{Clock, MonotonicClock};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_CYCLE_BEGIN: u8 = 1;
const TAG_ACQUIRE: u8 = 2;
const TAG_PHASE_BEGIN: u8 = 3;
const TAG_PHASE_END: u8 = 4;
const TAG_CURSOR: u8 = 5;
const TAG_SUBMIT: u8 = 6;
const TAG_VBLANK: u8 = 7;
const TAG_CYCLE_END: u8 = 8;
const TAG_ERROR: u8 = 9;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
pub struct RecorderSink<C: Clock = MonotonicClock> {
    buf: Vec<u8>,
    clock: C,
}

impl<C: Clock> std::fmt::Debug for RecorderSink<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecorderSink")
            .field("len", &self.buf.len())
            .finish_non_exhaustive()
    }
}

impl RecorderSink {
    /// Creates an empty recorder stamping events from now.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl Default for RecorderSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RecorderSink<C> {
    /// Creates an empty recorder stamping events with `clock`.
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        Self {
            buf: Vec::new(),
            clock,
        }
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn begin(&mut self, tag: u8, cycle: u64) {
        let t = self.clock.now_nanos();
        self.write_u8(tag);
        self.write_u64(t);
        self.write_u64(cycle);
    }

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_str(&mut self, s: &str) {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "error messages are far shorter than u32::MAX"
        )]
        self.write_u32(s.len().min(u32::MAX as usize) as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Acquire => 0,
            PhaseKind::DrawFrame => 1,
            PhaseKind::DrawCursor => 2,
            PhaseKind::Release => 3,
            PhaseKind::Present => 4,
            PhaseKind::VblankWait => 5,
        });
    }

    fn write_cursor_kind(&mut self, k: CursorKind) {
        self.write_u8(match k {
            CursorKind::NotVisible => 0,
            CursorKind::Hidden => 1,
            CursorKind::Drawn => 2,
            CursorKind::Dropped => 3,
        });
    }

    fn write_cycle_kind(&mut self, k: CycleKind) {
        self.write_u8(match k {
            CycleKind::Busy => 0,
            CycleKind::Presented => 1,
            CycleKind::Failed => 2,
        });
    }
}

impl<C: Clock> TraceSink for RecorderSink<C> {
    fn on_cycle_begin(&mut self, e: &CycleBeginEvent) {
        self.begin(TAG_CYCLE_BEGIN, e.cycle);
        self.write_u32(e.slot);
    }

    fn on_acquire(&mut self, e: &AcquireEvent) {
        self.begin(TAG_ACQUIRE, e.cycle);
        self.write_u8(u8::from(e.acquired));
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.begin(TAG_PHASE_BEGIN, e.cycle);
        self.write_phase(e.phase);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.begin(TAG_PHASE_END, e.cycle);
        self.write_phase(e.phase);
    }

    fn on_cursor(&mut self, e: &CursorEvent) {
        self.begin(TAG_CURSOR, e.cycle);
        self.write_cursor_kind(e.kind);
        self.write_i32(e.left);
        self.write_i32(e.top);
        self.write_u32(e.width);
        self.write_u32(e.height);
    }

    fn on_submit(&mut self, e: &SubmitEvent) {
        self.begin(TAG_SUBMIT, e.cycle);
        self.write_u64(e.render_fence_value);
        self.write_u32(e.slot);
    }

    fn on_vblank(&mut self, e: &VblankEvent) {
        self.begin(TAG_VBLANK, e.cycle);
        self.write_u64(e.expected);
        self.write_u64(e.completed);
        self.write_u64(e.skipped);
    }

    fn on_cycle_end(&mut self, e: &CycleEndEvent) {
        self.begin(TAG_CYCLE_END, e.cycle);
        self.write_cycle_kind(e.kind);
    }

    fn on_error(&mut self, e: &ErrorEvent) {
        self.begin(TAG_ERROR, e.cycle);
        self.write_u8(u8::from(e.severity() == Severity::Fatal));
        self.write_str(&e.error.to_string());
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`CycleBeginEvent`].
    CycleBegin(CycleBeginEvent),
    /// An [`AcquireEvent`].
    Acquire(AcquireEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`CursorEvent`].
    Cursor(CursorEvent),
    /// A [`SubmitEvent`].
    Submit(SubmitEvent),
    /// A [`VblankEvent`].
    Vblank(VblankEvent),
    /// A [`CycleEndEvent`].
    CycleEnd(CycleEndEvent),
    /// An [`ErrorEvent`], flattened to text.
    Error {
        /// Cycle counter.
        cycle: u64,
        /// Whether the session had to end.
        fatal: bool,
        /// Display text of the error.
        message: String,
    },
}

impl RecordedEvent {
    /// Cycle the event belongs to.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        match self {
            Self::CycleBegin(e) => e.cycle,
            Self::Acquire(e) => e.cycle,
            Self::PhaseBegin(e) => e.cycle,
            Self::PhaseEnd(e) => e.cycle,
            Self::Cursor(e) => e.cycle,
            Self::Submit(e) => e.cycle,
            Self::Vblank(e) => e.cycle,
            Self::CycleEnd(e) => e.cycle,
            Self::Error { cycle, .. } => *cycle,
        }
    }
}

/// A decoded event and the time it was recorded.
#[derive(Clone, Debug)]
pub struct Record {
    /// Recorder clock reading, in nanoseconds.
    pub t_nanos: u64,
    /// The event.
    pub event: RecordedEvent,
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`Record`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded records.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take(&mut self, n: usize) -> Option<&[u8]> {
        let bytes = self.data.get(self.pos..self.pos.checked_add(n)?)?;
        self.pos += n;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        Some(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Option<u32> {
        Some(u32::from_le_bytes(self.take(4)?.try_into().ok()?))
    }

    fn read_i32(&mut self) -> Option<i32> {
        Some(i32::from_le_bytes(self.take(4)?.try_into().ok()?))
    }

    fn read_u64(&mut self) -> Option<u64> {
        Some(u64::from_le_bytes(self.take(8)?.try_into().ok()?))
    }

    fn read_str(&mut self) -> Option<String> {
        let len = usize::try_from(self.read_u32()?).ok()?;
        Some(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        PhaseKind::ALL.get(usize::from(self.read_u8()?)).copied()
    }

    fn read_cursor_kind(&mut self) -> Option<CursorKind> {
        Some(match self.read_u8()? {
            0 => CursorKind::NotVisible,
            1 => CursorKind::Hidden,
            2 => CursorKind::Drawn,
            3 => CursorKind::Dropped,
            _ => return None,
        })
    }

    fn read_cycle_kind(&mut self) -> Option<CycleKind> {
        Some(match self.read_u8()? {
            0 => CycleKind::Busy,
            1 => CycleKind::Presented,
            2 => CycleKind::Failed,
            _ => return None,
        })
    }

    fn decode_event(&mut self, tag: u8, cycle: u64) -> Option<RecordedEvent> {
        Some(match tag {
            TAG_CYCLE_BEGIN => RecordedEvent::CycleBegin(CycleBeginEvent {
                cycle,
                slot: self.read_u32()?,
            }),
            TAG_ACQUIRE => RecordedEvent::Acquire(AcquireEvent {
                cycle,
                acquired: self.read_u8()? != 0,
            }),
            TAG_PHASE_BEGIN => RecordedEvent::PhaseBegin(PhaseBeginEvent {
                cycle,
                phase: self.read_phase()?,
            }),
            TAG_PHASE_END => RecordedEvent::PhaseEnd(PhaseEndEvent {
                cycle,
                phase: self.read_phase()?,
            }),
            TAG_CURSOR => RecordedEvent::Cursor(CursorEvent {
                cycle,
                kind: self.read_cursor_kind()?,
                left: self.read_i32()?,
                top: self.read_i32()?,
                width: self.read_u32()?,
                height: self.read_u32()?,
            }),
            TAG_SUBMIT => RecordedEvent::Submit(SubmitEvent {
                cycle,
                render_fence_value: self.read_u64()?,
                slot: self.read_u32()?,
            }),
            TAG_VBLANK => RecordedEvent::Vblank(VblankEvent {
                cycle,
                expected: self.read_u64()?,
                completed: self.read_u64()?,
                skipped: self.read_u64()?,
            }),
            TAG_CYCLE_END => RecordedEvent::CycleEnd(CycleEndEvent {
                cycle,
                kind: self.read_cycle_kind()?,
            }),
            TAG_ERROR => RecordedEvent::Error {
                cycle,
                fatal: self.read_u8()? != 0,
                message: self.read_str()?,
            },
            // unknown tag → stop iteration
            _ => return None,
        })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        let t_nanos = self.read_u64()?;
        let cycle = self.read_u64()?;
        let event = self.decode_event(tag, cycle)?;
        Some(Record { t_nanos, event })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
