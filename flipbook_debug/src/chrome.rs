// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! Cycles and phases become duration slices; everything else becomes an
//! instant event.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for record in decode(bytes) {
        let ts = nanos_to_us(record.t_nanos);
        let event = match record.event {
            RecordedEvent::CycleBegin(e) => json!({
                "ph": "B",
                "name": "cycle",
                "cat": "Cycle",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "args": {
                    "cycle": e.cycle,
                    "slot": e.slot,
                }
            }),
            RecordedEvent::CycleEnd(e) => json!({
                "ph": "E",
                "name": "cycle",
                "cat": "Cycle",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "args": {
                    "cycle": e.cycle,
                    "kind": format!("{:?}", e.kind),
                }
            }),
            RecordedEvent::PhaseBegin(e) => json!({
                "ph": "B",
                "name": e.phase.name(),
                "cat": "Phase",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "args": {
                    "cycle": e.cycle,
                }
            }),
            RecordedEvent::PhaseEnd(e) => json!({
                "ph": "E",
                "name": e.phase.name(),
                "cat": "Phase",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "args": {
                    "cycle": e.cycle,
                }
            }),
            RecordedEvent::Acquire(e) => instant(
                "Acquire",
                ts,
                json!({
                    "cycle": e.cycle,
                    "acquired": e.acquired,
                }),
            ),
            RecordedEvent::Cursor(e) => instant(
                "Cursor",
                ts,
                json!({
                    "cycle": e.cycle,
                    "kind": format!("{:?}", e.kind),
                    "left": e.left,
                    "top": e.top,
                    "width": e.width,
                    "height": e.height,
                }),
            ),
            RecordedEvent::Submit(e) => instant(
                "Submit",
                ts,
                json!({
                    "cycle": e.cycle,
                    "render_fence_value": e.render_fence_value,
                    "slot": e.slot,
                }),
            ),
            RecordedEvent::Vblank(e) => instant(
                "Vblank",
                ts,
                json!({
                    "cycle": e.cycle,
                    "expected": e.expected,
                    "completed": e.completed,
                    "skipped": e.skipped,
                }),
            ),
            RecordedEvent::Error {
                cycle,
                fatal,
                message,
            } => json!({
                "ph": "i",
                "name": "Error",
                "cat": "Error",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "s": "g",
                "args": {
                    "cycle": cycle,
                    "fatal": fatal,
                    "message": message,
                }
            }),
        };
        events.push(event);
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn instant(name: &str, ts: f64, args: Value) -> Value {
    json!({
        "ph": "i",
        "name": name,
        "cat": "Cycle",
        "ts": ts,
        "pid": 0,
        "tid": 0,
        "s": "t",
        "args": args,
    })
}

fn nanos_to_us(nanos: u64) -> f64 {
    nanos as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use flipbook_core::trace::{
        AcquireEvent, CycleBeginEvent, CycleEndEvent, CycleKind, PhaseBeginEvent, PhaseEndEvent,
        PhaseKind, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let mut t = 0;
        let mut rec = RecorderSink::with_clock(move || {
            t += 1_000;
            t
        });
        rec.on_cycle_begin(&CycleBeginEvent { cycle: 1, slot: 0 });
        rec.on_phase_begin(&PhaseBeginEvent {
            cycle: 1,
            phase: PhaseKind::Acquire,
        });
        rec.on_phase_end(&PhaseEndEvent {
            cycle: 1,
            phase: PhaseKind::Acquire,
        });
        rec.on_acquire(&AcquireEvent {
            cycle: 1,
            acquired: false,
        });
        rec.on_cycle_end(&CycleEndEvent {
            cycle: 1,
            kind: CycleKind::Busy,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 5);

        assert_eq!(parsed[0]["ph"], "B");
        assert_eq!(parsed[0]["name"], "cycle");
        assert_eq!(parsed[0]["ts"], 1.0);

        assert_eq!(parsed[1]["ph"], "B");
        assert_eq!(parsed[1]["name"], "acquire");
        assert_eq!(parsed[2]["ph"], "E");
        assert_eq!(parsed[2]["name"], "acquire");

        assert_eq!(parsed[3]["ph"], "i");
        assert_eq!(parsed[3]["args"]["acquired"], false);

        assert_eq!(parsed[4]["ph"], "E");
        assert_eq!(parsed[4]["args"]["kind"], "Busy");
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
