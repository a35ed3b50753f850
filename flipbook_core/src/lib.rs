// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presentation and synchronization pipeline for a shared-surface display
//! compositor.
//!
//! An external producer renders frames into a shared texture. `flipbook_core`
//! copies each frame onto an output surface, overlays the mouse cursor, and
//! hands the result to a display pipeline that flips it onto the screen on a
//! vertical blank. It is `no_std` compatible (with `alloc`); all GPU and
//! display work goes through the capability traits in [`backend`].
//!
//! # Architecture
//!
//! Each cycle runs the same sequence, driven by [`Session`](session::Session):
//!
//! ```text
//!   SurfaceArbiter::try_acquire() ──► busy? ──► skip cycle
//!       │
//!       ▼
//!   Compositor::draw_frame() ──► Compositor::draw_cursor()
//!       │                              │
//!       │                    cursor::resolve() (mask shapes)
//!       ▼
//!   FrameLease::release() ──► PresentScheduler::present()
//!       │
//!       ▼
//!   VblankPacer::wait()
//! ```
//!
//! **[`arbiter`]**: Keyed-mutex handshake with the producer. A timed-out
//! acquire is a skipped cycle, not an error.
//!
//! **[`cursor`]**: Clipping of pointer shapes to the desktop and CPU
//! resolution of monochrome and masked-color shapes against the background.
//!
//! **[`compositor`]**: Full-screen frame copy and straight-alpha cursor quad,
//! with per-draw resources.
//!
//! **[`scheduler`]**: Render-fence signalling, scanout submission over an
//! N-slot flip ring, and vertical-blank pacing that skips missed blanks.
//!
//! **[`session`]**: Startup (scanout binding, fence sharing) and the cycle
//! driver.
//!
//! **[`backend`]**: The [`GpuDevice`](backend::GpuDevice),
//! [`DisplayPipeline`](backend::DisplayPipeline),
//! [`KeyedMutex`](backend::KeyedMutex) and
//! [`TimelineFence`](backend::TimelineFence) traits backends implement.
//!
//! **[`config`]**: [`SessionConfig`](config::SessionConfig) timeouts, keys and
//! ring length.
//!
//! **[`error`]**: Error types and the recoverable/fatal split.
//!
//! **[`output`]**: Output identifiers and desktop bounds.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! cycle instrumentation, with zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod arbiter;
pub mod backend;
pub mod compositor;
pub mod config;
pub mod cursor;
pub mod error;
pub mod output;
pub mod scheduler;
pub mod session;
pub mod trace;

#[cfg(test)]
mod testing;
