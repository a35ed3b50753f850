// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, log forwarding and Chrome trace export for
//! flipbook diagnostics.
//!
//! This crate provides [`TraceSink`](flipbook_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`log::LogSink`]: structured `tracing` records plus per-cycle summaries.
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`recorder::RecorderSink`]: compact binary recording with
//!   [`recorder::decode`] for playback.
//! - [`chrome::export`]: writes Chrome Trace Event Format JSON from recorded
//!   bytes.
//!
//! Core events carry no timestamps; every sink stamps them with a
//! [`clock::Clock`].

pub mod chrome;
pub mod clock;
pub mod log;
pub mod pretty;
pub mod recorder;
