// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A software backend and harness for exercising flipbook sessions.
//!
//! Everything here runs on the CPU in-process, so a whole presentation
//! pipeline can be driven from a test:
//!
//! - [`SoftBackend`] creates the GPU device, display pipeline, keyed mutex
//!   and textures a session is set up with, and can inject device faults.
//! - [`DisplayController`] steps the display's vertical blanks by hand or
//!   from a [`VblankThread`], and reports what reached the screen.
//! - [`Producer`] plays the other side of the shared-frame handshake.
//! - [`run`] drives a session for a number of cycles, feeding a
//!   [`PacingTracker`] that grades how well presentation kept up.
//!
//! Pixels are `0xAARRGGBB` words, the little-endian reading of BGRA bytes.

pub mod device;
pub mod display;
pub mod fence;
pub mod keyed_mutex;
pub mod pacing;
pub mod producer;
pub mod runner;
pub mod texture;

pub use device::{SoftBackend, SoftDevice};
pub use display::{DisplayController, SoftDisplay, SoftScanout, VblankThread};
pub use fence::SoftFence;
pub use keyed_mutex::SoftKeyedMutex;
pub use pacing::{PacingGrade, PacingReport, PacingSample, PacingTracker};
pub use producer::{Producer, ProducerThread};
pub use runner::{RunStats, run};
pub use texture::{PixelBuffer, SoftTexture};
