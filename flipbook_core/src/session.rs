// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The presentation session.
//!
//! A [`Session`] owns one backend (device, display pipeline and the keyed
//! mutex of the shared frame) and runs the per-cycle sequence:
//!
//! ```text
//!   acquire ─┬─ busy ──────────────────────────────────────────► (skip)
//!            └─ draw frame ── draw cursor ── release ── present
//!                                                          │
//!   wait for next vblank ◄─────────────────────────────────┘
//! ```
//!
//! The session is single-threaded. The producer that fills the shared frame
//! runs elsewhere and only meets the session through the keyed mutex.

use alloc::vec::Vec;
use core::fmt;

use crate::arbiter::{Acquire, SurfaceArbiter};
use crate::backend::{DisplayPipeline, GpuDevice, KeyedMutex, SharedHandle, TimelineFence};
use crate::compositor::{Compositor, CursorOutcome};
use crate::config::{RetryPolicy, SessionConfig};
use crate::cursor::PointerState;
use crate::error::{ConfigError, DeviceError, SessionError, Status};
use crate::output::{DesktopBounds, OutputDesc, OutputInfo};
use crate::scheduler::{PresentScheduler, Submission, VblankPacer, VblankTick};
use crate::trace::{
    AcquireEvent, CursorEvent, CycleBeginEvent, CycleEndEvent, CycleKind, ErrorEvent, PhaseKind,
    SubmitEvent, Tracer, VblankEvent,
};

/// A presentable surface supplied at setup.
pub struct SurfaceSlot<D: GpuDevice, P: DisplayPipeline> {
    /// The surface as the display pipeline knows it.
    pub primary: P::Primary,
    /// The same surface as a device render target.
    pub target: D::Texture,
}

impl<D: GpuDevice, P: DisplayPipeline> fmt::Debug for SurfaceSlot<D, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceSlot").finish_non_exhaustive()
    }
}

/// Everything a session needs from a backend.
pub struct SessionSetup<D: GpuDevice, P: DisplayPipeline, M: KeyedMutex> {
    /// GPU device.
    pub device: D,
    /// Display pipeline.
    pub pipeline: P,
    /// The frame the producer writes.
    pub shared_frame: D::Texture,
    /// Keyed mutex guarding `shared_frame`.
    pub mutex: M,
    /// Output surfaces, one per flip slot.
    pub surfaces: Vec<SurfaceSlot<D, P>>,
    /// Outputs making up the desktop.
    pub outputs: Vec<OutputDesc>,
}

impl<D: GpuDevice, P: DisplayPipeline, M: KeyedMutex> fmt::Debug for SessionSetup<D, P, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSetup")
            .field("surfaces", &self.surfaces.len())
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// An output slot: a surface bound to a scanout.
struct OutputSurface<D: GpuDevice, P: DisplayPipeline> {
    scanout: P::Scanout,
    target: D::Texture,
    // Keeps the display-side surface alive as long as its scanout.
    _primary: P::Primary,
}

/// What a cycle did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The producer held the shared frame; nothing was drawn or presented.
    Busy,
    /// A frame was composited and queued for scanout.
    Presented {
        /// Render-fence value and slot of the queued frame.
        submission: Submission,
        /// What happened to the cursor.
        cursor: CursorOutcome,
    },
}

/// Composites the shared frame and cursor and paces presentation.
pub struct Session<D: GpuDevice, P: DisplayPipeline, M: KeyedMutex> {
    config: SessionConfig,
    device: D,
    pipeline: P,
    arbiter: SurfaceArbiter<M>,
    frame: D::Texture,
    surfaces: Vec<OutputSurface<D, P>>,
    render_fence: D::Fence,
    display_render_fence: P::Fence,
    vblank_fence: D::Fence,
    _periodic_fence: P::Fence,
    scheduler: PresentScheduler,
    pacer: VblankPacer,
    cycle: u64,
    output: OutputInfo,
}

impl<D: GpuDevice, P: DisplayPipeline, M: KeyedMutex> fmt::Debug for Session<D, P, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("cycle", &self.cycle)
            .field("scheduler", &self.scheduler)
            .field("pacer", &self.pacer)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl<D: GpuDevice, P: DisplayPipeline, M: KeyedMutex> Session<D, P, M> {
    /// Binds every output surface to a scanout and shares the render and
    /// vertical-blank fences between the device and the display pipeline.
    ///
    /// Scanout creation for the first slot is retried per
    /// [`SessionConfig::scanout_retry`]. An empty output list fails with the
    /// recoverable [`SessionError::NoOutputs`].
    pub fn init_output(
        config: SessionConfig,
        setup: SessionSetup<D, P, M>,
    ) -> Result<(Self, OutputInfo), SessionError> {
        config.validate()?;
        let SessionSetup {
            mut device,
            mut pipeline,
            shared_frame,
            mutex,
            surfaces: slots,
            outputs,
        } = setup;

        let bounds: Vec<DesktopBounds> = outputs.iter().map(|output| output.bounds).collect();
        let desktop = DesktopBounds::enclosing(&bounds).ok_or(SessionError::NoOutputs)?;
        if slots.len() != config.slots {
            return Err(ConfigError::SlotMismatch {
                configured: config.slots,
                supplied: slots.len(),
            }
            .into());
        }

        let mut surfaces = Vec::with_capacity(slots.len());
        for (i, slot) in slots.into_iter().enumerate() {
            let scanout = if i == 0 {
                create_scanout_with_retry(&mut pipeline, &slot.primary, config.scanout_retry)?
            } else {
                pipeline.create_scanout(&slot.primary)?
            };
            surfaces.push(OutputSurface {
                scanout,
                target: slot.target,
                _primary: slot.primary,
            });
        }

        let render_fence = device.create_fence(0)?;
        let display_render_fence = pipeline.import_fence(render_fence.share()?)?;
        let periodic_fence = pipeline.create_periodic_fence(config.vblank_lead_time)?;
        let vblank_fence = device.open_fence(periodic_fence.share()?)?;

        let output = OutputInfo {
            output_count: outputs.len(),
            desktop,
        };
        let session = Self {
            config,
            device,
            pipeline,
            arbiter: SurfaceArbiter::new(mutex, config.keys, config.acquire_timeout),
            frame: shared_frame,
            surfaces,
            render_fence,
            display_render_fence,
            vblank_fence,
            _periodic_fence: periodic_fence,
            scheduler: PresentScheduler::new(config.slots),
            pacer: VblankPacer::new(),
            cycle: 0,
            output,
        };
        Ok((session, output))
    }

    /// Runs one compositing cycle.
    ///
    /// Returns [`CycleOutcome::Busy`] without drawing if the producer holds
    /// the shared frame past the acquire timeout. Whenever the frame was
    /// acquired it is released again, even if drawing failed.
    pub fn update_application_window(
        &mut self,
        pointer: &PointerState,
        tracer: &mut Tracer<'_>,
    ) -> Result<CycleOutcome, SessionError> {
        self.cycle += 1;
        let cycle = self.cycle;
        tracer.cycle_begin(&CycleBeginEvent {
            cycle,
            slot: slot_id(self.scheduler.render_slot()),
        });

        let result = self.run_cycle(pointer, tracer);
        let kind = match &result {
            Ok(CycleOutcome::Busy) => CycleKind::Busy,
            Ok(CycleOutcome::Presented { .. }) => CycleKind::Presented,
            Err(error) => {
                tracer.error(&ErrorEvent {
                    cycle,
                    error: *error,
                });
                CycleKind::Failed
            }
        };
        tracer.cycle_end(&CycleEndEvent { cycle, kind });
        result
    }

    fn run_cycle(
        &mut self,
        pointer: &PointerState,
        tracer: &mut Tracer<'_>,
    ) -> Result<CycleOutcome, SessionError> {
        let cycle = self.cycle;

        tracer.phase_begin(cycle, PhaseKind::Acquire);
        let acquired = self.arbiter.try_acquire();
        tracer.phase_end(cycle, PhaseKind::Acquire);
        let lease = match acquired? {
            Acquire::Busy => {
                tracer.acquire(&AcquireEvent {
                    cycle,
                    acquired: false,
                });
                return Ok(CycleOutcome::Busy);
            }
            Acquire::Acquired(lease) => lease,
        };
        tracer.acquire(&AcquireEvent {
            cycle,
            acquired: true,
        });

        let slot = self.scheduler.render_slot();
        let mut compositor =
            Compositor::new(&mut self.device, &self.frame, &self.surfaces[slot].target);

        tracer.phase_begin(cycle, PhaseKind::DrawFrame);
        let frame_drawn = compositor.draw_frame();
        tracer.phase_end(cycle, PhaseKind::DrawFrame);
        let drawn = match frame_drawn {
            Ok(()) => {
                tracer.phase_begin(cycle, PhaseKind::DrawCursor);
                let cursor = compositor.draw_cursor(pointer);
                tracer.phase_end(cycle, PhaseKind::DrawCursor);
                cursor
            }
            Err(err) => Err(err),
        };

        tracer.phase_begin(cycle, PhaseKind::Release);
        let released = lease.release();
        tracer.phase_end(cycle, PhaseKind::Release);
        released?;
        let cursor = drawn?;
        tracer.cursor(&CursorEvent::new(cycle, &cursor));

        tracer.phase_begin(cycle, PhaseKind::Present);
        let submitted = self.scheduler.present(
            &mut self.device,
            &self.render_fence,
            &mut self.pipeline,
            &self.display_render_fence,
            &self.surfaces[slot].scanout,
        );
        tracer.phase_end(cycle, PhaseKind::Present);
        let submission = submitted?;
        tracer.submit(&SubmitEvent {
            cycle,
            render_fence_value: submission.render_fence_value,
            slot: slot_id(submission.slot),
        });

        Ok(CycleOutcome::Presented { submission, cursor })
    }

    /// Blocks until the next vertical blank.
    ///
    /// Blanks missed while the loop was busy are skipped. A wait that times
    /// out is fatal: the display has gone away.
    pub fn wait_next_vblank(&mut self, tracer: &mut Tracer<'_>) -> Result<VblankTick, SessionError> {
        let cycle = self.cycle;
        tracer.phase_begin(cycle, PhaseKind::VblankWait);
        let waited = self
            .pacer
            .wait(&self.vblank_fence, self.config.vblank_timeout);
        tracer.phase_end(cycle, PhaseKind::VblankWait);

        match &waited {
            Ok(tick) => tracer.vblank(&VblankEvent {
                cycle,
                expected: tick.expected,
                completed: tick.completed,
                skipped: tick.skipped,
            }),
            Err(error) => tracer.error(&ErrorEvent {
                cycle,
                error: *error,
            }),
        }
        waited
    }

    /// Waits for one last vertical blank so queued scanouts drain, then tears
    /// the session down.
    pub fn shutdown(mut self, tracer: &mut Tracer<'_>) -> Result<(), SessionError> {
        self.wait_next_vblank(tracer).map(|_| ())
    }

    /// Handle the producer opens the shared frame with.
    #[must_use]
    pub fn shared_handle(&self) -> SharedHandle {
        self.arbiter.shared_handle()
    }

    /// Cycles started so far.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Last value the render fence was signalled to.
    #[must_use]
    pub const fn render_fence_value(&self) -> u64 {
        self.scheduler.render_fence_value()
    }

    /// Slot the next cycle renders into.
    #[must_use]
    pub const fn active_slot(&self) -> usize {
        self.scheduler.render_slot()
    }

    /// Vertical-blank fence value the next wait blocks for.
    #[must_use]
    pub const fn expected_vblank(&self) -> u64 {
        self.pacer.expected()
    }

    /// Outputs set up at init.
    #[must_use]
    pub const fn output_info(&self) -> OutputInfo {
        self.output
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The GPU device.
    #[must_use]
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// The display pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &P {
        &self.pipeline
    }
}

fn create_scanout_with_retry<P: DisplayPipeline>(
    pipeline: &mut P,
    primary: &P::Primary,
    policy: RetryPolicy,
) -> Result<P::Scanout, DeviceError> {
    let mut attempt = 1;
    loop {
        match pipeline.create_scanout(primary) {
            Ok(scanout) => return Ok(scanout),
            Err(err) if attempt < policy.attempts && err.status != Status::DeviceRemoved => {
                pipeline.backoff(policy.backoff);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[inline]
fn slot_id(slot: usize) -> u32 {
    u32::try_from(slot).unwrap_or(u32::MAX)
}
