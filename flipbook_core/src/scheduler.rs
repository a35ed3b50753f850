// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presentation scheduling and vertical-blank pacing.
//!
//! [`PresentScheduler`] hands composited frames to the display pipeline
//! without blocking the CPU on GPU completion. Every present:
//!
//! 1. signals the render fence to the next value after the recorded draws,
//! 2. flushes the device,
//! 3. queues a scanout task for the slot just rendered that waits on that
//!    fence value,
//! 4. advances the [`FlipChain`] so the next cycle renders into a different
//!    slot.
//!
//! [`VblankPacer`] blocks the loop until the periodic vertical-blank fence
//! passes the value it expects next, then expects the value after the one it
//! observed. Vertical blanks that went by while the loop was busy are
//! skipped rather than queued up.

use core::time::Duration;

use crate::backend::{DisplayPipeline, FenceWait, GpuDevice, ScanoutTask, TimelineFence};
use crate::error::{DeviceError, SessionError};

/// Ring of output slots.
///
/// The active slot is the one the next frame renders into. It is never the
/// slot most recently submitted for scanout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlipChain {
    len: usize,
    active: usize,
}

impl FlipChain {
    /// Creates a ring of `len` slots, rendering into slot 0 first.
    ///
    /// `len` is clamped to at least 2.
    #[must_use]
    pub const fn new(len: usize) -> Self {
        Self {
            len: if len < 2 { 2 } else { len },
            active: 0,
        }
    }

    /// Number of slots.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Slot the next frame renders into.
    #[must_use]
    pub const fn active(&self) -> usize {
        self.active
    }

    /// Moves to the next slot and returns the one that was active.
    pub fn advance(&mut self) -> usize {
        let submitted = self.active;
        self.active = (self.active + 1) % self.len;
        submitted
    }
}

/// A frame handed to the display pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Submission {
    /// Render-fence value the scanout waits for.
    pub render_fence_value: u64,
    /// Slot submitted for scanout.
    pub slot: usize,
}

/// Signals completion of rendered frames and queues them for scanout.
#[derive(Clone, Copy, Debug)]
pub struct PresentScheduler {
    chain: FlipChain,
    render_fence_value: u64,
}

impl PresentScheduler {
    /// Creates a scheduler over `slots` output slots.
    #[must_use]
    pub const fn new(slots: usize) -> Self {
        Self {
            chain: FlipChain::new(slots),
            render_fence_value: 0,
        }
    }

    /// Slot the next frame renders into.
    #[must_use]
    pub const fn render_slot(&self) -> usize {
        self.chain.active()
    }

    /// Last value the render fence was signalled to; `0` before any present.
    #[must_use]
    pub const fn render_fence_value(&self) -> u64 {
        self.render_fence_value
    }

    /// The slot ring.
    #[must_use]
    pub const fn chain(&self) -> &FlipChain {
        &self.chain
    }

    /// Presents the frame rendered into [`render_slot`](Self::render_slot).
    ///
    /// `scanout` must be the scanout bound to that slot. The render-fence
    /// value only advances once the signal has been queued; the slot only
    /// advances once the scanout task has been accepted.
    pub fn present<D, P>(
        &mut self,
        device: &mut D,
        render_fence: &D::Fence,
        pipeline: &mut P,
        display_fence: &P::Fence,
        scanout: &P::Scanout,
    ) -> Result<Submission, DeviceError>
    where
        D: GpuDevice,
        P: DisplayPipeline,
    {
        let value = self.render_fence_value + 1;
        device.signal(render_fence, value)?;
        self.render_fence_value = value;
        device.flush();

        pipeline.execute(ScanoutTask::new(scanout).wait_for(display_fence, value))?;

        Ok(Submission {
            render_fence_value: value,
            slot: self.chain.advance(),
        })
    }
}

/// Outcome of a vertical-blank wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VblankTick {
    /// Fence value that was waited for.
    pub expected: u64,
    /// Fence value observed after the wait.
    pub completed: u64,
    /// Vertical blanks that went by beyond the one waited for.
    pub skipped: u64,
}

/// Paces the loop to the periodic vertical-blank fence.
#[derive(Clone, Copy, Debug, Default)]
pub struct VblankPacer {
    expected: u64,
}

impl VblankPacer {
    /// Creates a pacer whose first wait returns immediately.
    #[must_use]
    pub const fn new() -> Self {
        Self { expected: 0 }
    }

    /// Fence value the next wait blocks for.
    #[must_use]
    pub const fn expected(&self) -> u64 {
        self.expected
    }

    /// Blocks until `fence` reaches the expected value or `timeout` elapses.
    ///
    /// On success the next expected value is the fence's completed value plus
    /// one. A timeout means the display is gone and is reported as
    /// [`SessionError::VblankTimeout`].
    pub fn wait<F: TimelineFence>(
        &mut self,
        fence: &F,
        timeout: Duration,
    ) -> Result<VblankTick, SessionError> {
        let expected = self.expected;
        match fence.wait(expected, timeout)? {
            FenceWait::Reached(reached) => {
                let completed = fence.completed_value().max(reached);
                self.expected = completed + 1;
                let skipped = if expected == 0 {
                    0
                } else {
                    completed.saturating_sub(expected)
                };
                Ok(VblankTick {
                    expected,
                    completed,
                    skipped,
                })
            }
            FenceWait::TimedOut(completed) => Err(SessionError::VblankTimeout {
                expected,
                completed,
                timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Operation, Status};
    use crate::testing::{FakeBackend, FakeFence};

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[test]
    fn flip_chain_alternates_two_slots() {
        let mut chain = FlipChain::new(2);
        let order: [usize; 4] = core::array::from_fn(|_| chain.advance());
        assert_eq!(order, [0, 1, 0, 1]);
    }

    #[test]
    fn flip_chain_cycles_n_slots() {
        let mut chain = FlipChain::new(3);
        let order: [usize; 4] = core::array::from_fn(|_| chain.advance());
        assert_eq!(order, [0, 1, 2, 0]);
        assert_eq!(FlipChain::new(1).len(), 2);
    }

    #[test]
    fn present_signals_flushes_then_executes() {
        let backend = FakeBackend::new();
        let mut device = backend.device();
        let mut pipeline = backend.pipeline();
        let render = device.fence(0);
        let mut scheduler = PresentScheduler::new(2);

        let submission = scheduler
            .present(&mut device, &render, &mut pipeline, &render, &10)
            .unwrap();
        assert_eq!(
            submission,
            Submission {
                render_fence_value: 1,
                slot: 0
            }
        );
        assert_eq!(
            backend.log(),
            ["signal 1", "flush", "execute scanout=10 wait=1"]
        );
        assert_eq!(render.completed_value(), 1);
        assert_eq!(scheduler.render_slot(), 1);
    }

    #[test]
    fn render_fence_advances_by_one_per_present() {
        let backend = FakeBackend::new();
        let mut device = backend.device();
        let mut pipeline = backend.pipeline();
        let render = device.fence(0);
        let mut scheduler = PresentScheduler::new(2);

        for expected in 1..=5 {
            let submission = scheduler
                .present(&mut device, &render, &mut pipeline, &render, &0)
                .unwrap();
            assert_eq!(submission.render_fence_value, expected);
            assert_eq!(scheduler.render_fence_value(), expected);
        }
    }

    #[test]
    fn render_slot_is_never_the_submitted_slot() {
        let backend = FakeBackend::new();
        let mut device = backend.device();
        let mut pipeline = backend.pipeline();
        let render = device.fence(0);
        let mut scheduler = PresentScheduler::new(2);

        for _ in 0..4 {
            let submission = scheduler
                .present(&mut device, &render, &mut pipeline, &render, &0)
                .unwrap();
            assert_ne!(submission.slot, scheduler.render_slot());
        }
    }

    #[test]
    fn failed_signal_does_not_advance() {
        let backend = FakeBackend::new();
        let mut device = backend.device();
        let mut pipeline = backend.pipeline();
        let render = device.fence(0);
        let mut scheduler = PresentScheduler::new(2);

        backend.fail(Operation::Signal, Status::DeviceRemoved);
        let err = scheduler
            .present(&mut device, &render, &mut pipeline, &render, &0)
            .unwrap_err();
        assert_eq!(err.op, Operation::Signal);
        assert_eq!(scheduler.render_fence_value(), 0);
        assert_eq!(scheduler.render_slot(), 0);
    }

    #[test]
    fn failed_execute_keeps_fence_value_but_not_slot() {
        let backend = FakeBackend::new();
        let mut device = backend.device();
        let mut pipeline = backend.pipeline();
        let render = device.fence(0);
        let mut scheduler = PresentScheduler::new(2);

        backend.fail(Operation::ExecuteTask, Status::Code(-1));
        assert!(
            scheduler
                .present(&mut device, &render, &mut pipeline, &render, &0)
                .is_err()
        );
        assert_eq!(scheduler.render_fence_value(), 1);
        assert_eq!(scheduler.render_slot(), 0);
    }

    #[test]
    fn vblank_expected_follows_completed_value() {
        for completed in [0, 1, 100] {
            let fence = FakeFence::new(completed);
            let mut pacer = VblankPacer::new();
            pacer.wait(&fence, TIMEOUT).unwrap();
            assert_eq!(pacer.expected(), completed + 1);
        }
    }

    #[test]
    fn vblank_skips_missed_blanks() {
        let fence = FakeFence::new(10);
        let mut pacer = VblankPacer::new();
        pacer.wait(&fence, TIMEOUT).unwrap();
        assert_eq!(pacer.expected(), 11);

        // Two blanks go by before the next wait.
        fence.advance(2);
        let tick = pacer.wait(&fence, TIMEOUT).unwrap();
        assert_eq!(
            tick,
            VblankTick {
                expected: 11,
                completed: 12,
                skipped: 1
            }
        );
        assert_eq!(pacer.expected(), 13);
    }

    #[test]
    fn vblank_wait_blocks_for_next_blank() {
        let fence = FakeFence::new(4);
        fence.tick_on_wait(1);
        let mut pacer = VblankPacer::new();
        pacer.wait(&fence, TIMEOUT).unwrap();

        let tick = pacer.wait(&fence, TIMEOUT).unwrap();
        assert_eq!((tick.expected, tick.completed, tick.skipped), (5, 5, 0));
    }

    #[test]
    fn vblank_timeout_is_fatal() {
        let fence = FakeFence::new(7);
        let mut pacer = VblankPacer::new();
        pacer.wait(&fence, TIMEOUT).unwrap();

        let err = pacer.wait(&fence, TIMEOUT).unwrap_err();
        assert_eq!(
            err,
            SessionError::VblankTimeout {
                expected: 8,
                completed: 7,
                timeout: TIMEOUT
            }
        );
        assert!(err.is_fatal());
        assert_eq!(pacer.expected(), 8);
    }
}
