// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The software display pipeline.
//!
//! [`SoftDisplay`] queues scanout tasks; nothing reaches the screen until a
//! vertical blank. [`DisplayController::vblank`] plays the role of the
//! display hardware: it latches the newest queued task whose fence wait is
//! satisfied, then advances the periodic vertical-blank fence. Call it from
//! a test to step the display by hand, or let a [`VblankThread`] call it at
//! a fixed interval.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flipbook_core::backend::{DisplayPipeline, ScanoutTask, SharedHandle, TimelineFence};
use flipbook_core::error::{DeviceError, Operation};

use crate::device::Faults;
use crate::fence::{FenceRegistry, SoftFence};
use crate::texture::{PixelBuffer, SoftTexture};

/// A surface bound for scanout.
#[derive(Clone, Debug)]
pub struct SoftScanout {
    id: u32,
    surface: SoftTexture,
}

impl SoftScanout {
    /// Index in creation order.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }
}

#[derive(Debug)]
struct QueuedTask {
    scanout: SoftScanout,
    wait: Option<(SoftFence, u64)>,
}

impl QueuedTask {
    fn is_ready(&self) -> bool {
        self.wait
            .as_ref()
            .is_none_or(|(fence, value)| fence.completed_value() >= *value)
    }
}

/// Scanout ids kept by [`DisplayController::presented`].
pub const PRESENTED_HISTORY: usize = 64;

#[derive(Debug, Default)]
struct DisplayState {
    next_scanout: u32,
    queue: VecDeque<QueuedTask>,
    periodic: Option<SoftFence>,
    lead_time: Option<Duration>,
    front: Option<PixelBuffer>,
    presented: VecDeque<u32>,
    presented_count: u64,
    backoffs: Vec<Duration>,
}

type Shared = Arc<Mutex<DisplayState>>;

fn lock(state: &Shared) -> MutexGuard<'_, DisplayState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The software display pipeline.
#[derive(Debug)]
pub struct SoftDisplay {
    state: Shared,
    fences: FenceRegistry,
    faults: Faults,
}

impl SoftDisplay {
    pub(crate) fn new(fences: FenceRegistry, faults: Faults) -> Self {
        Self {
            state: Shared::default(),
            fences,
            faults,
        }
    }

    /// A handle that drives and inspects this display from another thread.
    #[must_use]
    pub fn controller(&self) -> DisplayController {
        DisplayController {
            state: Arc::clone(&self.state),
        }
    }
}

impl DisplayPipeline for SoftDisplay {
    type Primary = SoftTexture;
    type Scanout = SoftScanout;
    type Fence = SoftFence;

    fn create_scanout(&mut self, primary: &SoftTexture) -> Result<SoftScanout, DeviceError> {
        self.faults.check(Operation::CreateScanout)?;
        let mut state = lock(&self.state);
        let id = state.next_scanout;
        state.next_scanout += 1;
        Ok(SoftScanout {
            id,
            surface: primary.clone(),
        })
    }

    fn import_fence(&mut self, handle: SharedHandle) -> Result<SoftFence, DeviceError> {
        self.faults.check(Operation::ImportFence)?;
        self.fences.open(handle, Operation::ImportFence)
    }

    fn create_periodic_fence(&mut self, lead_time: Duration) -> Result<SoftFence, DeviceError> {
        self.faults.check(Operation::CreatePeriodicFence)?;
        let fence = self.fences.create(0);
        let mut state = lock(&self.state);
        state.periodic = Some(fence.clone());
        state.lead_time = Some(lead_time);
        Ok(fence)
    }

    fn execute(&mut self, task: ScanoutTask<'_, Self>) -> Result<(), DeviceError> {
        self.faults.check(Operation::ExecuteTask)?;
        lock(&self.state).queue.push_back(QueuedTask {
            scanout: task.scanout().clone(),
            wait: task.wait().map(|(fence, value)| (fence.clone(), value)),
        });
        Ok(())
    }

    fn backoff(&mut self, delay: Duration) {
        lock(&self.state).backoffs.push(delay);
        thread::sleep(delay);
    }
}

/// Drives the display's vertical blanks and reports what was shown.
#[derive(Clone, Debug)]
pub struct DisplayController {
    state: Shared,
}

impl DisplayController {
    /// Runs one vertical blank.
    ///
    /// Scanout tasks complete in submission order; a task whose fence has
    /// not been reached holds back everything queued after it. Returns the
    /// periodic fence value after the blank, or `None` before the periodic
    /// fence exists.
    pub fn vblank(&self) -> Option<u64> {
        let mut state = lock(&self.state);
        let mut latched = None;
        while state.queue.front().is_some_and(QueuedTask::is_ready) {
            latched = state.queue.pop_front();
        }
        if let Some(task) = latched {
            state.front = Some(task.scanout.surface.snapshot());
            if state.presented.len() == PRESENTED_HISTORY {
                state.presented.pop_front();
            }
            state.presented.push_back(task.scanout.id);
            state.presented_count += 1;
        }
        state.periodic.as_ref().map(SoftFence::increment)
    }

    /// What the screen currently shows.
    #[must_use]
    pub fn front(&self) -> Option<PixelBuffer> {
        lock(&self.state).front.clone()
    }

    /// The last [`PRESENTED_HISTORY`] scanout ids, oldest first.
    #[must_use]
    pub fn presented(&self) -> Vec<u32> {
        lock(&self.state).presented.iter().copied().collect()
    }

    /// Blanks that latched a new frame.
    #[must_use]
    pub fn presented_count(&self) -> u64 {
        lock(&self.state).presented_count
    }

    /// Tasks waiting for their fence or for the next blank.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.state).queue.len()
    }

    /// Delays requested by the startup retry loop.
    #[must_use]
    pub fn backoffs(&self) -> Vec<Duration> {
        lock(&self.state).backoffs.clone()
    }

    /// Lead time the periodic fence was created with.
    #[must_use]
    pub fn lead_time(&self) -> Option<Duration> {
        lock(&self.state).lead_time
    }

    /// Starts a thread that runs a vertical blank every `interval`.
    #[must_use]
    pub fn spawn(self, interval: Duration) -> VblankThread {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            while !stop_flag.load(Ordering::Acquire) {
                thread::sleep(interval);
                self.vblank();
            }
        });
        VblankThread {
            stop,
            handle: Some(handle),
        }
    }
}

/// A running vertical-blank generator. Stops when dropped.
#[derive(Debug)]
pub struct VblankThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl VblankThread {
    /// Stops generating blanks and waits for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for VblankThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SoftBackend;
    use flipbook_core::backend::{FenceWait, GpuDevice};
    use flipbook_core::error::Status;

    #[test]
    fn vblank_advances_periodic_fence() {
        let backend = SoftBackend::new();
        let mut display = backend.display();
        let controller = display.controller();
        assert_eq!(controller.vblank(), None);

        let periodic = display
            .create_periodic_fence(Duration::from_millis(5))
            .unwrap();
        assert_eq!(controller.vblank(), Some(1));
        assert_eq!(controller.vblank(), Some(2));
        assert_eq!(periodic.completed_value(), 2);
        assert_eq!(controller.lead_time(), Some(Duration::from_millis(5)));
    }

    #[test]
    fn task_waits_for_its_fence() {
        let backend = SoftBackend::new();
        let mut display = backend.display();
        let controller = display.controller();
        let surface = backend.texture(2, 2, 0xFF00_FF00);
        let scanout = display.create_scanout(&surface).unwrap();
        let render = backend.device().create_fence(0).unwrap();
        let imported = display.import_fence(render.share().unwrap()).unwrap();
        display
            .execute(ScanoutTask::new(&scanout).wait_for(&imported, 5))
            .unwrap();

        controller.vblank();
        assert_eq!(controller.pending(), 1);
        assert!(controller.front().is_none());

        render.signal(5);
        controller.vblank();
        assert_eq!(controller.pending(), 0);
        assert_eq!(controller.presented(), [0]);
        assert_eq!(controller.front().unwrap().pixel(1, 1), Some(0xFF00_FF00));
    }

    #[test]
    fn newest_ready_task_wins_the_blank() {
        let backend = SoftBackend::new();
        let mut display = backend.display();
        let controller = display.controller();
        let a = display
            .create_scanout(&backend.texture(1, 1, 0xFFAA_AAAA))
            .unwrap();
        let b = display
            .create_scanout(&backend.texture(1, 1, 0xFFBB_BBBB))
            .unwrap();
        display.execute(ScanoutTask::new(&a)).unwrap();
        display.execute(ScanoutTask::new(&b)).unwrap();

        controller.vblank();
        assert_eq!(controller.presented(), [1]);
        assert_eq!(controller.front().unwrap().pixel(0, 0), Some(0xFFBB_BBBB));
    }

    #[test]
    fn presented_history_is_bounded() {
        let backend = SoftBackend::new();
        let mut display = backend.display();
        let controller = display.controller();
        let scanouts = [
            display.create_scanout(&backend.texture(1, 1, 0)).unwrap(),
            display.create_scanout(&backend.texture(1, 1, 0)).unwrap(),
        ];
        let blanks = PRESENTED_HISTORY + 10;
        for i in 0..blanks {
            display.execute(ScanoutTask::new(&scanouts[i % 2])).unwrap();
            controller.vblank();
        }

        let presented = controller.presented();
        assert_eq!(presented.len(), PRESENTED_HISTORY);
        assert_eq!(controller.presented_count(), blanks as u64);
        assert_eq!(presented.last(), Some(&1));
        assert_eq!(presented[0], 0);
    }

    #[test]
    fn failed_scanout_creation_is_reported() {
        let backend = SoftBackend::new();
        let mut display = backend.display();
        backend.fail(Operation::CreateScanout, Status::Code(-1));
        let surface = backend.texture(1, 1, 0);
        assert!(display.create_scanout(&surface).is_err());
        assert_eq!(display.create_scanout(&surface).unwrap().id(), 0);
    }

    #[test]
    fn vblank_thread_ticks_until_stopped() {
        let backend = SoftBackend::new();
        let mut display = backend.display();
        let periodic = display
            .create_periodic_fence(Duration::from_millis(1))
            .unwrap();
        let ticker = display.controller().spawn(Duration::from_millis(1));
        assert!(matches!(
            periodic.wait(3, Duration::from_secs(5)).unwrap(),
            FenceWait::Reached(_)
        ));
        ticker.stop();
        let value = periodic.completed_value();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(periodic.completed_value(), value);
    }
}
