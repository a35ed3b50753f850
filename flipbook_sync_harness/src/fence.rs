// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Timeline fences backed by a condition variable.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use flipbook_core::backend::{FenceWait, SharedHandle, TimelineFence};
use flipbook_core::error::{DeviceError, Operation, Status};

#[derive(Debug)]
struct FenceCell {
    handle: u64,
    value: Mutex<u64>,
    reached: Condvar,
}

/// A monotonically increasing counter that threads can block on.
///
/// Clones refer to the same counter, as does every fence opened from its
/// [`SharedHandle`].
#[derive(Clone, Debug)]
pub struct SoftFence(Arc<FenceCell>);

impl SoftFence {
    fn new(handle: u64, initial: u64) -> Self {
        Self(Arc::new(FenceCell {
            handle,
            value: Mutex::new(initial),
            reached: Condvar::new(),
        }))
    }

    fn value(&self) -> MutexGuard<'_, u64> {
        self.0.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raises the counter to `value` and wakes waiters. Lower values are
    /// ignored.
    pub fn signal(&self, value: u64) {
        let mut current = self.value();
        if value > *current {
            *current = value;
            self.0.reached.notify_all();
        }
    }

    /// Raises the counter by one and returns the new value.
    pub fn increment(&self) -> u64 {
        let mut current = self.value();
        *current += 1;
        self.0.reached.notify_all();
        *current
    }

    /// Handle other pipelines open this fence with.
    #[must_use]
    pub fn handle(&self) -> SharedHandle {
        SharedHandle(self.0.handle)
    }
}

impl TimelineFence for SoftFence {
    fn completed_value(&self) -> u64 {
        *self.value()
    }

    fn wait(&self, value: u64, timeout: Duration) -> Result<FenceWait, DeviceError> {
        let guard = self.value();
        let (guard, _) = self
            .0
            .reached
            .wait_timeout_while(guard, timeout, |current| *current < value)
            .unwrap_or_else(PoisonError::into_inner);
        let completed = *guard;
        Ok(if completed >= value {
            FenceWait::Reached(completed)
        } else {
            FenceWait::TimedOut(completed)
        })
    }

    fn share(&self) -> Result<SharedHandle, DeviceError> {
        Ok(self.handle())
    }
}

/// Fences reachable by shared handle, standing in for the kernel object
/// table both pipelines open handles from.
#[derive(Clone, Debug, Default)]
pub(crate) struct FenceRegistry {
    inner: Arc<Mutex<Registry>>,
}

#[derive(Debug, Default)]
struct Registry {
    next_handle: u64,
    fences: HashMap<u64, SoftFence>,
}

impl FenceRegistry {
    pub(crate) fn create(&self, initial: u64) -> SoftFence {
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        registry.next_handle += 1;
        let handle = 0x1000 + registry.next_handle;
        let fence = SoftFence::new(handle, initial);
        registry.fences.insert(handle, fence.clone());
        fence
    }

    pub(crate) fn open(&self, handle: SharedHandle, op: Operation) -> Result<SoftFence, DeviceError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fences
            .get(&handle.0)
            .cloned()
            .ok_or(DeviceError::new(op, Status::InvalidHandle))
    }
}
