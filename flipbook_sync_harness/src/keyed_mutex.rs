// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A keyed mutex shared between threads.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use flipbook_core::backend::{AcquireStatus, KeyedMutex, SharedHandle};
use flipbook_core::error::{DeviceError, Operation, Status};

use crate::device::Faults;

/// Status returned when the holder went away without releasing.
pub const WAIT_ABANDONED: i32 = 0x80;
/// Status returned for a release without a matching acquire.
pub const DXGI_ERROR_INVALID_CALL: i32 = 0x887A_0001_u32.cast_signed();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Ownership {
    /// Free for whoever acquires with this key.
    Released(u64),
    /// Held; the holder acquired with this key.
    Held(u64),
    /// The holder went away while holding.
    Abandoned,
}

#[derive(Debug)]
struct KeyedState {
    ownership: Mutex<Ownership>,
    changed: Condvar,
    handle: u64,
}

/// A keyed mutex guarding a shared frame.
///
/// Starts released with key `0`. Clones refer to the same mutex, the way
/// the producer and the session each open the shared frame.
#[derive(Clone, Debug)]
pub struct SoftKeyedMutex {
    state: Arc<KeyedState>,
    faults: Faults,
}

impl SoftKeyedMutex {
    pub(crate) fn new(handle: u64, faults: Faults) -> Self {
        Self {
            state: Arc::new(KeyedState {
                ownership: Mutex::new(Ownership::Released(0)),
                changed: Condvar::new(),
                handle,
            }),
            faults,
        }
    }

    fn ownership(&self) -> MutexGuard<'_, Ownership> {
        self.state
            .ownership
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulates the holder crashing: every later acquire fails.
    pub fn abandon(&self) {
        *self.ownership() = Ownership::Abandoned;
        self.state.changed.notify_all();
    }

    /// Whether someone currently holds the mutex.
    #[must_use]
    pub fn is_held(&self) -> bool {
        matches!(*self.ownership(), Ownership::Held(_))
    }
}

impl KeyedMutex for SoftKeyedMutex {
    fn acquire(&mut self, key: u64, timeout: Duration) -> Result<AcquireStatus, DeviceError> {
        self.faults.check(Operation::AcquireSync)?;
        let guard = self.ownership();
        let (mut guard, _) = self
            .state
            .changed
            .wait_timeout_while(guard, timeout, |ownership| {
                !matches!(ownership, Ownership::Abandoned)
                    && *ownership != Ownership::Released(key)
            })
            .unwrap_or_else(PoisonError::into_inner);
        match *guard {
            Ownership::Abandoned => Err(DeviceError::new(
                Operation::AcquireSync,
                Status::Code(WAIT_ABANDONED),
            )),
            Ownership::Released(released) if released == key => {
                *guard = Ownership::Held(key);
                Ok(AcquireStatus::Acquired)
            }
            _ => Ok(AcquireStatus::TimedOut),
        }
    }

    fn release(&mut self, key: u64) -> Result<(), DeviceError> {
        self.faults.check(Operation::ReleaseSync)?;
        let mut guard = self.ownership();
        if !matches!(*guard, Ownership::Held(_)) {
            return Err(DeviceError::new(
                Operation::ReleaseSync,
                Status::Code(DXGI_ERROR_INVALID_CALL),
            ));
        }
        *guard = Ownership::Released(key);
        self.state.changed.notify_all();
        Ok(())
    }

    fn shared_handle(&self) -> SharedHandle {
        SharedHandle(self.state.handle)
    }
}
