// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared-surface arbitration.
//!
//! An external producer writes the shared frame; the session reads it. The
//! two sides never touch the frame at the same time: a keyed mutex is passed
//! back and forth, each side releasing with the key the other side acquires
//! with.
//!
//! ```text
//!   producer: acquire(producer) ── write ── release(consumer)
//!                                                   │
//!   session:              acquire(consumer) ◄───────┘ ── read ── release(producer)
//! ```
//!
//! [`SurfaceArbiter::try_acquire`] returns a [`FrameLease`] on success. The
//! lease borrows the arbiter, so a second acquire cannot start while one is
//! outstanding, and [`FrameLease::release`] is the only way to hand the frame
//! back with an observable result.

use core::fmt;
use core::time::Duration;

use crate::backend::{AcquireStatus, KeyedMutex, SharedHandle};
use crate::error::DeviceError;

/// Keys used for the producer/consumer handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandshakeKeys {
    /// Key the producer acquires with; the session releases with it.
    pub producer: u64,
    /// Key the session acquires with; the producer releases with it.
    pub consumer: u64,
}

impl HandshakeKeys {
    /// Producer `0`, consumer `1`.
    pub const DEFAULT: Self = Self {
        producer: 0,
        consumer: 1,
    };
}

impl Default for HandshakeKeys {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Outcome of [`SurfaceArbiter::try_acquire`].
#[derive(Debug)]
pub enum Acquire<'a, M: KeyedMutex> {
    /// The session holds the shared frame until the lease is released.
    Acquired(FrameLease<'a, M>),
    /// The producer did not release within the timeout. Not an error: the
    /// cycle is skipped.
    Busy,
}

/// Serializes access to the shared frame between producer and session.
#[derive(Debug)]
pub struct SurfaceArbiter<M> {
    mutex: M,
    keys: HandshakeKeys,
    timeout: Duration,
}

impl<M: KeyedMutex> SurfaceArbiter<M> {
    /// Creates an arbiter over `mutex`.
    #[must_use]
    pub const fn new(mutex: M, keys: HandshakeKeys, timeout: Duration) -> Self {
        Self {
            mutex,
            keys,
            timeout,
        }
    }

    /// Waits up to the configured timeout for the producer's release.
    ///
    /// Returns [`Acquire::Busy`] if the producer still holds the frame.
    /// Any other keyed-mutex failure is returned as an error.
    pub fn try_acquire(&mut self) -> Result<Acquire<'_, M>, DeviceError> {
        match self.mutex.acquire(self.keys.consumer, self.timeout)? {
            AcquireStatus::Acquired => Ok(Acquire::Acquired(FrameLease { arbiter: Some(self) })),
            AcquireStatus::TimedOut => Ok(Acquire::Busy),
        }
    }

    /// Handle the producer opens the shared frame with.
    #[must_use]
    pub fn shared_handle(&self) -> SharedHandle {
        self.mutex.shared_handle()
    }

    /// Handshake keys in use.
    #[must_use]
    pub const fn keys(&self) -> HandshakeKeys {
        self.keys
    }

    /// Acquire timeout in use.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Exclusive access to the shared frame for one cycle.
///
/// Dropping a lease without calling [`release`](Self::release) still hands the
/// frame back to the producer, but the release result is lost; that path is
/// only taken when a cycle unwinds.
#[must_use = "the shared frame stays locked for the producer until the lease is released"]
pub struct FrameLease<'a, M: KeyedMutex> {
    arbiter: Option<&'a mut SurfaceArbiter<M>>,
}

impl<M: KeyedMutex> FrameLease<'_, M> {
    /// Hands the shared frame back to the producer.
    pub fn release(mut self) -> Result<(), DeviceError> {
        match self.arbiter.take() {
            Some(arbiter) => arbiter.mutex.release(arbiter.keys.producer),
            None => Ok(()),
        }
    }
}

impl<M: KeyedMutex> Drop for FrameLease<'_, M> {
    fn drop(&mut self) {
        if let Some(arbiter) = self.arbiter.take() {
            _ = arbiter.mutex.release(arbiter.keys.producer);
        }
    }
}

impl<M: KeyedMutex> fmt::Debug for FrameLease<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameLease")
            .field("held", &self.arbiter.is_some())
            .finish()
    }
}
