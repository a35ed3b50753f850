// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Session configuration.

use core::time::Duration;

use crate::arbiter::HandshakeKeys;
use crate::error::ConfigError;

/// Startup retry policy for scanout creation.
///
/// Right after a display mode change the first scanout creation can fail
/// transiently; the first slot is retried `attempts` times with `backoff`
/// between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

/// Configuration for a [`Session`](crate::session::Session).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long a cycle waits for the producer to release the shared frame.
    pub acquire_timeout: Duration,
    /// How long [`wait_next_vblank`](crate::session::Session::wait_next_vblank)
    /// blocks before the display is considered lost.
    pub vblank_timeout: Duration,
    /// How far ahead of each vertical blank the periodic fence fires.
    pub vblank_lead_time: Duration,
    /// Keyed-mutex keys for the producer/consumer handshake.
    pub keys: HandshakeKeys,
    /// Scanout creation retries at startup.
    pub scanout_retry: RetryPolicy,
    /// Number of output surfaces in the flip ring.
    pub slots: usize,
}

impl SessionConfig {
    /// Double-buffered output with generous timeouts.
    pub const DEFAULT: Self = Self {
        acquire_timeout: Duration::from_millis(100),
        vblank_timeout: Duration::from_millis(200),
        vblank_lead_time: Duration::from_millis(5),
        keys: HandshakeKeys::DEFAULT,
        scanout_retry: RetryPolicy {
            attempts: 2,
            backoff: Duration::from_millis(500),
        },
        slots: 2,
    };

    /// Shorter acquire timeout and a tighter vblank lead, for producers that
    /// keep up with the display rate.
    #[must_use]
    pub const fn low_latency() -> Self {
        Self {
            acquire_timeout: Duration::from_millis(8),
            vblank_lead_time: Duration::from_millis(2),
            ..Self::DEFAULT
        }
    }

    /// Checks the configuration for values the session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slots < 2 {
            return Err(ConfigError::TooFewSlots { slots: self.slots });
        }
        if self.acquire_timeout.is_zero() || self.vblank_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.vblank_lead_time >= self.vblank_timeout {
            return Err(ConfigError::LeadTimeTooLong {
                lead_time: self.vblank_lead_time,
                vblank_timeout: self.vblank_timeout,
            });
        }
        if self.acquire_timeout >= self.vblank_timeout {
            return Err(ConfigError::AcquireTimeoutTooLong {
                acquire_timeout: self.acquire_timeout,
                vblank_timeout: self.vblank_timeout,
            });
        }
        if self.scanout_retry.attempts == 0 {
            return Err(ConfigError::NoRetryAttempts);
        }
        if self.keys.producer == self.keys.consumer {
            return Err(ConfigError::SameKeys);
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
