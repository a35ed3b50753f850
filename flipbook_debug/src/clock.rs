// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Timestamp sources for sinks.
//!
//! `flipbook_core` events carry no timestamps; each sink stamps them on
//! arrival with a [`Clock`].

use std::time::Instant;

/// Source of monotonic nanosecond timestamps.
pub trait Clock {
    /// Nanoseconds since an arbitrary fixed origin.
    fn now_nanos(&mut self) -> u64;
}

/// Wall-clock [`Clock`] counting from its creation.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_nanos(&mut self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

impl<F: FnMut() -> u64> Clock for F {
    fn now_nanos(&mut self) -> u64 {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let mut clock = MonotonicClock::new();
        let a = clock.now_nanos();
        let b = clock.now_nanos();
        assert!(b >= a);
    }

    #[test]
    fn closures_are_clocks() {
        let mut t = 0;
        let mut clock = move || {
            t += 10;
            t
        };
        assert_eq!(clock.now_nanos(), 10);
        assert_eq!(clock.now_nanos(), 20);
    }
}
