// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The producer side of the shared-frame handshake.
//!
//! A [`Producer`] writes frames into the shared texture under the keyed
//! mutex: acquire with the producer key, paint, release with the consumer
//! key. [`ProducerThread`] runs that loop on its own thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flipbook_core::arbiter::HandshakeKeys;
use flipbook_core::backend::{AcquireStatus, KeyedMutex};
use flipbook_core::error::DeviceError;
use tracing::warn;

use crate::keyed_mutex::SoftKeyedMutex;
use crate::texture::{PixelBuffer, SoftTexture};

/// Writes frames into the shared texture.
#[derive(Debug)]
pub struct Producer {
    mutex: SoftKeyedMutex,
    frame: SoftTexture,
    keys: HandshakeKeys,
    timeout: Duration,
    frames: u64,
}

impl Producer {
    /// Creates a producer over the shared `frame` and its `mutex`.
    #[must_use]
    pub fn new(
        mutex: SoftKeyedMutex,
        frame: SoftTexture,
        keys: HandshakeKeys,
        timeout: Duration,
    ) -> Self {
        Self {
            mutex,
            frame,
            keys,
            timeout,
            frames: 0,
        }
    }

    /// Frames written so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Takes the shared frame, lets `paint` write frame number `n`, and hands
    /// it to the consumer.
    ///
    /// Returns `false` without painting if the consumer did not hand the
    /// frame back within the timeout.
    pub fn produce(&mut self, paint: impl FnOnce(u64, &mut PixelBuffer)) -> Result<bool, DeviceError> {
        match self.mutex.acquire(self.keys.producer, self.timeout)? {
            AcquireStatus::TimedOut => Ok(false),
            AcquireStatus::Acquired => {
                let mut pixels = self.frame.lock();
                paint(self.frames, &mut *pixels);
                drop(pixels);
                self.frames += 1;
                self.mutex.release(self.keys.consumer)?;
                Ok(true)
            }
        }
    }

    /// Takes the shared frame and keeps it until [`hand_back`](Self::hand_back),
    /// simulating a producer that stalls mid-frame.
    pub fn stall(&mut self) -> Result<bool, DeviceError> {
        Ok(self.mutex.acquire(self.keys.producer, self.timeout)? == AcquireStatus::Acquired)
    }

    /// Releases a frame taken with [`stall`](Self::stall) to the consumer.
    pub fn hand_back(&mut self) -> Result<(), DeviceError> {
        self.mutex.release(self.keys.consumer)
    }

    /// Runs the produce loop on a new thread, painting with `paint` and
    /// pausing `interval` between frames.
    #[must_use]
    pub fn spawn<F>(mut self, interval: Duration, mut paint: F) -> ProducerThread
    where
        F: FnMut(u64, &mut PixelBuffer) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let frames = Arc::new(AtomicU64::new(0));
        let (stop_flag, counter) = (Arc::clone(&stop), Arc::clone(&frames));
        let handle = thread::spawn(move || {
            while !stop_flag.load(Ordering::Acquire) {
                match self.produce(&mut paint) {
                    Ok(true) => {
                        counter.store(self.frames, Ordering::Release);
                        thread::sleep(interval);
                    }
                    Ok(false) => {}
                    Err(err) => {
                        warn!(target: "flipbook", error = %err, "producer stopped");
                        break;
                    }
                }
            }
        });
        ProducerThread {
            stop,
            frames,
            handle: Some(handle),
        }
    }
}

/// A running producer. Stops when dropped.
#[derive(Debug)]
pub struct ProducerThread {
    stop: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl ProducerThread {
    /// Frames written so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Stops producing and returns the number of frames written.
    pub fn stop(mut self) -> u64 {
        self.shutdown();
        self.frames()
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ProducerThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SoftBackend;

    const SHORT: Duration = Duration::from_millis(5);

    #[test]
    fn produce_paints_and_hands_over() {
        let backend = SoftBackend::new();
        let mutex = backend.keyed_mutex();
        let frame = backend.texture(2, 2, 0);
        let mut consumer = mutex.clone();
        let mut producer = Producer::new(mutex, frame.clone(), HandshakeKeys::DEFAULT, SHORT);

        assert!(producer.produce(|n, px| px.fill(0xFF00_0000 | u32::try_from(n).unwrap())).unwrap());
        assert_eq!(frame.snapshot().pixel(0, 0), Some(0xFF00_0000));
        assert_eq!(producer.frames(), 1);

        // The consumer has not handed the frame back yet.
        assert!(!producer.produce(|_, _| unreachable!()).unwrap());

        assert_eq!(consumer.acquire(1, SHORT).unwrap(), AcquireStatus::Acquired);
        consumer.release(0).unwrap();
        assert!(producer.produce(|n, px| px.fill(0xFF00_0000 | u32::try_from(n).unwrap())).unwrap());
        assert_eq!(frame.snapshot().pixel(1, 1), Some(0xFF00_0001));
    }

    #[test]
    fn stalled_producer_holds_the_frame() {
        let backend = SoftBackend::new();
        let mutex = backend.keyed_mutex();
        let mut consumer = mutex.clone();
        let mut producer = Producer::new(
            mutex,
            backend.texture(1, 1, 0),
            HandshakeKeys::DEFAULT,
            SHORT,
        );

        assert!(producer.stall().unwrap());
        assert_eq!(consumer.acquire(1, SHORT).unwrap(), AcquireStatus::TimedOut);
        producer.hand_back().unwrap();
        assert_eq!(consumer.acquire(1, SHORT).unwrap(), AcquireStatus::Acquired);
    }

    #[test]
    fn thread_produces_while_consumer_keeps_up() {
        let backend = SoftBackend::new();
        let mutex = backend.keyed_mutex();
        let mut consumer = mutex.clone();
        let producer = Producer::new(
            mutex,
            backend.texture(1, 1, 0),
            HandshakeKeys::DEFAULT,
            SHORT,
        );
        let running = producer.spawn(Duration::ZERO, |_, px| px.fill(0xFFFF_FFFF));

        for _ in 0..3 {
            assert_eq!(
                consumer.acquire(1, Duration::from_secs(5)).unwrap(),
                AcquireStatus::Acquired
            );
            consumer.release(0).unwrap();
        }
        assert!(running.stop() >= 3);
    }
}
