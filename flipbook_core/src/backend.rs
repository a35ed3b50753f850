// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for graphics and display integrations.
//!
//! Flipbook splits platform-specific work into *backends*. A backend provides
//! three capabilities, each expressed as a trait here:
//!
//! - **Keyed mutex** ([`KeyedMutex`]) guards the shared frame written by an
//!   external producer. The producer and the consumer take turns by
//!   releasing with each other's key.
//!
//! - **GPU device** ([`GpuDevice`]) creates textures, views and vertex
//!   buffers, issues quad draws, reads back texture regions, and signals
//!   [`TimelineFence`]s after submitted work.
//!
//! - **Display pipeline** ([`DisplayPipeline`]) binds presentable surfaces to
//!   scanouts, imports device fences, owns a periodic vertical-blank fence,
//!   and executes [`ScanoutTask`]s.
//!
//! Fences cross between the device and the display pipeline only as opaque
//! [`SharedHandle`]s.
//!
//! # Crate boundaries
//!
//! `flipbook_core` owns the arbitration, cursor resolution, compositing,
//! scheduling and this contract module. Backends implement the traits and the
//! application wires a backend into a [`Session`](crate::session::Session).
//!
//! # Cycle pseudocode
//!
//! ```rust,ignore
//! let (mut session, info) = Session::init_output(config, setup)?;
//! loop {
//!     let pointer = cursor_source.latest();
//!     match session.update_application_window(&pointer, &mut tracer) {
//!         Ok(_) => {}
//!         Err(err) if err.is_fatal() => break,
//!         Err(_) => continue,
//!     }
//!     session.wait_next_vblank(&mut tracer)?;
//! }
//! ```

use core::time::Duration;

use alloc::vec::Vec;

use crate::compositor::Vertex;
use crate::error::DeviceError;

/// An opaque token that lets one subsystem open an object created by another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SharedHandle(pub u64);

/// Result of a timed keyed-mutex acquire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireStatus {
    /// The key was taken.
    Acquired,
    /// The mutex was not released with the requested key before the timeout.
    TimedOut,
}

/// Result of a timed fence wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FenceWait {
    /// The fence reached the requested value; carries the completed value.
    Reached(u64),
    /// The timeout elapsed first; carries the completed value at that point.
    TimedOut(u64),
}

/// A keyed mutex attached to the shared frame.
///
/// The mutex starts released with key `0`. `acquire(key)` succeeds only once
/// the current owner has called `release(key)`.
pub trait KeyedMutex {
    /// Waits up to `timeout` for the mutex to be released with `key`.
    fn acquire(&mut self, key: u64, timeout: Duration) -> Result<AcquireStatus, DeviceError>;

    /// Releases the mutex, handing it to whoever acquires with `key`.
    fn release(&mut self, key: u64) -> Result<(), DeviceError>;

    /// Handle through which the producer opens the shared frame.
    fn shared_handle(&self) -> SharedHandle;
}

/// A monotonically increasing 64-bit fence.
pub trait TimelineFence {
    /// Latest value the fence has reached.
    fn completed_value(&self) -> u64;

    /// Blocks until the fence reaches `value` or `timeout` elapses.
    fn wait(&self, value: u64, timeout: Duration) -> Result<FenceWait, DeviceError>;

    /// Exports the fence so another subsystem can open it.
    fn share(&self) -> Result<SharedHandle, DeviceError>;
}

/// What a texture is created for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureUsage {
    /// Immutable, sampled by draws.
    Sampled,
    /// CPU-readable copy destination.
    Staging,
}

/// Description of a 32-bit BGRA texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Intended usage.
    pub usage: TextureUsage,
}

/// Initial contents for a texture.
#[derive(Clone, Copy, Debug)]
pub struct InitData<'a> {
    /// Row-major pixel bytes, four per pixel.
    pub bytes: &'a [u8],
    /// Distance between rows in bytes.
    pub row_pitch: u32,
}

/// A pixel rectangle, half-open on the right and bottom edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelBox {
    /// Left edge, inclusive.
    pub left: u32,
    /// Top edge, inclusive.
    pub top: u32,
    /// Right edge, exclusive.
    pub right: u32,
    /// Bottom edge, exclusive.
    pub bottom: u32,
}

impl PixelBox {
    /// Creates a box from an origin and a size.
    #[must_use]
    pub const fn from_origin_size(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            right: left + width,
            bottom: top + height,
        }
    }

    /// Width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.right - self.left
    }

    /// Height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// CPU copy of a texture region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappedImage {
    /// Pixels as `0xAARRGGBB`, `pitch` per row.
    pub pixels: Vec<u32>,
    /// Region width in pixels.
    pub width: u32,
    /// Region height in pixels.
    pub height: u32,
    /// Distance between rows, in pixels.
    pub pitch: u32,
}

impl MappedImage {
    /// Pixel at `(x, y)` relative to the region origin.
    #[inline]
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.pitch as usize + x as usize)
            .copied()
    }
}

/// Color blending applied by a draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    /// Source replaces destination.
    Opaque,
    /// `src.rgb * src.a + dst.rgb * (1 - src.a)`; alpha is written as source.
    StraightAlpha,
}

/// A textured-quad draw into a render target.
///
/// Each draw carries its own target, source, geometry and blend mode, so no
/// pipeline state leaks from one draw to the next.
pub struct DrawCall<'a, D: GpuDevice + ?Sized> {
    /// Texture drawn into; the viewport covers all of it.
    pub target: &'a D::Texture,
    /// Sampled source.
    pub source: &'a D::View,
    /// Triangle list.
    pub vertices: &'a D::Buffer,
    /// Number of vertices to draw.
    pub vertex_count: u32,
    /// Blend mode.
    pub blend: BlendMode,
}

impl<D: GpuDevice + ?Sized> core::fmt::Debug for DrawCall<'_, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DrawCall")
            .field("vertex_count", &self.vertex_count)
            .field("blend", &self.blend)
            .finish_non_exhaustive()
    }
}

/// GPU device capability.
pub trait GpuDevice {
    /// A 2D texture.
    type Texture;
    /// A sampled view of a texture.
    type View;
    /// A vertex buffer.
    type Buffer;
    /// A device-side timeline fence.
    type Fence: TimelineFence;

    /// Size of `texture` in pixels.
    fn texture_size(&self, texture: &Self::Texture) -> (u32, u32);

    /// Creates a texture, uploading `init`.
    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        init: InitData<'_>,
    ) -> Result<Self::Texture, DeviceError>;

    /// Creates a sampled view of `texture`.
    fn create_view(&mut self, texture: &Self::Texture) -> Result<Self::View, DeviceError>;

    /// Creates an immutable vertex buffer.
    fn create_vertex_buffer(&mut self, vertices: &[Vertex]) -> Result<Self::Buffer, DeviceError>;

    /// Copies `region` of `texture` into CPU memory.
    fn read_region(
        &mut self,
        texture: &Self::Texture,
        region: PixelBox,
    ) -> Result<MappedImage, DeviceError>;

    /// Records a draw.
    fn draw(&mut self, call: &DrawCall<'_, Self>) -> Result<(), DeviceError>;

    /// Creates a fence starting at `initial`.
    fn create_fence(&mut self, initial: u64) -> Result<Self::Fence, DeviceError>;

    /// Opens a fence shared by another subsystem.
    fn open_fence(&mut self, handle: SharedHandle) -> Result<Self::Fence, DeviceError>;

    /// Queues a signal of `fence` to `value` after all recorded work.
    fn signal(&mut self, fence: &Self::Fence, value: u64) -> Result<(), DeviceError>;

    /// Submits recorded work.
    fn flush(&mut self);
}

/// A unit of display work: flip a scanout, optionally after a fence wait.
pub struct ScanoutTask<'a, P: DisplayPipeline + ?Sized> {
    scanout: &'a P::Scanout,
    wait: Option<(&'a P::Fence, u64)>,
}

impl<'a, P: DisplayPipeline + ?Sized> ScanoutTask<'a, P> {
    /// Creates a task that flips `scanout` as soon as possible.
    #[must_use]
    pub const fn new(scanout: &'a P::Scanout) -> Self {
        Self {
            scanout,
            wait: None,
        }
    }

    /// Delays the flip until `fence` reaches `value`.
    #[must_use]
    pub fn wait_for(mut self, fence: &'a P::Fence, value: u64) -> Self {
        self.wait = Some((fence, value));
        self
    }

    /// The scanout to flip.
    #[must_use]
    pub const fn scanout(&self) -> &'a P::Scanout {
        self.scanout
    }

    /// The fence gate, if any.
    #[must_use]
    pub const fn wait(&self) -> Option<(&'a P::Fence, u64)> {
        self.wait
    }
}

impl<P: DisplayPipeline + ?Sized> core::fmt::Debug for ScanoutTask<'_, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScanoutTask")
            .field("wait_value", &self.wait.map(|(_, value)| value))
            .finish_non_exhaustive()
    }
}

/// Display pipeline capability.
pub trait DisplayPipeline {
    /// A presentable surface as owned by the display subsystem.
    type Primary;
    /// A scanout bound to a primary surface.
    type Scanout;
    /// A display-side timeline fence.
    type Fence: TimelineFence;

    /// Binds `primary` to a new scanout.
    fn create_scanout(&mut self, primary: &Self::Primary) -> Result<Self::Scanout, DeviceError>;

    /// Opens a fence shared by the GPU device.
    fn import_fence(&mut self, handle: SharedHandle) -> Result<Self::Fence, DeviceError>;

    /// Creates a fence that increments once per vertical blank, `lead_time`
    /// before the blank itself.
    fn create_periodic_fence(&mut self, lead_time: Duration) -> Result<Self::Fence, DeviceError>;

    /// Submits a scanout task.
    fn execute(&mut self, task: ScanoutTask<'_, Self>) -> Result<(), DeviceError>;

    /// Pauses before a startup retry. The default does not wait.
    fn backoff(&mut self, delay: Duration) {
        _ = delay;
    }
}
