// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The software backend and its GPU device.
//!
//! [`SoftBackend`] hands out every collaborator a session needs, all sharing
//! one fence table and one fault list. Draws run synchronously on the
//! calling thread; fence signals are queued and applied on
//! [`flush`](GpuDevice::flush), like a command buffer submission.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use flipbook_core::backend::{
    DrawCall, GpuDevice, InitData, MappedImage, PixelBox, SharedHandle, TextureDesc,
};
use flipbook_core::compositor::Vertex;
use flipbook_core::error::{DeviceError, Operation, Status};

use crate::display::SoftDisplay;
use crate::fence::{FenceRegistry, SoftFence};
use crate::keyed_mutex::SoftKeyedMutex;
use crate::texture::{PixelBuffer, SoftTexture, draw_quads};

/// Status returned for malformed requests.
pub const E_INVALIDARG: i32 = 0x8007_0057_u32.cast_signed();

/// One-shot failures to inject into backend calls.
#[derive(Clone, Debug, Default)]
pub(crate) struct Faults(Arc<Mutex<Vec<(Operation, Status)>>>);

impl Faults {
    pub(crate) fn push(&self, op: Operation, status: Status) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((op, status));
    }

    /// Fails with the first queued fault for `op`, consuming it.
    pub(crate) fn check(&self, op: Operation) -> Result<(), DeviceError> {
        let mut faults = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match faults.iter().position(|(fault, _)| *fault == op) {
            Some(i) => {
                let (_, status) = faults.remove(i);
                Err(DeviceError::new(op, status))
            }
            None => Ok(()),
        }
    }
}

/// Factory for the software device, display and keyed mutex.
///
/// Clones share the fence table, the texture id counter and the injected
/// faults.
#[derive(Clone, Debug, Default)]
pub struct SoftBackend {
    fences: FenceRegistry,
    faults: Faults,
    next_id: Arc<AtomicU32>,
}

impl SoftBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A GPU device.
    #[must_use]
    pub fn device(&self) -> SoftDevice {
        SoftDevice {
            backend: self.clone(),
            pending_signals: Vec::new(),
        }
    }

    /// A display pipeline.
    #[must_use]
    pub fn display(&self) -> SoftDisplay {
        SoftDisplay::new(self.fences.clone(), self.faults.clone())
    }

    /// A keyed mutex, released with key `0`.
    #[must_use]
    pub fn keyed_mutex(&self) -> SoftKeyedMutex {
        SoftKeyedMutex::new(
            0x2000 + u64::from(self.allocate_id()),
            self.faults.clone(),
        )
    }

    /// A texture filled with `fill`, e.g. the shared frame or an output
    /// surface.
    #[must_use]
    pub fn texture(&self, width: u32, height: u32, fill: u32) -> SoftTexture {
        SoftTexture::new(self.allocate_id(), PixelBuffer::new(width, height, fill))
    }

    /// Makes the next call of `op` on any collaborator fail with `status`.
    pub fn fail(&self, op: Operation, status: Status) {
        self.faults.push(op, status);
    }

    fn allocate_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// The software GPU device.
#[derive(Debug)]
pub struct SoftDevice {
    backend: SoftBackend,
    pending_signals: Vec<(SoftFence, u64)>,
}

impl SoftDevice {
    fn invalid(op: Operation) -> DeviceError {
        DeviceError::new(op, Status::Code(E_INVALIDARG))
    }
}

impl GpuDevice for SoftDevice {
    type Texture = SoftTexture;
    type View = SoftTexture;
    type Buffer = Vec<Vertex>;
    type Fence = SoftFence;

    fn texture_size(&self, texture: &SoftTexture) -> (u32, u32) {
        texture.size()
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        init: InitData<'_>,
    ) -> Result<SoftTexture, DeviceError> {
        self.backend.faults.check(Operation::CreateTexture)?;
        let buffer = PixelBuffer::from_bgra(desc.width, desc.height, init.bytes, init.row_pitch)
            .ok_or(Self::invalid(Operation::CreateTexture))?;
        Ok(SoftTexture::new(self.backend.allocate_id(), buffer))
    }

    fn create_view(&mut self, texture: &SoftTexture) -> Result<SoftTexture, DeviceError> {
        self.backend.faults.check(Operation::CreateView)?;
        Ok(texture.clone())
    }

    fn create_vertex_buffer(&mut self, vertices: &[Vertex]) -> Result<Vec<Vertex>, DeviceError> {
        self.backend.faults.check(Operation::CreateBuffer)?;
        Ok(vertices.to_vec())
    }

    fn read_region(
        &mut self,
        texture: &SoftTexture,
        region: PixelBox,
    ) -> Result<MappedImage, DeviceError> {
        self.backend.faults.check(Operation::ReadRegion)?;
        let source = texture.lock();
        if region.right > source.width() || region.bottom > source.height() {
            return Err(Self::invalid(Operation::ReadRegion));
        }
        let mut pixels = Vec::with_capacity(region.width() as usize * region.height() as usize);
        for y in region.top..region.bottom {
            for x in region.left..region.right {
                pixels.push(source.pixel(x, y).unwrap_or_default());
            }
        }
        Ok(MappedImage {
            pixels,
            width: region.width(),
            height: region.height(),
            pitch: region.width(),
        })
    }

    fn draw(&mut self, call: &DrawCall<'_, Self>) -> Result<(), DeviceError> {
        self.backend.faults.check(Operation::Draw)?;
        if call.target.same_texture(call.source) {
            return Err(Self::invalid(Operation::Draw));
        }
        let count = (call.vertex_count as usize).min(call.vertices.len());
        let source = call.source.lock();
        let mut target = call.target.lock();
        draw_quads(&mut target, &source, &call.vertices[..count], call.blend);
        Ok(())
    }

    fn create_fence(&mut self, initial: u64) -> Result<SoftFence, DeviceError> {
        self.backend.faults.check(Operation::CreateFence)?;
        Ok(self.backend.fences.create(initial))
    }

    fn open_fence(&mut self, handle: SharedHandle) -> Result<SoftFence, DeviceError> {
        self.backend.faults.check(Operation::OpenFence)?;
        self.backend.fences.open(handle, Operation::OpenFence)
    }

    fn signal(&mut self, fence: &SoftFence, value: u64) -> Result<(), DeviceError> {
        self.backend.faults.check(Operation::Signal)?;
        self.pending_signals.push((fence.clone(), value));
        Ok(())
    }

    fn flush(&mut self) {
        for (fence, value) in self.pending_signals.drain(..) {
            fence.signal(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flipbook_core::backend::{BlendMode, TextureUsage, TimelineFence};
    use flipbook_core::compositor::{FULL_SCREEN_QUAD, QUAD_VERTEX_COUNT};

    #[test]
    fn draw_copies_frame_into_target() {
        let backend = SoftBackend::new();
        let mut device = backend.device();
        let frame = backend.texture(8, 4, 0xFF12_3456);
        let target = backend.texture(8, 4, 0);

        let view = device.create_view(&frame).unwrap();
        let vertices = device.create_vertex_buffer(&FULL_SCREEN_QUAD).unwrap();
        device
            .draw(&DrawCall {
                target: &target,
                source: &view,
                vertices: &vertices,
                vertex_count: QUAD_VERTEX_COUNT,
                blend: BlendMode::Opaque,
            })
            .unwrap();
        assert_eq!(target.snapshot(), frame.snapshot());
    }

    #[test]
    fn drawing_a_texture_onto_itself_is_rejected() {
        let backend = SoftBackend::new();
        let mut device = backend.device();
        let frame = backend.texture(2, 2, 0);
        let err = device
            .draw(&DrawCall {
                target: &frame,
                source: &frame,
                vertices: &FULL_SCREEN_QUAD.to_vec(),
                vertex_count: QUAD_VERTEX_COUNT,
                blend: BlendMode::Opaque,
            })
            .unwrap_err();
        assert_eq!(err.op, Operation::Draw);
        assert!(!err.is_fatal());
    }

    #[test]
    fn create_texture_decodes_pitched_rows() {
        let backend = SoftBackend::new();
        let mut device = backend.device();
        let bytes = [0x01, 0x02, 0x03, 0x04, 0xAA, 0xAA, 0xAA, 0xAA];
        let desc = TextureDesc {
            width: 1,
            height: 2,
            usage: TextureUsage::Sampled,
        };
        let texture = device
            .create_texture(
                &desc,
                InitData {
                    bytes: &bytes,
                    row_pitch: 4,
                },
            )
            .unwrap();
        assert_eq!(texture.snapshot().pixels(), [0x0403_0201, 0xAAAA_AAAA]);

        let err = device
            .create_texture(
                &desc,
                InitData {
                    bytes: &bytes,
                    row_pitch: 8,
                },
            )
            .unwrap_err();
        assert_eq!(err.status, Status::Code(E_INVALIDARG));
    }

    #[test]
    fn read_region_copies_the_box() {
        let backend = SoftBackend::new();
        let mut device = backend.device();
        let frame = backend.texture(4, 4, 0xFF00_0000);
        frame.lock().fill_rect(2, 1, 1, 1, 0xFFFF_FFFF);

        let image = device
            .read_region(&frame, PixelBox::from_origin_size(1, 1, 3, 2))
            .unwrap();
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.pixel(1, 0), Some(0xFFFF_FFFF));
        assert_eq!(image.pixel(0, 0), Some(0xFF00_0000));

        assert!(
            device
                .read_region(&frame, PixelBox::from_origin_size(3, 3, 2, 2))
                .is_err()
        );
    }

    #[test]
    fn signals_apply_on_flush() {
        let backend = SoftBackend::new();
        let mut device = backend.device();
        let fence = device.create_fence(0).unwrap();
        device.signal(&fence, 1).unwrap();
        assert_eq!(fence.completed_value(), 0);
        device.flush();
        assert_eq!(fence.completed_value(), 1);

        let opened = device.open_fence(fence.share().unwrap()).unwrap();
        assert_eq!(opened.completed_value(), 1);
    }

    #[test]
    fn injected_faults_are_one_shot() {
        let backend = SoftBackend::new();
        let mut device = backend.device();
        backend.fail(Operation::CreateBuffer, Status::OutOfMemory);
        assert_eq!(
            device.create_vertex_buffer(&FULL_SCREEN_QUAD).unwrap_err(),
            DeviceError::new(Operation::CreateBuffer, Status::OutOfMemory)
        );
        assert!(device.create_vertex_buffer(&FULL_SCREEN_QUAD).is_ok());
    }
}
