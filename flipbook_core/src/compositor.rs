// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame and cursor compositing.
//!
//! Each cycle draws the shared frame over the whole render target with
//! blending disabled, then draws the cursor on top as a straight-alpha
//! textured quad. Cursor textures, views and vertex buffers live only for
//! the draw that uses them.

use kurbo::{Affine, Point, Rect};

use crate::backend::{BlendMode, DrawCall, GpuDevice, InitData, TextureDesc, TextureUsage};
use crate::cursor::{self, PointerState, Resolution};
use crate::error::{DeviceError, ResolveError};

/// Vertex layout shared by every quad: clip-space position and texture
/// coordinate.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Clip-space position; `z` is always `0`.
    pub position: [f32; 3],
    /// Texture coordinate, origin at the top left.
    pub uv: [f32; 2],
}

impl Vertex {
    const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self {
            position: [x, y, 0.0],
            uv: [u, v],
        }
    }
}

/// Vertices per quad (two triangles, no index buffer).
pub const QUAD_VERTEX_COUNT: u32 = 6;

/// Two triangles covering clip space (−1..1) with the texture upright.
pub const FULL_SCREEN_QUAD: [Vertex; 6] = [
    Vertex::new(-1.0, -1.0, 0.0, 1.0),
    Vertex::new(-1.0, 1.0, 0.0, 0.0),
    Vertex::new(1.0, -1.0, 1.0, 1.0),
    Vertex::new(1.0, -1.0, 1.0, 1.0),
    Vertex::new(-1.0, 1.0, 0.0, 0.0),
    Vertex::new(1.0, 1.0, 1.0, 0.0),
];

/// Builds the quad for a cursor occupying `rect` (desktop pixels) on a
/// desktop of the given size.
///
/// The desktop center is taken with integer division, so odd sizes map the
/// same way the display hardware's integer center does.
#[must_use]
#[expect(
    clippy::cast_possible_truncation,
    reason = "clip-space coordinates are small and f32 is the vertex format"
)]
pub fn cursor_quad(rect: Rect, desktop_width: u32, desktop_height: u32) -> [Vertex; 6] {
    let center_x = f64::from((desktop_width / 2).max(1));
    let center_y = f64::from((desktop_height / 2).max(1));
    // Desktop pixels to clip space, flipping y.
    let to_clip = Affine::new([1.0 / center_x, 0.0, 0.0, -1.0 / center_y, -1.0, 1.0]);

    let corner = |x: f64, y: f64, u: f32, v: f32| {
        let p = to_clip * Point::new(x, y);
        Vertex::new(p.x as f32, p.y as f32, u, v)
    };
    let bottom_left = corner(rect.x0, rect.y1, 0.0, 1.0);
    let top_left = corner(rect.x0, rect.y0, 0.0, 0.0);
    let bottom_right = corner(rect.x1, rect.y1, 1.0, 1.0);
    let top_right = corner(rect.x1, rect.y0, 1.0, 0.0);

    [
        bottom_left,
        top_left,
        bottom_right,
        bottom_right,
        top_left,
        top_right,
    ]
}

/// What happened to the cursor in a cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CursorOutcome {
    /// The pointer was not visible.
    NotVisible,
    /// The cursor lies entirely off the desktop.
    Hidden,
    /// The cursor was drawn at this desktop rectangle.
    Drawn {
        /// Left edge in desktop coordinates.
        left: i32,
        /// Top edge in desktop coordinates.
        top: i32,
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// The shape could not be resolved; the frame was presented without it.
    Dropped(ResolveError),
}

/// Draws into one render target for one cycle.
pub struct Compositor<'a, D: GpuDevice> {
    device: &'a mut D,
    frame: &'a D::Texture,
    target: &'a D::Texture,
}

impl<D: GpuDevice> core::fmt::Debug for Compositor<'_, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Compositor").finish_non_exhaustive()
    }
}

impl<'a, D: GpuDevice> Compositor<'a, D> {
    /// Creates a compositor drawing `frame` (and the cursor) into `target`.
    pub const fn new(device: &'a mut D, frame: &'a D::Texture, target: &'a D::Texture) -> Self {
        Self {
            device,
            frame,
            target,
        }
    }

    /// Copies the shared frame over the whole render target.
    pub fn draw_frame(&mut self) -> Result<(), DeviceError> {
        let view = self.device.create_view(self.frame)?;
        let vertices = self.device.create_vertex_buffer(&FULL_SCREEN_QUAD)?;
        self.device.draw(&DrawCall {
            target: self.target,
            source: &view,
            vertices: &vertices,
            vertex_count: QUAD_VERTEX_COUNT,
            blend: BlendMode::Opaque,
        })
    }

    /// Draws the pointer over the render target.
    ///
    /// Shape resolution failures are reported as [`CursorOutcome::Dropped`];
    /// failures creating or drawing the cursor resources are errors.
    pub fn draw_cursor(&mut self, pointer: &PointerState) -> Result<CursorOutcome, DeviceError> {
        if !pointer.visible {
            return Ok(CursorOutcome::NotVisible);
        }

        let (desktop_width, desktop_height) = self.device.texture_size(self.frame);
        let resolution = {
            let device = &mut *self.device;
            let frame = self.frame;
            cursor::resolve(pointer, desktop_width, desktop_height, |region| {
                device.read_region(frame, region)
            })
        };

        let (left, top, width, height, init) = match &resolution {
            Err(err) => return Ok(CursorOutcome::Dropped(*err)),
            Ok(Resolution::Hidden) => return Ok(CursorOutcome::Hidden),
            Ok(Resolution::PassThrough(region)) => (
                region.left,
                region.top,
                region.width,
                region.height,
                InitData {
                    bytes: &pointer.buffer,
                    row_pitch: pointer.shape.pitch,
                },
            ),
            Ok(Resolution::Resolved(image)) => (
                image.left,
                image.top,
                image.width,
                image.height,
                InitData {
                    bytes: bytemuck::cast_slice(&image.pixels),
                    row_pitch: image.pitch(),
                },
            ),
        };

        let texture = self.device.create_texture(
            &TextureDesc {
                width,
                height,
                usage: TextureUsage::Sampled,
            },
            init,
        )?;
        let view = self.device.create_view(&texture)?;
        let rect = Rect::new(
            f64::from(left),
            f64::from(top),
            f64::from(left) + f64::from(width),
            f64::from(top) + f64::from(height),
        );
        let vertices = self
            .device
            .create_vertex_buffer(&cursor_quad(rect, desktop_width, desktop_height))?;
        self.device.draw(&DrawCall {
            target: self.target,
            source: &view,
            vertices: &vertices,
            vertex_count: QUAD_VERTEX_COUNT,
            blend: BlendMode::StraightAlpha,
        })?;

        Ok(CursorOutcome::Drawn {
            left,
            top,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FenceWait, MappedImage, PixelBox, SharedHandle, TimelineFence};
    use crate::cursor::{ShapeInfo, ShapeKind};
    use crate::error::{Operation, Status};
    use alloc::vec;
    use alloc::vec::Vec;
    use core::time::Duration;

    #[derive(Debug)]
    struct NullFence;

    impl TimelineFence for NullFence {
        fn completed_value(&self) -> u64 {
            0
        }
        fn wait(&self, _: u64, _: Duration) -> Result<FenceWait, DeviceError> {
            Ok(FenceWait::Reached(0))
        }
        fn share(&self) -> Result<SharedHandle, DeviceError> {
            Ok(SharedHandle(0))
        }
    }

    /// Records uploads and draws instead of rendering.
    #[derive(Debug, Default)]
    struct RecordingDevice {
        uploads: Vec<(TextureDesc, Vec<u8>, u32)>,
        draws: Vec<(u32, Vec<Vertex>, BlendMode)>,
        reads: Vec<PixelBox>,
        fail: Option<Operation>,
        next_texture: u32,
    }

    impl RecordingDevice {
        fn check(&self, op: Operation) -> Result<(), DeviceError> {
            match self.fail {
                Some(fail) if fail == op => Err(DeviceError::new(op, Status::OutOfMemory)),
                _ => Ok(()),
            }
        }
    }

    impl GpuDevice for RecordingDevice {
        type Texture = (u32, u32, u32);
        type View = u32;
        type Buffer = Vec<Vertex>;
        type Fence = NullFence;

        fn texture_size(&self, texture: &Self::Texture) -> (u32, u32) {
            (texture.1, texture.2)
        }

        fn create_texture(
            &mut self,
            desc: &TextureDesc,
            init: InitData<'_>,
        ) -> Result<Self::Texture, DeviceError> {
            self.check(Operation::CreateTexture)?;
            self.next_texture += 1;
            self.uploads
                .push((*desc, init.bytes.to_vec(), init.row_pitch));
            Ok((100 + self.next_texture, desc.width, desc.height))
        }

        fn create_view(&mut self, texture: &Self::Texture) -> Result<Self::View, DeviceError> {
            self.check(Operation::CreateView)?;
            Ok(texture.0)
        }

        fn create_vertex_buffer(
            &mut self,
            vertices: &[Vertex],
        ) -> Result<Self::Buffer, DeviceError> {
            self.check(Operation::CreateBuffer)?;
            Ok(vertices.to_vec())
        }

        fn read_region(
            &mut self,
            _: &Self::Texture,
            region: PixelBox,
        ) -> Result<MappedImage, DeviceError> {
            self.check(Operation::ReadRegion)?;
            self.reads.push(region);
            Ok(MappedImage {
                pixels: vec![0xFF20_4060; (region.width() * region.height()) as usize],
                width: region.width(),
                height: region.height(),
                pitch: region.width(),
            })
        }

        fn draw(&mut self, call: &DrawCall<'_, Self>) -> Result<(), DeviceError> {
            self.check(Operation::Draw)?;
            self.draws
                .push((*call.source, call.vertices.clone(), call.blend));
            Ok(())
        }

        fn create_fence(&mut self, _: u64) -> Result<Self::Fence, DeviceError> {
            Ok(NullFence)
        }

        fn open_fence(&mut self, _: SharedHandle) -> Result<Self::Fence, DeviceError> {
            Ok(NullFence)
        }

        fn signal(&mut self, _: &Self::Fence, _: u64) -> Result<(), DeviceError> {
            Ok(())
        }

        fn flush(&mut self) {}
    }

    const FRAME: (u32, u32, u32) = (1, 1920, 1080);
    const TARGET: (u32, u32, u32) = (2, 1920, 1080);

    fn color_pointer(x: i32, y: i32) -> PointerState {
        PointerState {
            visible: true,
            x,
            y,
            shape: ShapeInfo {
                kind: ShapeKind::Color,
                width: 32,
                height: 32,
                pitch: 128,
            },
            buffer: vec![0xAB; 128 * 32],
        }
    }

    #[test]
    fn full_screen_quad_matches_desktop_sized_cursor() {
        let quad = cursor_quad(Rect::new(0.0, 0.0, 1920.0, 1080.0), 1920, 1080);
        assert_eq!(quad, FULL_SCREEN_QUAD);
    }

    #[test]
    fn cursor_quad_maps_pixels_to_clip_space() {
        let quad = cursor_quad(Rect::new(512.0, 256.0, 768.0, 384.0), 1024, 512);
        // Top left of the quad is the desktop center.
        assert_eq!(quad[1].position, [0.0, 0.0, 0.0]);
        assert_eq!(quad[0].position, [0.0, -0.5, 0.0]);
        assert_eq!(quad[5].position, [0.5, 0.0, 0.0]);
        assert_eq!(quad[2], quad[3]);
        assert_eq!(quad[1], quad[4]);
    }

    #[test]
    fn frame_draw_is_opaque_full_screen() {
        let mut device = RecordingDevice::default();
        Compositor::new(&mut device, &FRAME, &TARGET)
            .draw_frame()
            .unwrap();
        assert_eq!(device.draws.len(), 1);
        let (source, vertices, blend) = &device.draws[0];
        assert_eq!(*source, 1);
        assert_eq!(vertices.as_slice(), FULL_SCREEN_QUAD.as_slice());
        assert_eq!(*blend, BlendMode::Opaque);
    }

    #[test]
    fn color_cursor_uploads_shape_with_its_pitch() {
        let mut device = RecordingDevice::default();
        let pointer = color_pointer(100, 100);
        let outcome = Compositor::new(&mut device, &FRAME, &TARGET)
            .draw_cursor(&pointer)
            .unwrap();

        assert_eq!(
            outcome,
            CursorOutcome::Drawn {
                left: 100,
                top: 100,
                width: 32,
                height: 32
            }
        );
        assert!(device.reads.is_empty());
        let (desc, bytes, pitch) = &device.uploads[0];
        assert_eq!((desc.width, desc.height, *pitch), (32, 32, 128));
        assert_eq!(bytes, &pointer.buffer);
        let (_, vertices, blend) = &device.draws[0];
        assert_eq!(*blend, BlendMode::StraightAlpha);
        assert_eq!(
            vertices.as_slice(),
            cursor_quad(Rect::new(100.0, 100.0, 132.0, 132.0), 1920, 1080).as_slice()
        );
    }

    #[test]
    fn monochrome_cursor_uploads_resolved_image() {
        let mut device = RecordingDevice::default();
        let pointer = PointerState {
            visible: true,
            x: -5,
            y: 1070,
            shape: ShapeInfo {
                kind: ShapeKind::Monochrome,
                width: 16,
                height: 32,
                pitch: 2,
            },
            buffer: vec![0xFF; 64],
        };
        let outcome = Compositor::new(&mut device, &FRAME, &TARGET)
            .draw_cursor(&pointer)
            .unwrap();

        assert_eq!(
            outcome,
            CursorOutcome::Drawn {
                left: 0,
                top: 1070,
                width: 11,
                height: 10
            }
        );
        assert_eq!(device.reads, [PixelBox::from_origin_size(0, 1070, 11, 10)]);
        let (desc, bytes, pitch) = &device.uploads[0];
        assert_eq!((desc.width, desc.height, *pitch), (11, 10, 44));
        assert_eq!(bytes.len(), 11 * 10 * 4);
    }

    #[test]
    fn hidden_pointer_draws_nothing() {
        let mut device = RecordingDevice::default();
        let mut pointer = color_pointer(0, 0);
        pointer.visible = false;
        let outcome = Compositor::new(&mut device, &FRAME, &TARGET)
            .draw_cursor(&pointer)
            .unwrap();
        assert_eq!(outcome, CursorOutcome::NotVisible);
        assert!(device.uploads.is_empty());
        assert!(device.draws.is_empty());
    }

    #[test]
    fn background_failure_drops_only_the_cursor() {
        let mut device = RecordingDevice {
            fail: Some(Operation::ReadRegion),
            ..RecordingDevice::default()
        };
        let mut pointer = color_pointer(10, 10);
        pointer.shape.kind = ShapeKind::MaskedColor;
        let outcome = Compositor::new(&mut device, &FRAME, &TARGET)
            .draw_cursor(&pointer)
            .unwrap();
        assert!(matches!(
            outcome,
            CursorOutcome::Dropped(ResolveError::Background(_))
        ));
        assert!(device.draws.is_empty());
    }

    #[test]
    fn cursor_texture_failure_is_an_error() {
        let mut device = RecordingDevice {
            fail: Some(Operation::CreateTexture),
            ..RecordingDevice::default()
        };
        let err = Compositor::new(&mut device, &FRAME, &TARGET)
            .draw_cursor(&color_pointer(10, 10))
            .unwrap_err();
        assert_eq!(err.op, Operation::CreateTexture);
        assert!(device.draws.is_empty());
    }
}
