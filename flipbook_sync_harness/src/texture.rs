// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU textures and the quad rasterizer behind [`SoftDevice::draw`].
//!
//! Pixels are `0xAARRGGBB` words, which is the little-endian layout of
//! 32-bit BGRA. Quads are rasterized as axis-aligned rectangles with nearest
//! sampling: a pixel is covered when its center lies inside the quad.
//!
//! [`SoftDevice::draw`]: crate::device::SoftDevice

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flipbook_core::backend::BlendMode;
use flipbook_core::compositor::{QUAD_VERTEX_COUNT, Vertex};

/// A CPU pixel grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl PixelBuffer {
    /// Creates a buffer filled with `fill`.
    #[must_use]
    pub fn new(width: u32, height: u32, fill: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; width as usize * height as usize],
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Tightly packed rows of pixels.
    #[must_use]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// The pixel at `(x, y)`, if in bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        (x < self.width && y < self.height)
            .then(|| self.pixels[y as usize * self.width as usize + x as usize])
    }

    /// Overwrites every pixel with `color`.
    pub fn fill(&mut self, color: u32) {
        self.pixels.fill(color);
    }

    /// Overwrites the pixels of `rect` (clipped to the buffer).
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: u32) {
        let x1 = x.saturating_add(width).min(self.width);
        let y1 = y.saturating_add(height).min(self.height);
        for row in y.min(y1)..y1 {
            let start = row as usize * self.width as usize;
            self.pixels[start + x.min(x1) as usize..start + x1 as usize].fill(color);
        }
    }

    /// Decodes `height` rows of little-endian BGRA from `bytes`, `row_pitch`
    /// bytes apart. Returns `None` if `bytes` is too short.
    #[must_use]
    pub fn from_bgra(width: u32, height: u32, bytes: &[u8], row_pitch: u32) -> Option<Self> {
        let row_bytes = width as usize * 4;
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for row in 0..height as usize {
            let start = row * row_pitch as usize;
            let line = bytes.get(start..start + row_bytes)?;
            pixels.extend(
                line.chunks_exact(4)
                    .map(|px| u32::from_le(bytemuck::pod_read_unaligned(px))),
            );
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }
}

/// A texture shared between the device, the display and the producer.
///
/// Clones alias the same pixels.
#[derive(Clone, Debug)]
pub struct SoftTexture {
    id: u32,
    width: u32,
    height: u32,
    pixels: Arc<Mutex<PixelBuffer>>,
}

impl SoftTexture {
    pub(crate) fn new(id: u32, buffer: PixelBuffer) -> Self {
        Self {
            id,
            width: buffer.width,
            height: buffer.height,
            pixels: Arc::new(Mutex::new(buffer)),
        }
    }

    /// Backend-assigned identifier.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// `(width, height)` in pixels.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Locks the pixels.
    pub fn lock(&self) -> MutexGuard<'_, PixelBuffer> {
        self.pixels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies the current pixels.
    #[must_use]
    pub fn snapshot(&self) -> PixelBuffer {
        self.lock().clone()
    }

    /// Whether both handles alias the same pixels.
    #[must_use]
    pub fn same_texture(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

// ---------------------------------------------------------------------------
// Rasterizer
// ---------------------------------------------------------------------------

/// Draws every quad in `vertices` from `source` onto `target`.
///
/// `source` and `target` must not be the same texture.
pub(crate) fn draw_quads(
    target: &mut PixelBuffer,
    source: &PixelBuffer,
    vertices: &[Vertex],
    blend: BlendMode,
) {
    for quad in vertices.chunks_exact(QUAD_VERTEX_COUNT as usize) {
        draw_quad(target, source, quad, blend);
    }
}

struct Span {
    start: f32,
    end: f32,
    tex_start: f32,
    tex_end: f32,
}

impl Span {
    /// Pixels whose centers fall in `[start, end)`, clamped to `0..limit`.
    fn pixels(&self, limit: u32) -> std::ops::Range<u32> {
        let first = (self.start - 0.5).ceil().max(0.0);
        let last = (self.end - 0.5).ceil().max(0.0);
        to_pixel(first).min(limit)..to_pixel(last).min(limit)
    }

    /// Texel along this axis for pixel `p` of a source `size` texels long.
    fn texel(&self, p: u32, size: u32) -> u32 {
        let center = p as f32 + 0.5;
        let t = (center - self.start) / (self.end - self.start);
        let tex = self.tex_start + t * (self.tex_end - self.tex_start);
        let texel = (tex * size as f32).floor();
        to_pixel(texel).min(size.saturating_sub(1))
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "value is clamped to be non-negative and bounded by texture size"
)]
fn to_pixel(v: f32) -> u32 {
    v.max(0.0) as u32
}

fn axis(quad: &[Vertex], extent: u32, coord: impl Fn(&Vertex) -> (f32, f32)) -> Option<Span> {
    let extent = extent as f32;
    let mut lo: Option<(f32, f32)> = None;
    let mut hi: Option<(f32, f32)> = None;
    for vertex in quad {
        let (pos, tex) = coord(vertex);
        let pos = pos * extent;
        if lo.is_none_or(|(p, _)| pos < p) {
            lo = Some((pos, tex));
        }
        if hi.is_none_or(|(p, _)| pos > p) {
            hi = Some((pos, tex));
        }
    }
    let ((start, tex_start), (end, tex_end)) = (lo?, hi?);
    (end > start).then_some(Span {
        start,
        end,
        tex_start,
        tex_end,
    })
}

fn draw_quad(target: &mut PixelBuffer, source: &PixelBuffer, quad: &[Vertex], blend: BlendMode) {
    if source.width == 0 || source.height == 0 {
        return;
    }
    // Clip space to normalized target coordinates, y pointing down.
    let Some(xs) = axis(quad, target.width, |v| ((v.position[0] + 1.0) / 2.0, v.uv[0])) else {
        return;
    };
    let Some(ys) = axis(quad, target.height, |v| ((1.0 - v.position[1]) / 2.0, v.uv[1])) else {
        return;
    };

    for y in ys.pixels(target.height) {
        let sy = ys.texel(y, source.height);
        for x in xs.pixels(target.width) {
            let sx = xs.texel(x, source.width);
            let src = source.pixels[sy as usize * source.width as usize + sx as usize];
            let dst = &mut target.pixels[y as usize * target.width as usize + x as usize];
            *dst = match blend {
                BlendMode::Opaque => src,
                BlendMode::StraightAlpha => blend_straight(src, *dst),
            };
        }
    }
}

/// `src * a + dst * (1 - a)` per color channel; alpha is taken from `src`.
fn blend_straight(src: u32, dst: u32) -> u32 {
    let a = src >> 24;
    if a == 0xFF {
        return src;
    }
    if a == 0 {
        return dst & 0x00FF_FFFF;
    }
    let mix = |shift: u32| {
        let s = (src >> shift) & 0xFF;
        let d = (dst >> shift) & 0xFF;
        ((s * a + d * (0xFF - a) + 0x7F) / 0xFF) << shift
    };
    (a << 24) | mix(16) | mix(8) | mix(0)
}
