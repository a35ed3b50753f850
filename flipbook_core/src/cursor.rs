// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cursor shape resolution.
//!
//! Pointer shapes arrive in one of three encodings ([`ShapeKind`]). Color
//! shapes are straight-alpha BGRA and are drawn as-is. Monochrome and
//! masked-color shapes combine with the desktop pixels underneath, so they
//! are resolved on the CPU against a copy of the background into a plain
//! BGRA image before drawing.
//!
//! Pixels are `u32` values laid out as `0xAARRGGBB`, i.e. BGRA bytes in
//! little-endian order.
//!
//! Only the part of a mask-based cursor that lies on the desktop is resolved.
//! [`clip`] computes that part and how many leading shape columns and rows it
//! skips.

use alloc::vec::Vec;

use crate::backend::{MappedImage, PixelBox};
use crate::error::{DeviceError, ResolveError};

/// Encoding of a pointer shape buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// 32-bit straight-alpha BGRA.
    Color,
    /// 1 bit per pixel; an AND mask stacked on top of an XOR mask, each half
    /// of the stated height.
    Monochrome,
    /// 32-bit BGR with the top byte as a per-pixel XOR/replace mask.
    MaskedColor,
}

/// Geometry of a pointer shape buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShapeInfo {
    /// Encoding.
    pub kind: ShapeKind,
    /// Width in pixels.
    pub width: u32,
    /// Height of the buffer in rows. For [`ShapeKind::Monochrome`] this
    /// covers both masks and is twice the visible height.
    pub height: u32,
    /// Distance between rows in bytes.
    pub pitch: u32,
}

impl ShapeInfo {
    /// Visible height of the cursor in pixels.
    #[must_use]
    pub const fn logical_height(&self) -> u32 {
        match self.kind {
            ShapeKind::Monochrome => self.height / 2,
            ShapeKind::Color | ShapeKind::MaskedColor => self.height,
        }
    }

    /// Bytes the buffer must hold for its stated geometry.
    #[must_use]
    pub fn required_bytes(&self) -> usize {
        (self.pitch as usize).saturating_mul(self.height as usize)
    }

    /// Smallest pitch that can hold one row of `width` pixels.
    const fn min_pitch(&self) -> u32 {
        match self.kind {
            ShapeKind::Monochrome => self.width.div_ceil(8),
            ShapeKind::Color | ShapeKind::MaskedColor => self.width.saturating_mul(4),
        }
    }
}

/// A snapshot of the pointer, captured elsewhere.
///
/// The snapshot is only read; resolution never mutates it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointerState {
    /// Whether the cursor should be drawn.
    pub visible: bool,
    /// Left edge of the shape in desktop coordinates. May be negative.
    pub x: i32,
    /// Top edge of the shape in desktop coordinates. May be negative.
    pub y: i32,
    /// Shape geometry.
    pub shape: ShapeInfo,
    /// Shape bytes, `shape.pitch` per row.
    pub buffer: Vec<u8>,
}

/// The on-desktop part of a cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CursorRegion {
    /// Left edge in desktop coordinates.
    pub left: i32,
    /// Top edge in desktop coordinates.
    pub top: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Shape columns cut off on the left.
    pub skip_x: u32,
    /// Shape rows cut off on the top.
    pub skip_y: u32,
}

impl CursorRegion {
    /// Whether nothing of the cursor is visible.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The desktop pixels under this region.
    ///
    /// Only meaningful for clipped regions, whose origin is never negative.
    #[must_use]
    pub const fn background_box(&self) -> PixelBox {
        PixelBox::from_origin_size(
            self.left.unsigned_abs(),
            self.top.unsigned_abs(),
            self.width,
            self.height,
        )
    }
}

/// Clips a `width` × `height` cursor at (`x`, `y`) to a desktop of the given
/// size.
///
/// An edge overflowing on the negative side is cut and counted in `skip_x` /
/// `skip_y`; an edge overflowing on the positive side is cut. A cursor larger
/// than the desktop overflowing both sides is clamped to the desktop extent.
#[must_use]
pub fn clip(
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    desktop_width: u32,
    desktop_height: u32,
) -> CursorRegion {
    let (left, width, skip_x) = clip_axis(x, width, desktop_width);
    let (top, height, skip_y) = clip_axis(y, height, desktop_height);
    CursorRegion {
        left,
        top,
        width,
        height,
        skip_x,
        skip_y,
    }
}

/// Returns `(origin, visible extent, skipped leading pixels)` for one axis.
fn clip_axis(position: i32, extent: u32, desktop: u32) -> (i32, u32, u32) {
    let start = i64::from(position);
    let end = start + i64::from(extent);
    let desktop = i64::from(desktop);

    let visible = if start < 0 {
        end.min(desktop)
    } else if end > desktop {
        desktop - start
    } else {
        i64::from(extent)
    };
    let visible = u32::try_from(visible.max(0)).unwrap_or(0);
    let skip = if position < 0 {
        position.unsigned_abs()
    } else {
        0
    };
    (position.max(0), visible, skip)
}

/// A mask-based cursor resolved against its background.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedCursorImage {
    /// Tightly packed `0xAARRGGBB` pixels, `width` per row.
    pub pixels: Vec<u32>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Left edge in desktop coordinates, never negative.
    pub left: i32,
    /// Top edge in desktop coordinates, never negative.
    pub top: i32,
}

impl ResolvedCursorImage {
    /// Row pitch of the packed pixels in bytes.
    #[must_use]
    pub const fn pitch(&self) -> u32 {
        self.width * 4
    }
}

/// What to draw for a pointer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Upload the shape buffer as-is at this region, using the shape's pitch.
    PassThrough(CursorRegion),
    /// Upload the resolved image.
    Resolved(ResolvedCursorImage),
    /// Nothing of the cursor lies on the desktop.
    Hidden,
}

/// Decides how to draw `pointer` on a desktop of the given size.
///
/// `read_background` is called at most once, with the clipped desktop region
/// under a mask-based cursor.
pub fn resolve<F>(
    pointer: &PointerState,
    desktop_width: u32,
    desktop_height: u32,
    read_background: F,
) -> Result<Resolution, ResolveError>
where
    F: FnOnce(PixelBox) -> Result<MappedImage, DeviceError>,
{
    let shape = &pointer.shape;
    check_shape(shape, &pointer.buffer)?;

    if shape.kind == ShapeKind::Color {
        if shape.width == 0 || shape.height == 0 {
            return Ok(Resolution::Hidden);
        }
        return Ok(Resolution::PassThrough(CursorRegion {
            left: pointer.x,
            top: pointer.y,
            width: shape.width,
            height: shape.height,
            skip_x: 0,
            skip_y: 0,
        }));
    }

    let region = clip(
        pointer.x,
        pointer.y,
        shape.width,
        shape.logical_height(),
        desktop_width,
        desktop_height,
    );
    if region.is_empty() {
        return Ok(Resolution::Hidden);
    }

    let background = read_background(region.background_box()).map_err(ResolveError::Background)?;
    check_background(&background, &region)?;

    let pixels = match shape.kind {
        ShapeKind::Monochrome => resolve_monochrome(shape, &pointer.buffer, &region, &background)?,
        ShapeKind::MaskedColor => {
            resolve_masked_color(shape, &pointer.buffer, &region, &background)?
        }
        ShapeKind::Color => return Ok(Resolution::Hidden),
    };

    Ok(Resolution::Resolved(ResolvedCursorImage {
        pixels,
        width: region.width,
        height: region.height,
        left: region.left,
        top: region.top,
    }))
}

fn check_shape(shape: &ShapeInfo, buffer: &[u8]) -> Result<(), ResolveError> {
    let required = shape.required_bytes();
    if buffer.len() < required || shape.pitch < shape.min_pitch() {
        return Err(ResolveError::MalformedShape {
            required: required.max(shape.min_pitch() as usize * shape.height as usize),
            actual: buffer.len(),
        });
    }
    Ok(())
}

fn check_background(background: &MappedImage, region: &CursorRegion) -> Result<(), ResolveError> {
    let last_row = (region.height as usize - 1) * background.pitch as usize;
    if background.width < region.width
        || background.height < region.height
        || background.pitch < region.width
        || background.pixels.len() < last_row + region.width as usize
    {
        return Err(ResolveError::BackgroundTooSmall);
    }
    Ok(())
}

fn alloc_pixels(region: &CursorRegion) -> Result<Vec<u32>, ResolveError> {
    let count = region.width as usize * region.height as usize;
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(count)
        .map_err(|_| ResolveError::OutOfMemory {
            bytes: count.saturating_mul(4),
        })?;
    Ok(pixels)
}

/// Resolves a monochrome shape.
///
/// For each pixel the AND bit selects whether the background color survives
/// and the XOR bit inverts it: `(bg & and32) ^ xor32` with
/// `and32 = 0xFFFFFFFF | 0xFF000000` and `xor32 = 0x00FFFFFF | 0`.
fn resolve_monochrome(
    shape: &ShapeInfo,
    buffer: &[u8],
    region: &CursorRegion,
    background: &MappedImage,
) -> Result<Vec<u32>, ResolveError> {
    let mut out = alloc_pixels(region)?;
    let pitch = shape.pitch as usize;
    let xor_offset = (shape.height / 2) as usize * pitch;
    let bg_pitch = background.pitch as usize;

    for row in 0..region.height as usize {
        let shape_row = (row + region.skip_y as usize) * pitch;
        for col in 0..region.width as usize {
            let shape_col = col + region.skip_x as usize;
            let bit = 0x80_u8 >> (shape_col % 8);
            let byte = shape_row + shape_col / 8;

            let and_set = buffer[byte] & bit != 0;
            let xor_set = buffer[byte + xor_offset] & bit != 0;
            let and32 = if and_set { 0xFFFF_FFFF } else { 0xFF00_0000 };
            let xor32 = if xor_set { 0x00FF_FFFF } else { 0 };

            let bg = background.pixels[row * bg_pitch + col];
            out.push((bg & and32) ^ xor32);
        }
    }
    Ok(out)
}

/// Resolves a masked-color shape.
///
/// A pixel whose top byte is set is XORed with the background; otherwise its
/// color replaces the background. The result is always opaque.
fn resolve_masked_color(
    shape: &ShapeInfo,
    buffer: &[u8],
    region: &CursorRegion,
    background: &MappedImage,
) -> Result<Vec<u32>, ResolveError> {
    let mut out = alloc_pixels(region)?;
    let pitch_px = (shape.pitch / 4) as usize;
    let bg_pitch = background.pitch as usize;

    for row in 0..region.height as usize {
        let shape_row = (row + region.skip_y as usize) * pitch_px;
        for col in 0..region.width as usize {
            let shape_px = read_pixel(buffer, (shape_row + col + region.skip_x as usize) * 4);
            let bg = background.pixels[row * bg_pitch + col];
            let resolved = if shape_px & 0xFF00_0000 != 0 {
                (bg ^ shape_px) | 0xFF00_0000
            } else {
                shape_px | 0xFF00_0000
            };
            out.push(resolved);
        }
    }
    Ok(out)
}

#[inline]
fn read_pixel(bytes: &[u8], offset: usize) -> u32 {
    match bytes.get(offset..offset + 4) {
        Some(&[b, g, r, a]) => u32::from_le_bytes([b, g, r, a]),
        _ => 0,
    }
}
