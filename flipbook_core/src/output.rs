// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display output identification and desktop geometry.
//!
//! [`OutputId`] is a lightweight handle identifying a specific display.
//! Backends assign these; core treats them as opaque. [`DesktopBounds`] is the
//! rectangle an output occupies in desktop coordinates.

use core::fmt;

/// Identifies a specific display output.
///
/// Backends assign output IDs to distinguish multiple displays. Core code
/// passes them through without interpreting the value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OutputId(pub u32);

impl fmt::Debug for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputId({})", self.0)
    }
}

/// A rectangle in desktop coordinates, half-open on the right and bottom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct DesktopBounds {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Right edge, exclusive.
    pub right: i32,
    /// Bottom edge, exclusive.
    pub bottom: i32,
}

impl DesktopBounds {
    /// Creates bounds from an origin and a size.
    #[must_use]
    pub const fn from_origin_size(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            right: left.saturating_add_unsigned(width),
            bottom: top.saturating_add_unsigned(height),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.right.abs_diff(self.left)
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.bottom.abs_diff(self.top)
    }

    /// Smallest rectangle covering both.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self {
            left: if self.left < other.left { self.left } else { other.left },
            top: if self.top < other.top { self.top } else { other.top },
            right: if self.right > other.right { self.right } else { other.right },
            bottom: if self.bottom > other.bottom { self.bottom } else { other.bottom },
        }
    }

    /// Union of all `outputs`, or `None` if there are none.
    #[must_use]
    pub fn enclosing(outputs: &[Self]) -> Option<Self> {
        outputs.iter().copied().reduce(Self::union)
    }
}

/// A display output taking part in the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutputDesc {
    /// Backend-assigned identifier.
    pub id: OutputId,
    /// Where the output sits on the desktop.
    pub bounds: DesktopBounds,
}

/// What [`Session::init_output`](crate::session::Session::init_output) set up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutputInfo {
    /// Number of outputs covered by the desktop.
    pub output_count: usize,
    /// Union of all output rectangles.
    pub desktop: DesktopBounds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_output_is_its_own_desktop() {
        let main = DesktopBounds::from_origin_size(0, 0, 1920, 1080);
        assert_eq!(DesktopBounds::enclosing(&[main]), Some(main));
        assert_eq!((main.width(), main.height()), (1920, 1080));
    }

    #[test]
    fn desktop_is_union_of_outputs() {
        let left = DesktopBounds::from_origin_size(-1280, 100, 1280, 1024);
        let main = DesktopBounds::from_origin_size(0, 0, 1920, 1080);
        let desktop = DesktopBounds::enclosing(&[main, left]).unwrap();
        assert_eq!(
            desktop,
            DesktopBounds {
                left: -1280,
                top: 0,
                right: 1920,
                bottom: 1124,
            }
        );
        assert_eq!(desktop.width(), 3200);
    }

    #[test]
    fn no_outputs_has_no_desktop() {
        assert_eq!(DesktopBounds::enclosing(&[]), None);
    }
}
