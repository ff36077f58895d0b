// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer rectangles and the 2×2 layer matrix.
//!
//! Crops live in integer pixel space (buffer space for `crop`, screen space
//! for `final_crop`), so they use [`IntRect`] rather than [`kurbo::Rect`].
//! Continuous geometry (layer position, the full layer-to-screen mapping) is
//! expressed with kurbo types.

use kurbo::{Affine, Point, Rect};

/// A half-open integer rectangle `[left, right) × [top, bottom)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    /// Left edge (inclusive).
    pub left: i32,
    /// Top edge (inclusive).
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
}

impl IntRect {
    /// Creates a rectangle from its four edges.
    #[inline]
    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Creates a rectangle anchored at the origin.
    #[inline]
    #[must_use]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: clamp_to_i32(width),
            bottom: clamp_to_i32(height),
        }
    }

    /// Whether the edges are ordered. Zero-area rectangles are valid.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.right >= self.left && self.bottom >= self.top
    }

    /// Whether the rectangle covers no pixels.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Width in pixels (zero for invalid rectangles).
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        if self.right > self.left {
            self.right.abs_diff(self.left)
        } else {
            0
        }
    }

    /// Height in pixels (zero for invalid rectangles).
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        if self.bottom > self.top {
            self.bottom.abs_diff(self.top)
        } else {
            0
        }
    }

    /// Whether the pixel at `(x, y)` lies inside the rectangle.
    #[inline]
    #[must_use]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Returns the overlap of two rectangles. Disjoint inputs produce an empty
    /// rectangle.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        Self {
            left,
            top,
            right: self.right.min(other.right).max(left),
            bottom: self.bottom.min(other.bottom).max(top),
        }
    }

    /// Converts to a continuous kurbo rectangle.
    #[inline]
    #[must_use]
    pub fn to_kurbo(&self) -> Rect {
        Rect::new(
            f64::from(self.left),
            f64::from(self.top),
            f64::from(self.right),
            f64::from(self.bottom),
        )
    }
}

const fn clamp_to_i32(v: u32) -> i32 {
    if v > i32::MAX as u32 {
        i32::MAX
    } else {
        v as i32
    }
}

/// A 2×2 linear transform applied to a layer around its origin.
///
/// Maps layer-local `(x, y)` to `(dsdx·x + dsdy·y, dtdx·x + dtdy·y)`. The
/// result is then translated by the layer position (see
/// [`to_affine`](Self::to_affine)).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerMatrix {
    /// Screen-x change per unit of local x.
    pub dsdx: f64,
    /// Screen-y change per unit of local x.
    pub dtdx: f64,
    /// Screen-x change per unit of local y.
    pub dsdy: f64,
    /// Screen-y change per unit of local y.
    pub dtdy: f64,
}

impl LayerMatrix {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        dsdx: 1.0,
        dtdx: 0.0,
        dsdy: 0.0,
        dtdy: 1.0,
    };

    /// Creates a matrix from its four coefficients.
    #[inline]
    #[must_use]
    pub const fn new(dsdx: f64, dtdx: f64, dsdy: f64, dtdy: f64) -> Self {
        Self {
            dsdx,
            dtdx,
            dsdy,
            dtdy,
        }
    }

    /// Is every coefficient [finite]?
    ///
    /// [finite]: f64::is_finite
    #[inline]
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.dsdx.is_finite()
            && self.dtdx.is_finite()
            && self.dsdy.is_finite()
            && self.dtdy.is_finite()
    }

    /// Returns the determinant of the linear part.
    #[inline]
    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.dsdx * self.dtdy - self.dsdy * self.dtdx
    }

    /// Returns the full layer-to-screen mapping: this matrix first, then a
    /// translation to `position`.
    #[inline]
    #[must_use]
    pub fn to_affine(&self, position: Point) -> Affine {
        Affine::new([
            self.dsdx, self.dtdx, self.dsdy, self.dtdy, position.x, position.y,
        ])
    }
}

impl Default for LayerMatrix {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}
