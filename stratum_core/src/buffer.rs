// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU pixel buffers and per-layer frame numbers.
//!
//! Buffer allocation and transport belong to the producer side; the core only
//! needs something it can sample from and a counter telling how many buffers a
//! layer has latched.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::error::{Result, StratumError};

/// Pixel layout of a buffer. Both formats store four bytes per pixel in
/// R, G, B, A order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Straight (non-premultiplied) alpha in the fourth byte.
    #[default]
    Rgba8888,
    /// Fourth byte is padding; every pixel is treated as opaque.
    Rgbx8888,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Whether per-pixel alpha is ignored.
    #[inline]
    #[must_use]
    pub const fn is_opaque(self) -> bool {
        matches!(self, Self::Rgbx8888)
    }
}

/// A monotonically increasing per-layer counter, bumped on every latch.
///
/// Layers start at frame 0; the first latched buffer is frame 1.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FrameNumber(pub u64);

impl FrameNumber {
    /// The value before any buffer has been latched.
    pub const ZERO: Self = Self(0);

    /// Returns the following frame number.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameNumber({})", self.0)
    }
}

/// A tightly packed RGBA8 pixel buffer (stride equals width).
#[derive(Clone, PartialEq, Eq)]
pub struct GraphicBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl fmt::Debug for GraphicBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl GraphicBuffer {
    /// Allocates a zero-filled buffer.
    ///
    /// Returns [`StratumError::InvalidArgument`] if either dimension is zero.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let len = byte_len(width, height)?;
        Ok(Self {
            width,
            height,
            format,
            pixels: vec![0; len],
        })
    }

    /// Wraps existing pixel storage.
    ///
    /// Returns [`StratumError::InvalidBuffer`] if `pixels` is not exactly
    /// `width * height * 4` bytes long.
    pub fn from_pixels(
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> Result<Self> {
        let len = byte_len(width, height)?;
        if pixels.len() != len {
            return Err(StratumError::InvalidBuffer(
                "pixel storage does not match width * height * 4",
            ));
        }
        Ok(Self {
            width,
            height,
            format,
            pixels,
        })
    }

    /// Width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel format.
    #[inline]
    #[must_use]
    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw RGBA bytes, row-major.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Fills every pixel with one color.
    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(PixelFormat::BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Returns the pixel at `(x, y)`, or `None` outside the buffer.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let i = self.offset(x, y)?;
        let px = self.pixels.get(i..i + PixelFormat::BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Writes the pixel at `(x, y)`. Out-of-range writes are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if let Some(i) = self.offset(x, y) {
            self.pixels[i..i + PixelFormat::BYTES_PER_PIXEL].copy_from_slice(&rgba);
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * PixelFormat::BYTES_PER_PIXEL)
    }
}

fn byte_len(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(StratumError::InvalidArgument(
            "buffer dimensions must be positive",
        ));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(PixelFormat::BYTES_PER_PIXEL))
        .ok_or(StratumError::InvalidBuffer("buffer size overflows usize"))
}
