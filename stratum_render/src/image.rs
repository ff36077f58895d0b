// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composed output image.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

/// A tightly packed RGBA8 image, row-major, top row first.
#[derive(Clone, PartialEq, Eq)]
pub struct RgbaImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl fmt::Debug for RgbaImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgbaImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl RgbaImage {
    /// Creates an image filled with `clear`.
    #[must_use]
    pub fn new(width: u32, height: u32, clear: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = vec![0; pixels * 4];
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&clear);
        }
        Self {
            width,
            height,
            data,
        }
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

    /// Raw RGBA bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the image and returns its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Returns the pixel at `(x, y)`, or `None` outside the image.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let at = self.offset(x, y)?;
        let mut px = [0; 4];
        px.copy_from_slice(&self.data[at..at + 4]);
        Some(px)
    }

    pub(crate) fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u8]> {
        let at = self.offset(x, y)?;
        Some(&mut self.data[at..at + 4])
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| (y as usize * self.width as usize + x as usize) * 4)
    }
}
