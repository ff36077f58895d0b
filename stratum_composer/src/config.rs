// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composer configuration.

/// Settings fixed when a [`Composer`](crate::Composer) is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComposerConfig {
    /// Width of the main display in pixels.
    pub display_width: u32,
    /// Height of the main display in pixels.
    pub display_height: u32,
    /// How many queued, unlatched buffers a layer's queue holds before
    /// producers block.
    pub buffer_queue_depth: usize,
    /// Colour every display is cleared to before layers are drawn.
    pub clear_color: [u8; 4],
}

impl ComposerConfig {
    /// Default queue depth: one buffer on screen, one queued, one in flight.
    pub const DEFAULT_QUEUE_DEPTH: usize = 3;

    /// A configuration for a single `width × height` display with default
    /// queue depth and a transparent clear colour.
    #[must_use]
    pub const fn headless(width: u32, height: u32) -> Self {
        Self {
            display_width: width,
            display_height: height,
            buffer_queue_depth: Self::DEFAULT_QUEUE_DEPTH,
            clear_color: [0; 4],
        }
    }

    /// Returns the configuration with a different queue depth.
    #[must_use]
    pub const fn with_queue_depth(mut self, depth: usize) -> Self {
        self.buffer_queue_depth = depth;
        self
    }

    /// Returns the configuration with a different clear colour.
    #[must_use]
    pub const fn with_clear_color(mut self, rgba: [u8; 4]) -> Self {
        self.clear_color = rgba;
        self
    }
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self::headless(1024, 768)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_xga_depth_three_transparent() {
        let cfg = ComposerConfig::default();
        assert_eq!((cfg.display_width, cfg.display_height), (1024, 768));
        assert_eq!(cfg.buffer_queue_depth, 3);
        assert_eq!(cfg.clear_color, [0; 4]);
    }

    #[test]
    fn builders_override_fields() {
        let cfg = ComposerConfig::headless(256, 256)
            .with_queue_depth(1)
            .with_clear_color([1, 2, 3, 4]);
        assert_eq!(cfg.display_width, 256);
        assert_eq!(cfg.buffer_queue_depth, 1);
        assert_eq!(cfg.clear_color, [1, 2, 3, 4]);
    }
}
