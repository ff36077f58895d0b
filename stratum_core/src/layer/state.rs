// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer flags and the read-only committed-state snapshot.

use alloc::sync::Arc;

use bitflags::bitflags;
use kurbo::Point;

use super::id::LayerId;
use crate::buffer::{FrameNumber, GraphicBuffer, PixelFormat};
use crate::geometry::{IntRect, LayerMatrix};

bitflags! {
    /// Generic per-layer flags, updated with a value/mask pair.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct LayerFlags: u32 {
        /// Suppresses the layer. OR'd with the explicit show/hide toggle.
        const HIDDEN = 0x01;
        /// Ignore per-pixel alpha when blending.
        const OPAQUE = 0x02;
    }
}

impl LayerFlags {
    /// Replaces the bits selected by `mask` with the corresponding bits of
    /// `flags`; bits outside the mask are kept. Unknown bits are dropped.
    #[inline]
    #[must_use]
    pub fn apply_masked(self, flags: u32, mask: u32) -> Self {
        let bits = (self.bits() & !mask) | (flags & mask);
        Self::from_bits_truncate(bits)
    }
}

/// A consistent copy of one layer's committed state.
///
/// Produced by [`LayerStore::state`](super::LayerStore::state) and inside
/// scene snapshots. Holding one never blocks commits; the latched buffer is
/// shared by reference count.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerState {
    /// The layer this state belongs to.
    pub id: LayerId,
    /// Creation order; breaks ties between equal `z` values.
    pub creation_seq: u64,
    /// Z order within the layer stack; higher is in front.
    pub z: i32,
    /// Screen-space offset of the layer origin.
    pub position: Point,
    /// Size requested by the last committed resize.
    pub requested_size: (u32, u32),
    /// Size currently used for composition.
    pub active_size: (u32, u32),
    /// Buffer-space source restriction.
    pub crop: Option<IntRect>,
    /// Screen-space output restriction.
    pub final_crop: Option<IntRect>,
    /// Linear transform applied around the origin before translation.
    pub matrix: LayerMatrix,
    /// Straight opacity in `[0, 1]`.
    pub alpha: f32,
    /// Flags set through the value/mask mechanism.
    pub flags: LayerFlags,
    /// Hidden through the explicit show/hide toggle.
    pub hidden_by_toggle: bool,
    /// Layer stack this layer belongs to.
    pub layer_stack: u32,
    /// Buffer format requested at creation.
    pub format: PixelFormat,
    /// Frame number of the latched buffer (0 before the first latch).
    pub frame_number: FrameNumber,
    /// The latched buffer, if any.
    pub buffer: Option<Arc<GraphicBuffer>>,
}

impl LayerState {
    /// Whether either hide source is set.
    #[inline]
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hidden_by_toggle || self.flags.contains(LayerFlags::HIDDEN)
    }
}
