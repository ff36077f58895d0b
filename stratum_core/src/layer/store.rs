// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays layer storage with allocation and committed-state access.

use alloc::sync::Arc;
use alloc::vec::Vec;

use kurbo::Point;

use super::id::LayerId;
use super::state::{LayerFlags, LayerState};
use crate::buffer::{FrameNumber, GraphicBuffer, PixelFormat};
use crate::error::{Result, StratumError};
use crate::geometry::{IntRect, LayerMatrix};
use crate::transaction::LayerDiff;

/// What a single latch did to a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Latched {
    /// The layer's frame number after the latch.
    pub frame_number: FrameNumber,
    /// The new active size, if the buffer matched a pending resize.
    pub resized_to: Option<(u32, u32)>,
}

/// Struct-of-arrays storage for all layers.
///
/// Layers are addressed by [`LayerId`] handles. Internally, each layer occupies
/// a slot in parallel arrays. Destroyed layers are recycled via a free list,
/// and generation counters prevent stale handle access.
///
/// There are no per-property setters: properties change only through
/// whole-transaction commits and buffer latches driven by
/// [`Scene`](crate::scene::Scene).
#[derive(Debug)]
pub struct LayerStore {
    // -- Committed geometry and visual properties --
    pub(crate) z: Vec<i32>,
    pub(crate) position: Vec<Point>,
    pub(crate) crop: Vec<Option<IntRect>>,
    pub(crate) final_crop: Vec<Option<IntRect>>,
    pub(crate) matrix: Vec<LayerMatrix>,
    pub(crate) alpha: Vec<f32>,
    pub(crate) flags: Vec<LayerFlags>,
    pub(crate) hidden_by_toggle: Vec<bool>,
    pub(crate) layer_stack: Vec<u32>,

    // -- Buffer-bound state --
    pub(crate) requested_size: Vec<(u32, u32)>,
    pub(crate) active_size: Vec<(u32, u32)>,
    pub(crate) format: Vec<PixelFormat>,
    pub(crate) buffer: Vec<Option<Arc<GraphicBuffer>>>,
    pub(crate) frame_number: Vec<FrameNumber>,

    // -- Allocation --
    pub(crate) creation_seq: Vec<u64>,
    pub(crate) generation: Vec<u32>,
    pub(crate) alive: Vec<bool>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,
    next_seq: u64,
}

impl Default for LayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStore {
    /// Creates an empty layer store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            z: Vec::new(),
            position: Vec::new(),
            crop: Vec::new(),
            final_crop: Vec::new(),
            matrix: Vec::new(),
            alpha: Vec::new(),
            flags: Vec::new(),
            hidden_by_toggle: Vec::new(),
            layer_stack: Vec::new(),
            requested_size: Vec::new(),
            active_size: Vec::new(),
            format: Vec::new(),
            buffer: Vec::new(),
            frame_number: Vec::new(),
            creation_seq: Vec::new(),
            generation: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            next_seq: 0,
        }
    }

    // -- Allocation API --

    /// Creates a new layer and returns its handle.
    ///
    /// The layer starts at z 0 on layer stack 0, at the origin, uncropped,
    /// untransformed, fully opaque, visible, and with no latched buffer.
    /// Both the requested and the active size are `width × height`.
    pub fn create_layer(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<LayerId> {
        if width == 0 || height == 0 {
            return Err(StratumError::InvalidArgument(
                "layer dimensions must be positive",
            ));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let size = (width, height);

        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            let i = idx as usize;
            self.generation[i] += 1;
            self.z[i] = 0;
            self.position[i] = Point::ORIGIN;
            self.crop[i] = None;
            self.final_crop[i] = None;
            self.matrix[i] = LayerMatrix::IDENTITY;
            self.alpha[i] = 1.0;
            self.flags[i] = LayerFlags::empty();
            self.hidden_by_toggle[i] = false;
            self.layer_stack[i] = 0;
            self.requested_size[i] = size;
            self.active_size[i] = size;
            self.format[i] = format;
            self.buffer[i] = None;
            self.frame_number[i] = FrameNumber::ZERO;
            self.creation_seq[i] = seq;
            self.alive[i] = true;
            idx
        } else {
            // Allocate a new slot.
            let idx = self.len;
            self.len += 1;
            self.z.push(0);
            self.position.push(Point::ORIGIN);
            self.crop.push(None);
            self.final_crop.push(None);
            self.matrix.push(LayerMatrix::IDENTITY);
            self.alpha.push(1.0);
            self.flags.push(LayerFlags::empty());
            self.hidden_by_toggle.push(false);
            self.layer_stack.push(0);
            self.requested_size.push(size);
            self.active_size.push(size);
            self.format.push(format);
            self.buffer.push(None);
            self.frame_number.push(FrameNumber::ZERO);
            self.creation_seq.push(seq);
            self.generation.push(0);
            self.alive.push(true);
            idx
        };

        Ok(LayerId {
            idx,
            generation: self.generation[idx as usize],
        })
    }

    /// Destroys a layer, freeing its slot for reuse and dropping its latched
    /// buffer.
    pub fn destroy_layer(&mut self, id: LayerId) -> Result<()> {
        let i = self.slot(id)?;
        // Bump generation so old handles immediately fail validation.
        self.generation[i] += 1;
        self.alive[i] = false;
        self.buffer[i] = None;
        self.free_list.push(id.idx);
        Ok(())
    }

    /// Returns whether the given handle refers to a live layer.
    #[must_use]
    pub fn is_alive(&self, id: LayerId) -> bool {
        self.slot(id).is_ok()
    }

    /// Returns the number of live layers.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    /// Returns handles of all live layers in slot order.
    pub fn ids(&self) -> impl Iterator<Item = LayerId> + '_ {
        (0..self.len).filter_map(|idx| {
            self.alive[idx as usize].then(|| LayerId {
                idx,
                generation: self.generation[idx as usize],
            })
        })
    }

    // -- Read API --

    /// Returns a copy of the layer's committed state.
    pub fn state(&self, id: LayerId) -> Result<LayerState> {
        let i = self.slot(id)?;
        Ok(self.state_at(id, i))
    }

    /// Returns the frame number of the layer's latched buffer.
    pub fn frame_number(&self, id: LayerId) -> Result<FrameNumber> {
        Ok(self.frame_number[self.slot(id)?])
    }

    /// Returns the size requested by the last committed resize.
    pub fn requested_size(&self, id: LayerId) -> Result<(u32, u32)> {
        Ok(self.requested_size[self.slot(id)?])
    }

    /// Returns copies of every live layer's committed state, in slot order.
    #[must_use]
    pub fn states(&self) -> Vec<LayerState> {
        self.ids()
            .map(|id| self.state_at(id, id.idx as usize))
            .collect()
    }

    // -- Commit API (crate-internal; driven by Scene) --

    /// Applies one already-validated diff to slot `i`.
    pub(crate) fn apply_diff(&mut self, i: usize, diff: &LayerDiff) {
        match *diff {
            LayerDiff::Position(p) => self.position[i] = p,
            LayerDiff::Size { width, height } => self.requested_size[i] = (width, height),
            LayerDiff::Alpha(a) => self.alpha[i] = a,
            LayerDiff::Crop(c) => self.crop[i] = c,
            LayerDiff::FinalCrop(c) => self.final_crop[i] = c,
            LayerDiff::Matrix(m) => self.matrix[i] = m,
            LayerDiff::Z(z) => self.z[i] = z,
            LayerDiff::LayerStack(s) => self.layer_stack[i] = s,
            LayerDiff::Flags { flags, mask } => {
                self.flags[i] = self.flags[i].apply_masked(flags, mask);
            }
            LayerDiff::Show => self.hidden_by_toggle[i] = false,
            LayerDiff::Hide => self.hidden_by_toggle[i] = true,
        }
    }

    /// Latches `buffer` as the layer's content and advances its frame number.
    ///
    /// A buffer matching the requested size promotes it to the active size.
    /// Any other buffer is still latched but composed within the old active
    /// size.
    pub(crate) fn latch(&mut self, id: LayerId, buffer: Arc<GraphicBuffer>) -> Result<Latched> {
        let i = self.slot(id)?;
        let size = buffer.size();
        let resized_to = (size == self.requested_size[i] && size != self.active_size[i])
            .then_some(size);
        if size == self.requested_size[i] {
            self.active_size[i] = size;
        }
        self.buffer[i] = Some(buffer);
        self.frame_number[i] = self.frame_number[i].next();
        Ok(Latched {
            frame_number: self.frame_number[i],
            resized_to,
        })
    }

    // -- Internal helpers --

    /// Resolves a handle to its slot, or reports it as unknown.
    pub(crate) fn slot(&self, id: LayerId) -> Result<usize> {
        let i = id.idx as usize;
        if id.idx < self.len && self.alive[i] && self.generation[i] == id.generation {
            Ok(i)
        } else {
            Err(StratumError::UnknownHandle(id))
        }
    }

    fn state_at(&self, id: LayerId, i: usize) -> LayerState {
        LayerState {
            id,
            creation_seq: self.creation_seq[i],
            z: self.z[i],
            position: self.position[i],
            requested_size: self.requested_size[i],
            active_size: self.active_size[i],
            crop: self.crop[i],
            final_crop: self.final_crop[i],
            matrix: self.matrix[i],
            alpha: self.alpha[i],
            flags: self.flags[i],
            hidden_by_toggle: self.hidden_by_toggle[i],
            layer_stack: self.layer_stack[i],
            format: self.format[i],
            frame_number: self.frame_number[i],
            buffer: self.buffer[i].clone(),
        }
    }
}
