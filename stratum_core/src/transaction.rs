// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Atomic batches of property changes.
//!
//! A [`Transaction`] is an ordered list of tagged diffs, one variant per
//! settable property. Setters validate their argument before anything is
//! queued, so a transaction never holds an out-of-domain value. Nothing in a
//! transaction touches committed state until the whole list is applied by
//! [`Scene::close`](crate::scene::Scene::close); later diffs to the same
//! property overwrite earlier ones.

use alloc::vec::Vec;
use core::fmt;

use kurbo::Point;

use crate::buffer::FrameNumber;
use crate::display::DisplayId;
use crate::error::{Result, StratumError};
use crate::geometry::{IntRect, LayerMatrix};
use crate::layer::LayerId;

/// Identifies a transaction from open to resolution.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TransactionId(pub u64);

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0)
    }
}

/// One property change for one layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LayerDiff {
    /// Moves the layer origin.
    Position(Point),
    /// Requests a new buffer size; takes effect at the next matching latch.
    Size {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// Sets straight opacity.
    Alpha(f32),
    /// Sets or clears the buffer-space crop.
    Crop(Option<IntRect>),
    /// Sets or clears the screen-space final crop.
    FinalCrop(Option<IntRect>),
    /// Sets the 2×2 transform.
    Matrix(LayerMatrix),
    /// Sets the z order.
    Z(i32),
    /// Moves the layer to another layer stack.
    LayerStack(u32),
    /// Updates the bits of the flag word selected by `mask`.
    Flags {
        /// New bit values.
        flags: u32,
        /// Which bits to replace.
        mask: u32,
    },
    /// Clears the explicit hide toggle.
    Show,
    /// Sets the explicit hide toggle.
    Hide,
}

/// One property change for one display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayDiff {
    /// Selects which layer stack the display composes.
    LayerStack(u32),
}

/// A tagged diff addressed to a layer or a display.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Diff {
    /// Layer property change.
    Layer(LayerId, LayerDiff),
    /// Display property change.
    Display(DisplayId, DisplayDiff),
}

/// Holds a transaction back until `target` has latched `frame`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deferral {
    /// Layer whose buffer counter gates the transaction.
    pub target: LayerId,
    /// Frame number the target must reach.
    pub frame: FrameNumber,
}

/// An atomic set of diffs with an optional deferral.
#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    id: TransactionId,
    diffs: Vec<Diff>,
    deferral: Option<Deferral>,
}

impl Transaction {
    /// Creates an empty, non-deferred transaction.
    #[must_use]
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            diffs: Vec::new(),
            deferral: None,
        }
    }

    /// The transaction id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> TransactionId {
        self.id
    }

    /// Diffs in the order they were issued.
    #[inline]
    #[must_use]
    pub fn diffs(&self) -> &[Diff] {
        &self.diffs
    }

    /// The deferral, if the transaction is gated on a buffer milestone.
    #[inline]
    #[must_use]
    pub const fn deferral(&self) -> Option<Deferral> {
        self.deferral
    }

    /// Whether no diffs have been issued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    /// Returns the layers referenced by any diff (may repeat).
    pub fn layers(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.diffs.iter().filter_map(|d| match d {
            Diff::Layer(id, _) => Some(*id),
            Diff::Display(..) => None,
        })
    }

    /// Returns the displays referenced by any diff (may repeat).
    pub fn displays(&self) -> impl Iterator<Item = DisplayId> + '_ {
        self.diffs.iter().filter_map(|d| match d {
            Diff::Display(id, _) => Some(*id),
            Diff::Layer(..) => None,
        })
    }

    // -- Layer setters --

    /// Moves the layer origin to `(x, y)`.
    pub fn set_position(&mut self, layer: LayerId, x: f64, y: f64) -> Result<&mut Self> {
        if !x.is_finite() || !y.is_finite() {
            return Err(StratumError::InvalidArgument("position must be finite"));
        }
        Ok(self.push_layer(layer, LayerDiff::Position(Point::new(x, y))))
    }

    /// Requests a new buffer size.
    pub fn set_size(&mut self, layer: LayerId, width: u32, height: u32) -> Result<&mut Self> {
        if width == 0 || height == 0 {
            return Err(StratumError::InvalidArgument(
                "size dimensions must be positive",
            ));
        }
        Ok(self.push_layer(layer, LayerDiff::Size { width, height }))
    }

    /// Sets straight opacity; `alpha` must lie in `[0, 1]`.
    pub fn set_alpha(&mut self, layer: LayerId, alpha: f32) -> Result<&mut Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(StratumError::InvalidArgument("alpha must lie in [0, 1]"));
        }
        Ok(self.push_layer(layer, LayerDiff::Alpha(alpha)))
    }

    /// Sets (`Some`) or clears (`None`) the buffer-space crop.
    pub fn set_crop(&mut self, layer: LayerId, crop: Option<IntRect>) -> Result<&mut Self> {
        check_rect(crop, "crop must not have negative extent")?;
        Ok(self.push_layer(layer, LayerDiff::Crop(crop)))
    }

    /// Sets (`Some`) or clears (`None`) the screen-space final crop.
    pub fn set_final_crop(&mut self, layer: LayerId, crop: Option<IntRect>) -> Result<&mut Self> {
        check_rect(crop, "final crop must not have negative extent")?;
        Ok(self.push_layer(layer, LayerDiff::FinalCrop(crop)))
    }

    /// Sets the 2×2 transform.
    pub fn set_matrix(&mut self, layer: LayerId, matrix: LayerMatrix) -> Result<&mut Self> {
        if !matrix.is_finite() {
            return Err(StratumError::InvalidArgument("matrix must be finite"));
        }
        Ok(self.push_layer(layer, LayerDiff::Matrix(matrix)))
    }

    /// Sets the z order.
    pub fn set_layer_z(&mut self, layer: LayerId, z: i32) -> Result<&mut Self> {
        Ok(self.push_layer(layer, LayerDiff::Z(z)))
    }

    /// Moves the layer to another layer stack.
    pub fn set_layer_stack(&mut self, layer: LayerId, layer_stack: u32) -> Result<&mut Self> {
        Ok(self.push_layer(layer, LayerDiff::LayerStack(layer_stack)))
    }

    /// Replaces the flag bits selected by `mask`.
    pub fn set_flags(&mut self, layer: LayerId, flags: u32, mask: u32) -> Result<&mut Self> {
        Ok(self.push_layer(layer, LayerDiff::Flags { flags, mask }))
    }

    /// Clears the explicit hide toggle.
    pub fn show(&mut self, layer: LayerId) -> Result<&mut Self> {
        Ok(self.push_layer(layer, LayerDiff::Show))
    }

    /// Sets the explicit hide toggle.
    pub fn hide(&mut self, layer: LayerId) -> Result<&mut Self> {
        Ok(self.push_layer(layer, LayerDiff::Hide))
    }

    // -- Display setters --

    /// Selects which layer stack `display` composes.
    pub fn set_display_layer_stack(
        &mut self,
        display: DisplayId,
        layer_stack: u32,
    ) -> Result<&mut Self> {
        self.diffs
            .push(Diff::Display(display, DisplayDiff::LayerStack(layer_stack)));
        Ok(self)
    }

    // -- Deferral --

    /// Holds the whole transaction until `target` latches `frame`. Replaces
    /// any earlier deferral.
    pub fn defer_until(&mut self, target: LayerId, frame: FrameNumber) -> &mut Self {
        self.deferral = Some(Deferral { target, frame });
        self
    }

    fn push_layer(&mut self, layer: LayerId, diff: LayerDiff) -> &mut Self {
        self.diffs.push(Diff::Layer(layer, diff));
        self
    }
}

fn check_rect(rect: Option<IntRect>, msg: &'static str) -> Result<()> {
    match rect {
        Some(r) if !r.is_valid() => Err(StratumError::InvalidArgument(msg)),
        _ => Ok(()),
    }
}
