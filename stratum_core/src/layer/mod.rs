// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer registry data model.
//!
//! A *layer* is a rectangular, buffer-backed visual element. Each layer has:
//!
//! - An identity ([`LayerId`]): a generational handle that becomes stale when
//!   the layer is destroyed, so a reused slot is never mistaken for the old one.
//! - **Geometry and visual properties**: z order, position, crop, final crop,
//!   matrix, alpha, flags, the show/hide toggle, and layer stack. These change
//!   only when a transaction commits.
//! - **Buffer-bound state**: the latched buffer, its frame number, and the
//!   active size. These change only when a buffer is latched. A committed
//!   resize waits in `requested_size` until a buffer of that size arrives.
//!
//! Layers are stored in struct-of-arrays layout with index-based handles.
//! Readers get [`LayerState`] copies, never references into the arrays.

mod id;
mod state;
mod store;

pub use id::LayerId;
pub use state::{LayerFlags, LayerState};
pub use store::{Latched, LayerStore};
