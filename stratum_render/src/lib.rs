// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render plans and CPU composition for stratum.
//!
//! This crate turns a [`SceneSnapshot`](stratum_core::scene::SceneSnapshot)
//! into pixels in two steps:
//!
//! - [`RenderPlan::build`] filters layers by layer stack, visibility, and
//!   content, orders them back to front, and resolves crop, final crop,
//!   matrix, and position into one [`RenderItem`] per drawable layer.
//! - [`compose`] rasterizes a plan into an [`RgbaImage`] with nearest
//!   sampling at pixel centres and straight-alpha source-over blending.
//!
//! Planning never fails as a whole: a layer whose transform cannot be
//! inverted is reported in [`RenderPlan::skipped`] and the rest still draw.

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

mod image;
mod plan;
mod raster;

pub use image::RgbaImage;
pub use plan::{RenderItem, RenderPlan, SkipReason, SkippedLayer};
pub use raster::{blend_pixel, compose};
