// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types, layer registry, and transaction model for scene composition.
//!
//! `stratum_core` owns every piece of state a composition pass reads. It is
//! `no_std` compatible (with `alloc`) and stores layers in struct-of-arrays
//! form behind generational handles, so destroying a layer can never leave a
//! dangling observer behind.
//!
//! # Architecture
//!
//! ```text
//!   Transaction (diffs + optional deferral)
//!       │
//!       ▼
//!   Scene::close() ──► commit ──────────────► LayerStore (committed state)
//!       │                                         ▲
//!       └─► DeferredQueue (target, frame) ──┐     │
//!                                           ▼     │
//!   Scene::latch_buffer() ──► frame number ──► release ──► commit
//!
//!   Scene::snapshot() ──► SceneSnapshot ──► renderer
//! ```
//!
//! **[`layer`]**: Struct-of-arrays layer registry with generational handles.
//! Mutation only happens through whole-transaction commits and buffer latches.
//!
//! **[`transaction`]**: Tagged diff lists with eager argument validation.
//!
//! **[`deferred`]**: Per-target ordered map of transactions waiting for a
//! buffer milestone.
//!
//! **[`scene`]**: The commit domain: applies transactions atomically, latches
//! buffers, resolves deferred work, and hands out consistent snapshots.
//!
//! **[`buffer`]**: CPU pixel buffers and per-layer frame numbers.
//!
//! **[`display`]**: Display identity and the active layer-stack table.
//!
//! **[`geometry`]**: Integer rectangles and the 2×2 layer matrix.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! commit/latch/render instrumentation, with a zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

pub mod buffer;
pub mod deferred;
pub mod display;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod scene;
pub mod trace;
pub mod transaction;

pub use error::{Result, StratumError};
