// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the commit/latch/compose cycle.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! scene calls as transactions commit, defer, and resolve, as buffers latch,
//! and as render passes finish. All method bodies default to no-ops, so
//! implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

use crate::buffer::FrameNumber;
use crate::display::DisplayId;
use crate::layer::LayerId;
use crate::transaction::TransactionId;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a deferred transaction left the pending set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResolveKind {
    /// Its target reached the threshold and the diffs were committed.
    Applied,
    /// Its target was destroyed first.
    Cancelled,
    /// It was released but referenced a handle that no longer exists.
    Rejected,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a transaction's diffs are applied to committed state.
#[derive(Clone, Copy, Debug)]
pub struct CommitEvent {
    /// Which transaction committed.
    pub transaction: TransactionId,
    /// Number of diffs applied.
    pub diffs: usize,
    /// Number of distinct layers the diffs touched.
    pub layers: usize,
    /// Whether the commit was triggered by a deferred release.
    pub from_deferral: bool,
}

/// Emitted when a transaction is parked behind a buffer milestone.
#[derive(Clone, Copy, Debug)]
pub struct DeferEvent {
    /// Which transaction was parked.
    pub transaction: TransactionId,
    /// Layer whose frame counter gates it.
    pub target: LayerId,
    /// Frame number the target must reach.
    pub frame: FrameNumber,
}

/// Emitted when a parked transaction leaves the pending set.
#[derive(Clone, Copy, Debug)]
pub struct ResolveEvent {
    /// Which transaction resolved.
    pub transaction: TransactionId,
    /// Layer it was waiting on.
    pub target: LayerId,
    /// How it resolved.
    pub kind: ResolveKind,
}

/// Emitted when a buffer becomes a layer's latched content.
#[derive(Clone, Copy, Debug)]
pub struct LatchEvent {
    /// Which layer latched.
    pub layer: LayerId,
    /// The layer's frame number after the latch.
    pub frame_number: FrameNumber,
    /// Buffer dimensions.
    pub buffer_size: (u32, u32),
    /// The new active size, if this latch completed a pending resize.
    pub resized_to: Option<(u32, u32)>,
}

/// Emitted after a display has been composed.
#[derive(Clone, Copy, Debug)]
pub struct RenderPassEvent {
    /// Which display was composed.
    pub display: DisplayId,
    /// Layers that contributed pixels.
    pub drawn: usize,
    /// Layers skipped because their geometry could not be drawn.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the scene.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a transaction commits.
    fn on_commit(&mut self, e: &CommitEvent) {
        _ = e;
    }

    /// Called when a transaction is deferred.
    fn on_defer(&mut self, e: &DeferEvent) {
        _ = e;
    }

    /// Called when a deferred transaction resolves.
    fn on_resolve(&mut self, e: &ResolveEvent) {
        _ = e;
    }

    /// Called when a buffer is latched.
    fn on_latch(&mut self, e: &LatchEvent) {
        _ = e;
    }

    /// Called after a display is composed.
    fn on_render_pass(&mut self, e: &RenderPassEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`CommitEvent`].
    #[inline]
    pub fn commit(&mut self, e: &CommitEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_commit(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`DeferEvent`].
    #[inline]
    pub fn defer(&mut self, e: &DeferEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_defer(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ResolveEvent`].
    #[inline]
    pub fn resolve(&mut self, e: &ResolveEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_resolve(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`LatchEvent`].
    #[inline]
    pub fn latch(&mut self, e: &LatchEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_latch(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`RenderPassEvent`].
    #[inline]
    pub fn render_pass(&mut self, e: &RenderPassEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_render_pass(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
