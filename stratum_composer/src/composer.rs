// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The thread-safe composition service.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use stratum_core::buffer::{FrameNumber, PixelFormat};
use stratum_core::display::{DisplayId, DisplayState};
use stratum_core::geometry::{IntRect, LayerMatrix};
use stratum_core::layer::{LayerId, LayerState};
use stratum_core::scene::{
    CloseOutcome, CommitReport, DeferredStatus, LatchReport, Resolution, Scene,
};
use stratum_core::trace::{RenderPassEvent, TraceSink, Tracer};
use stratum_core::transaction::{Transaction, TransactionId};
use stratum_core::{Result, StratumError};
use stratum_render::{RenderPlan, RgbaImage, compose};
use tracing::{debug, warn};

use crate::config::ComposerConfig;
use crate::queue::{BufferProducer, BufferQueue};

/// Everything mutated under the commit lock.
struct Core {
    scene: Scene,
    queues: BTreeMap<LayerId, BufferQueue>,
    sink: Option<Box<dyn TraceSink + Send>>,
}

/// A shareable composition service.
///
/// All commits, latches, and deferred releases run under one lock, so a
/// render pass always sees the result of zero or more whole commits. Open
/// transactions are kept in a separate map and never block composition.
///
/// `Composer` is `Send + Sync`; share it behind an `Arc`.
pub struct Composer {
    config: ComposerConfig,
    core: Mutex<Core>,
    open: Mutex<BTreeMap<TransactionId, Transaction>>,
    next_transaction: AtomicU64,
}

impl fmt::Debug for Composer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composer")
            .field("config", &self.config)
            .field("open_transactions", &self.open.lock().len())
            .finish_non_exhaustive()
    }
}

fn tracer(sink: &mut Option<Box<dyn TraceSink + Send>>) -> Tracer<'_> {
    match sink {
        Some(s) => Tracer::new(s.as_mut()),
        None => Tracer::none(),
    }
}

impl Composer {
    /// Creates a composer with one display, [`DisplayId::MAIN`], sized from
    /// `config`.
    pub fn new(config: ComposerConfig) -> Result<Self> {
        let mut scene = Scene::new();
        scene.create_display(config.display_width, config.display_height)?;
        Ok(Self {
            config,
            core: Mutex::new(Core {
                scene,
                queues: BTreeMap::new(),
                sink: None,
            }),
            open: Mutex::new(BTreeMap::new()),
            next_transaction: AtomicU64::new(1),
        })
    }

    /// The configuration this composer was created with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Installs (or with `None`, removes) a sink for trace events.
    pub fn set_trace_sink(&self, sink: Option<Box<dyn TraceSink + Send>>) {
        self.core.lock().sink = sink;
    }

    // -- Layers and displays --

    /// Creates a layer and its buffer queue.
    ///
    /// The producer hands out `width × height` buffers of `format` until a
    /// committed resize changes the default.
    pub fn create_layer(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<(LayerId, BufferProducer)> {
        let mut core = self.core.lock();
        let id = core.scene.create_layer(width, height, format)?;
        let queue = BufferQueue::new(id, self.config.buffer_queue_depth, (width, height), format);
        let producer = queue.producer();
        core.queues.insert(id, queue);
        debug!(layer = ?id, width, height, ?format, "layer created");
        Ok((id, producer))
    }

    /// Returns another producer for an existing layer.
    pub fn producer(&self, layer: LayerId) -> Result<BufferProducer> {
        self.core
            .lock()
            .queues
            .get(&layer)
            .map(BufferQueue::producer)
            .ok_or(StratumError::UnknownHandle(layer))
    }

    /// Destroys a layer, abandons its buffer queue, and cancels deferred
    /// transactions waiting on it. Returns the cancelled transaction ids.
    pub fn destroy_layer(&self, layer: LayerId) -> Result<Vec<TransactionId>> {
        let mut guard = self.core.lock();
        let Core {
            scene,
            queues,
            sink,
        } = &mut *guard;
        let cancelled = scene.destroy_layer(layer, &mut tracer(sink))?;
        if let Some(queue) = queues.remove(&layer) {
            queue.abandon();
        }
        for id in &cancelled {
            warn!(transaction = ?id, target = ?layer, "deferred transaction cancelled");
        }
        debug!(?layer, "layer destroyed");
        Ok(cancelled)
    }

    /// Returns a copy of a layer's committed state.
    pub fn layer_state(&self, layer: LayerId) -> Result<LayerState> {
        self.core.lock().scene.layer_state(layer)
    }

    /// Buffers queued for `layer` and not yet latched.
    pub fn queue_depth(&self, layer: LayerId) -> Result<usize> {
        self.core
            .lock()
            .queues
            .get(&layer)
            .map(BufferQueue::depth)
            .ok_or(StratumError::UnknownHandle(layer))
    }

    /// Registers another display showing layer stack 0.
    pub fn create_display(&self, width: u32, height: u32) -> Result<DisplayId> {
        self.core.lock().scene.create_display(width, height)
    }

    /// Returns a display's committed state.
    pub fn display_state(&self, display: DisplayId) -> Result<DisplayState> {
        self.core.lock().scene.display_state(display)
    }

    // -- Transaction bracket --

    /// Opens an empty transaction.
    pub fn open_transaction(&self) -> TransactionId {
        let id = TransactionId(self.next_transaction.fetch_add(1, Ordering::Relaxed));
        self.open.lock().insert(id, Transaction::new(id));
        id
    }

    /// Moves the layer origin.
    pub fn set_position(&self, tx: TransactionId, layer: LayerId, x: f64, y: f64) -> Result<()> {
        self.edit_layer(tx, layer, |t| t.set_position(layer, x, y).map(|_| ()))
    }

    /// Requests a new buffer size; it shows once a matching buffer latches.
    pub fn set_size(
        &self,
        tx: TransactionId,
        layer: LayerId,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.edit_layer(tx, layer, |t| t.set_size(layer, width, height).map(|_| ()))
    }

    /// Sets straight opacity in `[0, 1]`.
    pub fn set_alpha(&self, tx: TransactionId, layer: LayerId, alpha: f32) -> Result<()> {
        self.edit_layer(tx, layer, |t| t.set_alpha(layer, alpha).map(|_| ()))
    }

    /// Sets or clears the buffer-space crop.
    pub fn set_crop(&self, tx: TransactionId, layer: LayerId, crop: Option<IntRect>) -> Result<()> {
        self.edit_layer(tx, layer, |t| t.set_crop(layer, crop).map(|_| ()))
    }

    /// Sets or clears the screen-space final crop.
    pub fn set_final_crop(
        &self,
        tx: TransactionId,
        layer: LayerId,
        crop: Option<IntRect>,
    ) -> Result<()> {
        self.edit_layer(tx, layer, |t| t.set_final_crop(layer, crop).map(|_| ()))
    }

    /// Sets the 2×2 transform.
    pub fn set_matrix(&self, tx: TransactionId, layer: LayerId, matrix: LayerMatrix) -> Result<()> {
        self.edit_layer(tx, layer, |t| t.set_matrix(layer, matrix).map(|_| ()))
    }

    /// Sets the z order.
    pub fn set_layer_z(&self, tx: TransactionId, layer: LayerId, z: i32) -> Result<()> {
        self.edit_layer(tx, layer, |t| t.set_layer_z(layer, z).map(|_| ()))
    }

    /// Moves the layer to another layer stack.
    pub fn set_layer_stack(
        &self,
        tx: TransactionId,
        layer: LayerId,
        layer_stack: u32,
    ) -> Result<()> {
        self.edit_layer(tx, layer, |t| t.set_layer_stack(layer, layer_stack).map(|_| ()))
    }

    /// Replaces the flag bits selected by `mask`.
    pub fn set_flags(
        &self,
        tx: TransactionId,
        layer: LayerId,
        flags: u32,
        mask: u32,
    ) -> Result<()> {
        self.edit_layer(tx, layer, |t| t.set_flags(layer, flags, mask).map(|_| ()))
    }

    /// Clears the explicit hide toggle.
    pub fn show(&self, tx: TransactionId, layer: LayerId) -> Result<()> {
        self.edit_layer(tx, layer, |t| t.show(layer).map(|_| ()))
    }

    /// Sets the explicit hide toggle.
    pub fn hide(&self, tx: TransactionId, layer: LayerId) -> Result<()> {
        self.edit_layer(tx, layer, |t| t.hide(layer).map(|_| ()))
    }

    /// Selects which layer stack a display composes.
    pub fn set_display_layer_stack(
        &self,
        tx: TransactionId,
        display: DisplayId,
        layer_stack: u32,
    ) -> Result<()> {
        self.core.lock().scene.display_state(display)?;
        self.edit(tx, |t| t.set_display_layer_stack(display, layer_stack).map(|_| ()))
    }

    /// Holds the whole transaction until `target` latches `frame`.
    pub fn defer_transaction_until(
        &self,
        tx: TransactionId,
        target: LayerId,
        frame: FrameNumber,
    ) -> Result<()> {
        self.edit_layer(tx, target, |t| {
            t.defer_until(target, frame);
            Ok(())
        })
    }

    /// Closes a transaction.
    ///
    /// A transaction without a deferral is committed before this returns. With
    /// `synchronous`, a latch pass then runs, so buffers queued before the
    /// call are reflected too. A deferred transaction is parked and the call
    /// returns at once, whatever `synchronous` says.
    ///
    /// The transaction is consumed even when closing fails.
    pub fn close_transaction(&self, tx: TransactionId, synchronous: bool) -> Result<CloseOutcome> {
        let txn = self
            .open
            .lock()
            .remove(&tx)
            .ok_or(StratumError::UnknownTransaction(tx))?;

        let mut guard = self.core.lock();
        let core = &mut *guard;
        let outcome = match core.scene.close(txn, &mut tracer(&mut core.sink)) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(transaction = ?tx, %err, "transaction rejected");
                return Err(err);
            }
        };
        match &outcome {
            CloseOutcome::Committed(report) => {
                debug!(transaction = ?tx, layers = report.layers.len(), "transaction committed");
                apply_size_requests(&core.queues, report);
                if synchronous {
                    latch_pass(core);
                }
            }
            CloseOutcome::Deferred { target, frame, .. } => {
                debug!(transaction = ?tx, ?target, ?frame, "transaction deferred");
            }
        }
        Ok(outcome)
    }

    /// Status of a transaction that was closed with a deferral.
    ///
    /// See [`Scene::deferred_status`] for how long resolved statuses are kept.
    pub fn deferred_status(&self, tx: TransactionId) -> Result<DeferredStatus> {
        self.core.lock().scene.deferred_status(tx)
    }

    /// Number of deferred transactions still waiting.
    #[must_use]
    pub fn pending_deferred(&self) -> usize {
        self.core.lock().scene.pending_deferred()
    }

    /// Drains deferred resolutions recorded since the last call. At most
    /// [`RESOLVED_HISTORY`](stratum_core::scene::RESOLVED_HISTORY) are kept.
    pub fn take_resolved(&self) -> Vec<Resolution> {
        self.core.lock().scene.take_resolved()
    }

    // -- Buffers and output --

    /// Latches every queued buffer, layer by layer, oldest first, releasing
    /// deferred transactions as frame numbers advance.
    pub fn latch_buffers(&self) -> Vec<LatchReport> {
        latch_pass(&mut self.core.lock())
    }

    /// Latches queued buffers, then composes `display`.
    ///
    /// The snapshot and plan are taken under the commit lock; rasterizing
    /// happens after it is released.
    pub fn render_display(&self, display: DisplayId) -> Result<RgbaImage> {
        let plan = {
            let mut guard = self.core.lock();
            let core = &mut *guard;
            latch_pass(core);
            let snapshot = core.scene.snapshot(display)?;
            let plan = RenderPlan::build(&snapshot);
            for skipped in &plan.skipped {
                warn!(
                    layer = ?skipped.layer,
                    reason = ?skipped.reason,
                    "layer skipped in render pass"
                );
            }
            tracer(&mut core.sink).render_pass(&RenderPassEvent {
                display,
                drawn: plan.items.len(),
                skipped: plan.skipped.len(),
            });
            plan
        };
        Ok(compose(&plan, self.config.clear_color))
    }

    // -- Internal helpers --

    fn edit(
        &self,
        tx: TransactionId,
        f: impl FnOnce(&mut Transaction) -> Result<()>,
    ) -> Result<()> {
        let mut open = self.open.lock();
        let txn = open
            .get_mut(&tx)
            .ok_or(StratumError::UnknownTransaction(tx))?;
        f(txn)
    }

    fn edit_layer(
        &self,
        tx: TransactionId,
        layer: LayerId,
        f: impl FnOnce(&mut Transaction) -> Result<()>,
    ) -> Result<()> {
        // The commit lock is released before the open-transaction lock is
        // taken; the two are never held together.
        if !self.core.lock().scene.layers().is_alive(layer) {
            return Err(StratumError::UnknownHandle(layer));
        }
        self.edit(tx, f)
    }
}

fn apply_size_requests(queues: &BTreeMap<LayerId, BufferQueue>, report: &CommitReport) {
    for &(layer, width, height) in &report.size_requests {
        if let Some(queue) = queues.get(&layer) {
            queue.set_default_size(width, height);
        }
    }
}

/// Drains every queue into the scene. Runs with the commit lock held.
fn latch_pass(core: &mut Core) -> Vec<LatchReport> {
    let Core {
        scene,
        queues,
        sink,
    } = core;
    let mut reports = Vec::new();
    for (&layer, queue) in queues.iter() {
        for buffer in queue.acquire_all() {
            let report = match scene.latch_buffer(layer, buffer, &mut tracer(sink)) {
                Ok(report) => report,
                Err(err) => {
                    warn!(?layer, %err, "buffer dropped");
                    continue;
                }
            };
            debug!(
                ?layer,
                frame = ?report.frame_number,
                resized = ?report.resized_to,
                released = report.resolved.len(),
                "buffer latched"
            );
            for resolution in &report.resolved {
                match (&resolution.status, &resolution.commit) {
                    (DeferredStatus::Applied, Some(commit)) => {
                        debug!(
                            transaction = ?resolution.transaction,
                            "deferred transaction applied"
                        );
                        apply_size_requests(queues, commit);
                    }
                    (status, _) => {
                        warn!(
                            transaction = ?resolution.transaction,
                            ?status,
                            "deferred transaction not applied"
                        );
                    }
                }
            }
            reports.push(report);
        }
    }
    reports
}
