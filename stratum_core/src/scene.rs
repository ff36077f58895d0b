// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The commit domain: atomic transaction commit, buffer latching, and deferred
//! resolution over one layer registry and display table.
//!
//! [`Scene`] is single-threaded. Callers that share it between threads wrap it
//! in a lock and hold that lock for the whole of each call, which makes every
//! commit and every latch-plus-release step atomic with respect to readers of
//! [`Scene::snapshot`].

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::buffer::{FrameNumber, GraphicBuffer, PixelFormat};
use crate::deferred::DeferredQueue;
use crate::display::{DisplayId, DisplayState, DisplayTable};
use crate::error::{Result, StratumError};
use crate::layer::{LayerId, LayerState, LayerStore};
use crate::trace::{CommitEvent, DeferEvent, LatchEvent, ResolveEvent, ResolveKind, Tracer};
use crate::transaction::{Diff, DisplayDiff, LayerDiff, Transaction, TransactionId};

/// Lifecycle of a transaction that was closed with a deferral.
#[derive(Clone, Debug, PartialEq)]
pub enum DeferredStatus {
    /// Waiting for the target layer to reach its frame number.
    Pending,
    /// Committed, either at close or on release.
    Applied,
    /// Discarded because the target layer was destroyed first.
    Cancelled,
    /// Released, but a referenced handle no longer existed; nothing applied.
    Rejected(StratumError),
}

/// What a single commit changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitReport {
    /// The committed transaction.
    pub transaction: TransactionId,
    /// Distinct layers touched, in first-mention order.
    pub layers: Vec<LayerId>,
    /// Committed size requests, last one per layer.
    pub size_requests: Vec<(LayerId, u32, u32)>,
}

/// Result of closing a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The diffs are now committed state.
    Committed(CommitReport),
    /// The transaction is parked until `target` latches `frame`.
    Deferred {
        /// The parked transaction.
        transaction: TransactionId,
        /// Layer whose frame counter gates it.
        target: LayerId,
        /// Frame number the target must reach.
        frame: FrameNumber,
    },
}

/// A deferred transaction leaving the pending set.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    /// Which transaction resolved.
    pub transaction: TransactionId,
    /// The layer it waited on.
    pub target: LayerId,
    /// Final status; never [`DeferredStatus::Pending`].
    pub status: DeferredStatus,
    /// What the commit changed, when the status is `Applied`.
    pub commit: Option<CommitReport>,
}

/// What a single latch did.
#[derive(Clone, Debug, PartialEq)]
pub struct LatchReport {
    /// The layer that latched.
    pub layer: LayerId,
    /// Its frame number after the latch.
    pub frame_number: FrameNumber,
    /// New active size, if this latch completed a pending resize.
    pub resized_to: Option<(u32, u32)>,
    /// Deferred transactions released by this latch, in release order.
    pub resolved: Vec<Resolution>,
}

/// A consistent copy of everything needed to compose one display.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneSnapshot {
    /// Which display this snapshot is for.
    pub display: DisplayId,
    /// The display's committed state.
    pub display_state: DisplayState,
    /// Every live layer, in slot order. Filtering and ordering are left to the
    /// renderer.
    pub layers: Vec<LayerState>,
}

/// Resolutions kept for [`Scene::take_resolved`] before the oldest is dropped.
pub const RESOLVED_HISTORY: usize = 1024;

/// Layer registry, display table, and deferred resolver under one commit
/// domain.
#[derive(Debug, Default)]
pub struct Scene {
    layers: LayerStore,
    displays: DisplayTable,
    deferred: DeferredQueue,
    /// Pending transactions plus every resolution still in `resolved`.
    statuses: HashMap<TransactionId, DeferredStatus>,
    resolved: VecDeque<Resolution>,
}

impl Scene {
    /// Creates an empty scene with no displays.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- Registry --

    /// Creates a layer. See [`LayerStore::create_layer`].
    pub fn create_layer(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<LayerId> {
        self.layers.create_layer(width, height, format)
    }

    /// Destroys a layer and cancels every deferred transaction waiting on it.
    ///
    /// Returns the cancelled transaction ids in release order. Transactions
    /// that merely *reference* the layer stay pending and are rejected when
    /// released.
    pub fn destroy_layer(
        &mut self,
        id: LayerId,
        tracer: &mut Tracer<'_>,
    ) -> Result<Vec<TransactionId>> {
        self.layers.destroy_layer(id)?;
        let cancelled = self.deferred.cancel_target(id);
        let mut ids = Vec::with_capacity(cancelled.len());
        for txn in cancelled {
            tracer.resolve(&ResolveEvent {
                transaction: txn.id(),
                target: id,
                kind: ResolveKind::Cancelled,
            });
            self.finish(txn.id(), id, DeferredStatus::Cancelled, None);
            ids.push(txn.id());
        }
        Ok(ids)
    }

    /// Read access to committed layer state.
    #[inline]
    #[must_use]
    pub fn layers(&self) -> &LayerStore {
        &self.layers
    }

    /// Returns a copy of one layer's committed state.
    pub fn layer_state(&self, id: LayerId) -> Result<LayerState> {
        self.layers.state(id)
    }

    /// Registers a display. See [`DisplayTable::create`].
    pub fn create_display(&mut self, width: u32, height: u32) -> Result<DisplayId> {
        self.displays.create(width, height)
    }

    /// Unregisters a display.
    pub fn remove_display(&mut self, id: DisplayId) -> Result<DisplayState> {
        self.displays.remove(id)
    }

    /// Returns the committed state of a display.
    pub fn display_state(&self, id: DisplayId) -> Result<DisplayState> {
        self.displays.get(id)
    }

    // -- Transactions --

    /// Closes a transaction: commits it now, or parks it behind its deferral.
    ///
    /// Every referenced handle is checked first. If any is stale the call
    /// fails and nothing is applied. A deferral whose target already reached
    /// the threshold commits immediately; one whose target is gone fails with
    /// [`StratumError::Cancelled`].
    pub fn close(&mut self, txn: Transaction, tracer: &mut Tracer<'_>) -> Result<CloseOutcome> {
        if let Some(deferral) = txn.deferral() {
            let reached = self.layers.frame_number(deferral.target).map_err(|_| {
                StratumError::Cancelled {
                    transaction: txn.id(),
                    target: deferral.target,
                }
            })?;
            self.validate(&txn)?;
            if reached >= deferral.frame {
                let report = self.apply(&txn, false, tracer);
                self.finish(
                    txn.id(),
                    deferral.target,
                    DeferredStatus::Applied,
                    Some(report.clone()),
                );
                return Ok(CloseOutcome::Committed(report));
            }
            let id = txn.id();
            tracer.defer(&DeferEvent {
                transaction: id,
                target: deferral.target,
                frame: deferral.frame,
            });
            self.statuses.insert(id, DeferredStatus::Pending);
            // A transaction carrying a deferral is always accepted here.
            _ = self.deferred.register(txn);
            return Ok(CloseOutcome::Deferred {
                transaction: id,
                target: deferral.target,
                frame: deferral.frame,
            });
        }

        self.validate(&txn)?;
        Ok(CloseOutcome::Committed(self.apply(&txn, false, tracer)))
    }

    /// Status of a transaction that was closed with a deferral.
    ///
    /// A resolved transaction is forgotten once its [`Resolution`] is drained
    /// by [`take_resolved`](Self::take_resolved) or pushed out of the
    /// [`RESOLVED_HISTORY`] most recent ones; after that this returns
    /// [`StratumError::UnknownTransaction`].
    pub fn deferred_status(&self, id: TransactionId) -> Result<DeferredStatus> {
        self.statuses
            .get(&id)
            .cloned()
            .ok_or(StratumError::UnknownTransaction(id))
    }

    /// Number of deferred transactions still waiting.
    #[inline]
    #[must_use]
    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }

    /// Drains the deferred transactions resolved since the last call, oldest
    /// first, and forgets their statuses.
    pub fn take_resolved(&mut self) -> Vec<Resolution> {
        let drained: Vec<Resolution> = self.resolved.drain(..).collect();
        for resolution in &drained {
            self.statuses.remove(&resolution.transaction);
        }
        drained
    }

    // -- Buffers --

    /// Latches `buffer` as the content of `layer`, then releases and commits
    /// every deferred transaction the new frame number satisfies.
    pub fn latch_buffer(
        &mut self,
        layer: LayerId,
        buffer: Arc<GraphicBuffer>,
        tracer: &mut Tracer<'_>,
    ) -> Result<LatchReport> {
        let buffer_size = buffer.size();
        let latched = self.layers.latch(layer, buffer)?;
        tracer.latch(&LatchEvent {
            layer,
            frame_number: latched.frame_number,
            buffer_size,
            resized_to: latched.resized_to,
        });

        let mut resolved = Vec::new();
        for txn in self.deferred.release(layer, latched.frame_number) {
            let (status, commit) = match self.validate(&txn) {
                Ok(()) => (DeferredStatus::Applied, Some(self.apply(&txn, true, tracer))),
                Err(err) => (DeferredStatus::Rejected(err), None),
            };
            tracer.resolve(&ResolveEvent {
                transaction: txn.id(),
                target: layer,
                kind: match status {
                    DeferredStatus::Rejected(_) => ResolveKind::Rejected,
                    _ => ResolveKind::Applied,
                },
            });
            resolved.push(self.finish(txn.id(), layer, status, commit));
        }

        Ok(LatchReport {
            layer,
            frame_number: latched.frame_number,
            resized_to: latched.resized_to,
            resolved,
        })
    }

    // -- Snapshots --

    /// Copies the committed state needed to compose `display`.
    pub fn snapshot(&self, display: DisplayId) -> Result<SceneSnapshot> {
        Ok(SceneSnapshot {
            display,
            display_state: self.displays.get(display)?,
            layers: self.layers.states(),
        })
    }

    // -- Internal helpers --

    fn validate(&self, txn: &Transaction) -> Result<()> {
        for layer in txn.layers() {
            self.layers.slot(layer)?;
        }
        for display in txn.displays() {
            if !self.displays.contains(display) {
                return Err(StratumError::UnknownDisplay(display));
            }
        }
        Ok(())
    }

    /// Applies a validated transaction. Diffs apply in issue order, so a later
    /// diff to the same property wins.
    fn apply(
        &mut self,
        txn: &Transaction,
        from_deferral: bool,
        tracer: &mut Tracer<'_>,
    ) -> CommitReport {
        let mut layers: Vec<LayerId> = Vec::new();
        let mut size_requests: Vec<(LayerId, u32, u32)> = Vec::new();
        for diff in txn.diffs() {
            match *diff {
                Diff::Layer(id, ref layer_diff) => {
                    let Ok(i) = self.layers.slot(id) else {
                        continue;
                    };
                    self.layers.apply_diff(i, layer_diff);
                    if !layers.contains(&id) {
                        layers.push(id);
                    }
                    if let LayerDiff::Size { width, height } = *layer_diff {
                        size_requests.retain(|(l, ..)| *l != id);
                        size_requests.push((id, width, height));
                    }
                }
                Diff::Display(id, DisplayDiff::LayerStack(stack)) => {
                    self.displays.set_layer_stack(id, stack);
                }
            }
        }
        tracer.commit(&CommitEvent {
            transaction: txn.id(),
            diffs: txn.diffs().len(),
            layers: layers.len(),
            from_deferral,
        });
        CommitReport {
            transaction: txn.id(),
            layers,
            size_requests,
        }
    }

    fn finish(
        &mut self,
        transaction: TransactionId,
        target: LayerId,
        status: DeferredStatus,
        commit: Option<CommitReport>,
    ) -> Resolution {
        self.statuses.insert(transaction, status.clone());
        let resolution = Resolution {
            transaction,
            target,
            status,
            commit,
        };
        if self.resolved.len() == RESOLVED_HISTORY
            && let Some(evicted) = self.resolved.pop_front()
        {
            self.statuses.remove(&evicted.transaction);
        }
        self.resolved.push_back(resolution.clone());
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Arc<GraphicBuffer> {
        let mut buf = GraphicBuffer::new(w, h, PixelFormat::Rgba8888).unwrap();
        buf.fill(rgba);
        Arc::new(buf)
    }

    struct Fixture {
        scene: Scene,
        fg: LayerId,
        sync: LayerId,
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new();
        scene.create_display(256, 256).unwrap();
        let fg = scene.create_layer(64, 64, PixelFormat::Rgba8888).unwrap();
        let sync = scene.create_layer(1, 1, PixelFormat::Rgba8888).unwrap();
        let mut tracer = Tracer::none();
        scene
            .latch_buffer(fg, solid(64, 64, [195, 63, 63, 255]), &mut tracer)
            .unwrap();
        scene
            .latch_buffer(sync, solid(1, 1, [31, 31, 31, 255]), &mut tracer)
            .unwrap();
        Fixture { scene, fg, sync }
    }

    fn txn(id: u64) -> Transaction {
        Transaction::new(TransactionId(id))
    }

    #[test]
    fn commit_is_visible_immediately() {
        let mut f = fixture();
        let mut t = txn(1);
        t.set_position(f.fg, 128.0, 128.0).unwrap();
        let outcome = f.scene.close(t, &mut Tracer::none()).unwrap();
        assert!(matches!(outcome, CloseOutcome::Committed(_)));
        assert_eq!(
            f.scene.layer_state(f.fg).unwrap().position,
            Point::new(128.0, 128.0)
        );
    }

    #[test]
    fn stale_handle_rejects_whole_transaction() {
        let mut f = fixture();
        let doomed = f.scene.create_layer(4, 4, PixelFormat::Rgba8888).unwrap();
        f.scene.destroy_layer(doomed, &mut Tracer::none()).unwrap();

        let mut t = txn(1);
        t.set_alpha(f.fg, 0.5).unwrap();
        t.set_alpha(doomed, 0.5).unwrap();
        assert_eq!(
            f.scene.close(t, &mut Tracer::none()),
            Err(StratumError::UnknownHandle(doomed))
        );
        assert_eq!(
            f.scene.layer_state(f.fg).unwrap().alpha,
            1.0,
            "a rejected transaction must not partially apply"
        );
    }

    #[test]
    fn unknown_display_rejects_whole_transaction() {
        let mut f = fixture();
        let mut t = txn(1);
        t.set_layer_z(f.fg, 7).unwrap();
        t.set_display_layer_stack(DisplayId(9), 1).unwrap();
        assert_eq!(
            f.scene.close(t, &mut Tracer::none()),
            Err(StratumError::UnknownDisplay(DisplayId(9)))
        );
        assert_eq!(f.scene.layer_state(f.fg).unwrap().z, 0);
    }

    #[test]
    fn last_write_wins_within_transaction() {
        let mut f = fixture();
        let mut t = txn(1);
        t.set_alpha(f.fg, 0.25).unwrap();
        t.set_alpha(f.fg, 0.75).unwrap();
        t.set_size(f.fg, 32, 32).unwrap();
        t.set_size(f.fg, 128, 128).unwrap();
        let CloseOutcome::Committed(report) = f.scene.close(t, &mut Tracer::none()).unwrap() else {
            panic!("expected an immediate commit");
        };
        assert_eq!(f.scene.layer_state(f.fg).unwrap().alpha, 0.75);
        assert_eq!(report.layers, [f.fg]);
        assert_eq!(report.size_requests, [(f.fg, 128, 128)]);
    }

    #[test]
    fn resize_is_gated_on_matching_buffer() {
        let mut f = fixture();
        let mut t = txn(1);
        t.set_size(f.fg, 128, 128).unwrap();
        f.scene.close(t, &mut Tracer::none()).unwrap();
        let s = f.scene.layer_state(f.fg).unwrap();
        assert_eq!(s.requested_size, (128, 128));
        assert_eq!(s.active_size, (64, 64));

        let report = f
            .scene
            .latch_buffer(f.fg, solid(128, 128, [195, 63, 63, 255]), &mut Tracer::none())
            .unwrap();
        assert_eq!(report.resized_to, Some((128, 128)));
        assert_eq!(f.scene.layer_state(f.fg).unwrap().active_size, (128, 128));
    }

    #[test]
    fn deferred_transactions_release_in_threshold_order() {
        let mut f = fixture();
        assert_eq!(f.scene.layers().frame_number(f.sync).unwrap(), FrameNumber(1));

        let mut first = txn(1);
        first.set_alpha(f.fg, 0.75).unwrap();
        first.defer_until(f.sync, FrameNumber(2));
        let mut second = txn(2);
        second.set_position(f.fg, 128.0, 128.0).unwrap();
        second.defer_until(f.sync, FrameNumber(3));

        let mut tracer = Tracer::none();
        assert!(matches!(
            f.scene.close(first, &mut tracer).unwrap(),
            CloseOutcome::Deferred { .. }
        ));
        f.scene.close(second, &mut tracer).unwrap();
        assert_eq!(f.scene.layer_state(f.fg).unwrap().alpha, 1.0);
        assert_eq!(
            f.scene.deferred_status(TransactionId(1)),
            Ok(DeferredStatus::Pending)
        );

        let report = f
            .scene
            .latch_buffer(f.sync, solid(1, 1, [31, 31, 31, 255]), &mut tracer)
            .unwrap();
        assert_eq!(report.frame_number, FrameNumber(2));
        assert_eq!(report.resolved.len(), 1);
        assert_eq!(report.resolved[0].transaction, TransactionId(1));
        let s = f.scene.layer_state(f.fg).unwrap();
        assert_eq!(s.alpha, 0.75);
        assert_eq!(s.position, Point::ORIGIN);

        // An immediate transaction in between is not held back.
        let mut immediate = txn(3);
        immediate.set_alpha(f.fg, 1.0).unwrap();
        f.scene.close(immediate, &mut tracer).unwrap();
        assert_eq!(f.scene.layer_state(f.fg).unwrap().alpha, 1.0);

        f.scene
            .latch_buffer(f.sync, solid(1, 1, [31, 31, 31, 255]), &mut tracer)
            .unwrap();
        assert_eq!(
            f.scene.layer_state(f.fg).unwrap().position,
            Point::new(128.0, 128.0)
        );
        assert_eq!(
            f.scene.deferred_status(TransactionId(2)),
            Ok(DeferredStatus::Applied)
        );
        assert_eq!(f.scene.pending_deferred(), 0);
        assert_eq!(f.scene.take_resolved().len(), 2);
        assert!(f.scene.take_resolved().is_empty());
    }

    #[test]
    fn reached_threshold_commits_at_close() {
        let mut f = fixture();
        let mut t = txn(1);
        t.set_alpha(f.fg, 0.5).unwrap();
        t.defer_until(f.sync, FrameNumber(1));
        assert!(matches!(
            f.scene.close(t, &mut Tracer::none()).unwrap(),
            CloseOutcome::Committed(_)
        ));
        assert_eq!(f.scene.layer_state(f.fg).unwrap().alpha, 0.5);
        assert_eq!(
            f.scene.deferred_status(TransactionId(1)),
            Ok(DeferredStatus::Applied)
        );
    }

    #[test]
    fn destroying_target_cancels_pending() {
        let mut f = fixture();
        let mut t = txn(1);
        t.set_alpha(f.fg, 0.5).unwrap();
        t.defer_until(f.sync, FrameNumber(5));
        f.scene.close(t, &mut Tracer::none()).unwrap();

        let cancelled = f.scene.destroy_layer(f.sync, &mut Tracer::none()).unwrap();
        assert_eq!(cancelled, [TransactionId(1)]);
        assert_eq!(
            f.scene.deferred_status(TransactionId(1)),
            Ok(DeferredStatus::Cancelled)
        );
        assert_eq!(f.scene.layer_state(f.fg).unwrap().alpha, 1.0);
        assert_eq!(f.scene.pending_deferred(), 0);
    }

    #[test]
    fn deferral_on_dead_target_is_cancelled_at_close() {
        let mut f = fixture();
        f.scene.destroy_layer(f.sync, &mut Tracer::none()).unwrap();
        let mut t = txn(4);
        t.set_alpha(f.fg, 0.5).unwrap();
        t.defer_until(f.sync, FrameNumber(2));
        assert_eq!(
            f.scene.close(t, &mut Tracer::none()),
            Err(StratumError::Cancelled {
                transaction: TransactionId(4),
                target: f.sync,
            })
        );
    }

    #[test]
    fn released_transaction_with_destroyed_layer_is_rejected() {
        let mut f = fixture();
        let mut t = txn(1);
        t.set_alpha(f.fg, 0.5).unwrap();
        t.defer_until(f.sync, FrameNumber(2));
        f.scene.close(t, &mut Tracer::none()).unwrap();
        f.scene.destroy_layer(f.fg, &mut Tracer::none()).unwrap();

        let report = f
            .scene
            .latch_buffer(f.sync, solid(1, 1, [31, 31, 31, 255]), &mut Tracer::none())
            .unwrap();
        assert_eq!(
            report.resolved[0].status,
            DeferredStatus::Rejected(StratumError::UnknownHandle(f.fg))
        );
        assert!(report.resolved[0].commit.is_none());
    }

    #[test]
    fn drained_resolutions_forget_their_status() {
        let mut f = fixture();
        let mut t = txn(1);
        t.set_alpha(f.fg, 0.5).unwrap();
        t.defer_until(f.sync, FrameNumber(2));
        f.scene.close(t, &mut Tracer::none()).unwrap();
        f.scene
            .latch_buffer(f.sync, solid(1, 1, [31, 31, 31, 255]), &mut Tracer::none())
            .unwrap();
        assert_eq!(
            f.scene.deferred_status(TransactionId(1)),
            Ok(DeferredStatus::Applied)
        );

        let drained = f.scene.take_resolved();
        assert_eq!(drained.len(), 1, "one release");
        assert_eq!(
            f.scene.deferred_status(TransactionId(1)),
            Err(StratumError::UnknownTransaction(TransactionId(1)))
        );
        assert!(f.scene.statuses.is_empty(), "status table drained");
    }

    #[test]
    fn undrained_resolutions_are_bounded() {
        let mut f = fixture();
        let total = RESOLVED_HISTORY as u64 + 10;
        for id in 1..=total {
            let mut t = txn(id);
            t.set_alpha(f.fg, 0.5).unwrap();
            // Already reached, so each one resolves at close.
            t.defer_until(f.sync, FrameNumber(1));
            f.scene.close(t, &mut Tracer::none()).unwrap();
        }
        assert_eq!(f.scene.statuses.len(), RESOLVED_HISTORY);
        assert_eq!(
            f.scene.deferred_status(TransactionId(1)),
            Err(StratumError::UnknownTransaction(TransactionId(1)))
        );
        assert_eq!(
            f.scene.deferred_status(TransactionId(total)),
            Ok(DeferredStatus::Applied)
        );
        let drained = f.scene.take_resolved();
        assert_eq!(drained.len(), RESOLVED_HISTORY);
        assert_eq!(drained[0].transaction, TransactionId(11), "oldest dropped first");
    }

    #[test]
    fn unknown_transaction_status() {
        let f = fixture();
        assert_eq!(
            f.scene.deferred_status(TransactionId(42)),
            Err(StratumError::UnknownTransaction(TransactionId(42)))
        );
    }

    #[test]
    fn snapshot_carries_display_and_all_layers() {
        let mut f = fixture();
        let mut t = txn(1);
        t.set_display_layer_stack(DisplayId::MAIN, 3).unwrap();
        f.scene.close(t, &mut Tracer::none()).unwrap();
        let snap = f.scene.snapshot(DisplayId::MAIN).unwrap();
        assert_eq!(snap.display_state.layer_stack, 3);
        assert_eq!(snap.layers.len(), 2);
        assert!(matches!(
            f.scene.snapshot(DisplayId(5)),
            Err(StratumError::UnknownDisplay(_))
        ));
    }
}
