// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pending transactions keyed on another layer's frame counter.
//!
//! [`DeferredQueue`] only stores and releases transactions. Deciding what a
//! release means (committing, rejecting, reporting) is up to
//! [`Scene`](crate::scene::Scene).
//!
//! Release order is ascending threshold, then FIFO among transactions that
//! share a threshold on the same target.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

use crate::buffer::FrameNumber;
use crate::layer::LayerId;
use crate::transaction::Transaction;

/// Transactions waiting for their target layer to reach a frame number.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    by_target: BTreeMap<LayerId, BTreeMap<FrameNumber, VecDeque<Transaction>>>,
    len: usize,
}

impl DeferredQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks `txn` under its deferral.
    ///
    /// Transactions without a deferral are returned unchanged in `Err`.
    pub fn register(&mut self, txn: Transaction) -> Result<(), Transaction> {
        let Some(deferral) = txn.deferral() else {
            return Err(txn);
        };
        self.by_target
            .entry(deferral.target)
            .or_default()
            .entry(deferral.frame)
            .or_default()
            .push_back(txn);
        self.len += 1;
        Ok(())
    }

    /// Removes and returns every transaction on `target` whose threshold is at
    /// most `frame`, in release order.
    pub fn release(&mut self, target: LayerId, frame: FrameNumber) -> Vec<Transaction> {
        let Some(thresholds) = self.by_target.get_mut(&target) else {
            return Vec::new();
        };
        let ready = if frame.0 == u64::MAX {
            core::mem::take(thresholds)
        } else {
            // Everything strictly above `frame` stays.
            let later = thresholds.split_off(&frame.next());
            core::mem::replace(thresholds, later)
        };
        if thresholds.is_empty() {
            self.by_target.remove(&target);
        }
        let released: Vec<Transaction> = ready.into_values().flatten().collect();
        self.len -= released.len();
        released
    }

    /// Removes and returns every transaction waiting on `target`, in release
    /// order.
    pub fn cancel_target(&mut self, target: LayerId) -> Vec<Transaction> {
        let Some(thresholds) = self.by_target.remove(&target) else {
            return Vec::new();
        };
        let cancelled: Vec<Transaction> = thresholds.into_values().flatten().collect();
        self.len -= cancelled.len();
        cancelled
    }

    /// Number of transactions still waiting on `target`.
    #[must_use]
    pub fn pending_for(&self, target: LayerId) -> usize {
        self.by_target
            .get(&target)
            .map_or(0, |t| t.values().map(VecDeque::len).sum())
    }

    /// Total number of waiting transactions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing is waiting.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelFormat;
    use crate::layer::LayerStore;
    use crate::transaction::TransactionId;

    fn deferred(id: u64, target: LayerId, frame: u64) -> Transaction {
        let mut txn = Transaction::new(TransactionId(id));
        txn.defer_until(target, FrameNumber(frame));
        txn
    }

    fn ids(txns: &[Transaction]) -> Vec<u64> {
        txns.iter().map(|t| t.id().0).collect()
    }

    #[test]
    fn non_deferred_transaction_is_handed_back() {
        let mut q = DeferredQueue::new();
        let txn = Transaction::new(TransactionId(1));
        assert!(q.register(txn).is_err());
        assert!(q.is_empty());
    }

    #[test]
    fn release_is_threshold_ordered_then_fifo() {
        let mut store = LayerStore::new();
        let t = store.create_layer(1, 1, PixelFormat::Rgba8888).unwrap();
        let mut q = DeferredQueue::new();
        q.register(deferred(1, t, 3)).unwrap();
        q.register(deferred(2, t, 2)).unwrap();
        q.register(deferred(3, t, 2)).unwrap();
        q.register(deferred(4, t, 4)).unwrap();

        assert!(q.release(t, FrameNumber(1)).is_empty());
        assert_eq!(ids(&q.release(t, FrameNumber(3))), [2, 3, 1]);
        assert_eq!(q.len(), 1);
        assert_eq!(q.pending_for(t), 1);
        assert_eq!(ids(&q.release(t, FrameNumber(9))), [4]);
        assert!(q.is_empty());
    }

    #[test]
    fn release_only_touches_its_target() {
        let mut store = LayerStore::new();
        let a = store.create_layer(1, 1, PixelFormat::Rgba8888).unwrap();
        let b = store.create_layer(1, 1, PixelFormat::Rgba8888).unwrap();
        let mut q = DeferredQueue::new();
        q.register(deferred(1, a, 1)).unwrap();
        q.register(deferred(2, b, 1)).unwrap();
        assert_eq!(ids(&q.release(a, FrameNumber(5))), [1]);
        assert_eq!(q.pending_for(b), 1);
    }

    #[test]
    fn cancel_drains_target() {
        let mut store = LayerStore::new();
        let t = store.create_layer(1, 1, PixelFormat::Rgba8888).unwrap();
        let mut q = DeferredQueue::new();
        q.register(deferred(1, t, 5)).unwrap();
        q.register(deferred(2, t, 2)).unwrap();
        assert_eq!(ids(&q.cancel_target(t)), [2, 1]);
        assert!(q.is_empty());
        assert!(q.cancel_target(t).is_empty());
    }
}
