// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy shared by every stratum crate.

use thiserror::Error;

use crate::display::DisplayId;
use crate::layer::LayerId;
use crate::transaction::TransactionId;

/// Convenience alias used throughout the workspace.
pub type Result<T> = core::result::Result<T, StratumError>;

/// Errors reported by the registry, the transaction manager, the deferred
/// resolver, and buffer delivery.
///
/// None of these are fatal to the scene: a failed operation leaves committed
/// state exactly as it was before the call.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum StratumError {
    /// The handle refers to a layer that was destroyed or never existed.
    #[error("unknown layer handle {0:?}")]
    UnknownHandle(LayerId),

    /// The display id is not registered.
    #[error("unknown display {0:?}")]
    UnknownDisplay(DisplayId),

    /// The transaction id is not open (already closed, or never opened).
    #[error("unknown or closed transaction {0:?}")]
    UnknownTransaction(TransactionId),

    /// A value outside its domain, rejected before it was queued.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A deferred transaction whose target layer went away before resolution.
    #[error("transaction {transaction:?} cancelled: deferral target {target:?} was destroyed")]
    Cancelled {
        /// The discarded transaction.
        transaction: TransactionId,
        /// The layer whose buffer the transaction was waiting for.
        target: LayerId,
    },

    /// A producer stayed blocked on a saturated buffer queue past its bound.
    #[error("buffer queue for {layer:?} stayed full ({depth} buffers) past the timeout")]
    BackpressureTimeout {
        /// Layer whose queue was saturated.
        layer: LayerId,
        /// Queue depth at the time of the timeout.
        depth: usize,
    },

    /// A pixel buffer whose storage does not match its declared shape.
    #[error("invalid buffer: {0}")]
    InvalidBuffer(&'static str),
}
