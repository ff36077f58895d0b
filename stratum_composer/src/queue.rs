// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer bounded buffer queues.
//!
//! Each layer owns one queue. The producer side ([`BufferProducer`]) is handed
//! to the drawing client; the consumer side stays inside the composer and is
//! drained by the latch pass. Once `capacity` buffers are queued and not yet
//! latched, producers block until a latch pass retires them.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use stratum_core::buffer::{FrameNumber, GraphicBuffer, PixelFormat};
use stratum_core::layer::LayerId;
use stratum_core::{Result, StratumError};

#[derive(Debug)]
struct QueueState {
    items: VecDeque<Arc<GraphicBuffer>>,
    capacity: usize,
    default_size: (u32, u32),
    format: PixelFormat,
    /// Buffers accepted so far; the Nth becomes frame N when latched.
    queued_count: u64,
    abandoned: bool,
}

#[derive(Debug)]
struct Shared {
    layer: LayerId,
    state: Mutex<QueueState>,
    /// Signalled when space frees up or the queue is abandoned.
    space: Condvar,
}

/// Consumer end of a layer's buffer queue.
#[derive(Debug)]
pub(crate) struct BufferQueue {
    shared: Arc<Shared>,
}

impl BufferQueue {
    /// Creates a queue for `layer`. A zero capacity is promoted to one.
    pub(crate) fn new(
        layer: LayerId,
        capacity: usize,
        default_size: (u32, u32),
        format: PixelFormat,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                layer,
                state: Mutex::new(QueueState {
                    items: VecDeque::with_capacity(capacity),
                    capacity,
                    default_size,
                    format,
                    queued_count: 0,
                    abandoned: false,
                }),
                space: Condvar::new(),
            }),
        }
    }

    /// Returns a new producer handle for this queue.
    pub(crate) fn producer(&self) -> BufferProducer {
        BufferProducer {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Removes every queued buffer, oldest first, and wakes blocked producers.
    pub(crate) fn acquire_all(&self) -> Vec<Arc<GraphicBuffer>> {
        let mut st = self.shared.state.lock();
        let drained: Vec<_> = st.items.drain(..).collect();
        if !drained.is_empty() {
            self.shared.space.notify_all();
        }
        drained
    }

    /// Changes the size handed out by [`BufferProducer::dequeue_buffer`].
    pub(crate) fn set_default_size(&self, width: u32, height: u32) {
        self.shared.state.lock().default_size = (width, height);
    }

    /// Drops queued buffers and fails current and future producer calls.
    pub(crate) fn abandon(&self) {
        let mut st = self.shared.state.lock();
        st.abandoned = true;
        st.items.clear();
        self.shared.space.notify_all();
    }

    /// Buffers queued and not yet latched.
    pub(crate) fn depth(&self) -> usize {
        self.shared.state.lock().items.len()
    }
}

/// Producer end of a layer's buffer queue.
///
/// Cloneable and `Send`; every clone feeds the same queue.
#[derive(Clone, Debug)]
pub struct BufferProducer {
    shared: Arc<Shared>,
}

impl BufferProducer {
    /// The layer this producer draws into.
    #[inline]
    #[must_use]
    pub fn layer(&self) -> LayerId {
        self.shared.layer
    }

    /// Returns a blank buffer of the layer's current default size and format.
    ///
    /// The default size follows the last committed `set_size`.
    pub fn dequeue_buffer(&self) -> Result<GraphicBuffer> {
        let (size, format) = {
            let st = self.shared.state.lock();
            if st.abandoned {
                return Err(StratumError::UnknownHandle(self.shared.layer));
            }
            (st.default_size, st.format)
        };
        GraphicBuffer::new(size.0, size.1, format)
    }

    /// The size [`dequeue_buffer`](Self::dequeue_buffer) currently hands out.
    #[must_use]
    pub fn default_size(&self) -> (u32, u32) {
        self.shared.state.lock().default_size
    }

    /// The frame number the next queued buffer will carry once latched.
    #[must_use]
    pub fn next_frame_number(&self) -> FrameNumber {
        FrameNumber(self.shared.state.lock().queued_count).next()
    }

    /// Queues a filled buffer, blocking while the queue is full.
    ///
    /// Returns the frame number the buffer will carry once latched. Fails
    /// with [`StratumError::UnknownHandle`] if the layer is destroyed, before
    /// or while waiting.
    pub fn queue_buffer(&self, buffer: GraphicBuffer) -> Result<FrameNumber> {
        self.queue_inner(buffer, None)
    }

    /// Like [`queue_buffer`](Self::queue_buffer), but gives up with
    /// [`StratumError::BackpressureTimeout`] once `timeout` has passed.
    pub fn queue_buffer_timeout(
        &self,
        buffer: GraphicBuffer,
        timeout: Duration,
    ) -> Result<FrameNumber> {
        self.queue_inner(buffer, Some(Instant::now() + timeout))
    }

    fn queue_inner(&self, buffer: GraphicBuffer, deadline: Option<Instant>) -> Result<FrameNumber> {
        let layer = self.shared.layer;
        let mut st = self.shared.state.lock();
        if buffer.format() != st.format {
            return Err(StratumError::InvalidBuffer(
                "buffer format does not match the layer",
            ));
        }
        while !st.abandoned && st.items.len() >= st.capacity {
            match deadline {
                Some(deadline) => {
                    if self.shared.space.wait_until(&mut st, deadline).timed_out()
                        && !st.abandoned
                        && st.items.len() >= st.capacity
                    {
                        tracing::warn!(
                            ?layer,
                            depth = st.items.len(),
                            "buffer queue backpressure timeout"
                        );
                        return Err(StratumError::BackpressureTimeout {
                            layer,
                            depth: st.items.len(),
                        });
                    }
                }
                None => self.shared.space.wait(&mut st),
            }
        }
        if st.abandoned {
            return Err(StratumError::UnknownHandle(layer));
        }
        st.queued_count += 1;
        st.items.push_back(Arc::new(buffer));
        let frame = FrameNumber(st.queued_count);
        tracing::trace!(?layer, ?frame, depth = st.items.len(), "buffer queued");
        Ok(frame)
    }
}
