// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Threaded composition service for stratum.
//!
//! [`Composer`] wraps a [`Scene`](stratum_core::scene::Scene) in a single
//! commit lock and gives every layer a bounded buffer queue:
//!
//! - Callers open a transaction, issue setters against it, and close it. A
//!   closed transaction either commits at once or waits for another layer's
//!   buffer to reach a frame number.
//! - Drawing clients fill buffers from a [`BufferProducer`] and queue them.
//!   Producers block once `buffer_queue_depth` buffers are waiting.
//! - [`Composer::render_display`] latches everything queued, snapshots the
//!   committed state, and composes it into an
//!   [`RgbaImage`](stratum_render::RgbaImage).
//!
//! Diagnostics go to `tracing` and, when installed, to a
//! [`TraceSink`](stratum_core::trace::TraceSink).
//!
//! ```no_run
//! use stratum_composer::{Composer, ComposerConfig};
//! use stratum_core::buffer::PixelFormat;
//! use stratum_core::display::DisplayId;
//!
//! # fn main() -> stratum_core::Result<()> {
//! let composer = Composer::new(ComposerConfig::headless(256, 256))?;
//! let (layer, producer) = composer.create_layer(64, 64, PixelFormat::Rgba8888)?;
//!
//! let mut buffer = producer.dequeue_buffer()?;
//! buffer.fill([195, 63, 63, 255]);
//! producer.queue_buffer(buffer)?;
//!
//! let tx = composer.open_transaction();
//! composer.set_position(tx, layer, 64.0, 64.0)?;
//! composer.close_transaction(tx, true)?;
//!
//! let image = composer.render_display(DisplayId::MAIN)?;
//! assert_eq!(image.pixel(64, 64), Some([195, 63, 63, 255]));
//! # Ok(())
//! # }
//! ```

mod composer;
mod config;
mod queue;


pub use composer::Composer;
pub use config::ComposerConfig;
pub use queue::BufferProducer;
