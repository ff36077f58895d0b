// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Headless composition walkthrough.
//!
//! Builds a background layer and a foreground square, then moves the square,
//! fades it, and finally parks a resize behind the square's next buffer. Each
//! step renders the main display and prints a few probe pixels. Trace events
//! go to stdout through a
//! [`PrettyPrintSink`](stratum_debug::pretty::PrettyPrintSink); `tracing`
//! output is controlled by `RUST_LOG`.

use stratum_composer::{BufferProducer, Composer, ComposerConfig};
use stratum_core::Result;
use stratum_core::buffer::PixelFormat;
use stratum_core::display::DisplayId;
use stratum_core::layer::LayerId;
use stratum_core::scene::CloseOutcome;
use stratum_debug::pretty::PrettyPrintSink;
use tracing_subscriber::EnvFilter;

const BACKGROUND: [u8; 4] = [63, 195, 63, 255];
const FOREGROUND: [u8; 4] = [195, 63, 63, 255];

const PROBES: [(u32, u32); 4] = [(32, 32), (64, 64), (100, 100), (200, 200)];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let composer = Composer::new(ComposerConfig::headless(256, 256))?;
    let sink = PrettyPrintSink::new(Box::new(std::io::stdout()));
    composer.set_trace_sink(Some(Box::new(sink)));

    let (bg, bg_producer) = composer.create_layer(256, 256, PixelFormat::Rgba8888)?;
    let (fg, fg_producer) = composer.create_layer(64, 64, PixelFormat::Rgba8888)?;
    fill_and_queue(&bg_producer, BACKGROUND)?;
    fill_and_queue(&fg_producer, FOREGROUND)?;

    let tx = composer.open_transaction();
    composer.set_layer_z(tx, bg, i32::MAX - 2)?;
    composer.set_layer_z(tx, fg, i32::MAX - 1)?;
    composer.set_position(tx, fg, 64.0, 64.0)?;
    composer.close_transaction(tx, true)?;
    report(&composer, "initial")?;

    let tx = composer.open_transaction();
    composer.set_position(tx, fg, 128.0, 128.0)?;
    composer.close_transaction(tx, true)?;
    report(&composer, "moved")?;

    let tx = composer.open_transaction();
    composer.set_alpha(tx, fg, 0.75)?;
    composer.close_transaction(tx, true)?;
    report(&composer, "alpha 0.75")?;

    deferred_resize(&composer, fg, &fg_producer)?;
    report(&composer, "deferred resize applied")?;

    Ok(())
}

/// Parks a resize behind the foreground's next frame, then produces that frame.
fn deferred_resize(composer: &Composer, fg: LayerId, producer: &BufferProducer) -> Result<()> {
    let frame = producer.next_frame_number();
    let tx = composer.open_transaction();
    composer.set_size(tx, fg, 128, 128)?;
    composer.defer_transaction_until(tx, fg, frame)?;
    if let CloseOutcome::Deferred { target, frame, .. } = composer.close_transaction(tx, false)? {
        println!("resize waits for {target:?} to reach frame {}", frame.0);
    }
    report(composer, "resize pending")?;

    // Still 64x64: the resize is not committed until this frame latches.
    fill_and_queue(producer, FOREGROUND)?;
    composer.latch_buffers();
    for resolution in composer.take_resolved() {
        println!("{:?} -> {:?}", resolution.transaction, resolution.status);
    }

    // Dequeue now follows the committed size.
    fill_and_queue(producer, FOREGROUND)
}

fn fill_and_queue(producer: &BufferProducer, rgba: [u8; 4]) -> Result<()> {
    let mut buffer = producer.dequeue_buffer()?;
    buffer.fill(rgba);
    producer.queue_buffer(buffer)?;
    Ok(())
}

fn report(composer: &Composer, label: &str) -> Result<()> {
    let image = composer.render_display(DisplayId::MAIN)?;
    println!("== {label}");
    for (x, y) in PROBES {
        if let Some([r, g, b, a]) = image.pixel(x, y) {
            println!("  ({x:>3}, {y:>3}) = {r:>3} {g:>3} {b:>3} {a:>3}");
        }
    }
    tracing::info!(label, "rendered");
    Ok(())
}
