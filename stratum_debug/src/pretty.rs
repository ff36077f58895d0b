// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use stratum_core::trace::{
    CommitEvent, DeferEvent, LatchEvent, RenderPassEvent, ResolveEvent, ResolveKind, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write + Send>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn resolve_name(kind: ResolveKind) -> &'static str {
    match kind {
        ResolveKind::Applied => "applied",
        ResolveKind::Cancelled => "cancelled",
        ResolveKind::Rejected => "rejected",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_commit(&mut self, e: &CommitEvent) {
        let origin = if e.from_deferral { "deferred" } else { "direct" };
        let _ = writeln!(
            self.writer,
            "[commit] txn={} diffs={} layers={} {origin}",
            e.transaction.0, e.diffs, e.layers,
        );
    }

    fn on_defer(&mut self, e: &DeferEvent) {
        let _ = writeln!(
            self.writer,
            "[defer] txn={} until layer={} frame={}",
            e.transaction.0,
            e.target.index(),
            e.frame.0,
        );
    }

    fn on_resolve(&mut self, e: &ResolveEvent) {
        let _ = writeln!(
            self.writer,
            "[resolve] txn={} layer={} {}",
            e.transaction.0,
            e.target.index(),
            resolve_name(e.kind),
        );
    }

    fn on_latch(&mut self, e: &LatchEvent) {
        let (w, h) = e.buffer_size;
        let resized = match e.resized_to {
            Some((rw, rh)) => format!(" resized={rw}x{rh}"),
            None => String::new(),
        };
        let _ = writeln!(
            self.writer,
            "[latch] layer={} frame={} buffer={w}x{h}{resized}",
            e.layer.index(),
            e.frame_number.0,
        );
    }

    fn on_render_pass(&mut self, e: &RenderPassEvent) {
        let _ = writeln!(
            self.writer,
            "[render] display={} drawn={} skipped={}",
            e.display.0, e.drawn, e.skipped,
        );
    }
}
