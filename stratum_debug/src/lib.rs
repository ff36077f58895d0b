// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnostics output for stratum.
//!
//! This crate provides [`TraceSink`](stratum_core::trace::TraceSink)
//! implementations for development:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.

pub mod pretty;
