// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display identification and the active layer-stack table.
//!
//! [`DisplayId`] is a lightweight handle for a composition target. Each
//! display selects one layer stack; only layers on that stack are eligible for
//! composition on it.

use alloc::collections::BTreeMap;
use core::fmt;

use crate::error::{Result, StratumError};

/// Identifies a display (composition target).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DisplayId(pub u32);

impl DisplayId {
    /// The built-in display.
    pub const MAIN: Self = Self(0);
}

impl fmt::Debug for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayId({})", self.0)
    }
}

/// Committed state of one display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DisplayState {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Layer stack currently shown on this display.
    pub layer_stack: u32,
}

/// All registered displays, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct DisplayTable {
    displays: BTreeMap<DisplayId, DisplayState>,
    next_id: u32,
}

impl DisplayTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a display showing layer stack 0 and returns its id.
    ///
    /// The first display created receives [`DisplayId::MAIN`].
    pub fn create(&mut self, width: u32, height: u32) -> Result<DisplayId> {
        if width == 0 || height == 0 {
            return Err(StratumError::InvalidArgument(
                "display dimensions must be positive",
            ));
        }
        let id = DisplayId(self.next_id);
        self.next_id += 1;
        self.displays.insert(
            id,
            DisplayState {
                width,
                height,
                layer_stack: 0,
            },
        );
        Ok(id)
    }

    /// Unregisters a display.
    pub fn remove(&mut self, id: DisplayId) -> Result<DisplayState> {
        self.displays
            .remove(&id)
            .ok_or(StratumError::UnknownDisplay(id))
    }

    /// Returns the committed state of a display.
    pub fn get(&self, id: DisplayId) -> Result<DisplayState> {
        self.displays
            .get(&id)
            .copied()
            .ok_or(StratumError::UnknownDisplay(id))
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: DisplayId) -> bool {
        self.displays.contains_key(&id)
    }

    pub(crate) fn set_layer_stack(&mut self, id: DisplayId, layer_stack: u32) {
        if let Some(d) = self.displays.get_mut(&id) {
            d.layer_stack = layer_stack;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_display_is_main() {
        let mut table = DisplayTable::new();
        let main = table.create(256, 256).unwrap();
        let second = table.create(64, 64).unwrap();
        assert_eq!(main, DisplayId::MAIN);
        assert_ne!(main, second);
        assert_eq!(table.get(main).unwrap().layer_stack, 0);
    }

    #[test]
    fn removed_display_is_unknown() {
        let mut table = DisplayTable::new();
        let id = table.create(8, 8).unwrap();
        table.remove(id).unwrap();
        assert_eq!(table.get(id), Err(StratumError::UnknownDisplay(id)));
    }

    #[test]
    fn zero_sized_display_rejected() {
        let mut table = DisplayTable::new();
        assert!(matches!(
            table.create(0, 10),
            Err(StratumError::InvalidArgument(_))
        ));
    }
}
