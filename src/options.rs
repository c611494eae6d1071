// Copyright 2021 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Table configuration.

/// Options controlling how a [`crate::table::Table`] handles on-disk
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// On open, ignore any existing on-disk state for this table
    /// rather than loading it.
    pub delete_existing: bool,
    /// Suppress all I/O; `Table::save`/`Table::open` become no-ops
    /// (open always yields an empty table).
    pub in_memory: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            delete_existing: false,
            in_memory: false,
        }
    }
}
