// Copyright 2021 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Named column catalogue, row-count bookkeeping, and persistence.

use std::collections::{HashMap, VecDeque};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::bitvector::BitVector;
use crate::column::{AppendOutcome, Column};
use crate::error::{Error, Result};
use crate::persist;
use crate::{Code, ColumnId, ColumnType, Options, TupleId, DEFAULT_BLOCK_CODES};

/// A table owns a named catalogue of [`Column`]s that share a common
/// row count. Column ids are reused from a free-list on removal
/// (`table.cpp`'s `free_column_ids`), so `GetMaxColumnId` stays
/// `columns.len() + free_column_ids.len()` regardless of how many
/// columns have come and gone.
pub struct Table {
    name: String,
    options: Options,
    columns: HashMap<String, Column>,
    free_column_ids: VecDeque<ColumnId>,
    num_rows: usize,
    block_codes: usize,
}

impl Table {
    /// Create an empty table using the default block size.
    pub fn new(name: impl Into<String>, options: Options) -> Self {
        Self::with_block_codes(name, options, DEFAULT_BLOCK_CODES)
    }

    /// Create an empty table with a caller-chosen per-block code
    /// capacity, letting tests exercise block-boundary behavior at
    /// small sizes without waiting on the default capacity to fill.
    pub fn with_block_codes(name: impl Into<String>, options: Options, block_codes: usize) -> Self {
        Table {
            name: name.into(),
            options,
            columns: HashMap::new(),
            free_column_ids: VecDeque::new(),
            num_rows: 0,
            block_codes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// The smallest id guaranteed not to collide with any id ever
    /// handed out without being reclaimed.
    pub fn max_column_id(&self) -> usize {
        self.columns.len() + self.free_column_ids.len()
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn get_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.get_mut(name)
    }

    /// Add a new, empty column. Reuses a reclaimed id if the free-list
    /// is non-empty, otherwise mints `columns.len()` (always the
    /// lowest id not currently in use, since ids are reclaimed in
    /// `remove_column`).
    pub fn add_column(&mut self, name: &str, column_type: ColumnType, width: u32) -> Result<()> {
        if self.columns.contains_key(name) {
            return Err(Error::usage_error(format!(
                "table {:?}: column {:?} already exists",
                self.name, name
            )));
        }
        let id = self.free_column_ids.pop_front().unwrap_or(self.columns.len());
        log::debug!(
            "table {:?}: adding column {:?} (id {}, type {:?}, width {})",
            self.name,
            name,
            id,
            column_type,
            width
        );
        let column = Column::new(id, column_type, width, self.block_codes)?;
        self.columns.insert(name.to_string(), column);
        Ok(())
    }

    /// Remove a column, returning its id to the free-list for reuse.
    pub fn remove_column(&mut self, name: &str) -> Result<()> {
        let column = self
            .columns
            .remove(name)
            .ok_or_else(|| Error::usage_error(format!("table {:?}: no such column {:?}", self.name, name)))?;
        log::debug!("table {:?}: removing column {:?} (id {})", self.name, name, column.id());
        self.free_column_ids.push_back(column.id());
        Ok(())
    }

    /// Append `codes` to the named column, recovering from a
    /// width-exceeded failure by rebuilding the column at the
    /// suggested width and replaying the same batch, then separately
    /// shrinking the column if the batch's observed maximum no longer
    /// needs the configured width.
    pub fn append_to_column(&mut self, name: &str, codes: &[Code]) -> Result<AppendOutcome> {
        if !self.columns.contains_key(name) {
            return Err(Error::usage_error(format!("table {:?}: no such column {:?}", self.name, name)));
        }
        let mut outcome = {
            let column = self.columns.get_mut(name).unwrap();
            match column.append(codes) {
                Ok(outcome) => outcome,
                Err(Error::WidthExceeded { suggested }) => {
                    log::warn!(
                        "table {:?}: column {:?} exceeded its configured width, rebuilding at {}",
                        self.name,
                        name,
                        suggested
                    );
                    let rebuilt = column.rebuild_at_width(suggested)?;
                    *column = rebuilt;
                    column.append(codes)?
                }
                Err(e) => return Err(e),
            }
        };

        if !outcome.fits_in_width {
            let column = self.columns.get_mut(name).unwrap();
            log::debug!(
                "table {:?}: shrinking column {:?} to width {}",
                self.name,
                name,
                outcome.suggested_width
            );
            let rebuilt = column.rebuild_at_width(outcome.suggested_width)?;
            *column = rebuilt;
            outcome = AppendOutcome {
                fits_in_width: true,
                suggested_width: outcome.suggested_width,
            };
        }

        let num_values = self.columns.get(name).unwrap().num_values();
        if num_values > self.num_rows {
            self.num_rows = num_values;
        }
        Ok(outcome)
    }

    /// A fresh all-zero bit-vector spanning every row in the table.
    pub fn create_bit_vector(&self) -> BitVector {
        BitVector::with_block_codes(self.num_rows, self.block_codes)
    }

    /// A row cursor over every row (`bv = None`) or only the rows set
    /// in `bv`, combining set-bit enumeration with per-column code
    /// access.
    pub fn create_iterator<'a>(&'a self, bv: Option<&'a BitVector>) -> RowIterator<'a> {
        let positions: Vec<TupleId> = match bv {
            Some(bv) => bv.iter_set_bits().collect(),
            None => (0..self.num_rows).collect(),
        };
        RowIterator { positions, cursor: 0, bv }
    }

    /// Persist this table under `dir` in this crate's wire format. A
    /// no-op for an `in_memory` table, which suppresses all I/O.
    pub fn save(&self, dir: &Path) -> Result<()> {
        if self.options.in_memory {
            return Ok(());
        }
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        let mut columns_meta: Vec<(String, ColumnType, u32)> = self
            .columns
            .iter()
            .map(|(name, column)| (name.clone(), column.column_type(), column.width()))
            .collect();
        columns_meta.sort_by(|a, b| a.0.cmp(&b.0));
        persist::save_meta(dir, self.num_rows, &columns_meta)?;
        for (name, column) in &self.columns {
            let path = persist::column_path(dir, name);
            let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
            let mut w = BufWriter::new(file);
            column.save_to(&mut w, &path)?;
            w.flush().map_err(|e| Error::io(&path, e))?;
        }
        log::trace!("table {:?}: saved {} columns to {}", self.name, self.columns.len(), dir.display());
        Ok(())
    }

    /// Open a table previously written by [`Table::save`].
    /// `options.in_memory` suppresses all I/O and always yields a
    /// fresh, empty table, never touching `dir`. Otherwise
    /// `options.delete_existing` discards any on-disk state and
    /// returns a fresh, empty table rooted at `dir`.
    pub fn open(dir: &Path, options: Options) -> Result<Table> {
        let name = dir.to_string_lossy().into_owned();
        if options.in_memory {
            return Ok(Table::new(name, options));
        }
        if options.delete_existing {
            persist::delete_existing(dir)?;
            return Ok(Table::new(name, options));
        }
        let (num_rows, columns_meta) = persist::load_meta(dir)?;
        let mut columns = HashMap::new();
        for (id, (col_name, column_type, width)) in columns_meta.into_iter().enumerate() {
            let path = persist::column_path(dir, &col_name);
            let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
            let mut r = std::io::BufReader::new(file);
            let column = Column::load_from(&mut r, &path, id, column_type, width, DEFAULT_BLOCK_CODES, num_rows)?;
            columns.insert(col_name, column);
        }
        log::trace!("table {:?}: opened {} columns from {}", name, columns.len(), dir.display());
        Ok(Table {
            name,
            options,
            columns,
            free_column_ids: VecDeque::new(),
            num_rows,
            block_codes: DEFAULT_BLOCK_CODES,
        })
    }
}

/// A row cursor produced by [`Table::create_iterator`]: either every
/// row in the table, or only the rows a prior scan's [`BitVector`]
/// marked. Column access is by direct addressing (`Column::get_code`)
/// rather than a stateful per-column accessor — both are O(1) per
/// call, and this keeps the public surface independent of how many
/// columns a caller reads through the same cursor.
pub struct RowIterator<'a> {
    positions: Vec<TupleId>,
    cursor: usize,
    bv: Option<&'a BitVector>,
}

impl<'a> RowIterator<'a> {
    /// Reset the cursor to the first qualifying row.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Move to the next qualifying row. Returns `false` once the
    /// cursor has moved past the last row.
    pub fn advance(&mut self) -> bool {
        if self.cursor >= self.positions.len() {
            return false;
        }
        self.cursor += 1;
        self.cursor < self.positions.len()
    }

    fn current_position(&self) -> Result<TupleId> {
        self.positions
            .get(self.cursor)
            .copied()
            .ok_or_else(|| Error::usage_error("row iterator advanced past its end"))
    }

    /// Current row's value in `column`.
    pub fn get_code(&self, column: &Column) -> Result<Code> {
        column.get_code(self.current_position()?)
    }

    /// Overwrite the current row's value in `column`.
    pub fn set_code(&mut self, column: &mut Column, code: Code) -> Result<()> {
        column.set_code(self.current_position()?, code)
    }

    /// Copy this iterator's underlying bit-vector into a dense LSB-first
    /// bitmap. Only meaningful for an iterator created over a
    /// bit-vector (`Table::create_iterator(Some(bv))`).
    pub fn fill_into_dense_bitmap(&self, out: &mut [u8]) -> Result<()> {
        match self.bv {
            Some(bv) => {
                bv.fill_into_dense_bitmap(out);
                Ok(())
            }
            None => Err(Error::usage_error(
                "fill_into_dense_bitmap requires an iterator created over a bit-vector",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CombineOp, Comparator};

    #[test]
    fn add_remove_column_reuses_ids() {
        let mut table = Table::new("t", Options::default());
        table.add_column("a", ColumnType::Horizontal, 4).unwrap();
        table.add_column("b", ColumnType::Horizontal, 4).unwrap();
        assert_eq!(table.get_column("a").unwrap().id(), 0);
        assert_eq!(table.get_column("b").unwrap().id(), 1);
        table.remove_column("a").unwrap();
        table.add_column("c", ColumnType::Horizontal, 4).unwrap();
        assert_eq!(table.get_column("c").unwrap().id(), 0);
        assert_eq!(table.max_column_id(), 2);
    }

    #[test]
    fn duplicate_column_name_rejected() {
        let mut table = Table::new("t", Options::default());
        table.add_column("a", ColumnType::Naive, 64).unwrap();
        assert!(matches!(
            table.add_column("a", ColumnType::Naive, 64),
            Err(Error::UsageError(_))
        ));
    }

    #[test]
    fn append_tracks_num_rows_and_promotes_width_s5() {
        let mut table = Table::new("t", Options::default());
        table.add_column("a", ColumnType::Horizontal, 3).unwrap();
        table.append_to_column("a", &[1, 2, 3]).unwrap();
        assert_eq!(table.num_rows(), 3);

        table.append_to_column("a", &[8]).unwrap();
        assert_eq!(table.num_rows(), 4);
        let col = table.get_column("a").unwrap();
        assert_eq!(col.width(), 4);
        for (i, expected) in [1u64, 2, 3, 8].into_iter().enumerate() {
            assert_eq!(col.get_code(i).unwrap(), expected);
        }
    }

    #[test]
    fn append_shrinks_width_when_batch_fits_smaller() {
        let mut table = Table::new("t", Options::default());
        table.add_column("a", ColumnType::Vertical, 8).unwrap();
        table.append_to_column("a", &[1, 2, 3]).unwrap();
        assert_eq!(table.get_column("a").unwrap().width(), 2);
    }

    #[test]
    fn row_iterator_over_full_table_and_over_bitvector() {
        let mut table = Table::with_block_codes("t", Options::default(), 64);
        table.add_column("a", ColumnType::Horizontal, 4).unwrap();
        table.append_to_column("a", &(0..200u64).map(|i| i % 16).collect::<Vec<_>>()).unwrap();

        let mut it = table.create_iterator(None);
        let mut count = 0;
        loop {
            let col = table.get_column("a").unwrap();
            it.get_code(col).unwrap();
            count += 1;
            if !it.advance() {
                break;
            }
        }
        assert_eq!(count, 200);

        let mut bv = table.create_bit_vector();
        table.get_column("a").unwrap().scan(Comparator::Eq, 5, &mut bv, CombineOp::Set).unwrap();
        let matches = bv.count();
        let it2 = table.create_iterator(Some(&bv));
        let col = table.get_column("a").unwrap();
        let mut seen = 0;
        let mut cursor = it2;
        loop {
            assert_eq!(col.get_code(cursor.current_position().unwrap()).unwrap(), 5);
            seen += 1;
            if !cursor.advance() {
                break;
            }
        }
        assert_eq!(seen, matches);
    }

    #[test]
    fn open_in_memory_never_touches_disk() {
        let dir = std::env::temp_dir().join(format!("bwcol_table_test_in_memory_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        assert!(!dir.exists());

        let table = Table::open(&dir, Options { delete_existing: false, in_memory: true }).unwrap();
        assert_eq!(table.num_rows(), 0);
        assert!(!dir.exists());
    }

    #[test]
    fn save_in_memory_is_a_silent_no_op() {
        let dir = std::env::temp_dir().join(format!("bwcol_table_test_save_in_memory_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let mut table = Table::new("t", Options { delete_existing: false, in_memory: true });
        table.add_column("a", ColumnType::Naive, 64).unwrap();
        table.append_to_column("a", &[1, 2, 3]).unwrap();
        table.save(&dir).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn save_and_open_round_trip() {
        let dir = std::env::temp_dir().join(format!("bwcol_table_test_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let mut table = Table::new("t", Options { delete_existing: false, in_memory: false });
        table.add_column("a", ColumnType::Horizontal, 4).unwrap();
        table.add_column("b", ColumnType::Naive, 64).unwrap();
        table.append_to_column("a", &[1, 2, 3, 4, 5]).unwrap();
        table.append_to_column("b", &[10, 20, 30, 40, 50]).unwrap();
        table.save(&dir).unwrap();

        let reopened = Table::open(&dir, Options { delete_existing: false, in_memory: false }).unwrap();
        assert_eq!(reopened.num_rows(), 5);
        let a = reopened.get_column("a").unwrap();
        let b = reopened.get_column("b").unwrap();
        for i in 0..5 {
            assert_eq!(a.get_code(i).unwrap(), (i as u64) + 1);
            assert_eq!(b.get_code(i).unwrap(), (i as u64 + 1) * 10);
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
