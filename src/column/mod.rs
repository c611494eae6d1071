// Copyright 2021 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Column storage: width-specialized blocks, per-type dispatch, and
//! column-level scan/append coordination.
//!
//! A [`Column`] is a tagged variant over `(ColumnType, width)` rather
//! than a trait object: all blocks of a given column share the same
//! concrete, monomorphized block type, so scans never pay for dynamic
//! dispatch. The 32 widths a [`HColumnBlock`]/[`VColumnBlock`] can be
//! instantiated at are enumerated once via `width_variants!`.

pub mod horizontal;
pub mod iter;
pub mod naive;
pub mod vertical;

use std::io::{Read, Write};
use std::path::Path;

use crate::bits::required_width;
use crate::bitvector::{BitVector, BitVectorBlock};
use crate::column::horizontal::HColumnBlock;
use crate::column::iter::{HCodeIter, VCodeIter};
use crate::column::naive::NaiveColumnBlock;
use crate::column::vertical::VColumnBlock;
use crate::error::{Error, Result};
use crate::persist::{read_u64, read_words, write_u64, write_words};
use crate::{Code, ColumnId, ColumnType, CombineOp, Comparator};

/// Combine a freshly computed `word` into `bvb`'s word at `word_id`
/// per `combine`, without writing it back — callers still call
/// `bvb.set_word_unit`.
pub(crate) fn apply_combine(
    combine: CombineOp,
    word: u64,
    bvb: &BitVectorBlock,
    word_id: usize,
) -> Result<u64> {
    Ok(match combine {
        CombineOp::Set => word,
        CombineOp::And => word & bvb.get_word_unit(word_id)?,
        CombineOp::Or => word | bvb.get_word_unit(word_id)?,
    })
}

/// Outcome of a successful append. `suggested_width` names the
/// minimum width sufficient for every code observed so far;
/// `fits_in_width` is `false` when that is strictly less than the
/// column's configured width, i.e. a shrink rebuild would be
/// profitable. Append failure due to an over-wide code is instead
/// modeled as `Err(Error::WidthExceeded { .. })`, keeping overflow out
/// of this success-only outcome type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AppendOutcome {
    pub fits_in_width: bool,
    pub suggested_width: u32,
}

/// Common operations every concrete column block type (Naive, H, V)
/// implements identically in shape, letting [`ColumnBlocks`] hold the
/// column-level append/scan coordination logic exactly once instead
/// of once per storage kind.
pub(crate) trait ColumnBlockOps: Sized {
    /// Configured bit width of this block type. `64` for `Naive`,
    /// which stores whole `u64` codes and never rejects a value.
    const WIDTH: u32;

    /// Whether this block type persists a `num_used_words` field
    /// (naive omits it).
    const HAS_NUM_USED_WORDS: bool;

    fn new(capacity: usize) -> Self;
    fn num(&self) -> usize;
    fn max_code(&self) -> u64;
    fn append(&mut self, codes: &[Code]) -> Result<()>;
    fn get_code(&self, pos: usize) -> Result<Code>;
    fn set_code(&mut self, pos: usize, code: Code) -> Result<()>;
    fn scan(
        &self,
        cmp: Comparator,
        literal: Code,
        bvb: &mut BitVectorBlock,
        combine: CombineOp,
    ) -> Result<()>;
    fn scan_column(
        &self,
        cmp: Comparator,
        other: &Self,
        bvb: &mut BitVectorBlock,
        combine: CombineOp,
    ) -> Result<()>;

    /// Raw backing words, in persisted order.
    fn raw_words(&self) -> Vec<u64>;
    /// `Some(n)` for H/V layouts, `None` for `Naive` (format omits it).
    fn num_used_words(&self) -> Option<usize>;
    /// Reconstruct a block from its persisted fields. `max_code` may
    /// be a placeholder (`0`); callers recompute it via `set_code`
    /// after construction since the wire format does not carry it.
    fn from_raw(capacity: usize, num: usize, num_used_words: Option<usize>, max_code: u64, words: Vec<u64>) -> Self;
}

impl ColumnBlockOps for NaiveColumnBlock {
    const WIDTH: u32 = 64;
    const HAS_NUM_USED_WORDS: bool = false;

    fn raw_words(&self) -> Vec<u64> {
        NaiveColumnBlock::raw_words(self).to_vec()
    }
    fn num_used_words(&self) -> Option<usize> {
        None
    }
    fn from_raw(capacity: usize, num: usize, _num_used_words: Option<usize>, max_code: u64, words: Vec<u64>) -> Self {
        NaiveColumnBlock::from_raw(num, capacity, max_code, words)
    }

    fn new(capacity: usize) -> Self {
        NaiveColumnBlock::new(capacity)
    }
    fn num(&self) -> usize {
        NaiveColumnBlock::num(self)
    }
    fn max_code(&self) -> u64 {
        NaiveColumnBlock::max_code(self)
    }
    fn append(&mut self, codes: &[Code]) -> Result<()> {
        NaiveColumnBlock::append(self, codes)
    }
    fn get_code(&self, pos: usize) -> Result<Code> {
        NaiveColumnBlock::get_code(self, pos)
    }
    fn set_code(&mut self, pos: usize, code: Code) -> Result<()> {
        NaiveColumnBlock::set_code(self, pos, code)
    }
    fn scan(
        &self,
        cmp: Comparator,
        literal: Code,
        bvb: &mut BitVectorBlock,
        combine: CombineOp,
    ) -> Result<()> {
        NaiveColumnBlock::scan(self, cmp, literal, bvb, combine)
    }
    fn scan_column(
        &self,
        cmp: Comparator,
        other: &Self,
        bvb: &mut BitVectorBlock,
        combine: CombineOp,
    ) -> Result<()> {
        NaiveColumnBlock::scan_column(self, cmp, other, bvb, combine)
    }
}

impl<const K: u32> ColumnBlockOps for HColumnBlock<K> {
    const WIDTH: u32 = K;
    const HAS_NUM_USED_WORDS: bool = true;

    fn raw_words(&self) -> Vec<u64> {
        HColumnBlock::<K>::raw_words(self).to_vec()
    }
    fn num_used_words(&self) -> Option<usize> {
        Some(HColumnBlock::<K>::num_used_words_raw(self))
    }
    fn from_raw(capacity: usize, num: usize, num_used_words: Option<usize>, max_code: u64, words: Vec<u64>) -> Self {
        HColumnBlock::<K>::from_raw(capacity, num, num_used_words.unwrap_or(0), max_code, words)
    }

    fn new(capacity: usize) -> Self {
        HColumnBlock::<K>::new(capacity)
    }
    fn num(&self) -> usize {
        HColumnBlock::<K>::num(self)
    }
    fn max_code(&self) -> u64 {
        HColumnBlock::<K>::max_code(self)
    }
    fn append(&mut self, codes: &[Code]) -> Result<()> {
        HColumnBlock::<K>::append(self, codes)
    }
    fn get_code(&self, pos: usize) -> Result<Code> {
        HColumnBlock::<K>::get_code(self, pos)
    }
    fn set_code(&mut self, pos: usize, code: Code) -> Result<()> {
        HColumnBlock::<K>::set_code(self, pos, code)
    }
    fn scan(
        &self,
        cmp: Comparator,
        literal: Code,
        bvb: &mut BitVectorBlock,
        combine: CombineOp,
    ) -> Result<()> {
        HColumnBlock::<K>::scan(self, cmp, literal, bvb, combine)
    }
    fn scan_column(
        &self,
        cmp: Comparator,
        other: &Self,
        bvb: &mut BitVectorBlock,
        combine: CombineOp,
    ) -> Result<()> {
        HColumnBlock::<K>::scan_column(self, cmp, other, bvb, combine)
    }
}

impl<const K: u32> ColumnBlockOps for VColumnBlock<K> {
    const WIDTH: u32 = K;
    const HAS_NUM_USED_WORDS: bool = true;

    fn raw_words(&self) -> Vec<u64> {
        VColumnBlock::<K>::raw_words(self)
    }
    fn num_used_words(&self) -> Option<usize> {
        Some(VColumnBlock::<K>::num_used_words_raw(self))
    }
    fn from_raw(capacity: usize, num: usize, num_used_words: Option<usize>, max_code: u64, words: Vec<u64>) -> Self {
        VColumnBlock::<K>::from_raw(capacity, num, num_used_words.unwrap_or(0), max_code, &words)
    }

    fn new(capacity: usize) -> Self {
        VColumnBlock::<K>::new(capacity)
    }
    fn num(&self) -> usize {
        VColumnBlock::<K>::num(self)
    }
    fn max_code(&self) -> u64 {
        VColumnBlock::<K>::max_code(self)
    }
    fn append(&mut self, codes: &[Code]) -> Result<()> {
        VColumnBlock::<K>::append(self, codes)
    }
    fn get_code(&self, pos: usize) -> Result<Code> {
        VColumnBlock::<K>::get_code(self, pos)
    }
    fn set_code(&mut self, pos: usize, code: Code) -> Result<()> {
        VColumnBlock::<K>::set_code(self, pos, code)
    }
    fn scan(
        &self,
        cmp: Comparator,
        literal: Code,
        bvb: &mut BitVectorBlock,
        combine: CombineOp,
    ) -> Result<()> {
        VColumnBlock::<K>::scan(self, cmp, literal, bvb, combine)
    }
    fn scan_column(
        &self,
        cmp: Comparator,
        other: &Self,
        bvb: &mut BitVectorBlock,
        combine: CombineOp,
    ) -> Result<()> {
        VColumnBlock::<K>::scan_column(self, cmp, other, bvb, combine)
    }
}

/// Append-only sequence of same-typed blocks, generic over any
/// [`ColumnBlockOps`] implementor. Blocks are created lazily on first
/// write to their row range and never moved once created; only the
/// trailing block's code count grows.
pub(crate) struct ColumnBlocks<B> {
    blocks: Vec<B>,
    block_codes: usize,
    count_so_far: usize,
    max_code: u64,
}

impl<B: ColumnBlockOps> ColumnBlocks<B> {
    pub fn new(block_codes: usize) -> Self {
        ColumnBlocks {
            blocks: Vec::new(),
            block_codes,
            count_so_far: 0,
            max_code: 0,
        }
    }

    pub fn num_values(&self) -> usize {
        self.count_so_far
    }

    pub fn max_code(&self) -> u64 {
        self.max_code
    }

    fn suggested_outcome(&self) -> AppendOutcome {
        let required = required_width(self.max_code);
        let suggested = if required < B::WIDTH { required } else { B::WIDTH };
        AppendOutcome {
            fits_in_width: suggested == B::WIDTH,
            suggested_width: suggested,
        }
    }

    /// Append `codes` starting right after the last code previously
    /// appended. `count_so_far` only advances once every chunk has
    /// been written; a width-exceeded failure partway through leaves
    /// it unchanged, so that a caller-driven rebuild replays only the
    /// codes that were genuinely committed before this call.
    pub fn append(&mut self, codes: &[Code]) -> Result<AppendOutcome> {
        let mut pos = self.count_so_far;
        let mut offset = 0;
        while offset < codes.len() {
            let block_id = pos / self.block_codes;
            if block_id == self.blocks.len() {
                self.blocks.push(B::new(self.block_codes));
            }
            let block_pos = pos % self.block_codes;
            let space = self.block_codes - block_pos;
            let take = (codes.len() - offset).min(space);
            let chunk = &codes[offset..offset + take];
            let block = &mut self.blocks[block_id];
            let result = block.append(chunk);
            if block.max_code() > self.max_code {
                self.max_code = block.max_code();
            }
            result?;
            pos += take;
            offset += take;
        }
        self.count_so_far = pos;
        Ok(self.suggested_outcome())
    }

    /// Write `codes` starting at an arbitrary `pos`, either
    /// overwriting already-written rows or extending the column — not
    /// restricted to appending at the current end. `pos` may not skip
    /// past the column's current length.
    pub fn write_at(&mut self, pos: usize, codes: &[Code]) -> Result<AppendOutcome> {
        let mut p = pos;
        let mut offset = 0;
        while offset < codes.len() {
            let block_id = p / self.block_codes;
            while block_id >= self.blocks.len() {
                self.blocks.push(B::new(self.block_codes));
            }
            let block_pos = p % self.block_codes;
            let block = &mut self.blocks[block_id];
            if block_pos > block.num() {
                return Err(Error::invalid_argument(
                    "write_at: position leaves a gap past the column's current length",
                ));
            }
            if block_pos < block.num() {
                block.set_code(block_pos, codes[offset])?;
                if codes[offset] > self.max_code {
                    self.max_code = codes[offset];
                }
                p += 1;
                offset += 1;
            } else {
                let space = self.block_codes - block.num();
                let take = (codes.len() - offset).min(space);
                let chunk = &codes[offset..offset + take];
                block.append(chunk)?;
                if block.max_code() > self.max_code {
                    self.max_code = block.max_code();
                }
                p += take;
                offset += take;
            }
        }
        if p > self.count_so_far {
            self.count_so_far = p;
        }
        Ok(self.suggested_outcome())
    }

    pub fn get_code(&self, pos: usize) -> Result<Code> {
        if pos >= self.count_so_far {
            return Err(Error::usage_error(format!(
                "get_code: position {} out of range (num={})",
                pos, self.count_so_far
            )));
        }
        let block_id = pos / self.block_codes;
        let block_pos = pos % self.block_codes;
        self.blocks[block_id].get_code(block_pos)
    }

    pub fn set_code(&mut self, pos: usize, code: Code) -> Result<()> {
        if pos >= self.count_so_far {
            return Err(Error::usage_error(format!(
                "set_code: position {} out of range (num={})",
                pos, self.count_so_far
            )));
        }
        let block_id = pos / self.block_codes;
        let block_pos = pos % self.block_codes;
        self.blocks[block_id].set_code(block_pos, code)?;
        if code > self.max_code {
            self.max_code = code;
        }
        Ok(())
    }

    /// Scan every block against `literal`, treating any block index
    /// at or beyond `self.blocks.len()` as an all-NULL tail: `set`/`and`
    /// clear the corresponding target block, `or` leaves it untouched.
    pub fn scan(
        &self,
        cmp: Comparator,
        literal: Code,
        bv: &mut BitVector,
        combine: CombineOp,
    ) -> Result<()> {
        for i in 0..bv.num_blocks() {
            if i < self.blocks.len() {
                self.blocks[i].scan(cmp, literal, bv.block_mut(i), combine)?;
            } else {
                match combine {
                    CombineOp::Set | CombineOp::And => bv.block_mut(i).set_all_zero(),
                    CombineOp::Or => {}
                }
            }
        }
        Ok(())
    }

    pub fn scan_column(
        &self,
        cmp: Comparator,
        other: &Self,
        bv: &mut BitVector,
        combine: CombineOp,
    ) -> Result<()> {
        for i in 0..bv.num_blocks() {
            let a_present = i < self.blocks.len();
            let b_present = i < other.blocks.len();
            if a_present && b_present {
                self.blocks[i].scan_column(cmp, &other.blocks[i], bv.block_mut(i), combine)?;
            } else {
                match combine {
                    CombineOp::Set | CombineOp::And => bv.block_mut(i).set_all_zero(),
                    CombineOp::Or => {}
                }
            }
        }
        Ok(())
    }

    /// Every code in `[0, num_values())`, in row order. Used to salvage
    /// a column's contents before recreating it at a new width.
    pub fn extract_codes(&self) -> Vec<Code> {
        (0..self.count_so_far)
            .map(|i| self.get_code(i).expect("position within num_values"))
            .collect()
    }

    /// Write every block's persisted fields (`count`, `num_used_words`
    /// where applicable, then raw words) in order.
    pub fn save_to<W: Write>(&self, w: &mut W, path: &Path) -> Result<()> {
        for block in &self.blocks {
            write_u64(w, path, block.num() as u64)?;
            if let Some(nuw) = block.num_used_words() {
                write_u64(w, path, nuw as u64)?;
            }
            write_words(w, path, &block.raw_words())?;
        }
        Ok(())
    }

    /// Read back `num_blocks` blocks written by `save_to`.
    /// `word_count` names how many raw words each block occupies,
    /// fixed by `block_codes` and (for H/V) the compile-time width.
    pub fn load_from<R: Read>(
        r: &mut R,
        path: &Path,
        block_codes: usize,
        num_blocks: usize,
        word_count: usize,
    ) -> Result<Self> {
        let mut blocks = Vec::with_capacity(num_blocks);
        let mut max_code = 0u64;
        for _ in 0..num_blocks {
            let num = read_u64(r, path)? as usize;
            let nuw = if B::HAS_NUM_USED_WORDS {
                Some(read_u64(r, path)? as usize)
            } else {
                None
            };
            let words = read_words(r, path, word_count)?;
            let mut block = B::from_raw(block_codes, num, nuw, 0, words);
            for i in 0..num {
                let code = block.get_code(i)?;
                block.set_code(i, code)?;
            }
            if block.max_code() > max_code {
                max_code = block.max_code();
            }
            blocks.push(block);
        }
        let count_so_far = (num_blocks.saturating_sub(1)) * block_codes
            + blocks.last().map(|b| b.num()).unwrap_or(0);
        Ok(ColumnBlocks {
            blocks,
            block_codes,
            count_so_far,
            max_code,
        })
    }
}

/// Expands to a width-tagged enum wrapping `ColumnBlocks<$block<K>>`
/// for every `K` in `1..=32`, plus the dispatch methods `Column` needs,
/// so each bit width gets its own monomorphized scan kernel selected
/// by a single match rather than a dynamic-dispatch trait object.
macro_rules! width_variants {
    ($enum_name:ident, $block:ident, $iter:ident, [$(($k:literal, $variant:ident)),+ $(,)?]) => {
        pub(crate) enum $enum_name {
            $($variant(ColumnBlocks<$block<$k>>),)+
        }

        impl $enum_name {
            fn new(width: u32, block_codes: usize) -> Result<Self> {
                match width {
                    $($k => Ok($enum_name::$variant(ColumnBlocks::new(block_codes))),)+
                    _ => Err(Error::invalid_argument(format!(
                        "width {} out of range 1..=32", width
                    ))),
                }
            }

            fn width(&self) -> u32 {
                match self {
                    $($enum_name::$variant(_) => $k,)+
                }
            }

            fn num_values(&self) -> usize {
                match self {
                    $($enum_name::$variant(c) => c.num_values(),)+
                }
            }

            fn max_code(&self) -> u64 {
                match self {
                    $($enum_name::$variant(c) => c.max_code(),)+
                }
            }

            fn append(&mut self, codes: &[Code]) -> Result<AppendOutcome> {
                match self {
                    $($enum_name::$variant(c) => c.append(codes),)+
                }
            }

            fn write_at(&mut self, pos: usize, codes: &[Code]) -> Result<AppendOutcome> {
                match self {
                    $($enum_name::$variant(c) => c.write_at(pos, codes),)+
                }
            }

            fn get_code(&self, pos: usize) -> Result<Code> {
                match self {
                    $($enum_name::$variant(c) => c.get_code(pos),)+
                }
            }

            fn set_code(&mut self, pos: usize, code: Code) -> Result<()> {
                match self {
                    $($enum_name::$variant(c) => c.set_code(pos, code),)+
                }
            }

            fn scan(
                &self,
                cmp: Comparator,
                literal: Code,
                bv: &mut BitVector,
                combine: CombineOp,
            ) -> Result<()> {
                match self {
                    $($enum_name::$variant(c) => c.scan(cmp, literal, bv, combine),)+
                }
            }

            fn scan_column(
                &self,
                cmp: Comparator,
                other: &$enum_name,
                bv: &mut BitVector,
                combine: CombineOp,
            ) -> Result<()> {
                match (self, other) {
                    $(($enum_name::$variant(a), $enum_name::$variant(b)) => {
                        a.scan_column(cmp, b, bv, combine)
                    })+
                    _ => Err(Error::type_mismatch(
                        "column-vs-column scan requires matching widths",
                    )),
                }
            }

            /// Fast-path extraction using the width-specialized,
            /// seek-amortized code iterator instead of the generic
            /// per-position `get_code` loop, the natural use case for
            /// a stateful sequential accessor.
            fn extract_codes(&self) -> Vec<Code> {
                match self {
                    $($enum_name::$variant(c) => {
                        let mut it = $iter::<$k>::new(&c.blocks, c.block_codes);
                        (0..c.num_values())
                            .map(|i| it.get_code(i).expect("position within num_values"))
                            .collect()
                    })+
                }
            }

            fn save_to<W: Write>(&self, w: &mut W, path: &Path) -> Result<()> {
                match self {
                    $($enum_name::$variant(c) => c.save_to(w, path),)+
                }
            }

            fn load_from<R: Read>(
                r: &mut R,
                path: &Path,
                width: u32,
                block_codes: usize,
                num_blocks: usize,
            ) -> Result<Self> {
                match width {
                    $($k => {
                        let word_count = ColumnBlockOps::raw_words(&<$block<$k>>::new(block_codes)).len();
                        Ok($enum_name::$variant(ColumnBlocks::load_from(
                            r, path, block_codes, num_blocks, word_count,
                        )?))
                    })+
                    _ => Err(Error::invalid_argument(format!(
                        "width {} out of range 1..=32", width
                    ))),
                }
            }
        }
    };
}

width_variants!(
    HStorage,
    HColumnBlock,
    HCodeIter,
    [
        (1, W1), (2, W2), (3, W3), (4, W4), (5, W5), (6, W6), (7, W7), (8, W8),
        (9, W9), (10, W10), (11, W11), (12, W12), (13, W13), (14, W14), (15, W15), (16, W16),
        (17, W17), (18, W18), (19, W19), (20, W20), (21, W21), (22, W22), (23, W23), (24, W24),
        (25, W25), (26, W26), (27, W27), (28, W28), (29, W29), (30, W30), (31, W31), (32, W32),
    ]
);

width_variants!(
    VStorage,
    VColumnBlock,
    VCodeIter,
    [
        (1, W1), (2, W2), (3, W3), (4, W4), (5, W5), (6, W6), (7, W7), (8, W8),
        (9, W9), (10, W10), (11, W11), (12, W12), (13, W13), (14, W14), (15, W15), (16, W16),
        (17, W17), (18, W18), (19, W19), (20, W20), (21, W21), (22, W22), (23, W23), (24, W24),
        (25, W25), (26, W26), (27, W27), (28, W28), (29, W29), (30, W30), (31, W31), (32, W32),
    ]
);

enum ColumnStorage {
    Naive(ColumnBlocks<NaiveColumnBlock>),
    H(HStorage),
    V(VStorage),
}

/// A named column's full row range: type, configured width, and the
/// sequence of blocks holding its codes. Owned exclusively by its
/// [`crate::Table`]; `id` is the numeric handle the table's free-list
/// reuses across `remove_column`/`add_column`.
pub struct Column {
    id: ColumnId,
    column_type: ColumnType,
    configured_width: u32,
    block_codes: usize,
    storage: ColumnStorage,
}

impl Column {
    pub(crate) fn new(
        id: ColumnId,
        column_type: ColumnType,
        width: u32,
        block_codes: usize,
    ) -> Result<Self> {
        let storage = match column_type {
            ColumnType::Naive => ColumnStorage::Naive(ColumnBlocks::new(block_codes)),
            ColumnType::Horizontal => ColumnStorage::H(HStorage::new(width, block_codes)?),
            ColumnType::Vertical => ColumnStorage::V(VStorage::new(width, block_codes)?),
        };
        Ok(Column {
            id,
            column_type,
            configured_width: width,
            block_codes,
            storage,
        })
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Configured bit width. For `Naive` this is informational only,
    /// persisted alongside the other types' header fields, since
    /// every `u64` code fits regardless of what was requested at
    /// creation.
    pub fn width(&self) -> u32 {
        match &self.storage {
            ColumnStorage::Naive(_) => self.configured_width,
            ColumnStorage::H(h) => h.width(),
            ColumnStorage::V(v) => v.width(),
        }
    }

    pub(crate) fn block_codes(&self) -> usize {
        self.block_codes
    }

    /// Number of codes inserted so far.
    pub fn num_values(&self) -> usize {
        match &self.storage {
            ColumnStorage::Naive(c) => c.num_values(),
            ColumnStorage::H(h) => h.num_values(),
            ColumnStorage::V(v) => v.num_values(),
        }
    }

    /// Largest code observed across every append.
    pub fn max_code(&self) -> u64 {
        match &self.storage {
            ColumnStorage::Naive(c) => c.max_code(),
            ColumnStorage::H(h) => h.max_code(),
            ColumnStorage::V(v) => v.max_code(),
        }
    }

    /// Append `codes` after the last previously appended code.
    pub fn append(&mut self, codes: &[Code]) -> Result<AppendOutcome> {
        match &mut self.storage {
            ColumnStorage::Naive(c) => c.append(codes),
            ColumnStorage::H(h) => h.append(codes),
            ColumnStorage::V(v) => v.append(codes),
        }
    }

    /// Overwrite or extend the column starting at `pos`, not restricted
    /// to appending at the current end.
    pub fn write_at(&mut self, pos: usize, codes: &[Code]) -> Result<AppendOutcome> {
        match &mut self.storage {
            ColumnStorage::Naive(c) => c.write_at(pos, codes),
            ColumnStorage::H(h) => h.write_at(pos, codes),
            ColumnStorage::V(v) => v.write_at(pos, codes),
        }
    }

    pub fn get_code(&self, pos: usize) -> Result<Code> {
        match &self.storage {
            ColumnStorage::Naive(c) => c.get_code(pos),
            ColumnStorage::H(h) => h.get_code(pos),
            ColumnStorage::V(v) => v.get_code(pos),
        }
    }

    pub fn set_code(&mut self, pos: usize, code: Code) -> Result<()> {
        match &mut self.storage {
            ColumnStorage::Naive(c) => c.set_code(pos, code),
            ColumnStorage::H(h) => h.set_code(pos, code),
            ColumnStorage::V(v) => v.set_code(pos, code),
        }
    }

    /// Compare every code against `literal`, writing matches into `bv`.
    pub fn scan(
        &self,
        cmp: Comparator,
        literal: Code,
        bv: &mut BitVector,
        combine: CombineOp,
    ) -> Result<()> {
        match &self.storage {
            ColumnStorage::Naive(c) => c.scan(cmp, literal, bv, combine),
            ColumnStorage::H(h) => h.scan(cmp, literal, bv, combine),
            ColumnStorage::V(v) => v.scan(cmp, literal, bv, combine),
        }
    }

    /// Compare this column's codes against `other`'s, element-wise.
    /// Both sides must share a storage type and (for H/V) width, or
    /// this fails with `type_mismatch`.
    pub fn scan_column(
        &self,
        cmp: Comparator,
        other: &Column,
        bv: &mut BitVector,
        combine: CombineOp,
    ) -> Result<()> {
        match (&self.storage, &other.storage) {
            (ColumnStorage::Naive(a), ColumnStorage::Naive(b)) => {
                a.scan_column(cmp, b, bv, combine)
            }
            (ColumnStorage::H(a), ColumnStorage::H(b)) => a.scan_column(cmp, b, bv, combine),
            (ColumnStorage::V(a), ColumnStorage::V(b)) => a.scan_column(cmp, b, bv, combine),
            _ => Err(Error::type_mismatch(
                "column-vs-column scan requires the same storage type",
            )),
        }
    }

    /// Every code in row order, via the width-specialized code
    /// iterator where one exists (H/V) or direct access (Naive).
    pub(crate) fn extract_codes(&self) -> Vec<Code> {
        match &self.storage {
            ColumnStorage::Naive(c) => c.extract_codes(),
            ColumnStorage::H(h) => h.extract_codes(),
            ColumnStorage::V(v) => v.extract_codes(),
        }
    }

    /// Rebuild this column at `new_width`, preserving every
    /// previously-appended code. Used by the table layer to recover
    /// from `WidthExceeded` (a
    /// promotion) and to shrink a column back down after a batch
    /// whose codes no longer need the configured width.
    pub(crate) fn rebuild_at_width(&self, new_width: u32) -> Result<Column> {
        let codes = self.extract_codes();
        let mut rebuilt = Column::new(self.id, self.column_type, new_width, self.block_codes)?;
        if !codes.is_empty() {
            rebuilt.append(&codes)?;
        }
        Ok(rebuilt)
    }

    /// Write this column's blocks to `w` in this column's per-column
    /// on-disk format. `path` is used only to label I/O errors.
    pub(crate) fn save_to<W: Write>(&self, w: &mut W, path: &Path) -> Result<()> {
        match &self.storage {
            ColumnStorage::Naive(c) => c.save_to(w, path),
            ColumnStorage::H(h) => h.save_to(w, path),
            ColumnStorage::V(v) => v.save_to(w, path),
        }
    }

    /// Reconstruct a column of `num_rows` rows from a reader
    /// positioned at the start of its per-column file.
    pub(crate) fn load_from<R: Read>(
        r: &mut R,
        path: &Path,
        id: ColumnId,
        column_type: ColumnType,
        width: u32,
        block_codes: usize,
        num_rows: usize,
    ) -> Result<Column> {
        let num_blocks = if num_rows == 0 {
            0
        } else {
            (num_rows + block_codes - 1) / block_codes
        };
        let storage = match column_type {
            ColumnType::Naive => {
                ColumnStorage::Naive(ColumnBlocks::load_from(r, path, block_codes, num_blocks, block_codes)?)
            }
            ColumnType::Horizontal => {
                ColumnStorage::H(HStorage::load_from(r, path, width, block_codes, num_blocks)?)
            }
            ColumnType::Vertical => {
                ColumnStorage::V(VStorage::load_from(r, path, width, block_codes, num_blocks)?)
            }
        };
        Ok(Column {
            id,
            column_type,
            configured_width: width,
            block_codes,
            storage,
        })
    }
}
