// Copyright 2021 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Stateful, seek-optimized sequential code accessors over a column's
//! blocks. Each iterator assumes callers request tuple ids in
//! non-decreasing order and amortizes the segment/group address
//! arithmetic across consecutive calls, recomputing it from scratch
//! only when a seek crosses a segment or block boundary.

use crate::bits::WORD_BITS;
use crate::column::horizontal::HColumnBlock;
use crate::column::vertical::{VColumnBlock, B};
use crate::error::{Error, Result};

/// Sequential accessor over a BitWeaving/H column's blocks.
pub struct HCodeIter<'a, const K: u32> {
    blocks: &'a [HColumnBlock<K>],
    block_codes: usize,
    last_tuple_id: usize,
    segment_word_id: usize,
    code_id_in_segment: usize,
    code_id_in_block: usize,
    block_id: usize,
    pre_data: Vec<(usize, u32)>,
}

impl<'a, const K: u32> HCodeIter<'a, K> {
    const NUM_BITS_PER_CODE: u32 = K + 1;
    const NUM_WORDS_PER_SEGMENT: usize = (K + 1) as usize;
    const CODE_MASK: u64 = (1u64 << K) - 1;

    /// `block_codes` is the uniform per-block code capacity used by
    /// the owning column (blocks may hold fewer if not yet full).
    pub fn new(blocks: &'a [HColumnBlock<K>], block_codes: usize) -> Self {
        let num_codes_per_word = (WORD_BITS / Self::NUM_BITS_PER_CODE) as usize;
        let num_codes_per_segment = Self::NUM_WORDS_PER_SEGMENT * num_codes_per_word;
        let pre_data = (0..num_codes_per_segment)
            .map(|i| {
                let word_id_in_segment = i % Self::NUM_WORDS_PER_SEGMENT;
                let shift_in_word = (num_codes_per_word - 1 - i / Self::NUM_WORDS_PER_SEGMENT) as u32
                    * Self::NUM_BITS_PER_CODE;
                (word_id_in_segment, shift_in_word)
            })
            .collect();
        HCodeIter {
            blocks,
            block_codes,
            last_tuple_id: 0,
            segment_word_id: 0,
            code_id_in_segment: 0,
            code_id_in_block: 0,
            block_id: 0,
            pre_data,
        }
    }

    fn num_codes_per_segment(&self) -> usize {
        self.pre_data.len()
    }

    fn seek(&mut self, tuple_id: usize) {
        let delta = tuple_id - self.last_tuple_id;
        self.last_tuple_id = tuple_id;
        self.code_id_in_block += delta;
        let num_codes_per_segment = self.num_codes_per_segment();

        if self.code_id_in_block < self.block_codes {
            if delta + self.code_id_in_segment < num_codes_per_segment {
                self.code_id_in_segment += delta;
            } else {
                self.segment_word_id =
                    (self.code_id_in_block / num_codes_per_segment) * Self::NUM_WORDS_PER_SEGMENT;
                self.code_id_in_segment = self.code_id_in_block % num_codes_per_segment;
            }
        } else {
            let num_blocks = self.code_id_in_block / self.block_codes;
            self.block_id += num_blocks;
            self.code_id_in_block %= self.block_codes;
            self.segment_word_id =
                (self.code_id_in_block / num_codes_per_segment) * Self::NUM_WORDS_PER_SEGMENT;
            self.code_id_in_segment = self.code_id_in_block % num_codes_per_segment;
        }
    }

    pub fn get_code(&mut self, tuple_id: usize) -> Result<u64> {
        self.seek(tuple_id);
        let (word_in_segment, shift) = self.pre_data[self.code_id_in_segment];
        let block = self.blocks.get(self.block_id).ok_or_else(|| {
            Error::invalid_argument("code iterator: tuple id past end of column")
        })?;
        let word = block.word_at(self.segment_word_id + word_in_segment)?;
        Ok((word >> shift) & Self::CODE_MASK)
    }
}

/// Sequential accessor over a BitWeaving/V column's blocks.
pub struct VCodeIter<'a, const K: u32> {
    blocks: &'a [VColumnBlock<K>],
    block_codes: usize,
    last_tuple_id: usize,
    group_word_id: usize,
    last_group_word_id: usize,
    code_id_in_segment: usize,
    code_id_in_block: usize,
    block_id: usize,
}

impl<'a, const K: u32> VCodeIter<'a, K> {
    const NUM_FULL_GROUPS: usize = (K / B) as usize;
    const NUM_BITS_LAST_GROUP: u32 = K - B * Self::NUM_FULL_GROUPS as u32;
    const NUM_CODES_PER_SEGMENT: usize = WORD_BITS as usize;

    pub fn new(blocks: &'a [VColumnBlock<K>], block_codes: usize) -> Self {
        VCodeIter {
            blocks,
            block_codes,
            last_tuple_id: 0,
            group_word_id: 0,
            last_group_word_id: 0,
            code_id_in_segment: 0,
            code_id_in_block: 0,
            block_id: 0,
        }
    }

    fn seek(&mut self, tuple_id: usize) {
        let delta = tuple_id - self.last_tuple_id;
        self.last_tuple_id = tuple_id;
        self.code_id_in_block += delta;

        if self.code_id_in_block < self.block_codes {
            if delta + self.code_id_in_segment < Self::NUM_CODES_PER_SEGMENT {
                self.code_id_in_segment += delta;
            } else {
                self.code_id_in_segment = self.code_id_in_block % Self::NUM_CODES_PER_SEGMENT;
                let segment_id = self.code_id_in_block / Self::NUM_CODES_PER_SEGMENT;
                self.group_word_id = segment_id * B as usize;
                self.last_group_word_id = segment_id * Self::NUM_BITS_LAST_GROUP as usize;
            }
        } else {
            let num_blocks = self.code_id_in_block / self.block_codes;
            self.block_id += num_blocks;
            self.code_id_in_block %= self.block_codes;
            self.code_id_in_segment = self.code_id_in_block % Self::NUM_CODES_PER_SEGMENT;
            let segment_id = self.code_id_in_block / Self::NUM_CODES_PER_SEGMENT;
            self.group_word_id = segment_id * B as usize;
            self.last_group_word_id = segment_id * Self::NUM_BITS_LAST_GROUP as usize;
        }
    }

    pub fn get_code(&mut self, tuple_id: usize) -> Result<u64> {
        self.seek(tuple_id);
        let block = self.blocks.get(self.block_id).ok_or_else(|| {
            Error::invalid_argument("code iterator: tuple id past end of column")
        })?;

        let offset_in_segment = Self::NUM_CODES_PER_SEGMENT - 1 - self.code_id_in_segment;
        let mask = 1u64 << offset_in_segment;
        let mut code_word = 0u64;
        let mut bit_id = 0u32;

        for group_id in 0..Self::NUM_FULL_GROUPS {
            let mut word_id = self.group_word_id;
            for _ in 0..B {
                let bit = (block.group_word(group_id, word_id)? & mask) >> offset_in_segment;
                code_word |= bit << (K - 1 - bit_id);
                word_id += 1;
                bit_id += 1;
            }
        }
        if Self::NUM_BITS_LAST_GROUP != 0 {
            let mut word_id = self.last_group_word_id;
            for _ in 0..Self::NUM_BITS_LAST_GROUP {
                let bit = (block.last_group_word(word_id)? & mask) >> offset_in_segment;
                code_word |= bit << (K - 1 - bit_id);
                word_id += 1;
                bit_id += 1;
            }
        }
        Ok(code_word)
    }
}
