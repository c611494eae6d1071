// Copyright 2021 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Bit-vector: a logical concatenation of [`BitVectorBlock`]s.

mod block;
mod iter;

pub use block::BitVectorBlock;
pub use iter::SetBitsIter;

use crate::bits::ceil_div;
use crate::error::{Error, Result};
use crate::DEFAULT_BLOCK_CODES;

/// A bit-vector of logical length `num`, backed by fixed-size blocks.
/// All but possibly the last block have length `DEFAULT_BLOCK_CODES`.
#[derive(Debug, Clone)]
pub struct BitVector {
    blocks: Vec<BitVectorBlock>,
    num: usize,
    block_codes: usize,
}

impl BitVector {
    /// Create a bit-vector of `n` bits, all zero, using the default
    /// block size.
    pub fn new(n: usize) -> Self {
        Self::with_block_codes(n, DEFAULT_BLOCK_CODES)
    }

    /// Create a bit-vector of `n` bits using a caller-chosen block
    /// size. Exposed so tests can exercise multi-block behavior
    /// without allocating a full-size default block.
    pub fn with_block_codes(n: usize, block_codes: usize) -> Self {
        assert!(block_codes > 0);
        let num_blocks = ceil_div(n, block_codes).max(if n == 0 { 0 } else { 1 });
        let mut blocks = Vec::with_capacity(num_blocks);
        let mut remaining = n;
        for _ in 0..num_blocks {
            let this_block = remaining.min(block_codes);
            blocks.push(BitVectorBlock::new(this_block));
            remaining -= this_block;
        }
        BitVector {
            blocks,
            num: n,
            block_codes,
        }
    }

    /// Logical length in bits.
    pub fn num(&self) -> usize {
        self.num
    }

    /// Block size used to construct this bit-vector.
    pub fn block_codes(&self) -> usize {
        self.block_codes
    }

    /// Number of blocks.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Access a block by id.
    pub fn block(&self, id: usize) -> &BitVectorBlock {
        &self.blocks[id]
    }

    /// Mutably access a block by id.
    pub fn block_mut(&mut self, id: usize) -> &mut BitVectorBlock {
        &mut self.blocks[id]
    }

    /// Read the bit at a logical position, independent of block
    /// boundaries.
    pub fn get_bit(&self, pos: usize) -> Result<bool> {
        if pos >= self.num {
            return Err(Error::invalid_argument(format!(
                "get_bit: position {} out of range (num={})",
                pos, self.num
            )));
        }
        let block_id = pos / self.block_codes;
        let block_pos = pos % self.block_codes;
        self.blocks[block_id].get_bit(block_pos)
    }

    pub fn set_all_zero(&mut self) {
        for b in self.blocks.iter_mut() {
            b.set_all_zero();
        }
    }

    pub fn set_all_one(&mut self) {
        for b in self.blocks.iter_mut() {
            b.set_all_one();
        }
    }

    pub fn count(&self) -> usize {
        self.blocks.iter().map(|b| b.count()).sum()
    }

    pub fn complement(&mut self) {
        for b in self.blocks.iter_mut() {
            b.complement();
        }
    }

    pub fn and(&mut self, other: &BitVector) -> Result<()> {
        if self.num != other.num {
            return Err(Error::length_mismatch(format!(
                "bit-vector AND: {} != {}",
                self.num, other.num
            )));
        }
        for (a, b) in self.blocks.iter_mut().zip(other.blocks.iter()) {
            a.and(b)?;
        }
        Ok(())
    }

    pub fn or(&mut self, other: &BitVector) -> Result<()> {
        if self.num != other.num {
            return Err(Error::length_mismatch(format!(
                "bit-vector OR: {} != {}",
                self.num, other.num
            )));
        }
        for (a, b) in self.blocks.iter_mut().zip(other.blocks.iter()) {
            a.or(b)?;
        }
        Ok(())
    }

    pub fn equals(&self, other: &BitVector) -> bool {
        self.num == other.num && self.blocks == other.blocks
    }

    pub fn to_text(&self) -> String {
        self.blocks.iter().map(|b| b.to_text()).collect()
    }

    /// Iterate the positions of set bits, in strictly increasing order.
    pub fn iter_set_bits(&self) -> SetBitsIter<'_> {
        SetBitsIter::new(self)
    }

    /// Copy this bit-vector into a caller-supplied LSB-first dense
    /// bitmap. `out` must be at least `ceil(self.num / 8)` bytes.
    pub fn fill_into_dense_bitmap(&self, out: &mut [u8]) {
        iter::fill_into_dense_bitmap(self, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_splits_into_blocks() {
        let bv = BitVector::with_block_codes(200, 64);
        assert_eq!(bv.num_blocks(), 4);
        assert_eq!(bv.block(0).num(), 64);
        assert_eq!(bv.block(3).num(), 8);
    }

    #[test]
    fn and_or_complement_lift_across_blocks() {
        let mut a = BitVector::with_block_codes(130, 64);
        let mut b = BitVector::with_block_codes(130, 64);
        a.set_all_one();
        b.set_all_zero();
        b.block_mut(1).set_bit(0, true).unwrap();

        let mut and_ab = a.clone();
        and_ab.and(&b).unwrap();
        assert_eq!(and_ab.count(), 1);

        let mut or_ab = a.clone();
        or_ab.set_all_zero();
        or_ab.or(&b).unwrap();
        assert_eq!(or_ab.count(), 1);

        let mut comp = b.clone();
        comp.complement();
        comp.complement();
        assert!(comp.equals(&b));
    }

    #[test]
    fn length_mismatch_across_bitvectors() {
        let mut a = BitVector::new(10);
        let b = BitVector::new(20);
        assert!(matches!(a.and(&b), Err(Error::LengthMismatch(_))));
    }
}
