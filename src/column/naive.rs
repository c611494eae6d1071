// Copyright 2021 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Array-of-codes baseline column block.

use crate::bitvector::BitVectorBlock;
use crate::bits::{ceil_div, WORD_BITS};
use crate::error::{Error, Result};
use crate::{CombineOp, Comparator};

/// One code per `u64` slot, compared one at a time. The reference
/// against which the packed H/V layouts are checked for equivalence.
pub struct NaiveColumnBlock {
    data: Vec<u64>,
    num: usize,
    capacity: usize,
    max_code: u64,
}

impl NaiveColumnBlock {
    pub fn new(capacity: usize) -> Self {
        NaiveColumnBlock {
            data: vec![0u64; capacity],
            num: 0,
            capacity,
            max_code: 0,
        }
    }

    pub fn num(&self) -> usize {
        self.num
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_code(&self) -> u64 {
        self.max_code
    }

    /// Raw backing words, for bit-exact persistence.
    pub(crate) fn raw_words(&self) -> &[u64] {
        &self.data
    }

    pub(crate) fn from_raw(num: usize, capacity: usize, max_code: u64, data: Vec<u64>) -> Self {
        NaiveColumnBlock {
            data,
            num,
            capacity,
            max_code,
        }
    }

    pub fn append(&mut self, codes: &[u64]) -> Result<()> {
        if self.num + codes.len() > self.capacity {
            return Err(Error::invalid_argument(
                "naive column block: append exceeds block capacity",
            ));
        }
        for (i, &code) in codes.iter().enumerate() {
            self.data[self.num + i] = code;
            if code > self.max_code {
                self.max_code = code;
            }
        }
        self.num += codes.len();
        Ok(())
    }

    pub fn get_code(&self, pos: usize) -> Result<u64> {
        if pos >= self.num {
            return Err(Error::invalid_argument(format!(
                "naive get_code: position {} out of range (num={})",
                pos, self.num
            )));
        }
        Ok(self.data[pos])
    }

    pub fn set_code(&mut self, pos: usize, code: u64) -> Result<()> {
        if pos >= self.num {
            return Err(Error::invalid_argument(format!(
                "naive set_code: position {} out of range (num={})",
                pos, self.num
            )));
        }
        if code > self.max_code {
            self.max_code = code;
        }
        self.data[pos] = code;
        Ok(())
    }

    fn compare(cmp: Comparator, a: u64, b: u64) -> bool {
        match cmp {
            Comparator::Eq => a == b,
            Comparator::Ne => a != b,
            Comparator::Gt => a > b,
            Comparator::Lt => a < b,
            Comparator::Ge => a >= b,
            Comparator::Le => a <= b,
        }
    }

    /// Compare every stored code against `literal`, packing one
    /// comparison bit per code MSB-first into each output word.
    pub fn scan(
        &self,
        cmp: Comparator,
        literal: u64,
        bvb: &mut BitVectorBlock,
        combine: CombineOp,
    ) -> Result<()> {
        if bvb.num() != self.num {
            return Err(Error::length_mismatch(
                "bit-vector length does not match column length",
            ));
        }
        let word_bits = WORD_BITS as usize;
        let mut offset = 0;
        while offset < self.num {
            let mut word = 0u64;
            for i in 0..word_bits {
                let id = offset + i;
                if id >= self.num {
                    break;
                }
                let bit = Self::compare(cmp, self.data[id], literal) as u64;
                word |= bit << (word_bits - 1 - i);
            }
            let word_id = offset / word_bits;
            let word = match combine {
                CombineOp::Set => word,
                CombineOp::And => word & bvb.get_word_unit(word_id)?,
                CombineOp::Or => word | bvb.get_word_unit(word_id)?,
            };
            bvb.set_word_unit(word_id, word)?;
            offset += word_bits;
        }
        // The column is all-NULL beyond num_; zero the remaining tail.
        let mut tail = ceil_div(self.num, word_bits) * word_bits;
        while tail < bvb.num() {
            let word_id = tail / word_bits;
            bvb.set_word_unit(word_id, 0)?;
            tail += word_bits;
        }
        Ok(())
    }

    /// Compare this block's codes against `other`'s, element-wise.
    pub fn scan_column(
        &self,
        cmp: Comparator,
        other: &NaiveColumnBlock,
        bvb: &mut BitVectorBlock,
        combine: CombineOp,
    ) -> Result<()> {
        if bvb.num() != self.num {
            return Err(Error::length_mismatch(
                "bit-vector length does not match column length",
            ));
        }
        let word_bits = WORD_BITS as usize;
        let num = self.num.min(other.num);
        let mut offset = 0;
        while offset < num {
            let mut word = 0u64;
            for i in 0..word_bits {
                let id = offset + i;
                if id >= self.num {
                    break;
                }
                let bit = Self::compare(cmp, self.data[id], other.data[id]) as u64;
                word |= bit << (word_bits - 1 - i);
            }
            let word_id = offset / word_bits;
            let word = match combine {
                CombineOp::Set => word,
                CombineOp::And => word & bvb.get_word_unit(word_id)?,
                CombineOp::Or => word | bvb.get_word_unit(word_id)?,
            };
            bvb.set_word_unit(word_id, word)?;
            offset += word_bits;
        }
        // At least one side is all-NULL beyond num; zero the tail.
        let mut tail = ceil_div(num, word_bits) * word_bits;
        while tail < bvb.num() {
            let word_id = tail / word_bits;
            bvb.set_word_unit(word_id, 0)?;
            tail += word_bits;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitvector::BitVectorBlock;

    #[test]
    fn append_and_roundtrip() {
        let mut b = NaiveColumnBlock::new(16);
        b.append(&[5, 1, 9, 2]).unwrap();
        assert_eq!(b.num(), 4);
        assert_eq!(b.max_code(), 9);
        for (i, expected) in [5u64, 1, 9, 2].into_iter().enumerate() {
            assert_eq!(b.get_code(i).unwrap(), expected);
        }
    }

    #[test]
    fn append_beyond_capacity_errors() {
        let mut b = NaiveColumnBlock::new(2);
        assert!(b.append(&[1, 2, 3]).is_err());
    }

    #[test]
    fn scan_equality_literal() {
        let mut b = NaiveColumnBlock::new(10);
        b.append(&[0, 1, 2, 3, 4, 5, 6, 7, 0, 1]).unwrap();
        let mut bvb = BitVectorBlock::new(10);
        b.scan(Comparator::Eq, 5, &mut bvb, CombineOp::Set).unwrap();
        assert_eq!(bvb.count(), 1);
        assert!(bvb.get_bit(5).unwrap());
    }

    #[test]
    fn scan_combine_and() {
        let mut b = NaiveColumnBlock::new(10);
        b.append(&[0, 1, 2, 3, 4, 5, 6, 7, 0, 1]).unwrap();
        let mut bvb = BitVectorBlock::new(10);
        b.scan(Comparator::Ge, 3, &mut bvb, CombineOp::Set).unwrap();
        b.scan(Comparator::Le, 5, &mut bvb, CombineOp::And).unwrap();
        let positions: Vec<usize> = (0..10).filter(|&p| bvb.get_bit(p).unwrap()).collect();
        assert_eq!(positions, vec![3, 4, 5]);
    }

    #[test]
    fn scan_column_vs_column() {
        let mut a = NaiveColumnBlock::new(4);
        a.append(&[1, 2, 3, 4]).unwrap();
        let mut b = NaiveColumnBlock::new(4);
        b.append(&[1, 5, 3, 0]).unwrap();
        let mut bvb = BitVectorBlock::new(4);
        a.scan_column(Comparator::Eq, &b, &mut bvb, CombineOp::Set)
            .unwrap();
        assert_eq!(bvb.count(), 2);
        assert!(bvb.get_bit(0).unwrap());
        assert!(bvb.get_bit(2).unwrap());
    }
}
