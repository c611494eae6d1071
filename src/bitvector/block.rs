// Copyright 2021 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Fixed-capacity packed bit array.

use crate::bits::{ceil_div, popcount, WORD_BITS};
use crate::error::{Error, Result};

/// A block of a bit-vector: up to `BLOCK_CODES` bits, packed MSB-first
/// within each word. Bit position 0 is the highest bit of word 0.
#[derive(Debug, Clone)]
pub struct BitVectorBlock {
    data: Vec<u64>,
    num: usize,
    num_word_units: usize,
}

impl BitVectorBlock {
    /// Create a new all-zero block of `num` logical bits.
    pub fn new(num: usize) -> Self {
        let num_word_units = ceil_div(num, WORD_BITS as usize);
        BitVectorBlock {
            data: vec![0u64; num_word_units],
            num,
            num_word_units,
        }
    }

    /// Logical length in bits.
    pub fn num(&self) -> usize {
        self.num
    }

    /// Number of `u64` words backing this block.
    pub fn num_word_units(&self) -> usize {
        self.num_word_units
    }

    /// Set every bit to 0. Trailing bits remain zero (already finalized).
    pub fn set_all_zero(&mut self) {
        for w in self.data.iter_mut() {
            *w = 0;
        }
    }

    /// Set every bit to 1, then finalize (zero the tail).
    pub fn set_all_one(&mut self) {
        for w in self.data.iter_mut() {
            *w = u64::MAX;
        }
        self.finalize();
    }

    /// Get the bit at `p`, MSB-first within its word.
    pub fn get_bit(&self, p: usize) -> Result<bool> {
        if p >= self.num {
            return Err(Error::invalid_argument(format!(
                "get_bit: position {} out of range (num={})",
                p, self.num
            )));
        }
        let word_id = p / WORD_BITS as usize;
        let bit_offset = p % WORD_BITS as usize;
        Ok((self.data[word_id] >> (WORD_BITS as usize - 1 - bit_offset)) & 1 == 1)
    }

    /// Set the bit at `p`, MSB-first within its word.
    pub fn set_bit(&mut self, p: usize, bit: bool) -> Result<()> {
        if p >= self.num {
            return Err(Error::invalid_argument(format!(
                "set_bit: position {} out of range (num={})",
                p, self.num
            )));
        }
        let word_id = p / WORD_BITS as usize;
        let bit_offset = p % WORD_BITS as usize;
        let shift = WORD_BITS as usize - 1 - bit_offset;
        if bit {
            self.data[word_id] |= 1u64 << shift;
        } else {
            self.data[word_id] &= !(1u64 << shift);
        }
        Ok(())
    }

    /// Logical AND with `other`, in place, then finalize.
    pub fn and(&mut self, other: &BitVectorBlock) -> Result<()> {
        if other.num != self.num {
            return Err(Error::length_mismatch(format!(
                "bit-vector block AND: {} != {}",
                self.num, other.num
            )));
        }
        for i in 0..self.num_word_units {
            self.data[i] &= other.data[i];
        }
        self.finalize();
        Ok(())
    }

    /// Logical OR with `other`, in place, then finalize.
    pub fn or(&mut self, other: &BitVectorBlock) -> Result<()> {
        if other.num != self.num {
            return Err(Error::length_mismatch(format!(
                "bit-vector block OR: {} != {}",
                self.num, other.num
            )));
        }
        for i in 0..self.num_word_units {
            self.data[i] |= other.data[i];
        }
        self.finalize();
        Ok(())
    }

    /// Bitwise-NOT every word, then finalize.
    pub fn complement(&mut self) {
        for w in self.data.iter_mut() {
            *w = !*w;
        }
        self.finalize();
    }

    /// Count of 1-bits across the logical length.
    pub fn count(&self) -> usize {
        self.data.iter().map(|w| popcount(*w) as usize).sum()
    }

    /// Zero out bits `[num, num_word_units*64)` in the last word.
    pub fn finalize(&mut self) {
        if self.num_word_units == 0 {
            return;
        }
        let last = self.num_word_units - 1;
        let offset = WORD_BITS as usize - (self.num % WORD_BITS as usize);
        if offset != WORD_BITS as usize {
            self.data[last] &= u64::MAX << offset;
        }
    }

    /// Raw word access, for use by scan kernels.
    pub fn get_word_unit(&self, i: usize) -> Result<u64> {
        if i >= self.num_word_units {
            return Err(Error::invalid_argument(format!(
                "get_word_unit: index {} out of range (num_word_units={})",
                i, self.num_word_units
            )));
        }
        Ok(self.data[i])
    }

    /// Raw word write, for use by scan kernels.
    pub fn set_word_unit(&mut self, i: usize, word: u64) -> Result<()> {
        if i >= self.num_word_units {
            return Err(Error::invalid_argument(format!(
                "set_word_unit: index {} out of range (num_word_units={})",
                i, self.num_word_units
            )));
        }
        self.data[i] = word;
        Ok(())
    }

    /// Debug-only rendering as a string of '0'/'1' characters, one
    /// word at a time, space-separated.
    pub fn to_text(&self) -> String {
        let mut s = String::with_capacity(self.num_word_units * (WORD_BITS as usize + 1));
        for w in &self.data {
            for bit in 0..WORD_BITS {
                let b = (w >> (WORD_BITS - 1 - bit)) & 1;
                s.push(if b == 1 { '1' } else { '0' });
            }
            s.push(' ');
        }
        s
    }
}

impl PartialEq for BitVectorBlock {
    fn eq(&self, other: &Self) -> bool {
        self.num == other.num && self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_masks_tail_bits() {
        let mut b = BitVectorBlock::new(5);
        b.set_all_one();
        assert_eq!(b.get_word_unit(0).unwrap(), 0b1111_1000 << (64 - 8));
        for p in 0..5 {
            assert!(b.get_bit(p).unwrap());
        }
    }

    #[test]
    fn set_and_get_bit_roundtrip() {
        let mut b = BitVectorBlock::new(10);
        b.set_bit(0, true).unwrap();
        b.set_bit(9, true).unwrap();
        for p in 0..10 {
            assert_eq!(b.get_bit(p).unwrap(), p == 0 || p == 9);
        }
    }

    #[test]
    fn and_or_complement() {
        let mut a = BitVectorBlock::new(8);
        let mut b = BitVectorBlock::new(8);
        a.set_bit(0, true).unwrap();
        a.set_bit(1, true).unwrap();
        b.set_bit(1, true).unwrap();
        b.set_bit(2, true).unwrap();

        let mut and_result = a.clone();
        and_result.and(&b).unwrap();
        assert!(and_result.get_bit(1).unwrap());
        assert!(!and_result.get_bit(0).unwrap());
        assert_eq!(and_result.count(), 1);

        let mut or_result = a.clone();
        or_result.or(&b).unwrap();
        assert_eq!(or_result.count(), 3);

        let mut comp = a.clone();
        comp.complement();
        comp.complement();
        assert_eq!(comp, a);
    }

    #[test]
    fn length_mismatch_errors() {
        let mut a = BitVectorBlock::new(8);
        let b = BitVectorBlock::new(16);
        assert!(matches!(a.and(&b), Err(Error::LengthMismatch(_))));
    }

    #[test]
    fn count_across_multiple_words() {
        let mut b = BitVectorBlock::new(130);
        b.set_bit(0, true).unwrap();
        b.set_bit(64, true).unwrap();
        b.set_bit(129, true).unwrap();
        assert_eq!(b.count(), 3);
    }
}
