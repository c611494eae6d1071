// Copyright 2021 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! BitWeaving/V: bit-sliced vertical layout with bit-serial,
//! early-terminating scan kernels, monomorphized per width via the `K`
//! const generic.

use crate::bits::{ceil_div, required_width};
use crate::bitvector::BitVectorBlock;
use crate::error::{Error, Result};
use crate::{CombineOp, Comparator};

/// Bit-slice group width.
pub const B: u32 = crate::B_GROUP_SIZE;

/// A segment holds `W = 64` codes. Each code's `K` bits are sliced
/// into `⌈K/4⌉` groups of (up to) 4 bit-position words; within a
/// group-word, bit `i` is the corresponding bit of the i-th code of
/// the segment, MSB-first within the code.
pub struct VColumnBlock<const K: u32> {
    full_groups: Vec<Vec<u64>>,
    last_group: Vec<u64>,
    num: usize,
    num_segments_used: usize,
    max_code: u64,
    capacity: usize,
}

impl<const K: u32> VColumnBlock<K> {
    pub const NUM_FULL_GROUPS: usize = (K / B) as usize;
    pub const NUM_BITS_LAST_GROUP: u32 = K - B * Self::NUM_FULL_GROUPS as u32;
    pub const CODE_MASK: u64 = (1u64 << K) - 1;

    pub fn new(capacity: usize) -> Self {
        assert!((1..=32).contains(&K), "V column width must be in 1..=32");
        let num_segments = ceil_div(capacity.max(1), 64);
        let full_groups = (0..Self::NUM_FULL_GROUPS)
            .map(|_| vec![0u64; num_segments * B as usize])
            .collect();
        let last_group = if Self::NUM_BITS_LAST_GROUP != 0 {
            vec![0u64; num_segments * Self::NUM_BITS_LAST_GROUP as usize]
        } else {
            Vec::new()
        };
        VColumnBlock {
            full_groups,
            last_group,
            num: 0,
            num_segments_used: 0,
            max_code: 0,
            capacity,
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

    /// Raw group-word access for the code iterator's addressing.
    pub(crate) fn group_word(&self, group_id: usize, word_id: usize) -> Result<u64> {
        self.full_groups
            .get(group_id)
            .and_then(|g| g.get(word_id))
            .copied()
            .ok_or_else(|| Error::invalid_argument("V column block: group word index out of range"))
    }

    /// Raw last-group word access for the code iterator's addressing.
    pub(crate) fn last_group_word(&self, word_id: usize) -> Result<u64> {
        self.last_group
            .get(word_id)
            .copied()
            .ok_or_else(|| Error::invalid_argument("V column block: last-group word index out of range"))
    }

    /// Raw backing words flattened into one sequence (all full groups
    /// in order, then the last partial group), and the number of
    /// segments in use, for bit-exact persistence.
    pub(crate) fn raw_words(&self) -> Vec<u64> {
        let mut words =
            Vec::with_capacity(self.full_groups.iter().map(|g| g.len()).sum::<usize>() + self.last_group.len());
        for group in &self.full_groups {
            words.extend_from_slice(group);
        }
        words.extend_from_slice(&self.last_group);
        words
    }

    pub(crate) fn num_used_words_raw(&self) -> usize {
        self.num_segments_used
    }

    pub(crate) fn from_raw(capacity: usize, num: usize, num_segments_used: usize, max_code: u64, words: &[u64]) -> Self {
        let num_segments = ceil_div(capacity.max(1), 64);
        let mut offset = 0;
        let full_groups: Vec<Vec<u64>> = (0..Self::NUM_FULL_GROUPS)
            .map(|_| {
                let len = num_segments * B as usize;
                let g = words[offset..offset + len].to_vec();
                offset += len;
                g
            })
            .collect();
        let last_group = if Self::NUM_BITS_LAST_GROUP != 0 {
            let len = num_segments * Self::NUM_BITS_LAST_GROUP as usize;
            let g = words[offset..offset + len].to_vec();
            offset += len;
            g
        } else {
            Vec::new()
        };
        let _ = offset;
        VColumnBlock {
            full_groups,
            last_group,
            num,
            num_segments_used,
            max_code,
            capacity,
        }
    }

    fn set_code_raw(&mut self, pos: usize, code: u64) {
        let segment_id = pos / 64;
        let offset_in_segment = 63 - (pos % 64);
        let mask = 1u64 << offset_in_segment;
        let mut bit_id = 0u32;
        for group in self.full_groups.iter_mut() {
            let mut word_id = segment_id * B as usize;
            for _ in 0..B {
                group[word_id] &= !mask;
                group[word_id] |= ((code >> (K - 1 - bit_id)) << offset_in_segment) & mask;
                word_id += 1;
                bit_id += 1;
            }
        }
        if Self::NUM_BITS_LAST_GROUP != 0 {
            let mut word_id = segment_id * Self::NUM_BITS_LAST_GROUP as usize;
            for _ in 0..Self::NUM_BITS_LAST_GROUP {
                self.last_group[word_id] &= !mask;
                self.last_group[word_id] |= ((code >> (K - 1 - bit_id)) << offset_in_segment) & mask;
                word_id += 1;
                bit_id += 1;
            }
        }
    }

    pub fn get_code(&self, pos: usize) -> Result<u64> {
        if pos >= self.num {
            return Err(Error::invalid_argument(format!(
                "V get_code: position {} out of range (num={})",
                pos, self.num
            )));
        }
        let segment_id = pos / 64;
        let offset_in_segment = 63 - (pos % 64);
        let mask = 1u64 << offset_in_segment;
        let mut code_word = 0u64;
        let mut bit_id = 0u32;
        for group in self.full_groups.iter() {
            let mut word_id = segment_id * B as usize;
            for _ in 0..B {
                let bit = (group[word_id] & mask) >> offset_in_segment;
                code_word |= bit << (K - 1 - bit_id);
                word_id += 1;
                bit_id += 1;
            }
        }
        if Self::NUM_BITS_LAST_GROUP != 0 {
            let mut word_id = segment_id * Self::NUM_BITS_LAST_GROUP as usize;
            for _ in 0..Self::NUM_BITS_LAST_GROUP {
                let bit = (self.last_group[word_id] & mask) >> offset_in_segment;
                code_word |= bit << (K - 1 - bit_id);
                word_id += 1;
                bit_id += 1;
            }
        }
        Ok(code_word)
    }

    pub fn set_code(&mut self, pos: usize, code: u64) -> Result<()> {
        if pos >= self.num {
            return Err(Error::invalid_argument(format!(
                "V set_code: position {} out of range (num={})",
                pos, self.num
            )));
        }
        if code > self.max_code {
            self.max_code = code;
        }
        self.set_code_raw(pos, code & Self::CODE_MASK);
        Ok(())
    }

    pub fn append(&mut self, codes: &[u64]) -> Result<()> {
        if self.num + codes.len() > self.capacity {
            return Err(Error::invalid_argument(
                "V column block: append exceeds block capacity",
            ));
        }
        let start = self.num;
        self.num += codes.len();
        self.num_segments_used = ceil_div(self.num, 64);
        for (i, &code) in codes.iter().enumerate() {
            if code > self.max_code {
                self.max_code = code;
            }
            self.set_code_raw(start + i, code & Self::CODE_MASK);
        }
        if self.max_code >= (1u64 << K) {
            return Err(Error::WidthExceeded {
                suggested: required_width(self.max_code),
            });
        }
        Ok(())
    }

    fn apply_bit(cmp: Comparator, mask_equal: &mut u64, mask_less: &mut u64, mask_greater: &mut u64, d: u64, other: u64) {
        match cmp {
            Comparator::Eq | Comparator::Ne => {
                *mask_equal &= !(d ^ other);
            }
            Comparator::Lt | Comparator::Le => {
                *mask_less |= *mask_equal & !d & other;
                *mask_equal &= !(d ^ other);
            }
            Comparator::Gt | Comparator::Ge => {
                *mask_greater |= *mask_equal & d & !other;
                *mask_equal &= !(d ^ other);
            }
        }
    }

    fn select_mask(cmp: Comparator, mask_equal: u64, mask_less: u64, mask_greater: u64) -> u64 {
        match cmp {
            Comparator::Eq => mask_equal,
            Comparator::Ne => !mask_equal,
            Comparator::Gt => mask_greater,
            Comparator::Lt => mask_less,
            Comparator::Ge => mask_greater | mask_equal,
            Comparator::Le => mask_less | mask_equal,
        }
    }

    /// Compare every stored code against `literal`, bit position by
    /// bit position (MSB first), short-circuiting a segment's 64-wide
    /// lane as soon as no candidate rows remain.
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
        if literal >= (1u64 << K) {
            return Err(Error::invalid_argument(
                "literal overflows the column's configured width",
            ));
        }

        let literal_bits: Vec<u64> = (0..K)
            .map(|bit_id| 0u64.wrapping_sub((literal >> (K - 1 - bit_id)) & 1))
            .collect();

        for segment_id in 0..self.num_segments_used {
            let mask_bitvector = bvb.get_word_unit(segment_id)?;
            let mut mask_equal = match combine {
                CombineOp::Set => u64::MAX,
                CombineOp::And => mask_bitvector,
                CombineOp::Or => !mask_bitvector,
            };
            let mut mask_less = 0u64;
            let mut mask_greater = 0u64;
            let mut bit_id = 0usize;

            'groups: for group in self.full_groups.iter() {
                if mask_equal == 0 {
                    break 'groups;
                }
                let word_base = segment_id * B as usize;
                for b in 0..B as usize {
                    let d = group[word_base + b];
                    Self::apply_bit(cmp, &mut mask_equal, &mut mask_less, &mut mask_greater, d, literal_bits[bit_id]);
                    bit_id += 1;
                }
            }
            if Self::NUM_BITS_LAST_GROUP != 0 && mask_equal != 0 {
                let word_base = segment_id * Self::NUM_BITS_LAST_GROUP as usize;
                for b in 0..Self::NUM_BITS_LAST_GROUP as usize {
                    let d = self.last_group[word_base + b];
                    Self::apply_bit(cmp, &mut mask_equal, &mut mask_less, &mut mask_greater, d, literal_bits[bit_id]);
                    bit_id += 1;
                }
            }

            let mask = Self::select_mask(cmp, mask_equal, mask_less, mask_greater);
            let result = match combine {
                CombineOp::Set => mask,
                CombineOp::And => mask & mask_bitvector,
                CombineOp::Or => mask | mask_bitvector,
            };
            bvb.set_word_unit(segment_id, result)?;
        }
        bvb.finalize();
        Ok(())
    }

    /// Compare this block's codes against `other`'s, element-wise.
    /// Both sides must be V blocks of the same width `K`.
    pub fn scan_column(
        &self,
        cmp: Comparator,
        other: &VColumnBlock<K>,
        bvb: &mut BitVectorBlock,
        combine: CombineOp,
    ) -> Result<()> {
        if bvb.num() != self.num {
            return Err(Error::length_mismatch(
                "bit-vector length does not match column length",
            ));
        }
        if other.num != self.num {
            return Err(Error::length_mismatch(
                "column lengths do not match for column-vs-column scan",
            ));
        }

        for segment_id in 0..self.num_segments_used {
            let mask_bitvector = bvb.get_word_unit(segment_id)?;
            let mut mask_equal = match combine {
                CombineOp::Set => u64::MAX,
                CombineOp::And => mask_bitvector,
                CombineOp::Or => !mask_bitvector,
            };
            let mut mask_less = 0u64;
            let mut mask_greater = 0u64;

            'groups: for (group, other_group) in self.full_groups.iter().zip(other.full_groups.iter()) {
                if mask_equal == 0 {
                    break 'groups;
                }
                let word_base = segment_id * B as usize;
                for b in 0..B as usize {
                    let d = group[word_base + b];
                    let od = other_group[word_base + b];
                    Self::apply_bit(cmp, &mut mask_equal, &mut mask_less, &mut mask_greater, d, od);
                }
            }
            if Self::NUM_BITS_LAST_GROUP != 0 && mask_equal != 0 {
                let word_base = segment_id * Self::NUM_BITS_LAST_GROUP as usize;
                for b in 0..Self::NUM_BITS_LAST_GROUP as usize {
                    let d = self.last_group[word_base + b];
                    let od = other.last_group[word_base + b];
                    Self::apply_bit(cmp, &mut mask_equal, &mut mask_less, &mut mask_greater, d, od);
                }
            }

            let mask = Self::select_mask(cmp, mask_equal, mask_less, mask_greater);
            let result = match combine {
                CombineOp::Set => mask,
                CombineOp::And => mask & mask_bitvector,
                CombineOp::Or => mask | mask_bitvector,
            };
            bvb.set_word_unit(segment_id, result)?;
        }
        bvb.finalize();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_get_code_roundtrip() {
        let mut b: VColumnBlock<8> = VColumnBlock::new(128);
        b.append(&[0, 255, 128, 1, 127, 255, 0]).unwrap();
        for (i, expected) in [0u64, 255, 128, 1, 127, 255, 0].into_iter().enumerate() {
            assert_eq!(b.get_code(i).unwrap(), expected);
        }
    }

    #[test]
    fn append_overflow_reports_suggested_width() {
        let mut b: VColumnBlock<3> = VColumnBlock::new(64);
        b.append(&[1, 2, 3]).unwrap();
        let err = b.append(&[8]).unwrap_err();
        assert_eq!(err, Error::WidthExceeded { suggested: 4 });
    }

    #[test]
    fn scan_s3_less_than_with_early_termination() {
        let mut b: VColumnBlock<8> = VColumnBlock::new(128);
        b.append(&[0, 255, 128, 1, 127, 255, 0]).unwrap();
        let mut bvb = BitVectorBlock::new(7);
        b.scan(Comparator::Lt, 128, &mut bvb, CombineOp::Set).unwrap();
        let positions: Vec<usize> = (0..7).filter(|&p| bvb.get_bit(p).unwrap()).collect();
        assert_eq!(positions, vec![0, 3, 4, 6]);
        assert_eq!(bvb.count(), 4);
    }

    #[test]
    fn set_code_updates_existing_value() {
        let mut b: VColumnBlock<5> = VColumnBlock::new(64);
        b.append(&[1, 2, 3]).unwrap();
        b.set_code(1, 17).unwrap();
        assert_eq!(b.get_code(1).unwrap(), 17);
        assert_eq!(b.get_code(0).unwrap(), 1);
    }

    #[test]
    fn scan_column_vs_column_equality() {
        let mut a: VColumnBlock<4> = VColumnBlock::new(16);
        a.append(&[1, 2, 3, 4]).unwrap();
        let mut other: VColumnBlock<4> = VColumnBlock::new(16);
        other.append(&[1, 5, 3, 0]).unwrap();
        let mut bvb = BitVectorBlock::new(4);
        a.scan_column(Comparator::Eq, &other, &mut bvb, CombineOp::Set)
            .unwrap();
        assert_eq!(bvb.count(), 2);
        assert!(bvb.get_bit(0).unwrap());
        assert!(bvb.get_bit(2).unwrap());
    }

    #[test]
    fn scan_matches_naive_across_segments() {
        use crate::column::naive::NaiveColumnBlock;
        let n = 4096;
        let codes: Vec<u64> = (0..n as u64).map(|i| (i.wrapping_mul(2654435761)) % 16).collect();

        let mut v: VColumnBlock<4> = VColumnBlock::new(n);
        v.append(&codes).unwrap();
        let mut naive = NaiveColumnBlock::new(n);
        naive.append(&codes).unwrap();

        for cmp in [
            Comparator::Eq,
            Comparator::Ne,
            Comparator::Lt,
            Comparator::Le,
            Comparator::Gt,
            Comparator::Ge,
        ] {
            let mut v_bvb = BitVectorBlock::new(n);
            v.scan(cmp, 8, &mut v_bvb, CombineOp::Set).unwrap();
            let mut n_bvb = BitVectorBlock::new(n);
            naive.scan(cmp, 8, &mut n_bvb, CombineOp::Set).unwrap();
            assert_eq!(v_bvb, n_bvb, "mismatch for {:?}", cmp);
        }
    }
}
