// Copyright 2021 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::collection::vec;
use proptest::prelude::*;

use bwcol::{ColumnType, CombineOp, Comparator, Options, Table};

/// A fresh scratch directory per case; `process::id()` alone is
/// constant across the many cases proptest drives through one `#[test]`.
fn scratch_dir(label: &str) -> std::path::PathBuf {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("bwcol_proptest_{}_{}_{}", label, std::process::id(), n))
}

const COMPARATORS: [Comparator; 6] = [
    Comparator::Eq,
    Comparator::Ne,
    Comparator::Lt,
    Comparator::Le,
    Comparator::Gt,
    Comparator::Ge,
];

fn eval(cmp: Comparator, code: u64, literal: u64) -> bool {
    match cmp {
        Comparator::Eq => code == literal,
        Comparator::Ne => code != literal,
        Comparator::Lt => code < literal,
        Comparator::Le => code <= literal,
        Comparator::Gt => code > literal,
        Comparator::Ge => code >= literal,
    }
}

/// Build one column of each layout holding the same codes, with a
/// small `block_codes` so a modest `codes` vector still spans several
/// blocks (exercising the per-block dispatch and null-tail logic).
fn build_columns(codes: &[u64], width: u32, block_codes: usize) -> Vec<(&'static str, Table)> {
    let mut out = Vec::new();
    for (label, ty) in [
        ("naive", ColumnType::Naive),
        ("horizontal", ColumnType::Horizontal),
        ("vertical", ColumnType::Vertical),
    ] {
        let mut table = Table::with_block_codes("t", Options::default(), block_codes);
        table.add_column("v", ty, width).unwrap();
        table.append_to_column("v", codes).unwrap();
        out.push((label, table));
    }
    out
}

proptest! {
    /// Every layout scanning the same codes against the same literal
    /// under every comparator agrees with a plain per-code evaluation,
    /// and agrees with one another.
    #[test]
    fn scan_matches_naive_evaluation_across_layouts(
        codes in vec(0u64..16, 0..500),
        literal in 0u64..16,
        block_codes in 1usize..32,
    ) {
        for (_label, table) in build_columns(&codes, 4, block_codes) {
            let column = table.get_column("v").unwrap();
            for cmp in COMPARATORS {
                let mut bv = table.create_bit_vector();
                column.scan(cmp, literal, &mut bv, CombineOp::Set).unwrap();
                for (i, &code) in codes.iter().enumerate() {
                    assert_eq!(bv.get_bit(i).unwrap(), eval(cmp, code, literal));
                }
            }
        }
    }

    /// `And`/`Or` combine into a caller-supplied bit-vector the same
    /// way plain boolean algebra would, regardless of what was there
    /// before.
    #[test]
    fn combine_ops_match_boolean_algebra(
        codes in vec(0u64..16, 1..200),
        literal_a in 0u64..16,
        literal_b in 0u64..16,
    ) {
        let tables = build_columns(&codes, 4, 64);
        let (_, table) = &tables[1];
        let column = table.get_column("v").unwrap();

        let mut bv = table.create_bit_vector();
        column.scan(Comparator::Ge, literal_a, &mut bv, CombineOp::Set).unwrap();
        column.scan(Comparator::Le, literal_b, &mut bv, CombineOp::And).unwrap();
        for (i, &code) in codes.iter().enumerate() {
            assert_eq!(bv.get_bit(i).unwrap(), code >= literal_a && code <= literal_b);
        }

        let mut bv2 = table.create_bit_vector();
        column.scan(Comparator::Lt, literal_a, &mut bv2, CombineOp::Set).unwrap();
        column.scan(Comparator::Gt, literal_b, &mut bv2, CombineOp::Or).unwrap();
        for (i, &code) in codes.iter().enumerate() {
            assert_eq!(bv2.get_bit(i).unwrap(), code < literal_a || code > literal_b);
        }
    }

    /// Appending a code that overflows the configured width always
    /// reports the true minimum width, and a rebuild at that width
    /// always preserves every previously-appended code.
    #[test]
    fn width_promotion_preserves_codes(
        codes in vec(0u64..8, 1..100),
        overflow in 8u64..64,
    ) {
        let mut table = Table::with_block_codes("t", Options::default(), 32);
        table.add_column("v", ColumnType::Horizontal, 3).unwrap();
        table.append_to_column("v", &codes).unwrap();

        table.append_to_column("v", &[overflow]).unwrap();

        let column = table.get_column("v").unwrap();
        assert_eq!(column.num_values(), codes.len() + 1);
        for (i, &expected) in codes.iter().enumerate() {
            assert_eq!(column.get_code(i).unwrap(), expected);
        }
        assert_eq!(column.get_code(codes.len()).unwrap(), overflow);
    }

    /// `num_values` only ever grows by the length of a successful
    /// append batch, and never moves on a failed one.
    #[test]
    fn num_values_is_monotone_across_batches(
        batches in vec(vec(0u64..16, 0..50), 0..10),
    ) {
        let mut table = Table::with_block_codes("t", Options::default(), 64);
        table.add_column("v", ColumnType::Vertical, 4).unwrap();
        let mut total = 0usize;
        for batch in &batches {
            let before = table.get_column("v").unwrap().num_values();
            assert_eq!(before, total);
            table.append_to_column("v", batch).unwrap();
            total += batch.len();
        }
        assert_eq!(table.get_column("v").unwrap().num_values(), total);
        assert_eq!(table.num_rows(), total);
    }

    /// A row iterator over a scan's bit-vector visits exactly the
    /// matching rows, in ascending order, and every value it reads
    /// back matches a direct `get_code` at the same position.
    #[test]
    fn row_iterator_visits_exactly_matching_rows_in_order(
        codes in vec(0u64..16, 1..300),
        literal in 0u64..16,
    ) {
        let mut table = Table::with_block_codes("t", Options::default(), 47);
        table.add_column("v", ColumnType::Horizontal, 4).unwrap();
        table.append_to_column("v", &codes).unwrap();

        let column = table.get_column("v").unwrap();
        let mut bv = table.create_bit_vector();
        column.scan(Comparator::Lt, literal, &mut bv, CombineOp::Set).unwrap();

        let expected: Vec<usize> = codes
            .iter()
            .enumerate()
            .filter(|(_, &c)| c < literal)
            .map(|(i, _)| i)
            .collect();

        let mut walked = Vec::new();
        if !expected.is_empty() {
            let mut cursor = table.create_iterator(Some(&bv));
            loop {
                walked.push(cursor.get_code(column).unwrap());
                if !cursor.advance() {
                    break;
                }
            }
        }
        let expected_codes: Vec<u64> = expected.iter().map(|&i| codes[i]).collect();
        assert_eq!(walked, expected_codes);
    }

    /// `write_at` followed by `get_code` always reads back the written
    /// code, whether it overwrites an existing slot or extends the
    /// column past its current length.
    #[test]
    fn write_at_roundtrips_through_get_code(
        codes in vec(0u64..16, 1..100),
        pos in 0usize..150,
        values in vec(0u64..16, 1..20),
    ) {
        prop_assume!(pos <= codes.len());

        let mut table = Table::with_block_codes("t", Options::default(), 32);
        table.add_column("v", ColumnType::Horizontal, 4).unwrap();
        table.append_to_column("v", &codes).unwrap();

        let column = table.get_column_mut("v").unwrap();
        column.write_at(pos, &values).unwrap();
        for (i, &expected) in values.iter().enumerate() {
            assert_eq!(column.get_code(pos + i).unwrap(), expected);
        }
        for (i, &expected) in codes.iter().enumerate() {
            if i < pos || i >= pos + values.len() {
                assert_eq!(column.get_code(i).unwrap(), expected);
            }
        }
    }

    /// A table saved to disk and reopened (not `in_memory`) scans
    /// identically to the table that produced it. The wire format
    /// carries no `block_codes` field, so this only holds for tables
    /// built at the default block size.
    #[test]
    fn reopened_table_scans_match_original(
        codes in vec(0u64..16, 0..300),
        literal in 0u64..16,
    ) {
        let dir = scratch_dir("reopen");
        let _ = std::fs::remove_dir_all(&dir);

        let mut table = Table::new("t", Options::default());
        table.add_column("v", ColumnType::Horizontal, 4).unwrap();
        table.append_to_column("v", &codes).unwrap();
        table.save(&dir).unwrap();

        let reopened = Table::open(&dir, Options::default()).unwrap();
        let original_column = table.get_column("v").unwrap();
        let reopened_column = reopened.get_column("v").unwrap();

        for cmp in COMPARATORS {
            let mut bv_original = table.create_bit_vector();
            original_column.scan(cmp, literal, &mut bv_original, CombineOp::Set).unwrap();
            let mut bv_reopened = reopened.create_bit_vector();
            reopened_column.scan(cmp, literal, &mut bv_reopened, CombineOp::Set).unwrap();
            assert!(bv_original.equals(&bv_reopened), "mismatch for {:?}", cmp);
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
