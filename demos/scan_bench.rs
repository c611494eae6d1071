// Copyright 2021 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Compares scan throughput across the three column layouts for a
//! range of predicate selectivities.

use std::time::Instant;

use rand::Rng;

use bwcol::{ColumnType, Comparator, CombineOp, Options, Table};

const NUM_ROWS: usize = 4_000_000;
const WIDTH: u32 = 10;
const BLOCK_CODES: usize = 1 << 20;

fn build_table(column_type: ColumnType, codes: &[u64]) -> Table {
    let mut table = Table::with_block_codes("bench", Options::default(), BLOCK_CODES);
    table.add_column("v", column_type, WIDTH).unwrap();
    table.append_to_column("v", codes).unwrap();
    table
}

fn bench_scan(label: &str, table: &Table, literal: u64) {
    let column = table.get_column("v").unwrap();
    let mut bv = table.create_bit_vector();
    let start = Instant::now();
    column.scan(Comparator::Lt, literal, &mut bv, CombineOp::Set).unwrap();
    let elapsed = start.elapsed();
    log::info!(
        "{label}: literal={literal} matches={} rows={} in {:?} ({:.1} Mrows/s)",
        bv.count(),
        NUM_ROWS,
        elapsed,
        NUM_ROWS as f64 / elapsed.as_secs_f64() / 1e6
    );
}

fn main() {
    env_logger::init();

    let max_code = (1u64 << WIDTH) - 1;
    let mut rng = rand::thread_rng();
    let codes: Vec<u64> = (0..NUM_ROWS).map(|_| rng.gen_range(0..=max_code)).collect();

    let naive = build_table(ColumnType::Naive, &codes);
    let horizontal = build_table(ColumnType::Horizontal, &codes);
    let vertical = build_table(ColumnType::Vertical, &codes);

    for &selectivity in &[1u64, max_code / 16, max_code / 2, max_code] {
        bench_scan("naive", &naive, selectivity);
        bench_scan("horizontal", &horizontal, selectivity);
        bench_scan("vertical", &vertical, selectivity);
    }
}
