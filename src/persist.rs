// Copyright 2021 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Bit-exact persisted file format, gated behind
//! `Options::in_memory == false`.
//!
//! Layout:
//!   - table meta file: a `u64` length-prefixed text region holding
//!     whitespace-separated tokens `num_rows num_columns (name type
//!     width)*`, `type` a single integer tag (`Naive=0, H=1, V=2`).
//!   - one file per column: for each block in order, `u64 count`,
//!     `u64 num_used_words` (omitted for `Naive`), then the raw words.
//!
//! Endianness and word width are host-defined; the format makes no
//! portability promise across platforms with a different `usize`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::ColumnType;

fn io_err(path: &Path, source: std::io::Error) -> Error {
    Error::io(path, source)
}

pub(crate) fn write_u64<W: Write>(w: &mut W, path: &Path, v: u64) -> Result<()> {
    w.write_all(&v.to_ne_bytes()).map_err(|e| io_err(path, e))
}

pub(crate) fn read_u64<R: Read>(r: &mut R, path: &Path) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|e| io_err(path, e))?;
    Ok(u64::from_ne_bytes(buf))
}

pub(crate) fn write_words<W: Write>(w: &mut W, path: &Path, words: &[u64]) -> Result<()> {
    for &word in words {
        write_u64(w, path, word)?;
    }
    Ok(())
}

pub(crate) fn read_words<R: Read>(r: &mut R, path: &Path, count: usize) -> Result<Vec<u64>> {
    (0..count).map(|_| read_u64(r, path)).collect()
}

pub(crate) fn column_type_tag(ty: ColumnType) -> u64 {
    match ty {
        ColumnType::Naive => 0,
        ColumnType::Horizontal => 1,
        ColumnType::Vertical => 2,
    }
}

pub(crate) fn column_type_from_tag(tag: u64, path: &Path) -> Result<ColumnType> {
    match tag {
        0 => Ok(ColumnType::Naive),
        1 => Ok(ColumnType::Horizontal),
        2 => Ok(ColumnType::Vertical),
        _ => Err(Error::invalid_argument(format!(
            "{}: unknown column type tag {}",
            path.display(),
            tag
        ))),
    }
}

pub(crate) fn meta_path(dir: &Path) -> PathBuf {
    dir.join("meta")
}

pub(crate) fn column_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("col_{}", name))
}

/// Write the table meta file: a `u64` byte length followed by the text
/// region itself.
pub(crate) fn save_meta(
    dir: &Path,
    num_rows: usize,
    columns: &[(String, ColumnType, u32)],
) -> Result<()> {
    let mut text = format!("{} {}", num_rows, columns.len());
    for (name, ty, width) in columns {
        text.push_str(&format!(" {} {} {}", name, column_type_tag(*ty), width));
    }
    let path = meta_path(dir);
    let file = File::create(&path).map_err(|e| io_err(&path, e))?;
    let mut w = BufWriter::new(file);
    write_u64(&mut w, &path, text.len() as u64)?;
    w.write_all(text.as_bytes()).map_err(|e| io_err(&path, e))?;
    w.flush().map_err(|e| io_err(&path, e))
}

/// Read the table meta file back into `(num_rows, [(name, type, width)])`.
pub(crate) fn load_meta(dir: &Path) -> Result<(usize, Vec<(String, ColumnType, u32)>)> {
    let path = meta_path(dir);
    let file = File::open(&path).map_err(|e| io_err(&path, e))?;
    let mut r = BufReader::new(file);
    let len = read_u64(&mut r, &path)? as usize;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes).map_err(|e| io_err(&path, e))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| Error::invalid_argument(format!("{}: meta text is not valid UTF-8", path.display())))?;
    let mut tokens = text.split_whitespace();
    let num_rows: usize = tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| Error::invalid_argument(format!("{}: missing num_rows", path.display())))?;
    let num_columns: usize = tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| Error::invalid_argument(format!("{}: missing num_columns", path.display())))?;
    let mut columns = Vec::with_capacity(num_columns);
    for _ in 0..num_columns {
        let name = tokens
            .next()
            .ok_or_else(|| Error::invalid_argument(format!("{}: truncated column list", path.display())))?
            .to_string();
        let tag: u64 = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| Error::invalid_argument(format!("{}: missing column type", path.display())))?;
        let width: u32 = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| Error::invalid_argument(format!("{}: missing column width", path.display())))?;
        columns.push((name, column_type_from_tag(tag, &path)?, width));
    }
    Ok((num_rows, columns))
}

/// Remove every file this module may have written under `dir`, used
/// by `Options::delete_existing` on open.
pub(crate) fn delete_existing(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    Ok(())
}
