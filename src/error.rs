// Copyright 2021 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Error taxonomy for the scan engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong calling into a table, column, block or
/// bit-vector. None of these are exceptions in the non-local-control-flow
/// sense, they are just enum values callers are expected to match on.
///
/// `Clone`/`PartialEq`/`Eq` are implemented by hand below: `io::Error`
/// supports none of the three, so `Io` compares and clones by its path
/// and `ErrorKind` rather than its (possibly OS-specific) source.
#[derive(Error, Debug)]
pub enum Error {
    /// Out-of-range position, width mismatch between scan and target
    /// bit-vector, unknown operator, or a literal that overflows the
    /// column's configured width.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An append saw a code too large for the column's configured
    /// width. Carries the minimum width that would have fit it.
    #[error("bit width exceeded, suggest width {suggested}")]
    WidthExceeded {
        /// Minimum width sufficient to represent every code appended
        /// so far, including the one that triggered this error.
        suggested: u32,
    },

    /// Duplicate column name, removal of an unknown column, or an
    /// iterator advanced past its end before `get_code`/`set_code`.
    #[error("usage error: {0}")]
    UsageError(String),

    /// Two bit-vectors, a bit-vector and a column, or two columns
    /// disagree in length.
    #[error("length mismatch: {0}")]
    LengthMismatch(String),

    /// A column-vs-column scan where the two sides have different
    /// storage layouts or different configured widths.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A file open/read/write/flush/close failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn usage_error(msg: impl Into<String>) -> Self {
        Error::UsageError(msg.into())
    }

    pub fn length_mismatch(msg: impl Into<String>) -> Self {
        Error::LengthMismatch(msg.into())
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Error::TypeMismatch(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::InvalidArgument(s) => Error::InvalidArgument(s.clone()),
            Error::WidthExceeded { suggested } => Error::WidthExceeded { suggested: *suggested },
            Error::UsageError(s) => Error::UsageError(s.clone()),
            Error::LengthMismatch(s) => Error::LengthMismatch(s.clone()),
            Error::TypeMismatch(s) => Error::TypeMismatch(s.clone()),
            Error::Io { path, source } => Error::Io {
                path: path.clone(),
                source: std::io::Error::from(source.kind()),
            },
        }
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::InvalidArgument(a), Error::InvalidArgument(b)) => a == b,
            (Error::WidthExceeded { suggested: a }, Error::WidthExceeded { suggested: b }) => a == b,
            (Error::UsageError(a), Error::UsageError(b)) => a == b,
            (Error::LengthMismatch(a), Error::LengthMismatch(b)) => a == b,
            (Error::TypeMismatch(a), Error::TypeMismatch(b)) => a == b,
            (Error::Io { path: pa, source: sa }, Error::Io { path: pb, source: sb }) => {
                pa == pb && sa.kind() == sb.kind()
            }
            _ => false,
        }
    }
}

impl Eq for Error {}
