// Copyright (c) 2025 Cloudflare, Inc.

//! Errors returned by the core and by key/packet I/O.

use std::collections::TryReserveError;

/// Everything that can go wrong in this crate.
///
/// Shape errors (`DimensionMismatch`, `LengthMismatch`) are always caller bugs; retrying
/// will not help.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("allocation failed: {0}")]
    AllocationFailure(#[from] TryReserveError),

    #[error("dimension mismatch: {left_rows}x{left_cols} vs {right_rows}x{right_cols}")]
    DimensionMismatch {
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },

    #[error("length mismatch: expected {expected} bits, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed input: {0}")]
    Format(String),

    #[error("entropy source unavailable: {0}")]
    EntropySourceUnavailable(String),
}

impl Error {
    pub(crate) fn length(expected: usize, actual: usize) -> Self {
        Self::LengthMismatch { expected, actual }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
