// Copyright (c) 2025 Cloudflare, Inc.

//! A dense matrix implementation over GF(2). Each row is a packed [`BitVector`].

use std::io::{Cursor, Read};

use rayon::prelude::*;
use zeroize::Zeroize;

use crate::{
    bits::{alloc_words, dot_words, word_count, BitVector, WORD_BITS},
    error::{Error, Result},
};

/// A matrix over GF(2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitMatrix {
    pub(crate) num_rows: usize,
    pub(crate) num_cols: usize,
    pub(crate) rows: Vec<BitVector>,
}

impl BitMatrix {
    /// Construct the `num_rows`-by-`num_cols` zero matrix.
    pub fn zeros(num_rows: usize, num_cols: usize) -> Result<Self> {
        let mut rows = Vec::new();
        rows.try_reserve_exact(num_rows)?;
        for _ in 0..num_rows {
            rows.push(BitVector::zeros(num_cols)?);
        }
        Ok(Self {
            num_rows,
            num_cols,
            rows,
        })
    }

    /// Assemble a matrix from its rows, each of which must have length `num_cols`.
    pub fn from_rows(num_cols: usize, rows: Vec<BitVector>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|row| row.len() != num_cols) {
            return Err(Error::length(num_cols, row.len()));
        }
        Ok(Self {
            num_rows: rows.len(),
            num_cols,
            rows,
        })
    }

    pub fn identity(n: usize) -> Result<Self> {
        let mut m = Self::zeros(n, n)?;
        for i in 0..n {
            m.set(i, i, true);
        }
        Ok(m)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn rows(&self) -> &[BitVector] {
        &self.rows
    }

    pub fn row(&self, i: usize) -> &BitVector {
        &self.rows[i]
    }

    /// Get the value of `M[i, j]`.
    pub fn get(&self, i: usize, j: usize) -> bool {
        self.rows[i].get(j)
    }

    /// Set `M[i, j]` to `val`.
    pub fn set(&mut self, i: usize, j: usize, val: bool) {
        self.rows[i].set(j, val);
    }

    /// Set `M[i, j] = M[i, j] + val`.
    pub fn add_to(&mut self, i: usize, j: usize, val: bool) {
        if val {
            self.rows[i].flip(j);
        }
    }

    /// Indicate whether `M[i, j] == false` for all `i, j`.
    pub fn is_zero(&self) -> bool {
        self.rows.iter().all(BitVector::is_zero)
    }

    /// Return `M^T`.
    pub fn transpose(&self) -> Result<Self> {
        let mut t = Self::zeros(self.num_cols, self.num_rows)?;
        for (i, row) in self.rows.iter().enumerate() {
            let (word, bit) = (i / WORD_BITS, 1u64 << (i % WORD_BITS));
            for j in row.ones() {
                t.rows[j].words[word] |= bit;
            }
        }
        Ok(t)
    }

    /// Return `M + N`.
    pub fn add(&self, other: &Self) -> Result<Self> {
        if (self.num_rows, self.num_cols) != (other.num_rows, other.num_cols) {
            return Err(self.mismatch(other.num_rows, other.num_cols));
        }
        let rows = self
            .rows
            .iter()
            .zip(&other.rows)
            .map(|(a, b)| a.xor(b))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            num_rows: self.num_rows,
            num_cols: self.num_cols,
            rows,
        })
    }

    /// Return `M*x`.
    pub fn mul_by_vec(&self, x: &BitVector) -> Result<BitVector> {
        if self.num_cols != x.len() {
            return Err(self.mismatch(x.len(), 1));
        }
        // Each output word packs the products of 64 consecutive rows.
        let words = self
            .rows
            .par_chunks(WORD_BITS)
            .map(|chunk| {
                chunk.iter().enumerate().fold(0u64, |acc, (k, row)| {
                    acc | u64::from(dot_words(&row.words, &x.words)) << k
                })
            })
            .collect::<Vec<u64>>();
        debug_assert_eq!(words.len(), word_count(self.num_rows));
        Ok(BitVector {
            len: self.num_rows,
            words,
        })
    }

    /// Return `M*N`.
    ///
    /// `N` is transposed once so that every entry of the product is the inner product of two
    /// packed rows. Rows of the product are computed in parallel.
    pub fn mul(&self, other: &Self) -> Result<Self> {
        if self.num_cols != other.num_rows {
            return Err(self.mismatch(other.num_rows, other.num_cols));
        }

        let other_t = other.transpose()?;
        let rows = self
            .rows
            .par_iter()
            .map(|a| {
                let mut c = BitVector::zeros(other.num_cols)?;
                for (j, b) in other_t.rows.iter().enumerate() {
                    if dot_words(&a.words, &b.words) {
                        c.words[j / WORD_BITS] |= 1u64 << (j % WORD_BITS);
                    }
                }
                Ok(c)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            num_rows: self.num_rows,
            num_cols: other.num_cols,
            rows,
        })
    }

    /// Encode as `i32 rows`, `i32 cols`, then each row's words, all little-endian.
    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        let dims = |n: usize| {
            i32::try_from(n).map_err(|_| Error::invalid(format!("dimension {n} exceeds i32")))
        };
        let row_words = word_count(self.num_cols);
        let mut bytes = Vec::with_capacity(8 + self.num_rows * row_words * 8);
        bytes.extend_from_slice(&dims(self.num_rows)?.to_le_bytes());
        bytes.extend_from_slice(&dims(self.num_cols)?.to_le_bytes());
        for row in self.rows.iter() {
            for word in row.words.iter() {
                bytes.extend_from_slice(&word.to_le_bytes());
            }
        }
        Ok(bytes)
    }

    pub(crate) fn decode(bytes: &mut Cursor<&[u8]>) -> Result<Self> {
        let num_rows = read_dim(bytes).map_err(|e| Error::Format(format!("rows: {e}")))?;
        let num_cols = read_dim(bytes).map_err(|e| Error::Format(format!("cols: {e}")))?;
        if num_rows == 0 || num_cols == 0 {
            return Err(Error::Format(format!("empty {num_rows}x{num_cols} matrix")));
        }

        // Refuse to allocate for a body that cannot be present.
        let row_words = word_count(num_cols);
        let total = bytes.get_ref().len() as u64;
        let remaining = total - bytes.position().min(total);
        let body = (num_rows as u64)
            .checked_mul(row_words as u64 * 8)
            .ok_or_else(|| Error::Format(format!("{num_rows}x{num_cols} is too large")))?;
        if body > remaining {
            return Err(Error::Format(format!(
                "{num_rows}x{num_cols} needs {body} bytes, only {remaining} left"
            )));
        }

        let mut m = Self::zeros(num_rows, num_cols)?;
        let mut word_bytes = [0; 8];
        for (i, row) in m.rows.iter_mut().enumerate() {
            let mut words = alloc_words(row_words)?;
            for (k, word) in words.iter_mut().enumerate() {
                bytes
                    .read_exact(&mut word_bytes)
                    .map_err(|e| Error::Format(format!("row {i}: word {k}: {e}")))?;
                *word = u64::from_le_bytes(word_bytes);
            }
            *row = BitVector::from_words(num_cols, words)
                .map_err(|e| Error::Format(format!("row {i}: {e}")))?;
        }
        Ok(m)
    }

    #[cfg(test)]
    pub(crate) fn pretty_print(&self) {
        let mut pretty = String::new();
        for row in self.rows.iter() {
            pretty += &row.to_string();
            pretty += "\n";
        }
        println!("{}\n", pretty);
    }

    fn mismatch(&self, right_rows: usize, right_cols: usize) -> Error {
        Error::DimensionMismatch {
            left_rows: self.num_rows,
            left_cols: self.num_cols,
            right_rows,
            right_cols,
        }
    }
}

/// Read a non-negative little-endian `i32`.
pub(crate) fn read_dim(bytes: &mut Cursor<&[u8]>) -> std::result::Result<usize, String> {
    let mut dim_bytes = [0; 4];
    bytes.read_exact(&mut dim_bytes).map_err(|e| e.to_string())?;
    let dim = i32::from_le_bytes(dim_bytes);
    usize::try_from(dim).map_err(|_| format!("negative dimension {dim}"))
}

impl Zeroize for BitMatrix {
    fn zeroize(&mut self) {
        for row in self.rows.iter_mut() {
            row.zeroize();
        }
    }
}
