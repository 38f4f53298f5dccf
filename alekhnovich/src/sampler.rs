// Copyright (c) 2025 Cloudflare, Inc.

//! Sampling of uniform and fixed-weight vectors and matrices.

use crate::{
    bits::{tail_mask, BitVector},
    error::{Error, Result},
    matrix::BitMatrix,
    prng::Xoshiro256StarStar,
};

/// Sample an `n`-bit vector with each bit independently uniform.
pub fn sample_uniform(rng: &mut Xoshiro256StarStar, n: usize) -> Result<BitVector> {
    let mut v = BitVector::zeros(n)?;
    for word in v.words.iter_mut() {
        *word = rng.next_word();
    }
    if let Some(last) = v.words.last_mut() {
        *last &= tail_mask(n);
    }
    Ok(v)
}

/// Sample an `n`-bit vector with exactly `w` bits set, with the positions chosen uniformly
/// without replacement.
///
/// Positions are drawn as `next() mod n` and redrawn on collision. `w = 0` yields the zero
/// vector.
pub fn sample_fixed_weight(rng: &mut Xoshiro256StarStar, n: usize, w: usize) -> Result<BitVector> {
    if n == 0 {
        return Err(Error::invalid("cannot sample a vector of length 0"));
    }
    if w > n {
        return Err(Error::invalid(format!(
            "weight {w} exceeds vector length {n}"
        )));
    }

    let mut v = BitVector::zeros(n)?;
    let n_u64 = n as u64;
    for _ in 0..w {
        let pos = loop {
            let pos = (rng.next_word() % n_u64) as usize;
            if !v.get(pos) {
                break pos;
            }
        };
        v.set(pos, true);
    }
    Ok(v)
}

/// Sample a `rows`-by-`cols` matrix with uniform entries.
pub fn random_matrix(rng: &mut Xoshiro256StarStar, rows: usize, cols: usize) -> Result<BitMatrix> {
    let mut m = BitMatrix::zeros(rows, cols)?;
    for row in m.rows.iter_mut() {
        *row = sample_uniform(rng, cols)?;
    }
    Ok(m)
}

/// Sample a `rows`-by-`cols` matrix in which every row has weight exactly `w`.
pub fn fixed_weight_matrix(
    rng: &mut Xoshiro256StarStar,
    rows: usize,
    cols: usize,
    w: usize,
) -> Result<BitMatrix> {
    let mut m = BitMatrix::zeros(rows, cols)?;
    for row in m.rows.iter_mut() {
        *row = sample_fixed_weight(rng, cols, w)?;
    }
    Ok(m)
}
