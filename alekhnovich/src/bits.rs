// Copyright (c) 2025 Cloudflare, Inc.

//! Packed vectors over GF(2).
//!
//! Bit `i` of a vector lives in word `i / 64` at position `i % 64`. Bits of the last word past
//! the logical length are always zero; every constructor and mutator maintains this, and the
//! word-level arithmetic in this crate relies on it.

use std::fmt;

use zeroize::Zeroize;

use crate::error::{Error, Result};

pub(crate) const WORD_BITS: usize = 64;

/// The number of words needed to store `len` bits.
pub(crate) fn word_count(len: usize) -> usize {
    len.div_ceil(WORD_BITS)
}

/// Mask of the valid bits in the last word of a `len`-bit vector.
pub(crate) fn tail_mask(len: usize) -> u64 {
    match len % WORD_BITS {
        0 => u64::MAX,
        r => (1 << r) - 1,
    }
}

/// Allocate `n` zeroed words, reporting exhaustion instead of aborting.
pub(crate) fn alloc_words(n: usize) -> Result<Vec<u64>> {
    let mut words = Vec::new();
    words.try_reserve_exact(n)?;
    words.resize(n, 0);
    Ok(words)
}

/// Inner product over GF(2) of two equally sized word runs.
pub(crate) fn dot_words(a: &[u64], b: &[u64]) -> bool {
    debug_assert_eq!(a.len(), b.len());
    let acc = a.iter().zip(b).fold(0u64, |acc, (x, y)| acc ^ (x & y));
    acc.count_ones() & 1 == 1
}

/// A vector over GF(2), packed into 64-bit words.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitVector {
    pub(crate) len: usize,
    pub(crate) words: Vec<u64>,
}

impl BitVector {
    /// The all-zero vector of length `len`.
    pub fn zeros(len: usize) -> Result<Self> {
        Ok(Self {
            len,
            words: alloc_words(word_count(len))?,
        })
    }

    /// Wrap raw words. Fails if the word count does not match `len` or if any bit past `len` is
    /// set.
    pub fn from_words(len: usize, words: Vec<u64>) -> Result<Self> {
        if words.len() != word_count(len) {
            return Err(Error::Format(format!(
                "{} words cannot hold exactly {len} bits",
                words.len()
            )));
        }
        if let Some(last) = words.last() {
            if last & !tail_mask(len) != 0 {
                return Err(Error::Format(format!("bits set past length {len}")));
            }
        }
        Ok(Self { len, words })
    }

    pub fn from_bools(bits: &[bool]) -> Result<Self> {
        let mut words = alloc_words(word_count(bits.len()))?;
        for (i, _) in bits.iter().enumerate().filter(|(_, b)| **b) {
            words[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
        }
        Ok(Self {
            len: bits.len(),
            words,
        })
    }

    /// Read a `len`-bit vector from text. The first `len` characters are consumed: `'1'` sets
    /// the bit and anything else leaves it clear. Short input is padded with zeros.
    pub fn parse_bits(text: &str, len: usize) -> Result<Self> {
        let mut v = Self::zeros(len)?;
        for (i, c) in text.chars().take(len).enumerate() {
            if c == '1' {
                v.set(i, true);
            }
        }
        Ok(v)
    }

    pub fn to_bools(&self) -> Vec<bool> {
        (0..self.len).map(|i| self.get(i)).collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn get(&self, i: usize) -> bool {
        assert!(i < self.len, "bit {i} out of range for length {}", self.len);
        self.words[i / WORD_BITS] >> (i % WORD_BITS) & 1 == 1
    }

    pub fn set(&mut self, i: usize, val: bool) {
        assert!(i < self.len, "bit {i} out of range for length {}", self.len);
        let bit = 1u64 << (i % WORD_BITS);
        if val {
            self.words[i / WORD_BITS] |= bit;
        } else {
            self.words[i / WORD_BITS] &= !bit;
        }
    }

    pub fn flip(&mut self, i: usize) {
        assert!(i < self.len, "bit {i} out of range for length {}", self.len);
        self.words[i / WORD_BITS] ^= 1u64 << (i % WORD_BITS);
    }

    /// Hamming weight.
    pub fn weight(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Indices of the set bits, in increasing order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(k, &w)| {
            let mut w = w;
            std::iter::from_fn(move || {
                if w == 0 {
                    return None;
                }
                let j = w.trailing_zeros() as usize;
                w &= w - 1;
                Some(k * WORD_BITS + j)
            })
        })
    }

    /// Return `a + b`.
    pub fn xor(&self, other: &Self) -> Result<Self> {
        let mut out = self.clone();
        out.xor_assign(other)?;
        Ok(out)
    }

    /// Set `a = a + b`.
    pub fn xor_assign(&mut self, other: &Self) -> Result<()> {
        self.check_len(other)?;
        for (x, y) in self.words.iter_mut().zip(&other.words) {
            *x ^= y;
        }
        Ok(())
    }

    /// Return the coordinate-wise product `a * b`.
    pub fn and(&self, other: &Self) -> Result<Self> {
        self.check_len(other)?;
        Ok(Self {
            len: self.len,
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(x, y)| x & y)
                .collect(),
        })
    }

    /// Inner product `<a, b>`.
    pub fn dot(&self, other: &Self) -> Result<bool> {
        self.check_len(other)?;
        Ok(dot_words(&self.words, &other.words))
    }

    pub fn hamming_distance(&self, other: &Self) -> Result<usize> {
        self.check_len(other)?;
        Ok(self
            .words
            .iter()
            .zip(&other.words)
            .map(|(x, y)| (x ^ y).count_ones() as usize)
            .sum())
    }

    /// Return `a || b`, the bits of `a` followed by the bits of `b`.
    pub fn concat(&self, other: &Self) -> Result<Self> {
        let len = self.len + other.len;
        let shift = self.len % WORD_BITS;
        let mut words = Vec::new();
        words.try_reserve_exact(self.words.len() + other.words.len())?;
        words.extend_from_slice(&self.words);
        if shift == 0 {
            words.extend_from_slice(&other.words);
        } else {
            for &w in other.words.iter() {
                let last = words.len() - 1;
                words[last] |= w << shift;
                words.push(w >> (WORD_BITS - shift));
            }
            // The carry out of the last word is zero whenever it is not needed.
            words.truncate(word_count(len));
        }
        Ok(Self { len, words })
    }

    /// Return bits `start..end` as a new vector.
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.len {
            return Err(Error::invalid(format!(
                "range {start}..{end} out of bounds for length {}",
                self.len
            )));
        }
        let len = end - start;
        let base = start / WORD_BITS;
        let shift = start % WORD_BITS;
        let mut words = alloc_words(word_count(len))?;
        for (k, out) in words.iter_mut().enumerate() {
            let lo = self.words[base + k] >> shift;
            let hi = match (shift, self.words.get(base + k + 1)) {
                (0, _) | (_, None) => 0,
                (_, Some(next)) => next << (WORD_BITS - shift),
            };
            *out = lo | hi;
        }
        let mut v = Self { len, words };
        v.mask_tail();
        Ok(v)
    }

    /// Split into `(self[..mid], self[mid..])`.
    pub fn split_at(&self, mid: usize) -> Result<(Self, Self)> {
        Ok((self.slice(0, mid)?, self.slice(mid, self.len)?))
    }

    pub(crate) fn mask_tail(&mut self) {
        let mask = tail_mask(self.len);
        if let Some(last) = self.words.last_mut() {
            *last &= mask;
        }
    }

    fn check_len(&self, other: &Self) -> Result<()> {
        if self.len != other.len {
            return Err(Error::length(self.len, other.len));
        }
        Ok(())
    }
}

impl Zeroize for BitVector {
    fn zeroize(&mut self) {
        self.words.zeroize();
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len {
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({}; {self})", self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::prelude::*;

    fn rand_bools<R: Rng>(rng: &mut R, len: usize) -> Vec<bool> {
        std::iter::repeat_with(|| rng.gen()).take(len).collect()
    }

    #[test]
    fn basic_operations() {
        let mut v = BitVector::zeros(130).unwrap();
        assert_eq!(v.words().len(), 3);

        v.set(0, true);
        v.set(64, true);
        v.set(129, true);
        assert!(v.get(0));
        assert!(v.get(64));
        assert!(v.get(129));
        assert!(!v.get(1));
        assert_eq!(v.weight(), 3);
        assert_eq!(v.ones().collect::<Vec<_>>(), vec![0, 64, 129]);

        v.flip(129);
        assert!(!v.get(129));
        v.set(0, false);
        assert_eq!(v.weight(), 1);
    }

    #[test]
    #[should_panic]
    fn get_out_of_range() {
        BitVector::zeros(10).unwrap().get(10);
    }

    #[test]
    fn from_words_checks_tail() {
        assert!(BitVector::from_words(3, vec![0b111]).is_ok());
        assert!(matches!(
            BitVector::from_words(3, vec![0b1000]),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            BitVector::from_words(65, vec![0]),
            Err(Error::Format(_))
        ));
        assert!(BitVector::from_words(0, vec![]).unwrap().is_empty());
    }

    #[test]
    fn xor_with_self_is_zero() {
        let mut rng = thread_rng();
        let v = BitVector::from_bools(&rand_bools(&mut rng, 200)).unwrap();
        let z = v.xor(&v).unwrap();
        assert_eq!(z.len(), 200);
        assert!(z.is_zero());
    }

    #[test]
    fn length_mismatch() {
        let a = BitVector::zeros(10).unwrap();
        let b = BitVector::zeros(11).unwrap();
        assert!(matches!(
            a.xor(&b),
            Err(Error::LengthMismatch {
                expected: 10,
                actual: 11
            })
        ));
        assert!(a.and(&b).is_err());
        assert!(a.dot(&b).is_err());
        assert!(a.hamming_distance(&b).is_err());
    }

    #[test]
    fn dot_is_parity_of_and() {
        let a = BitVector::from_bools(&[true, true, false, true]).unwrap();
        let b = BitVector::from_bools(&[true, true, true, false]).unwrap();
        assert!(!a.dot(&b).unwrap());
        let c = BitVector::from_bools(&[true, false, false, false]).unwrap();
        assert!(a.dot(&c).unwrap());
        assert_eq!(a.and(&b).unwrap().to_bools(), vec![true, true, false, false]);
    }

    #[test]
    fn concat_unaligned() {
        let mut rng = thread_rng();
        for (la, lb) in [(0, 5), (5, 0), (3, 70), (64, 64), (63, 65), (100, 190)] {
            let a = rand_bools(&mut rng, la);
            let b = rand_bools(&mut rng, lb);
            let c = BitVector::from_bools(&a)
                .unwrap()
                .concat(&BitVector::from_bools(&b).unwrap())
                .unwrap();

            let mut expected = a.clone();
            expected.extend_from_slice(&b);
            assert_eq!(c, BitVector::from_bools(&expected).unwrap(), "{la} + {lb}");
            assert_eq!(c.words().len(), word_count(la + lb));
        }
    }

    #[test]
    fn oversized_allocation_is_reported() {
        // The word buffers behind zeros, from_bools and concat all fail this way.
        assert!(matches!(
            alloc_words(usize::MAX / 2),
            Err(Error::AllocationFailure(_))
        ));
        assert!(BitVector::from_bools(&[]).unwrap().is_empty());
        let empty = BitVector::zeros(0).unwrap();
        assert_eq!(empty.concat(&empty).unwrap(), empty);
    }

    #[test]
    fn split_undoes_concat() {
        let mut rng = thread_rng();
        let a = BitVector::from_bools(&rand_bools(&mut rng, 77)).unwrap();
        let b = BitVector::from_bools(&rand_bools(&mut rng, 141)).unwrap();
        let (x, y) = a.concat(&b).unwrap().split_at(77).unwrap();
        assert_eq!(x, a);
        assert_eq!(y, b);
        assert!(a.split_at(78).is_err());
    }

    #[test]
    fn parse_bits_pads_and_truncates() {
        let v = BitVector::parse_bits("1011", 6).unwrap();
        assert_eq!(v.to_string(), "101100");
        let v = BitVector::parse_bits("10x1\n111", 4).unwrap();
        assert_eq!(v.to_string(), "1001");
    }

    #[test]
    fn hamming_distance() {
        let a = BitVector::parse_bits("1011", 4).unwrap();
        let b = BitVector::parse_bits("0010", 4).unwrap();
        assert_eq!(a.hamming_distance(&b).unwrap(), 2);
        assert_eq!(a.hamming_distance(&a).unwrap(), 0);
    }
}
