// Copyright (c) 2025 Cloudflare, Inc.

//! The xoshiro256** generator used to sample keys and noise.
//!
//! The generator is an explicit value: every sampling routine takes it by `&mut`. Seed it once
//! from a strong [`EntropySource`] and hand out non-overlapping substreams with
//! [`Xoshiro256StarStar::split`] rather than reseeding per object.
//!
//! **WARNING:** xoshiro256** is not a cryptographically secure generator. Its output is
//! predictable from a handful of observed words.

use std::fmt;

use rand::{CryptoRng, RngCore, SeedableRng};

use crate::error::{Error, Result};

const JUMP: [u64; 4] = [
    0x180e_c6d3_3cfd_0aba,
    0xd5a6_1266_f0c9_392c,
    0xa958_2618_e03f_c9aa,
    0x39ab_dc45_29b1_661c,
];

const LONG_JUMP: [u64; 4] = [
    0x76e1_5d3e_fefd_cbbf,
    0xc500_4e44_1c52_2fb3,
    0x7771_0069_854e_e241,
    0x3910_9bb0_2acb_e635,
];

/// A source of seed material.
pub trait EntropySource {
    /// Fill `buf` with fresh, unpredictable bytes.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()>;
}

impl<R: RngCore + CryptoRng> EntropySource for R {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        self.try_fill_bytes(buf)
            .map_err(|e| Error::EntropySourceUnavailable(e.to_string()))
    }
}

/// xoshiro256** (Blackman and Vigna).
#[derive(Clone, PartialEq, Eq)]
pub struct Xoshiro256StarStar {
    s: [u64; 4],
}

impl Xoshiro256StarStar {
    /// Construct a generator with the given state. The all-zero state is a fixed point of the
    /// generator and is rejected.
    pub fn from_seed_words(s: [u64; 4]) -> Result<Self> {
        if s == [0; 4] {
            return Err(Error::invalid("xoshiro state must not be all zero"));
        }
        Ok(Self { s })
    }

    /// Construct a generator seeded from `source`.
    pub fn from_entropy<E: EntropySource + ?Sized>(source: &mut E) -> Result<Self> {
        let mut rng = Self { s: [0; 4] };
        rng.reseed(source)?;
        Ok(rng)
    }

    /// Construct a generator seeded by the operating system.
    pub fn from_os_entropy() -> Result<Self> {
        Self::from_entropy(&mut rand::rngs::OsRng)
    }

    /// Overwrite the state with 32 bytes drawn from `source`. On failure the state is left
    /// untouched.
    pub fn reseed<E: EntropySource + ?Sized>(&mut self, source: &mut E) -> Result<()> {
        let mut seed = [0; 32];
        source.fill(&mut seed)?;
        let s = pack_seed(&seed);
        if s == [0; 4] {
            return Err(Error::EntropySourceUnavailable(
                "source returned an all-zero seed".into(),
            ));
        }
        self.s = s;
        Ok(())
    }

    /// Return the next word and advance the state.
    #[inline]
    pub fn next_word(&mut self) -> u64 {
        let result = self.s[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Advance the state by 2^128 steps.
    pub fn jump(&mut self) {
        self.jump_by(&JUMP);
    }

    /// Advance the state by 2^192 steps.
    pub fn long_jump(&mut self) {
        self.jump_by(&LONG_JUMP);
    }

    /// Return a generator for the next 2^128 outputs of this one and move `self` past them.
    pub fn split(&mut self) -> Self {
        let sub = self.clone();
        self.jump();
        sub
    }

    /// Like [`Self::split`], but hands out 2^192 outputs. Use this to give each of several
    /// workers a stream that can itself be [`Self::split`] further.
    pub fn split_long(&mut self) -> Self {
        let sub = self.clone();
        self.long_jump();
        sub
    }

    fn jump_by(&mut self, poly: &[u64; 4]) {
        let mut s = [0; 4];
        for word in poly {
            for b in 0..64 {
                if word & (1 << b) != 0 {
                    for (acc, x) in s.iter_mut().zip(self.s) {
                        *acc ^= x;
                    }
                }
                self.next_word();
            }
        }
        self.s = s;
    }
}

/// Pack each 8-byte chunk big-endian into one state word.
fn pack_seed(seed: &[u8; 32]) -> [u64; 4] {
    let mut s = [0; 4];
    for (word, chunk) in s.iter_mut().zip(seed.chunks_exact(8)) {
        *word = chunk.iter().fold(0, |acc, b| (acc << 8) | u64::from(*b));
    }
    s
}

impl fmt::Debug for Xoshiro256StarStar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Xoshiro256StarStar").finish_non_exhaustive()
    }
}

impl RngCore for Xoshiro256StarStar {
    fn next_u32(&mut self) -> u32 {
        (self.next_word() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_word()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let word = self.next_word().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Xoshiro256StarStar {
    type Seed = [u8; 32];

    /// Pack `seed` big-endian into the state.
    ///
    /// The all-zero state is a fixed point and this trait method cannot fail, so an all-zero
    /// seed is replaced by the state of `seed_from_u64(0)`. Use
    /// [`Xoshiro256StarStar::from_seed_words`] to have it rejected instead.
    fn from_seed(seed: [u8; 32]) -> Self {
        let s = pack_seed(&seed);
        if s == [0; 4] {
            return Self::seed_from_u64(0);
        }
        Self { s }
    }
}
