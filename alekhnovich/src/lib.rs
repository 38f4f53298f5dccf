// Copyright (c) 2025 Cloudflare, Inc.

//! An implementation of Alekhnovich's LPN-based public-key cryptosystem over GF(2).
//!
//! Keys are `S` (`L`-by-`K`, private), `A` (`K`-by-`N`) and `Y = S*A + E` (`L`-by-`N`), where
//! every row of `E` has weight `T`. A message is masked with `Y*e` for a fresh weight-`T` noise
//! vector `e` and sent along with the nonce `A*e`. Decryption recovers the message up to the
//! residual `E*e`, which is sparse but not always zero; [`correct`] removes most of it by
//! majority vote over independent trials.
//!
//! **WARNING:** This code is not yet production ready and is intended for experimental evaluation
//! only. The parameters have not been chosen for IND-CPA security and no effort has been made to
//! resist side channels.

pub mod bits;
pub mod error;
pub mod keyfile;
pub mod matrix;
pub mod prng;
pub mod sampler;
pub mod selftest;

use std::{fmt, time::Instant};

use tracing::debug;
use zeroize::Zeroize;

pub use crate::{
    bits::BitVector,
    error::{Error, Result},
    keyfile::KeyKind,
    matrix::BitMatrix,
    prng::{EntropySource, Xoshiro256StarStar},
};

use crate::sampler::{fixed_weight_matrix, random_matrix, sample_fixed_weight};

#[cfg(feature = "python")]
use pyo3::prelude::*;

// Python bindings, built with `maturin develop --release --features python`.
#[cfg(feature = "python")]
mod py {
    use super::*;
    use pyo3::exceptions::PyValueError;

    fn value_error(e: Error) -> PyErr {
        PyValueError::new_err(e.to_string())
    }

    // Python callers have no generator to hand in, so each call seeds its own.
    fn os_rng() -> PyResult<Xoshiro256StarStar> {
        Xoshiro256StarStar::from_os_entropy().map_err(value_error)
    }

    #[pymethods]
    impl Alekhnovich {
        #[new]
        fn py_new(l: usize, k: usize, n: usize, t: usize) -> PyResult<Self> {
            Self::new(Params { l, k, n, t }).map_err(value_error)
        }

        #[pyo3(name = "key_gen")]
        fn py_key_gen(&self) -> PyResult<(PublicKey, PrivateKey)> {
            self.key_gen(&mut os_rng()?).map_err(value_error)
        }

        /// Encrypt `bits`, returning the packet as `nonce || ciphertext`.
        #[pyo3(name = "encrypt")]
        fn py_encrypt(&self, pk: &PublicKey, bits: Vec<bool>) -> PyResult<Vec<bool>> {
            let plaintext = BitVector::from_bools(&bits).map_err(value_error)?;
            let packet = self
                .encrypt(pk, &plaintext, &mut os_rng()?)
                .map_err(value_error)?;
            Ok(packet.to_bits().map_err(value_error)?.to_bools())
        }

        #[pyo3(name = "decrypt")]
        fn py_decrypt(&self, sk: &PrivateKey, word: Vec<bool>) -> PyResult<Vec<bool>> {
            let word = BitVector::from_bools(&word).map_err(value_error)?;
            let packet = Packet::from_bits(&word, sk.s.num_cols()).map_err(value_error)?;
            let noisy = self.decrypt(sk, &packet).map_err(value_error)?;
            Ok(noisy.to_bools())
        }

        #[staticmethod]
        #[pyo3(name = "correct")]
        fn py_correct(a: Vec<bool>, b: Vec<bool>, c: Vec<bool>) -> PyResult<Vec<bool>> {
            let [a, b, c] =
                [a, b, c].map(|bits| BitVector::from_bools(&bits).map_err(value_error));
            let corrected = correct(&a?, &b?, &c?).map_err(value_error)?;
            Ok(corrected.to_bools())
        }

        #[staticmethod]
        fn key_to_pem(pk: &PublicKey) -> PyResult<String> {
            pk.to_pem().map_err(value_error)
        }

        #[staticmethod]
        fn pem_to_key(pem: &str) -> PyResult<PublicKey> {
            PublicKey::from_pem(pem).map_err(value_error)
        }
    }

    #[pymodule]
    fn alekhnovich(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_class::<Alekhnovich>()?;
        m.add_class::<PublicKey>()?;
        m.add_class::<PrivateKey>()?;
        Ok(())
    }
}

/// Dimensions of the scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Params {
    /// Message length, i.e. the number of rows of `S` and `Y`.
    pub l: usize,
    /// Secret dimension, i.e. the number of rows of `A`.
    pub k: usize,
    /// Code length, i.e. the number of columns of `A` and `Y`.
    pub n: usize,
    /// Noise weight: the weight of each row of `E` and of each encryption's noise vector.
    pub t: usize,
}

impl Params {
    /// The parameters of the reference implementation. These have not been vetted for security.
    pub const REFERENCE: Params = Params {
        l: 13_000,
        k: 1_300,
        n: 16_000,
        t: 144,
    };

    /// Parameters small enough to inspect by hand.
    pub const TOY: Params = Params {
        l: 4,
        k: 3,
        n: 6,
        t: 1,
    };

    pub fn validate(&self) -> Result<()> {
        let Params { l, k, n, t } = *self;
        if l == 0 || k == 0 || n == 0 || t == 0 {
            return Err(Error::invalid(format!(
                "dimensions must be positive: l={l} k={k} n={n} t={t}"
            )));
        }
        if t > n {
            return Err(Error::invalid(format!(
                "noise weight {t} exceeds code length {n}"
            )));
        }
        Ok(())
    }
}

/// A public-key encryption scheme whose decryption is only correct up to sparse noise.
pub trait NoisyPke {
    type PublicKey;
    type PrivateKey;

    fn key_gen(&self, rng: &mut Xoshiro256StarStar)
        -> Result<(Self::PublicKey, Self::PrivateKey)>;

    fn encrypt(
        &self,
        pk: &Self::PublicKey,
        plaintext: &BitVector,
        rng: &mut Xoshiro256StarStar,
    ) -> Result<Packet>;

    /// Return the plaintext, possibly with a few bits flipped.
    fn decrypt(&self, sk: &Self::PrivateKey, packet: &Packet) -> Result<BitVector>;

    fn message_len(&self) -> usize;

    /// Encrypt and decrypt `plaintext` `trials` times with independent noise.
    fn noisy_trials(
        &self,
        pk: &Self::PublicKey,
        sk: &Self::PrivateKey,
        plaintext: &BitVector,
        trials: usize,
        rng: &mut Xoshiro256StarStar,
    ) -> Result<Vec<BitVector>> {
        (0..trials)
            .map(|_| {
                let packet = self.encrypt(pk, plaintext, rng)?;
                self.decrypt(sk, &packet)
            })
            .collect()
    }
}

/// The public key: `A` and `Y = S*A + E`.
#[cfg_attr(feature = "python", pyclass)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    a: BitMatrix,
    y: BitMatrix,
}

impl PublicKey {
    /// `A` and `Y` must have the same number of columns.
    pub fn new(a: BitMatrix, y: BitMatrix) -> Result<Self> {
        if a.num_cols() != y.num_cols() {
            return Err(Error::DimensionMismatch {
                left_rows: a.num_rows(),
                left_cols: a.num_cols(),
                right_rows: y.num_rows(),
                right_cols: y.num_cols(),
            });
        }
        Ok(Self { a, y })
    }

    pub fn a(&self) -> &BitMatrix {
        &self.a
    }

    pub fn y(&self) -> &BitMatrix {
        &self.y
    }

    /// Encode as two PEM blocks, `A` then `Y`.
    pub fn to_pem(&self) -> Result<String> {
        let mut pem = keyfile::key_to_pem(&self.a, KeyKind::A)?;
        pem += &keyfile::key_to_pem(&self.y, KeyKind::Y)?;
        Ok(pem)
    }

    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let blocks = pem::parse_many(pem_str).map_err(|e| Error::Format(e.to_string()))?;
        let find = |kind: KeyKind| {
            blocks
                .iter()
                .find(|block| block.tag() == kind.pem_tag())
                .ok_or_else(|| Error::Format(format!("missing {} block", kind.pem_tag())))
                .and_then(|block| keyfile::decode_key(block.contents()))
        };
        Self::new(find(KeyKind::A)?, find(KeyKind::Y)?)
    }
}

/// The private key `S`. Wiped on drop.
#[cfg_attr(feature = "python", pyclass)]
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    s: BitMatrix,
}

impl PrivateKey {
    pub fn new(s: BitMatrix) -> Self {
        Self { s }
    }

    pub fn s(&self) -> &BitMatrix {
        &self.s
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.s.zeroize();
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("rows", &self.s.num_rows())
            .field("cols", &self.s.num_cols())
            .finish_non_exhaustive()
    }
}

/// The output of one encryption: the nonce `A*e` and the masked message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub nonce: BitVector,
    pub ciphertext: BitVector,
}

impl Packet {
    /// Flatten to `nonce || ciphertext`.
    pub fn to_bits(&self) -> Result<BitVector> {
        self.nonce.concat(&self.ciphertext)
    }

    /// Inverse of [`Self::to_bits`].
    pub fn from_bits(bits: &BitVector, nonce_len: usize) -> Result<Self> {
        let (nonce, ciphertext) = bits.split_at(nonce_len)?;
        Ok(Self { nonce, ciphertext })
    }
}

/// Alekhnovich's cryptosystem.
#[cfg_attr(feature = "python", pyclass)]
#[derive(Clone, Debug)]
pub struct Alekhnovich {
    params: Params,
}

impl Alekhnovich {
    pub fn new(params: Params) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Generate a key pair, also returning the error matrix `E`. The caller must not keep `E`
    /// alongside `Y`.
    fn key_gen_with_error(
        &self,
        rng: &mut Xoshiro256StarStar,
    ) -> Result<(PublicKey, PrivateKey, BitMatrix)> {
        let Params { l, k, n, t } = self.params;
        let start = Instant::now();

        let mut s_rng = rng.split();
        let mut a_rng = rng.split();
        let mut e_rng = rng.split();

        let (s, a) = rayon::join(
            || random_matrix(&mut s_rng, l, k),
            || random_matrix(&mut a_rng, k, n),
        );
        let s = PrivateKey::new(s?);
        let a = a?;
        let e = fixed_weight_matrix(&mut e_rng, l, n, t)?;
        debug!(elapsed = ?start.elapsed(), "sampled S, A and E");

        let y = s.s.mul(&a)?.add(&e)?;
        debug!(l, k, n, t, elapsed = ?start.elapsed(), "generated key pair");

        Ok((PublicKey { a, y }, s, e))
    }

    /// Encrypt under explicit noise `e`.
    fn encrypt_with_noise(
        &self,
        pk: &PublicKey,
        plaintext: &BitVector,
        e: &BitVector,
    ) -> Result<Packet> {
        if plaintext.len() != pk.y.num_rows() {
            return Err(Error::length(pk.y.num_rows(), plaintext.len()));
        }
        let nonce = pk.a.mul_by_vec(e)?;
        let mask = pk.y.mul_by_vec(e)?;
        let ciphertext = plaintext.xor(&mask)?;
        Ok(Packet { nonce, ciphertext })
    }
}

impl NoisyPke for Alekhnovich {
    type PublicKey = PublicKey;
    type PrivateKey = PrivateKey;

    fn key_gen(&self, rng: &mut Xoshiro256StarStar) -> Result<(PublicKey, PrivateKey)> {
        let (pk, sk, mut e) = self.key_gen_with_error(rng)?;
        e.zeroize();
        Ok((pk, sk))
    }

    fn encrypt(
        &self,
        pk: &PublicKey,
        plaintext: &BitVector,
        rng: &mut Xoshiro256StarStar,
    ) -> Result<Packet> {
        // The noise weight comes from the parameters and the code length from the key.
        if pk.a.num_cols() != self.params.n {
            return Err(Error::invalid(format!(
                "public key has code length {} but the parameters expect n={}",
                pk.a.num_cols(),
                self.params.n
            )));
        }
        let mut e = sample_fixed_weight(rng, pk.a.num_cols(), self.params.t)?;
        let packet = self.encrypt_with_noise(pk, plaintext, &e);
        e.zeroize();
        packet
    }

    fn decrypt(&self, sk: &PrivateKey, packet: &Packet) -> Result<BitVector> {
        let Packet { nonce, ciphertext } = packet;
        if nonce.len() != sk.s.num_cols() {
            return Err(Error::length(sk.s.num_cols(), nonce.len()));
        }
        if ciphertext.len() != sk.s.num_rows() {
            return Err(Error::length(sk.s.num_rows(), ciphertext.len()));
        }
        let key = sk.s.mul_by_vec(nonce)?;
        ciphertext.xor(&key)
    }

    fn message_len(&self) -> usize {
        self.params.l
    }
}

/// Bitwise majority of three noisy estimates of the same message.
pub fn correct(a: &BitVector, b: &BitVector, c: &BitVector) -> Result<BitVector> {
    for other in [b, c] {
        if other.len() != a.len() {
            return Err(Error::length(a.len(), other.len()));
        }
    }
    let words = a
        .words()
        .iter()
        .zip(b.words())
        .zip(c.words())
        .map(|((x, y), z)| (x & y) | (y & z) | (x & z))
        .collect();
    BitVector::from_words(a.len(), words)
}

/// Bitwise majority of an odd number of noisy estimates.
pub fn correct_many(estimates: &[BitVector]) -> Result<BitVector> {
    if estimates.len() % 2 == 0 {
        return Err(Error::invalid(format!(
            "majority needs an odd number of estimates, got {}",
            estimates.len()
        )));
    }
    if let [a, b, c] = estimates {
        return correct(a, b, c);
    }

    let len = estimates[0].len();
    if let Some(other) = estimates.iter().find(|v| v.len() != len) {
        return Err(Error::length(len, other.len()));
    }
    let mut out = BitVector::zeros(len)?;
    for i in 0..len {
        let ones = estimates.iter().filter(|v| v.get(i)).count();
        out.set(i, 2 * ones > estimates.len());
    }
    Ok(out)
}
