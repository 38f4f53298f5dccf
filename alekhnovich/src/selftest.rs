// Copyright (c) 2025 Cloudflare, Inc.

//! End-to-end checks run by `alekhnovich test`.
//!
//! Both modes work in an output directory and leave every intermediate file behind for
//! inspection.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::{
    correct,
    error::{Error, Result},
    keyfile::{self, KeyKind},
    sampler::sample_uniform,
    Alekhnovich, NoisyPke, Packet, PrivateKey, PublicKey, Xoshiro256StarStar,
};

pub const A_PUB: &str = "a_pub.bin";
pub const Y_PUB: &str = "y_pub.bin";
pub const S_PRIV: &str = "s_priv.bin";
pub const MESSAGE: &str = "message.bin";
pub const NONCE: &str = "nonce.bin";
pub const CIPHERTEXT: &str = "ciphertext.bin";
pub const NOISY: &str = "noisy.bin";
pub const PLAIN: &str = "plain.bin";
pub const TRIALS: [&str; 3] = ["test1.bin", "test2.bin", "test3.bin"];

/// Hamming distances from the original message observed by a self-test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    /// One entry per decryption.
    pub trial_distances: Vec<usize>,
    /// Distance after majority correction, if the mode corrects.
    pub corrected_distance: Option<usize>,
}

/// Generate keys, round-trip them and one packet through files, and decrypt.
pub fn full(scheme: &Alekhnovich, dir: &Path, rng: &mut Xoshiro256StarStar) -> Result<Report> {
    info!("generating keys");
    let (pk, sk) = scheme.key_gen(rng)?;
    write_keys(dir, &pk, &sk)?;

    let (pk_read, sk_read) = read_keys(dir)?;
    if pk_read != pk || sk_read != sk {
        return Err(Error::Format("keys read back differ from keys written".into()));
    }
    info!("keys read back correctly");

    let message = sample_uniform(rng, scheme.message_len())?;
    keyfile::write_packet(&dir.join(MESSAGE), &message)?;

    let packet = scheme.encrypt(&pk, &message, rng)?;
    keyfile::write_packet(&dir.join(NONCE), &packet.nonce)?;
    keyfile::write_packet(&dir.join(CIPHERTEXT), &packet.ciphertext)?;
    let packet_read = Packet {
        nonce: keyfile::read_packet(&dir.join(NONCE))?,
        ciphertext: keyfile::read_packet(&dir.join(CIPHERTEXT))?,
    };
    if packet_read != packet {
        return Err(Error::Format("packets read back differ from packets written".into()));
    }
    info!("packets read back correctly");

    let noisy = scheme.decrypt(&sk_read, &packet_read)?;
    keyfile::write_packet(&dir.join(NOISY), &noisy)?;
    let distance = noisy.hamming_distance(&message)?;
    info!(distance, "decrypted");

    Ok(Report {
        trial_distances: vec![distance],
        corrected_distance: None,
    })
}

/// Read existing keys, decrypt a random message three times and correct the results.
pub fn trials(scheme: &Alekhnovich, dir: &Path, rng: &mut Xoshiro256StarStar) -> Result<Report> {
    let (pk, sk) = read_keys(dir)?;

    let message = sample_uniform(rng, pk.y().num_rows())?;
    keyfile::write_packet(&dir.join(MESSAGE), &message)?;

    let mut trial_distances = Vec::with_capacity(TRIALS.len());
    for name in TRIALS {
        // Each trial draws its noise from its own substream.
        let mut trial_rng = rng.split_long();
        let packet = scheme.encrypt(&pk, &message, &mut trial_rng)?;
        let noisy = scheme.decrypt(&sk, &packet)?;
        keyfile::write_packet(&dir.join(name), &noisy)?;

        let distance = noisy.hamming_distance(&message)?;
        info!(trial = name, distance, "decrypted");
        trial_distances.push(distance);
    }

    let [a, b, c] = trial_paths(dir).map(|path| keyfile::read_packet(&path));
    let corrected = correct(&a?, &b?, &c?)?;
    keyfile::write_packet(&dir.join(PLAIN), &corrected)?;
    let corrected_distance = corrected.hamming_distance(&message)?;
    info!(distance = corrected_distance, "corrected with three trials");

    Ok(Report {
        trial_distances,
        corrected_distance: Some(corrected_distance),
    })
}

pub fn write_keys(dir: &Path, pk: &PublicKey, sk: &PrivateKey) -> Result<()> {
    keyfile::write_key(&dir.join(A_PUB), pk.a())?;
    keyfile::write_key(&dir.join(Y_PUB), pk.y())?;
    keyfile::write_key(&dir.join(S_PRIV), sk.s())
}

pub fn read_keys(dir: &Path) -> Result<(PublicKey, PrivateKey)> {
    let a = keyfile::read_key(&dir.join(A_PUB), KeyKind::A)?;
    let y = keyfile::read_key(&dir.join(Y_PUB), KeyKind::Y)?;
    let s = keyfile::read_key(&dir.join(S_PRIV), KeyKind::S)?;
    Ok((PublicKey::new(a, y)?, PrivateKey::new(s)))
}

fn trial_paths(dir: &Path) -> [PathBuf; 3] {
    TRIALS.map(|name| dir.join(name))
}
