// Copyright (c) 2025 Cloudflare, Inc.

//! On-disk formats for keys and packets.
//!
//! A key file is `i32 rows`, `i32 cols`, then `rows * ceil(cols / 64)` 64-bit words, row-major.
//! A packet file is `i32 len`, then `ceil(len / 64)` 64-bit words. All integers are
//! little-endian. Keys may also be wrapped in a PEM block whose contents are the key file
//! bytes.

use std::{
    fs,
    io::{Cursor, Read},
    path::Path,
};

use tracing::debug;

use crate::{
    bits::{word_count, BitVector},
    error::{Error, Result},
    matrix::{read_dim, BitMatrix},
};

/// Which matrix of a key pair a file holds. Only used to tag PEM blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    A,
    Y,
    S,
}

impl KeyKind {
    pub fn pem_tag(self) -> &'static str {
        match self {
            KeyKind::A => "ALEKHNOVICH A KEY",
            KeyKind::Y => "ALEKHNOVICH Y KEY",
            KeyKind::S => "ALEKHNOVICH S KEY",
        }
    }
}

const PEM_PREFIX: &[u8] = b"-----BEGIN";

pub fn encode_key(m: &BitMatrix) -> Result<Vec<u8>> {
    m.encode()
}

pub fn decode_key(bytes: &[u8]) -> Result<BitMatrix> {
    let mut cursor = Cursor::new(bytes);
    let m = BitMatrix::decode(&mut cursor)?;
    check_consumed(&cursor)?;
    Ok(m)
}

pub fn encode_packet(v: &BitVector) -> Result<Vec<u8>> {
    let len = i32::try_from(v.len())
        .map_err(|_| Error::invalid(format!("packet length {} exceeds i32", v.len())))?;
    let mut bytes = Vec::with_capacity(4 + v.words().len() * 8);
    bytes.extend_from_slice(&len.to_le_bytes());
    for word in v.words() {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    Ok(bytes)
}

pub fn decode_packet(bytes: &[u8]) -> Result<BitVector> {
    let mut cursor = Cursor::new(bytes);
    let len = read_dim(&mut cursor).map_err(|e| Error::Format(format!("len: {e}")))?;

    let num_words = word_count(len);
    if (num_words as u64) * 8 > bytes.len() as u64 - cursor.position() {
        return Err(Error::Format(format!(
            "{len}-bit packet truncated to {} bytes",
            bytes.len()
        )));
    }
    let mut words = Vec::new();
    words.try_reserve_exact(num_words)?;
    let mut word_bytes = [0; 8];
    for k in 0..num_words {
        cursor
            .read_exact(&mut word_bytes)
            .map_err(|e| Error::Format(format!("word {k}: {e}")))?;
        words.push(u64::from_le_bytes(word_bytes));
    }
    check_consumed(&cursor)?;
    BitVector::from_words(len, words)
}

/// Encode a key as a PEM block.
pub fn key_to_pem(m: &BitMatrix, kind: KeyKind) -> Result<String> {
    Ok(pem::encode(&pem::Pem::new(kind.pem_tag(), encode_key(m)?)))
}

/// Decode a key from a PEM block.
pub fn pem_to_key(pem_str: &str, kind: KeyKind) -> Result<BitMatrix> {
    let pem = pem::parse(pem_str).map_err(|e| Error::Format(e.to_string()))?;
    if pem.tag() != kind.pem_tag() {
        return Err(Error::Format(format!(
            "unexpected PEM tag {:?}, want {:?}",
            pem.tag(),
            kind.pem_tag()
        )));
    }
    decode_key(pem.contents())
}

pub fn write_key(path: &Path, m: &BitMatrix) -> Result<()> {
    fs::write(path, encode_key(m)?)?;
    debug!(path = %path.display(), rows = m.num_rows(), cols = m.num_cols(), "wrote key");
    Ok(())
}

pub fn write_key_pem(path: &Path, m: &BitMatrix, kind: KeyKind) -> Result<()> {
    fs::write(path, key_to_pem(m, kind)?)?;
    debug!(path = %path.display(), tag = kind.pem_tag(), "wrote PEM key");
    Ok(())
}

/// Read a key written by [`write_key`] or [`write_key_pem`].
pub fn read_key(path: &Path, kind: KeyKind) -> Result<BitMatrix> {
    let bytes = fs::read(path)?;
    let m = if bytes.starts_with(PEM_PREFIX) {
        let pem_str =
            std::str::from_utf8(&bytes).map_err(|e| Error::Format(format!("PEM: {e}")))?;
        pem_to_key(pem_str, kind)?
    } else {
        decode_key(&bytes)?
    };
    debug!(path = %path.display(), rows = m.num_rows(), cols = m.num_cols(), "read key");
    Ok(m)
}

pub fn write_packet(path: &Path, v: &BitVector) -> Result<()> {
    fs::write(path, encode_packet(v)?)?;
    debug!(path = %path.display(), len = v.len(), "wrote packet");
    Ok(())
}

pub fn read_packet(path: &Path) -> Result<BitVector> {
    let v = decode_packet(&fs::read(path)?)?;
    debug!(path = %path.display(), len = v.len(), "read packet");
    Ok(v)
}

/// Read an `len`-bit message from a text file of `'0'` and `'1'` characters. See
/// [`BitVector::parse_bits`].
pub fn read_message(path: &Path, len: usize) -> Result<BitVector> {
    BitVector::parse_bits(&fs::read_to_string(path)?, len)
}

fn check_consumed(cursor: &Cursor<&[u8]>) -> Result<()> {
    let len = cursor.get_ref().len() as u64;
    if cursor.position() != len {
        return Err(Error::Format(format!(
            "{} bytes left over",
            len - cursor.position()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;

    use crate::{prng::Xoshiro256StarStar, sampler::random_matrix, sampler::sample_uniform};

    #[test]
    fn roundtrip_key() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        let m = random_matrix(&mut rng, 13, 130).unwrap();
        let bytes = encode_key(&m).unwrap();
        assert_eq!(decode_key(&bytes).unwrap(), m);
    }

    #[test]
    fn key_trailing_bytes() {
        let m = BitMatrix::identity(4).unwrap();
        let mut bytes = encode_key(&m).unwrap();
        bytes.push(0);
        assert!(matches!(decode_key(&bytes), Err(Error::Format(_))));
    }

    #[test]
    fn roundtrip_packet() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(2);
        for len in [0, 1, 64, 100] {
            let v = sample_uniform(&mut rng, len).unwrap();
            let bytes = encode_packet(&v).unwrap();
            assert_eq!(bytes.len(), 4 + word_count(len) * 8);
            assert_eq!(decode_packet(&bytes).unwrap(), v);
        }
    }

    #[test]
    fn malformed_packets() {
        assert!(decode_packet(&[]).is_err());
        assert!(decode_packet(&(-3i32).to_le_bytes()).is_err());

        let v = BitVector::parse_bits("1011", 4).unwrap();
        let bytes = encode_packet(&v).unwrap();
        assert!(decode_packet(&bytes[..bytes.len() - 2]).is_err());

        let mut long = bytes.clone();
        long.extend_from_slice(&[0; 8]);
        assert!(decode_packet(&long).is_err());

        let mut dirty = bytes;
        dirty[4] |= 0x10;
        assert!(matches!(decode_packet(&dirty), Err(Error::Format(_))));
    }

    #[test]
    fn roundtrip_pem() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);
        let m = random_matrix(&mut rng, 5, 70).unwrap();
        let pem = key_to_pem(&m, KeyKind::Y).unwrap();
        assert!(pem.starts_with("-----BEGIN ALEKHNOVICH Y KEY-----"));
        assert_eq!(pem_to_key(&pem, KeyKind::Y).unwrap(), m);
        assert!(matches!(
            pem_to_key(&pem, KeyKind::S),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn files() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = Xoshiro256StarStar::seed_from_u64(4);
        let m = random_matrix(&mut rng, 3, 6).unwrap();

        let bin = dir.path().join("a_pub.bin");
        write_key(&bin, &m).unwrap();
        assert_eq!(read_key(&bin, KeyKind::A).unwrap(), m);

        let pem = dir.path().join("a_pub.pem");
        write_key_pem(&pem, &m, KeyKind::A).unwrap();
        assert_eq!(read_key(&pem, KeyKind::A).unwrap(), m);

        let v = sample_uniform(&mut rng, 77).unwrap();
        let packet = dir.path().join("nonce.bin");
        write_packet(&packet, &v).unwrap();
        assert_eq!(read_packet(&packet).unwrap(), v);

        let msg = dir.path().join("message.txt");
        fs::write(&msg, "1011\n").unwrap();
        assert_eq!(read_message(&msg, 4).unwrap().to_string(), "1011");

        assert!(matches!(
            read_key(&dir.path().join("missing.bin"), KeyKind::A),
            Err(Error::Io(_))
        ));
    }
}
