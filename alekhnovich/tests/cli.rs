// Copyright (c) 2025 Cloudflare, Inc.

//! Tests of the `alekhnovich` binary: exit codes and the file protocol.

use std::{
    path::Path,
    process::{Command, Output},
};

use alekhnovich::{correct, keyfile, selftest};

fn alekhnovich(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_alekhnovich"))
        .arg("--out-dir")
        .arg(dir)
        .args(["--params", "toy", "--seed", "5"])
        .args(args)
        .output()
        .unwrap()
}

fn exit_code(dir: &Path, args: &[&str]) -> i32 {
    alekhnovich(dir, args).status.code().unwrap()
}

#[test]
fn test_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(env!("CARGO_BIN_EXE_alekhnovich"))
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));

    assert_eq!(exit_code(dir.path(), &[]), 1);
    assert_eq!(exit_code(dir.path(), &["encrypt"]), 2);
    assert_eq!(exit_code(dir.path(), &["correct", "a.bin"]), 2);
    assert_eq!(exit_code(dir.path(), &["frobnicate"]), 3);
    assert_eq!(exit_code(dir.path(), &["--help"]), 0);

    // Operation failures.
    assert_eq!(
        exit_code(dir.path(), &["decrypt", "nonce.bin", "ciphertext.bin", "s.bin"]),
        4
    );
    assert_eq!(exit_code(dir.path(), &["test", "1"]), 4);
}

#[test]
fn test_protocol() {
    let dir = tempfile::tempdir().unwrap();
    let path = |name: &str| dir.path().join(name).to_str().unwrap().to_owned();

    assert!(alekhnovich(dir.path(), &["generate"]).status.success());
    for name in [selftest::A_PUB, selftest::Y_PUB, selftest::S_PRIV] {
        assert!(dir.path().join(name).is_file(), "{name}");
    }

    std::fs::write(dir.path().join("message.txt"), "1011").unwrap();
    let out = alekhnovich(
        dir.path(),
        &[
            "encrypt",
            &path("message.txt"),
            &path(selftest::A_PUB),
            &path(selftest::Y_PUB),
        ],
    );
    assert!(out.status.success());
    assert_eq!(keyfile::read_packet(&dir.path().join(selftest::NONCE)).unwrap().len(), 3);
    assert_eq!(keyfile::read_packet(&dir.path().join(selftest::CIPHERTEXT)).unwrap().len(), 4);

    let out = alekhnovich(
        dir.path(),
        &[
            "decrypt",
            &path(selftest::NONCE),
            &path(selftest::CIPHERTEXT),
            &path(selftest::S_PRIV),
        ],
    );
    assert!(out.status.success());
    assert_eq!(keyfile::read_packet(&dir.path().join(selftest::NOISY)).unwrap().len(), 4);

    // Three trials with the existing keys, then the same correction by hand.
    assert!(alekhnovich(dir.path(), &["test", "1"]).status.success());
    let out = alekhnovich(
        dir.path(),
        &[
            "correct",
            &path(selftest::TRIALS[0]),
            &path(selftest::TRIALS[1]),
            &path(selftest::TRIALS[2]),
        ],
    );
    assert!(out.status.success());
    let trials: Vec<_> = selftest::TRIALS
        .iter()
        .map(|name| keyfile::read_packet(&dir.path().join(name)).unwrap())
        .collect();
    assert_eq!(
        keyfile::read_packet(&dir.path().join(selftest::PLAIN)).unwrap(),
        correct(&trials[0], &trials[1], &trials[2]).unwrap()
    );
}

#[test]
fn test_full_self_test_and_pem() {
    let dir = tempfile::tempdir().unwrap();
    assert!(alekhnovich(dir.path(), &["test"]).status.success());
    assert!(dir.path().join(selftest::NOISY).is_file());

    assert!(alekhnovich(dir.path(), &["generate", "--pem"]).status.success());
    let pem = std::fs::read_to_string(dir.path().join("s_priv.pem")).unwrap();
    assert!(pem.starts_with("-----BEGIN ALEKHNOVICH S KEY-----"));
}

#[test]
fn test_encrypt_checks_keys_against_parameters() {
    let dir = tempfile::tempdir().unwrap();
    assert!(alekhnovich(dir.path(), &["generate"]).status.success());
    let path = |name: &str| dir.path().join(name).to_str().unwrap().to_owned();
    std::fs::write(dir.path().join("message.txt"), "1011").unwrap();

    // Toy keys, but the default reference parameters.
    let out = Command::new(env!("CARGO_BIN_EXE_alekhnovich"))
        .arg("--out-dir")
        .arg(dir.path())
        .args([
            "encrypt".to_owned(),
            path("message.txt"),
            path(selftest::A_PUB),
            path(selftest::Y_PUB),
        ])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(4));
    let log = String::from_utf8_lossy(&out.stdout);
    assert!(log.contains("n=16000"), "{log}");

    // The trial mode sizes its message from the keys, so only the code length must agree.
    assert!(alekhnovich(dir.path(), &["-l", "8", "test", "1"]).status.success());
}

#[test]
fn test_parameter_overrides() {
    let dir = tempfile::tempdir().unwrap();
    assert!(alekhnovich(dir.path(), &["-l", "8", "-n", "40", "generate"])
        .status
        .success());
    let y = keyfile::read_key(
        &dir.path().join(selftest::Y_PUB),
        keyfile::KeyKind::Y,
    )
    .unwrap();
    assert_eq!((y.num_rows(), y.num_cols()), (8, 40));

    // Noise weight larger than the code length.
    assert_eq!(exit_code(dir.path(), &["-t", "7", "generate"]), 4);
}
