// Copyright (c) 2025 Cloudflare, Inc.

//! alekhnovich: key generation, encryption, decryption and majority correction from the command
//! line. Keys and packets are exchanged as files in an output directory.

use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};

use clap::{error::ErrorKind, Parser, Subcommand, ValueEnum};
use eyre::{Context, Result};
use rand::SeedableRng;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use alekhnovich::{
    correct,
    keyfile::{self, KeyKind},
    selftest::{self, A_PUB, CIPHERTEXT, NOISY, NONCE, PLAIN, S_PRIV, Y_PUB},
    Alekhnovich, NoisyPke, Packet, Params, PrivateKey, PublicKey, Xoshiro256StarStar,
};

#[derive(Parser)]
#[command(name = "alekhnovich")]
#[command(about = "Alekhnovich LPN public-key encryption")]
#[command(version)]
struct Args {
    /// Directory that output files are written to
    #[arg(long, global = true, default_value = "target")]
    out_dir: PathBuf,

    /// Named parameter set
    #[arg(long, global = true, value_enum, default_value_t = ParamSet::Reference)]
    params: ParamSet,

    /// Override the message length
    #[arg(short, global = true)]
    l: Option<usize>,

    /// Override the secret dimension
    #[arg(short, global = true)]
    k: Option<usize>,

    /// Override the code length
    #[arg(short, global = true)]
    n: Option<usize>,

    /// Override the noise weight
    #[arg(short, global = true)]
    t: Option<usize>,

    /// Seed for a reproducible run; OS entropy is used otherwise
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum ParamSet {
    Reference,
    Toy,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a key pair
    Generate {
        /// Write PEM-armored keys instead of binary ones
        #[arg(long)]
        pem: bool,
    },
    /// Encrypt a message file of '0'/'1' characters
    Encrypt {
        message: PathBuf,
        a_key: PathBuf,
        y_key: PathBuf,
    },
    /// Decrypt a nonce and ciphertext, up to noise
    Decrypt {
        nonce: PathBuf,
        ciphertext: PathBuf,
        s_key: PathBuf,
    },
    /// Majority-correct three noisy decryptions
    Correct {
        first: PathBuf,
        second: PathBuf,
        third: PathBuf,
    },
    /// Run a self-test: 0 for the full protocol, anything else for three trials with existing keys
    Test {
        #[arg(default_value_t = 0)]
        mode: u32,
    },
}

impl Args {
    fn params(&self) -> Params {
        let base = match self.params {
            ParamSet::Reference => Params::REFERENCE,
            ParamSet::Toy => Params::TOY,
        };
        Params {
            l: self.l.unwrap_or(base.l),
            k: self.k.unwrap_or(base.k),
            n: self.n.unwrap_or(base.n),
            t: self.t.unwrap_or(base.t),
        }
    }
}

const EXIT_USAGE: u8 = 1;
const EXIT_MISSING_ARGUMENT: u8 = 2;
const EXIT_UNKNOWN_COMMAND: u8 = 3;
const EXIT_FAILURE: u8 = 4;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                ErrorKind::MissingRequiredArgument => EXIT_MISSING_ARGUMENT,
                ErrorKind::InvalidSubcommand => EXIT_UNKNOWN_COMMAND,
                _ => EXIT_USAGE,
            };
            // Nothing sensible to do if the terminal is gone.
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:?}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let params = args.params();
    let scheme = Alekhnovich::new(params).wrap_err("invalid parameters")?;
    let mut rng = match args.seed {
        Some(seed) => Xoshiro256StarStar::seed_from_u64(seed),
        None => Xoshiro256StarStar::from_os_entropy()?,
    };

    let dir = &args.out_dir;
    fs::create_dir_all(dir)
        .wrap_err_with(|| format!("failed to create {}", dir.display()))?;

    let start = Instant::now();
    match args.command {
        Command::Generate { pem } => generate(&scheme, dir, pem, &mut rng)?,
        Command::Encrypt {
            message,
            a_key,
            y_key,
        } => {
            let pk = PublicKey::new(
                keyfile::read_key(&a_key, KeyKind::A)
                    .wrap_err_with(|| format!("failed to read {}", a_key.display()))?,
                keyfile::read_key(&y_key, KeyKind::Y)
                    .wrap_err_with(|| format!("failed to read {}", y_key.display()))?,
            )?;
            let plaintext = keyfile::read_message(&message, pk.y().num_rows())
                .wrap_err_with(|| format!("failed to read {}", message.display()))?;
            let packet = scheme.encrypt(&pk, &plaintext, &mut rng)?;
            keyfile::write_packet(&dir.join(NONCE), &packet.nonce)?;
            keyfile::write_packet(&dir.join(CIPHERTEXT), &packet.ciphertext)?;
            info!("Wrote {NONCE} and {CIPHERTEXT}");
        }
        Command::Decrypt {
            nonce,
            ciphertext,
            s_key,
        } => {
            let packet = Packet {
                nonce: keyfile::read_packet(&nonce)
                    .wrap_err_with(|| format!("failed to read {}", nonce.display()))?,
                ciphertext: keyfile::read_packet(&ciphertext)
                    .wrap_err_with(|| format!("failed to read {}", ciphertext.display()))?,
            };
            let sk = PrivateKey::new(
                keyfile::read_key(&s_key, KeyKind::S)
                    .wrap_err_with(|| format!("failed to read {}", s_key.display()))?,
            );
            let noisy = scheme.decrypt(&sk, &packet)?;
            keyfile::write_packet(&dir.join(NOISY), &noisy)?;
            info!("Wrote {NOISY}");
        }
        Command::Correct {
            first,
            second,
            third,
        } => {
            let [a, b, c] = [&first, &second, &third].map(|path| {
                keyfile::read_packet(path)
                    .wrap_err_with(|| format!("failed to read {}", path.display()))
            });
            let corrected = correct(&a?, &b?, &c?)?;
            keyfile::write_packet(&dir.join(PLAIN), &corrected)?;
            info!("Wrote {PLAIN}");
        }
        Command::Test { mode } => {
            let report = if mode == 0 {
                selftest::full(&scheme, dir, &mut rng)?
            } else {
                selftest::trials(&scheme, dir, &mut rng)?
            };
            info!("Hamming distances per trial: {:?}", report.trial_distances);
            if let Some(distance) = report.corrected_distance {
                info!("Hamming distance after correction: {distance}");
            }
        }
    }
    info!("Done in {:.2?}", start.elapsed());
    Ok(())
}

fn generate(
    scheme: &Alekhnovich,
    dir: &Path,
    pem: bool,
    rng: &mut Xoshiro256StarStar,
) -> Result<()> {
    let Params { l, k, n, t } = *scheme.params();
    info!("Generating keys with L={l} K={k} N={n} T={t}");
    let (pk, sk) = scheme.key_gen(rng)?;

    if pem {
        for (name, m, kind) in [
            (A_PUB, pk.a(), KeyKind::A),
            (Y_PUB, pk.y(), KeyKind::Y),
            (S_PRIV, sk.s(), KeyKind::S),
        ] {
            let path = dir.join(name).with_extension("pem");
            keyfile::write_key_pem(&path, m, kind)?;
            info!("Wrote {}", path.display());
        }
    } else {
        selftest::write_keys(dir, &pk, &sk)?;
        info!("Wrote {A_PUB}, {Y_PUB} and {S_PRIV} to {}", dir.display());
    }
    Ok(())
}
