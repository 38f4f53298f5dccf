// Copyright (c) 2025 Cloudflare, Inc.

use std::time::Instant;

use alekhnovich::{
    correct, sampler::sample_uniform, Alekhnovich, NoisyPke, Params, Xoshiro256StarStar,
};

fn run_test<P>(scheme: &P, rng: &mut Xoshiro256StarStar, trials: usize)
where
    P: NoisyPke,
{
    let l = scheme.message_len();

    println!("Generating key (this may take a while) ...");
    let start = Instant::now();
    let (pk, sk) = scheme.key_gen(rng).expect("key generation failed");
    let duration = start.elapsed();
    println!("Generated key in {duration:?}");

    let message = sample_uniform(rng, l).unwrap();

    let start = Instant::now();
    let packet = scheme.encrypt(&pk, &message, rng).unwrap();
    let duration = start.elapsed();
    println!("Encrypted in {duration:?}");

    let start = Instant::now();
    let noisy = scheme.decrypt(&sk, &packet).unwrap();
    let duration = start.elapsed();
    println!(
        "Decrypted in {duration:?} with {} of {l} bits flipped",
        noisy.hamming_distance(&message).unwrap()
    );

    println!("Let's try {trials} rounds of three trials each ...");
    let (mut single, mut corrected) = (0, 0);
    for _ in 0..trials {
        let noisy = scheme.noisy_trials(&pk, &sk, &message, 3, rng).unwrap();
        single += usize::from(noisy[0] == message);
        let majority = correct(&noisy[0], &noisy[1], &noisy[2]).unwrap();
        corrected += usize::from(majority == message);
    }
    println!("Single trial recovered the message {single}/{trials} times");
    println!("Majority of three recovered the message {corrected}/{trials} times");
}

fn main() {
    let mut rng = Xoshiro256StarStar::from_os_entropy().expect("no OS entropy");

    println!("Toy parameters");
    run_test(&Alekhnovich::new(Params::TOY).unwrap(), &mut rng, 1000);
    println!();

    println!("Small parameters");
    let small = Params {
        l: 16,
        k: 16,
        n: 256,
        t: 2,
    };
    run_test(&Alekhnovich::new(small).unwrap(), &mut rng, 1000);
    println!();

    println!("Reference parameters");
    run_test(&Alekhnovich::new(Params::REFERENCE).unwrap(), &mut rng, 3);
}
