// Copyright (c) 2025 Cloudflare, Inc.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::SeedableRng;

use alekhnovich::{
    sampler::{random_matrix, sample_fixed_weight},
    Alekhnovich, NoisyPke, Params, Xoshiro256StarStar,
};

fn matmul_benchmark(c: &mut Criterion) {
    let mut rng = Xoshiro256StarStar::seed_from_u64(1);
    let mut group = c.benchmark_group("matmul");
    group.sample_size(10);

    for dim in [256, 512, 1024] {
        let a = random_matrix(&mut rng, dim, dim).unwrap();
        let b = random_matrix(&mut rng, dim, dim).unwrap();
        group.bench_with_input(BenchmarkId::new("square", dim), &dim, |bench, _| {
            bench.iter(|| a.mul(&b).unwrap())
        });
    }

    group.finish();
}

fn vecmul_benchmark(c: &mut Criterion) {
    let mut rng = Xoshiro256StarStar::seed_from_u64(2);
    let Params { l, n, t, .. } = Params::REFERENCE;
    let y = random_matrix(&mut rng, l, n).unwrap();
    let e = sample_fixed_weight(&mut rng, n, t).unwrap();

    c.bench_function("vecmul_reference_y", |bench| {
        bench.iter(|| y.mul_by_vec(&e).unwrap())
    });
}

fn protocol_benchmark(c: &mut Criterion) {
    let mut rng = Xoshiro256StarStar::seed_from_u64(3);
    let scheme = Alekhnovich::new(Params {
        l: 1300,
        k: 130,
        n: 1600,
        t: 14,
    })
    .unwrap();
    let (pk, sk) = scheme.key_gen(&mut rng).unwrap();
    let message = alekhnovich::sampler::sample_uniform(&mut rng, 1300).unwrap();

    let mut group = c.benchmark_group("protocol");
    group.bench_function("encrypt", |bench| {
        bench.iter(|| scheme.encrypt(&pk, &message, &mut rng).unwrap())
    });
    let packet = scheme.encrypt(&pk, &message, &mut rng).unwrap();
    group.bench_function("decrypt", |bench| {
        bench.iter(|| scheme.decrypt(&sk, &packet).unwrap())
    });
    group.finish();
}

criterion_group!(
    benches,
    matmul_benchmark,
    vecmul_benchmark,
    protocol_benchmark
);
criterion_main!(benches);
