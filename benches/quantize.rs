//! Benchmarks for quantization and histogram assembly.
//!
//! Quantization dominates corpus indexing time once descriptors exist;
//! these benchmarks track the per-image cost across codebook sizes.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::prelude::*;

use imbow::quantize::{Quantizer, build_histvw, quantize_batch};

fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.random::<f32>()).collect())
        .collect()
}

fn bench_quantize(c: &mut Criterion) {
    let samples = random_vectors(512, 64, 1);

    let mut group = c.benchmark_group("quantize_batch");
    for vocabulary_size in [128usize, 512, 1024] {
        let codebook = random_vectors(vocabulary_size, 64, 2);
        group.throughput(Throughput::Elements(samples.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("hard", vocabulary_size),
            &codebook,
            |b, codebook| {
                b.iter(|| {
                    quantize_batch(black_box(&samples), codebook, Quantizer::Hard).unwrap()
                });
            },
        );

        let fuzzy = Quantizer::fuzzy(0.1).unwrap();
        group.bench_with_input(
            BenchmarkId::new("fuzzy", vocabulary_size),
            &codebook,
            |b, codebook| {
                b.iter(|| quantize_batch(black_box(&samples), codebook, fuzzy).unwrap());
            },
        );
    }
    group.finish();
}

fn bench_histvw(c: &mut Criterion) {
    let samples = random_vectors(512, 64, 3);
    let codebook = random_vectors(256, 64, 4);
    let quantized = quantize_batch(&samples, &codebook, Quantizer::Hard).unwrap();

    let mut rng = StdRng::seed_from_u64(5);
    let positions: Vec<[f32; 2]> = (0..samples.len())
        .map(|_| [rng.random::<f32>(), rng.random::<f32>()])
        .collect();

    let mut group = c.benchmark_group("build_histvw");
    for resolution in [1usize, 2, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(resolution),
            &resolution,
            |b, &resolution| {
                b.iter(|| {
                    build_histvw(
                        black_box(&quantized),
                        codebook.len(),
                        Some(&positions),
                        resolution,
                        false,
                    )
                    .unwrap()
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_quantize, bench_histvw);
criterion_main!(benches);
