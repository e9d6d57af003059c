//! Benchmarks for the two query paths: inverted-index ranking and linear
//! scan.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::prelude::*;

use imbow::distance::L2Norm;
use imbow::index::InvertedIndex;
use imbow::index::tfidf::{VideoGoogleIdf, VideoGoogleTf};
use imbow::search::LinearSearch;

/// Sparse histograms: most bins zero, as hard-quantized corpora are.
fn random_histograms(n: usize, words: usize, nonzero: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let mut histogram = vec![0.0f32; words];
            for _ in 0..nonzero {
                let term = rng.random_range(0..words);
                histogram[term] += rng.random_range(1.0f32..4.0);
            }
            histogram
        })
        .collect()
}

fn bench_inverted_query(c: &mut Criterion) {
    let words = 1000;
    let corpus = random_histograms(2000, words, 30, 1);

    let mut index = InvertedIndex::new(words).unwrap();
    for histogram in &corpus {
        index.add_document(histogram).unwrap();
    }
    index.finalize(&VideoGoogleTf, &VideoGoogleIdf).unwrap();

    let query = &random_histograms(1, words, 30, 2)[0];

    let mut group = c.benchmark_group("inverted_index_query");
    for k in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, &k| {
            b.iter(|| {
                index
                    .query(black_box(query), &VideoGoogleTf, &VideoGoogleIdf, k)
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_linear_query(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let features: Vec<Vec<f32>> = (0..2000)
        .map(|_| (0..128).map(|_| rng.random::<f32>()).collect())
        .collect();
    let query: Vec<f32> = (0..128).map(|_| rng.random::<f32>()).collect();

    let search = LinearSearch::new(features, Arc::new(L2Norm));

    let mut group = c.benchmark_group("linear_search_query");
    for k in [10usize, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, &k| {
            b.iter(|| search.query(black_box(&query), k).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_inverted_query, bench_linear_query);
criterion_main!(benches);
