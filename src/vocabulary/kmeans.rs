//! Parallel Lloyd's k-means over squared Euclidean distance.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use crate::distance::l2_squared_distance;
use crate::{Result, RetrievalError};

/// Default iteration cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Default fraction of reassigned samples below which iteration stops.
pub const DEFAULT_MIN_CHANGE_FRACTION: f64 = 0.01;

/// Lloyd's k-means configured for visual vocabulary learning.
///
/// Two stopping rules: an iteration cap and a minimum fraction of samples
/// changing cluster between iterations. Assignment and accumulation are
/// data-parallel; the per-iteration reduction is serial.
pub struct Kmeans {
    clusters: usize,
    max_iterations: usize,
    min_change_fraction: f64,
    seed: Option<u64>,
}

impl Kmeans {
    /// Create a clustering run producing `clusters` centers.
    pub fn new(clusters: usize) -> Result<Self> {
        if clusters == 0 {
            return Err(RetrievalError::Config(
                "number of clusters must be > 0".to_string(),
            ));
        }
        Ok(Self {
            clusters,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            min_change_fraction: DEFAULT_MIN_CHANGE_FRACTION,
            seed: None,
        })
    }

    /// Configure a deterministic seed for center initialization and
    /// empty-cluster reseeding.
    ///
    /// With a seed, repeated runs on the same samples produce identical
    /// codebooks.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Cap the number of Lloyd iterations (default 20).
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Stop once fewer than this fraction of samples change cluster
    /// (default 0.01).
    #[must_use]
    pub fn with_min_change_fraction(mut self, fraction: f64) -> Self {
        self.min_change_fraction = fraction;
        self
    }

    /// Cluster `samples`, returning the learned centers.
    pub fn run(&self, samples: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        if samples.is_empty() {
            return Err(RetrievalError::Config(
                "cannot cluster an empty sample set".to_string(),
            ));
        }
        if self.clusters > samples.len() {
            return Err(RetrievalError::Config(format!(
                "requested {} clusters from {} samples",
                self.clusters,
                samples.len()
            )));
        }
        let dimension = samples[0].len();
        for sample in samples {
            if sample.len() != dimension {
                return Err(RetrievalError::Shape {
                    context: "k-means sample dimension",
                    expected: dimension,
                    actual: sample.len(),
                });
            }
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        // Initialize with distinct samples drawn uniformly.
        let mut centers: Vec<Vec<f32>> =
            rand::seq::index::sample(&mut rng, samples.len(), self.clusters)
                .into_iter()
                .map(|i| samples[i].clone())
                .collect();

        let mut assignments = vec![usize::MAX; samples.len()];

        for iteration in 0..self.max_iterations {
            let new_assignments: Vec<usize> = samples
                .par_iter()
                .map(|sample| nearest_center(sample, &centers))
                .collect();

            // Per-thread partial sums, reduced serially by rayon.
            let (sums, counts) = new_assignments
                .par_iter()
                .zip(samples)
                .fold(
                    || (vec![vec![0.0f32; dimension]; self.clusters], vec![0usize; self.clusters]),
                    |(mut sums, mut counts), (&cluster, sample)| {
                        counts[cluster] += 1;
                        for (accumulator, value) in sums[cluster].iter_mut().zip(sample) {
                            *accumulator += value;
                        }
                        (sums, counts)
                    },
                )
                .reduce(
                    || (vec![vec![0.0f32; dimension]; self.clusters], vec![0usize; self.clusters]),
                    |(mut sums_a, mut counts_a), (sums_b, counts_b)| {
                        for (a, b) in sums_a.iter_mut().zip(&sums_b) {
                            for (x, y) in a.iter_mut().zip(b) {
                                *x += y;
                            }
                        }
                        for (a, b) in counts_a.iter_mut().zip(&counts_b) {
                            *a += b;
                        }
                        (sums_a, counts_a)
                    },
                );

            let mut reseeded = 0usize;
            for (cluster, (sum, &count)) in sums.iter().zip(&counts).enumerate() {
                if count > 0 {
                    centers[cluster] = sum.iter().map(|s| s / count as f32).collect();
                } else {
                    // Re-seed dead clusters from a random sample.
                    let pick = rng.random_range(0..samples.len());
                    centers[cluster] = samples[pick].clone();
                    reseeded += 1;
                }
            }

            let changed = new_assignments
                .iter()
                .zip(&assignments)
                .filter(|(new, old)| new != old)
                .count();
            assignments = new_assignments;

            debug!(iteration, changed, reseeded, "k-means iteration");

            if (changed as f64) / (samples.len() as f64) < self.min_change_fraction {
                break;
            }
        }

        Ok(centers)
    }
}

fn nearest_center(sample: &[f32], centers: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for (i, center) in centers.iter().enumerate() {
        let distance = l2_squared_distance(sample, center);
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}
