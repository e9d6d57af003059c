//! Visual vocabulary learning: descriptor sampling plus clustering.
//!
//! A vocabulary is learned from the local descriptors of a corpus, stored
//! as one `Vec<Vec<f32>>` record per image in a property file. Corpora are
//! usually far too large to cluster outright, so the sampler draws a
//! uniform subset of the *global* descriptor population first; clustering
//! is [`Kmeans`].

mod kmeans;

pub use kmeans::{DEFAULT_MAX_ITERATIONS, DEFAULT_MIN_CHANGE_FRACTION, Kmeans};

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::info;

use crate::property::PropertyReader;
use crate::{Result, RetrievalError};

/// Flatten every local descriptor of every image into one sample list.
///
/// Only viable for small corpora; prefer [`sample_words`] when a sizes
/// file is available.
pub fn read_all_samples(
    descriptors: &mut PropertyReader<Vec<Vec<f32>>>,
) -> Result<Vec<Vec<f32>>> {
    let mut samples = Vec::new();
    for i in 0..descriptors.len() {
        samples.extend(descriptors.get(i)?);
    }
    info!(samples = samples.len(), "collected all descriptors");
    Ok(samples)
}

/// Draw `num_samples` local descriptors uniformly from the global
/// descriptor population.
///
/// The descriptor file gives no cheap way to count the local features per
/// record, so `sizes[i]` must supply the number of descriptors image `i`
/// contributed (the generator's `numfeatures` stream). The global sample
/// space is permuted, truncated to `num_samples` (clamped to the
/// population size), and the chosen samples are bucketed by image so each
/// touched record is read exactly once, in ascending order.
pub fn sample_words(
    descriptors: &mut PropertyReader<Vec<Vec<f32>>>,
    sizes: &[i32],
    num_samples: usize,
    seed: Option<u64>,
) -> Result<Vec<Vec<f32>>> {
    if sizes.len() != descriptors.len() {
        return Err(RetrievalError::Shape {
            context: "sizes file length",
            expected: descriptors.len(),
            actual: sizes.len(),
        });
    }

    let population: usize = sizes.iter().map(|&s| s.max(0) as usize).sum();
    let num_samples = num_samples.min(population);
    if num_samples == 0 {
        return Err(RetrievalError::Config(
            "descriptor file contains no local features to sample".to_string(),
        ));
    }

    // Enumerate the global sample space as (image, index-within-image),
    // shuffle, and keep the head.
    let mut space = Vec::with_capacity(population);
    for (image, &size) in sizes.iter().enumerate() {
        for within in 0..size.max(0) as usize {
            space.push((image, within));
        }
    }
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    space.shuffle(&mut rng);
    space.truncate(num_samples);

    // Bucket by image to turn random sampling into one ordered read per
    // touched record.
    let mut by_image: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (image, within) in space {
        by_image.entry(image).or_default().push(within);
    }

    info!(
        samples = num_samples,
        population,
        images_read = by_image.len(),
        images_total = descriptors.len(),
        "sampling descriptor file"
    );

    let mut samples = Vec::with_capacity(num_samples);
    for (image, picks) in by_image {
        let features = descriptors.get(image)?;
        for within in picks {
            let feature = features.get(within).ok_or_else(|| {
                RetrievalError::Shape {
                    context: "sizes file feature count",
                    expected: within + 1,
                    actual: features.len(),
                }
            })?;
            samples.push(feature.clone());
        }
    }
    Ok(samples)
}
