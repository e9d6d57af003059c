//! Vector quantization against a visual vocabulary, and assembly of
//! (optionally spatialized) histograms of visual words.
//!
//! Quantization maps one local descriptor to a length-`K` weight vector
//! over the codebook: hard assignment is winner-take-all, fuzzy assignment
//! spreads Gaussian weights over all entries. Histograms accumulate those
//! weight vectors, either flat (`resolution = 1`) or into an `R×R` spatial
//! pyramid addressed by keypoint positions.

use rayon::prelude::*;
use tracing::debug;

use crate::distance::l2_squared_distance;
use crate::property::{PropertyReader, PropertyWriter};
use crate::{Result, RetrievalError};

/// Assignment strategy of a sample to codebook entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quantizer {
    /// One-hot assignment to the nearest entry under squared L2. Ties are
    /// broken toward the lowest index.
    Hard,
    /// Gaussian-weighted assignment `exp(-d² / 2σ²)`, L1-normalized so
    /// every sample contributes the same total energy to its histogram.
    Fuzzy { sigma: f32 },
}

impl Quantizer {
    /// Fuzzy quantizer with standard deviation `sigma`.
    pub fn fuzzy(sigma: f32) -> Result<Self> {
        if sigma <= 0.0 || !sigma.is_finite() {
            return Err(RetrievalError::Config(format!(
                "fuzzy quantization sigma must be > 0, got {sigma}"
            )));
        }
        Ok(Quantizer::Fuzzy { sigma })
    }

    /// Whether histograms built from this quantizer should be divided by
    /// the number of contributing samples.
    ///
    /// Fuzzy weights are normalized per sample, so the per-histogram
    /// normalization keeps corpora with varying keypoint counts
    /// comparable; hard histograms stay raw counts.
    #[must_use]
    pub fn normalizes_histogram(&self) -> bool {
        matches!(self, Quantizer::Fuzzy { .. })
    }

    /// Quantize `sample` against `codebook`, producing a vector of the
    /// codebook's length.
    pub fn quantize(&self, sample: &[f32], codebook: &[Vec<f32>]) -> Result<Vec<f32>> {
        if codebook.is_empty() {
            return Err(RetrievalError::Config(
                "cannot quantize against an empty codebook".to_string(),
            ));
        }
        match *self {
            Quantizer::Hard => {
                let mut closest = 0;
                let mut min_distance = f32::INFINITY;
                for (i, word) in codebook.iter().enumerate() {
                    let distance = l2_squared_distance(sample, word);
                    if distance < min_distance {
                        closest = i;
                        min_distance = distance;
                    }
                }
                let mut quantized = vec![0.0; codebook.len()];
                quantized[closest] = 1.0;
                Ok(quantized)
            }
            Quantizer::Fuzzy { sigma } => {
                let sigma2 = 2.0 * sigma * sigma;
                let mut quantized = Vec::with_capacity(codebook.len());
                let mut sum = 0.0f32;
                for word in codebook {
                    let e = (-l2_squared_distance(sample, word) / sigma2).exp();
                    sum += e;
                    quantized.push(e);
                }
                // All weights can underflow to zero when the sample is far
                // from every word; fall back to hard assignment semantics
                // rather than dividing by zero.
                if sum > 0.0 {
                    for q in &mut quantized {
                        *q /= sum;
                    }
                } else {
                    return Quantizer::Hard.quantize(sample, codebook);
                }
                Ok(quantized)
            }
        }
    }
}

/// Quantize a batch of samples in parallel; output order matches input
/// order.
pub fn quantize_batch(
    samples: &[Vec<f32>],
    codebook: &[Vec<f32>],
    quantizer: Quantizer,
) -> Result<Vec<Vec<f32>>> {
    samples
        .par_iter()
        .map(|sample| quantizer.quantize(sample, codebook))
        .collect()
}

/// Accumulate quantized samples into a histogram of visual words.
///
/// With `resolution = 1` this is the plain BoF histogram and `positions`
/// may be `None`. With `resolution = R > 1`, sample `i` lands in pyramid
/// cell `(⌊xᵢ·R⌋, ⌊yᵢ·R⌋)` (coordinates exactly 1.0 clamp into the last
/// cell) and the output is the row-major concatenation of the `R²` cell
/// histograms, length `K·R²`.
///
/// Empty input yields an all-zero histogram. If `normalize` is set and
/// any samples contributed, the whole vector is divided by the sample
/// count.
pub fn build_histvw(
    quantized: &[Vec<f32>],
    vocabulary_size: usize,
    positions: Option<&[[f32; 2]]>,
    resolution: usize,
    normalize: bool,
) -> Result<Vec<f32>> {
    if resolution == 0 {
        return Err(RetrievalError::Config(
            "pyramid resolution must be >= 1".to_string(),
        ));
    }
    if vocabulary_size == 0 {
        return Err(RetrievalError::Config(
            "vocabulary size must be >= 1".to_string(),
        ));
    }
    let positions = if resolution > 1 {
        let positions = positions.ok_or_else(|| {
            RetrievalError::Config(
                "positions are required for pyramid resolutions > 1".to_string(),
            )
        })?;
        if positions.len() != quantized.len() {
            return Err(RetrievalError::Shape {
                context: "pyramid positions",
                expected: quantized.len(),
                actual: positions.len(),
            });
        }
        Some(positions)
    } else {
        None
    };

    let mut histogram = vec![0.0f32; resolution * resolution * vocabulary_size];

    for (i, weights) in quantized.iter().enumerate() {
        if weights.len() != vocabulary_size {
            return Err(RetrievalError::Shape {
                context: "quantized sample width",
                expected: vocabulary_size,
                actual: weights.len(),
            });
        }

        let offset = match positions {
            None => 0,
            Some(positions) => {
                let [px, py] = positions[i];
                let x = ((px * resolution as f32) as usize).min(resolution - 1);
                let y = ((py * resolution as f32) as usize).min(resolution - 1);
                (y * resolution + x) * vocabulary_size
            }
        };

        for (j, weight) in weights.iter().enumerate() {
            histogram[offset + j] += weight;
        }
    }

    if normalize && !quantized.is_empty() {
        let count = quantized.len() as f32;
        for bin in &mut histogram {
            *bin /= count;
        }
    }

    Ok(histogram)
}

/// Build the concatenated spatial pyramid over resolutions `2⁰ .. 2^(levels-1)`.
///
/// Level histograms are appended in ascending resolution order; a single
/// level reduces to [`build_histvw`] at `resolution = 1`.
pub fn build_pyramid_histvw(
    quantized: &[Vec<f32>],
    vocabulary_size: usize,
    positions: Option<&[[f32; 2]]>,
    levels: usize,
    normalize: bool,
) -> Result<Vec<f32>> {
    if levels == 0 {
        return Err(RetrievalError::Config(
            "pyramid needs at least one level".to_string(),
        ));
    }
    let mut histogram = Vec::new();
    for level in 0..levels {
        let resolution = 1usize << level;
        let part = build_histvw(quantized, vocabulary_size, positions, resolution, normalize)?;
        histogram.extend_from_slice(&part);
    }
    Ok(histogram)
}

/// Options for [`compute_histvw_file`].
#[derive(Debug, Clone, Copy)]
pub struct HistvwOptions {
    pub quantizer: Quantizer,
    /// Number of pyramid levels; 1 gives plain BoF histograms.
    pub pyramid_levels: usize,
}

/// Quantize a whole descriptor file against `codebook` and write one
/// histogram of visual words per image.
///
/// `positions` must parallel `descriptors` record for record and is only
/// consulted when `pyramid_levels > 1`. Returns the number of histograms
/// written.
pub fn compute_histvw_file(
    descriptors: &mut PropertyReader<Vec<Vec<f32>>>,
    positions: Option<&mut PropertyReader<Vec<[f32; 2]>>>,
    codebook: &[Vec<f32>],
    options: HistvwOptions,
    output: &mut PropertyWriter<Vec<f32>>,
) -> Result<usize> {
    let total = descriptors.len();
    let needs_positions = options.pyramid_levels > 1;
    let mut positions = match (needs_positions, positions) {
        (false, _) => None,
        (true, Some(reader)) => {
            if reader.len() != total {
                return Err(RetrievalError::Shape {
                    context: "position file length",
                    expected: total,
                    actual: reader.len(),
                });
            }
            Some(reader)
        }
        (true, None) => {
            return Err(RetrievalError::Config(
                "a position file is required for pyramid levels > 1".to_string(),
            ));
        }
    };
    let normalize = options.quantizer.normalizes_histogram();

    for i in 0..total {
        let samples = descriptors.get(i)?;
        let image_positions = match positions.as_mut() {
            Some(reader) => Some(reader.get(i)?),
            None => None,
        };

        let quantized = quantize_batch(&samples, codebook, options.quantizer)?;
        let histogram = build_pyramid_histvw(
            &quantized,
            codebook.len(),
            image_positions.as_deref(),
            options.pyramid_levels,
            normalize,
        )?;
        output.append(&histogram)?;
    }

    debug!(histograms = total, levels = options.pyramid_levels, "histvw file complete");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codebook() -> Vec<Vec<f32>> {
        vec![vec![0.0, 0.0], vec![1.0, 1.0]]
    }

    #[test]
    fn hard_quantization_is_one_hot() {
        let q = Quantizer::Hard
            .quantize(&[0.9, 0.9], &codebook())
            .unwrap();
        assert_eq!(q, vec![0.0, 1.0]);
    }

    #[test]
    fn hard_ties_break_to_lowest_index() {
        let q = Quantizer::Hard
            .quantize(&[0.5, 0.5], &codebook())
            .unwrap();
        assert_eq!(q, vec![1.0, 0.0]);
    }

    #[test]
    fn fuzzy_quantization_sums_to_one() {
        let quantizer = Quantizer::fuzzy(0.5).unwrap();
        let q = quantizer.quantize(&[0.3, 0.7], &codebook()).unwrap();
        let sum: f32 = q.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(q.iter().all(|&w| w > 0.0 && w <= 1.0));
    }

    #[test]
    fn invalid_sigma_is_config_error() {
        assert!(Quantizer::fuzzy(0.0).is_err());
        assert!(Quantizer::fuzzy(-1.0).is_err());
        assert!(Quantizer::fuzzy(f32::NAN).is_err());
    }

    #[test]
    fn empty_codebook_fails() {
        assert!(Quantizer::Hard.quantize(&[1.0], &[]).is_err());
    }

    #[test]
    fn flat_histogram_counts_samples() {
        // Codebook {[0,0],[1,1]}, samples {[0,0],[0.9,0.9],[0.2,0.2]} -> [2,1].
        let samples = vec![vec![0.0, 0.0], vec![0.9, 0.9], vec![0.2, 0.2]];
        let quantized = quantize_batch(&samples, &codebook(), Quantizer::Hard).unwrap();
        let hist = build_histvw(&quantized, 2, None, 1, false).unwrap();
        assert_eq!(hist, vec![2.0, 1.0]);
    }

    #[test]
    fn pyramid_cells_are_row_major() {
        // Same samples with positions spread over a 2x2 grid.
        let samples = vec![vec![0.0, 0.0], vec![0.9, 0.9], vec![0.2, 0.2]];
        let positions = [[0.1, 0.1], [0.9, 0.9], [0.6, 0.4]];
        let quantized = quantize_batch(&samples, &codebook(), Quantizer::Hard).unwrap();
        let hist = build_histvw(&quantized, 2, Some(&positions), 2, false).unwrap();
        // cell (0,0): [1,0]; cell (1,0): [1,0]; cell (0,1): empty; cell (1,1): [0,1]
        assert_eq!(hist, vec![1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn coordinate_exactly_one_clamps_into_last_cell() {
        let quantized = vec![vec![1.0, 0.0]];
        let positions = [[1.0, 1.0]];
        let hist = build_histvw(&quantized, 2, Some(&positions), 2, false).unwrap();
        assert_eq!(hist[3 * 2], 1.0);
    }

    #[test]
    fn empty_input_yields_zero_histogram() {
        let hist = build_histvw(&[], 3, None, 1, true).unwrap();
        assert_eq!(hist, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn missing_positions_for_pyramid_is_error() {
        let quantized = vec![vec![1.0, 0.0]];
        assert!(build_histvw(&quantized, 2, None, 2, false).is_err());
    }

    #[test]
    fn pyramid_concatenates_levels_ascending() {
        let samples = vec![vec![0.0, 0.0]];
        let positions = [[0.2, 0.2]];
        let quantized = quantize_batch(&samples, &codebook(), Quantizer::Hard).unwrap();
        let hist =
            build_pyramid_histvw(&quantized, 2, Some(&positions), 2, false).unwrap();
        assert_eq!(hist.len(), 2 + 8);
        assert_eq!(&hist[..2], &[1.0, 0.0]);
    }
}
