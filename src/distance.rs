//! Distance kernels for dense feature vectors.
//!
//! Linear search and quantization are both parameterized over a distance.
//! The free functions here are the shared definitions; [`Distance`] wraps
//! them behind one object-safe interface so a kernel can be picked at
//! query time by name from a [`Registry`].
//!
//! All kernels measure *distance*: better matches produce smaller values.
//! Similarity-flavored kernels (cosine, histogram intersection) are folded
//! into that convention as `1 - similarity`.

use std::sync::Arc;

use crate::registry::Registry;

/// Object-safe distance kernel.
pub trait Distance: Send + Sync {
    /// Distance between `a` and `b`; smaller is closer.
    fn eval(&self, a: &[f32], b: &[f32]) -> f32;
}

/// L1 (Manhattan) distance.
///
/// If dimensions mismatch, this returns `f32::INFINITY` (so it is never
/// selected as a nearest neighbor).
#[inline]
#[must_use]
pub fn l1_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// L2 (Euclidean) distance.
#[inline]
#[must_use]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    l2_squared_distance(a, b).sqrt()
}

/// Squared L2 distance.
///
/// Monotone in [`l2_distance`], so nearest-neighbor decisions agree while
/// skipping the square root. This is the kernel quantization and k-means
/// run on.
#[inline]
#[must_use]
pub fn l2_squared_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Cosine distance `1 - cos(a, b)`.
///
/// Computes both norms, so inputs need not be normalized. Zero-norm
/// inputs yield distance 1.
#[inline]
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Histogram intersection distance `1 - Σ min(aᵢ, bᵢ)`.
///
/// Assumes L1-normalized histograms, for which the intersection lies in
/// `[0, 1]` and identical inputs give distance 0.
#[inline]
#[must_use]
pub fn histogram_intersection_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    let overlap: f32 = a.iter().zip(b).map(|(x, y)| x.min(*y)).sum();
    1.0 - overlap
}

macro_rules! kernel_struct {
    ($(#[$doc:meta] $name:ident => $fn:path),+ $(,)?) => {$(
        #[$doc]
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Distance for $name {
            fn eval(&self, a: &[f32], b: &[f32]) -> f32 {
                $fn(a, b)
            }
        }
    )+};
}

kernel_struct!(
    /// [`l1_distance`] as a [`Distance`] object.
    L1Norm => l1_distance,
    /// [`l2_distance`] as a [`Distance`] object.
    L2Norm => l2_distance,
    /// [`l2_squared_distance`] as a [`Distance`] object.
    L2NormSquared => l2_squared_distance,
    /// [`cosine_distance`] as a [`Distance`] object.
    Cosine => cosine_distance,
    /// [`histogram_intersection_distance`] as a [`Distance`] object.
    HistogramIntersection => histogram_intersection_distance,
);

/// Squared-difference accumulation restricted to masked-in positions.
///
/// Used for grid descriptors where empty cells carry no signal: the mask
/// selects the positions that participate. Without a mask this equals
/// [`l2_squared_distance`].
#[derive(Debug, Clone, Default)]
pub struct Frobenius {
    mask: Option<Vec<bool>>,
}

impl Frobenius {
    /// Kernel over all positions.
    #[must_use]
    pub fn new() -> Self {
        Self { mask: None }
    }

    /// Kernel over the positions where `mask` is `true`.
    ///
    /// The mask usually comes from the query descriptor's own streams and
    /// must have the descriptor's length.
    #[must_use]
    pub fn with_mask(mask: Vec<bool>) -> Self {
        Self { mask: Some(mask) }
    }
}

impl Distance for Frobenius {
    fn eval(&self, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return f32::INFINITY;
        }
        match &self.mask {
            None => l2_squared_distance(a, b),
            Some(mask) => {
                if mask.len() != a.len() {
                    return f32::INFINITY;
                }
                a.iter()
                    .zip(b)
                    .zip(mask)
                    .filter(|&(_, &keep)| keep)
                    .map(|((x, y), _)| {
                        let d = x - y;
                        d * d
                    })
                    .sum()
            }
        }
    }
}

/// Registry with the built-in kernels under their configuration names.
#[must_use]
pub fn default_distances() -> Registry<Arc<dyn Distance>> {
    let mut registry = Registry::new("distance function");
    registry
        .register("l1norm", Arc::new(L1Norm) as Arc<dyn Distance>)
        .register("l2norm", Arc::new(L2Norm))
        .register("l2norm_squared", Arc::new(L2NormSquared))
        .register("cosine", Arc::new(Cosine))
        .register("histogram_intersection", Arc::new(HistogramIntersection))
        .register("frobenius", Arc::new(Frobenius::new()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_squared_matches_l2() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 0.0, 3.0];
        assert!((l2_distance(&a, &b) - l2_squared_distance(&a, &b).sqrt()).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_are_never_nearest() {
        assert_eq!(l1_distance(&[1.0], &[1.0, 2.0]), f32::INFINITY);
        assert_eq!(l2_squared_distance(&[1.0], &[]), f32::INFINITY);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 2.0]), f32::INFINITY);
    }

    #[test]
    fn cosine_distance_is_zero_for_identical() {
        let a = [1.0_f32, 2.0, 3.0];
        assert!(cosine_distance(&a, &a).abs() < 1e-6);
    }

    #[test]
    fn intersection_of_identical_normalized_histograms_is_zero() {
        let h = [0.25_f32, 0.25, 0.5];
        assert!(histogram_intersection_distance(&h, &h).abs() < 1e-6);
        assert!((histogram_intersection_distance(&h, &[0.5, 0.25, 0.25]) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn frobenius_mask_skips_positions() {
        let a = [1.0_f32, 100.0, 2.0];
        let b = [1.0_f32, -100.0, 4.0];
        let masked = Frobenius::with_mask(vec![true, false, true]);
        assert!((masked.eval(&a, &b) - 4.0).abs() < 1e-6);
        assert!(Frobenius::new().eval(&a, &b) > 4.0);
    }

    #[test]
    fn registry_has_all_builtins() {
        let reg = default_distances();
        for name in [
            "l1norm",
            "l2norm",
            "l2norm_squared",
            "cosine",
            "histogram_intersection",
            "frobenius",
        ] {
            assert!(reg.contains(name), "missing {name}");
        }
    }
}
