//! Linear scan over a descriptor file under a configurable distance.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use tracing::info;

use crate::distance::Distance;
use crate::property::read_property;
use crate::registry::Registry;
use crate::Result;
use crate::search::LinearSearchConfig;

/// Heap entry ordered by distance, then index; the heap root is the
/// current worst match.
struct Candidate {
    distance: f32,
    index: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Exhaustive nearest-neighbor search over global descriptors.
///
/// Loads the full descriptor property file into memory at construction;
/// every query is a scan of all of it, kept cheap by a bounded max-heap
/// that only tracks the current best `k`. Results are sorted ascending by
/// distance, best match first.
pub struct LinearSearch {
    features: Vec<Vec<f32>>,
    distance: Arc<dyn Distance>,
}

impl LinearSearch {
    /// Search over `features` under `distance`.
    #[must_use]
    pub fn new(features: Vec<Vec<f32>>, distance: Arc<dyn Distance>) -> Self {
        Self { features, distance }
    }

    /// Load the descriptor file named by `config`, resolving the distance
    /// function from `distances`.
    pub fn from_config(
        config: &LinearSearchConfig,
        distances: &Registry<Arc<dyn Distance>>,
    ) -> Result<Self> {
        let distance = distances.get(&config.distfn)?.clone();
        let features: Vec<Vec<f32>> = read_property(&config.descriptor_file)?;
        info!(
            descriptors = features.len(),
            distfn = %config.distfn,
            file = %config.descriptor_file.display(),
            "loaded descriptors for linear search"
        );
        Ok(Self::new(features, distance))
    }

    /// Number of descriptors loaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether no descriptors are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Swap the distance kernel, e.g. for a per-query mask.
    pub fn set_distance(&mut self, distance: Arc<dyn Distance>) {
        self.distance = distance;
    }

    /// The `num_results` nearest descriptors to `query`, ascending by
    /// distance.
    pub fn query(&self, query: &[f32], num_results: usize) -> Result<Vec<(f32, u32)>> {
        let num_results = num_results.min(self.features.len());
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(num_results);

        for (index, feature) in self.features.iter().enumerate() {
            let distance = self.distance.eval(query, feature);
            let candidate = Candidate {
                distance,
                index: index as u32,
            };
            if heap.len() < num_results {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        let results = heap
            .into_sorted_vec()
            .into_iter()
            .map(|candidate| (candidate.distance, candidate.index))
            .collect();
        Ok(results)
    }
}
