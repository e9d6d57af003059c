//! Bag-of-features search over an inverted index.

use std::sync::Arc;

use tracing::info;

use crate::index::tfidf::{IdfWeight, TfWeight};
use crate::index::InvertedIndex;
use crate::quantize::{Quantizer, build_histvw, quantize_batch};
use crate::registry::Registry;
use crate::search::BofSearchConfig;
use crate::Result;

/// Ranked retrieval over histograms of visual words.
///
/// Wraps a finalized [`InvertedIndex`] together with the tf/idf functions
/// used to weight query histograms. You almost always want the same
/// functions the index itself was finalized with.
pub struct BofSearch {
    index: InvertedIndex,
    tf: Arc<dyn TfWeight>,
    idf: Arc<dyn IdfWeight>,
}

impl BofSearch {
    /// Search over an already-loaded index.
    #[must_use]
    pub fn new(index: InvertedIndex, tf: Arc<dyn TfWeight>, idf: Arc<dyn IdfWeight>) -> Self {
        Self { index, tf, idf }
    }

    /// Load the index file named by `config` and resolve its tf/idf
    /// function names.
    pub fn from_config(
        config: &BofSearchConfig,
        tf_functions: &Registry<Arc<dyn TfWeight>>,
        idf_functions: &Registry<Arc<dyn IdfWeight>>,
    ) -> Result<Self> {
        let tf = tf_functions.get(&config.tf)?.clone();
        let idf = idf_functions.get(&config.idf)?.clone();
        let index = InvertedIndex::load(&config.index_file)?;
        info!(
            documents = index.num_documents(),
            tf = %config.tf,
            idf = %config.idf,
            file = %config.index_file.display(),
            "loaded inverted index for bag-of-features search"
        );
        Ok(Self::new(index, tf, idf))
    }

    /// The wrapped index.
    #[must_use]
    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    /// The `num_results` highest-scoring documents for `histogram`,
    /// descending by cosine similarity.
    pub fn query(&self, histogram: &[f32], num_results: usize) -> Result<Vec<(f32, u32)>> {
        self.index
            .query(histogram, self.tf.as_ref(), self.idf.as_ref(), num_results)
    }
}

/// Build the plain (resolution 1) query histogram for a set of local
/// descriptors: hard quantization against `codebook`, no normalization.
///
/// This mirrors how corpus histograms are built in the hard-assignment
/// configuration, so query and documents live in the same space.
pub fn query_histogram(samples: &[Vec<f32>], codebook: &[Vec<f32>]) -> Result<Vec<f32>> {
    let quantized = quantize_batch(samples, codebook, Quantizer::Hard)?;
    build_histvw(&quantized, codebook.len(), None, 1, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tfidf::{ConstantIdf, ConstantTf};
    use crate::index::{default_idf_functions, default_tf_functions};
    use tempfile::TempDir;

    fn two_doc_index() -> InvertedIndex {
        let mut index = InvertedIndex::new(2).unwrap();
        index.add_document(&[1.0, 0.0]).unwrap();
        index.add_document(&[0.0, 1.0]).unwrap();
        index.finalize(&ConstantTf, &ConstantIdf).unwrap();
        index
    }

    #[test]
    fn query_ranks_matching_document_first() {
        let search = BofSearch::new(two_doc_index(), Arc::new(ConstantTf), Arc::new(ConstantIdf));
        let results = search.query(&[0.0, 1.0], 2).unwrap();
        assert_eq!(results[0].1, 1);
    }

    #[test]
    fn from_config_applies_defaults_and_rejects_unknown_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.bin");
        two_doc_index().save(&path).unwrap();

        let config = BofSearchConfig {
            index_file: path.clone(),
            tf: "constant".to_string(),
            idf: "constant".to_string(),
        };
        let search = BofSearch::from_config(
            &config,
            &default_tf_functions(),
            &default_idf_functions(),
        )
        .unwrap();
        assert_eq!(search.index().num_documents(), 2);

        let bad = BofSearchConfig {
            index_file: path,
            tf: "bm25".to_string(),
            idf: "constant".to_string(),
        };
        assert!(
            BofSearch::from_config(&bad, &default_tf_functions(), &default_idf_functions())
                .is_err()
        );
    }

    #[test]
    fn query_histogram_is_raw_hard_counts() {
        let codebook = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let samples = vec![vec![0.1, 0.1], vec![0.9, 1.0], vec![0.0, 0.2]];
        let histogram = query_histogram(&samples, &codebook).unwrap();
        assert_eq!(histogram, vec![2.0, 1.0]);
    }
}
