//! Inverted index and tf-idf ranking engine.
//!
//! Histograms of visual words are treated as documents over the visual
//! vocabulary. The index keeps per-term posting lists plus the corpus
//! statistics the weighting functions consume; finalization multiplies a
//! pluggable tf by a pluggable idf per posting and L2-normalizes each
//! document, after which a query is a sparse dot product walked term by
//! term.

mod inverted;
pub mod tfidf;

pub use inverted::InvertedIndex;
pub use tfidf::{
    BinaryTf, ConstantIdf, ConstantTf, IdfWeight, LogTf, TfWeight, VideoGoogleIdf, VideoGoogleTf,
    default_idf_functions, default_tf_functions,
};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn l2_length_of_doc(index: &InvertedIndex, doc: u32) -> f32 {
        let mut sum = 0.0f32;
        for term in 0..index.num_words() {
            for (posting, weight) in index
                .postings(term)
                .iter()
                .zip(index.posting_weights(term))
            {
                if posting.0 == doc {
                    sum += weight * weight;
                }
            }
        }
        sum.sqrt()
    }

    #[test]
    fn single_document_constant_weights() {
        // One document over four words; constant tf and idf give every
        // occupied term weight 1/sqrt(3) after normalization.
        let mut index = InvertedIndex::new(4).unwrap();
        index.add_document(&[0.5, 0.0, 0.25, 0.25]).unwrap();
        index.finalize(&ConstantTf, &ConstantIdf).unwrap();

        let inv_sqrt3 = 1.0 / 3.0f32.sqrt();
        for (term, expected) in [(0, inv_sqrt3), (2, inv_sqrt3), (3, inv_sqrt3)] {
            let weights = index.posting_weights(term);
            assert_eq!(weights.len(), 1);
            assert!((weights[0] - expected).abs() < 1e-6, "term {term}");
        }
        assert!(index.posting_weights(1).is_empty());

        let results = index
            .query(&[0.5, 0.0, 0.25, 0.25], &ConstantTf, &ConstantIdf, 1)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, 0);
        assert!((results[0].0 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn video_google_ranks_matching_document_first() {
        let mut index = InvertedIndex::new(2).unwrap();
        index.add_document(&[1.0, 0.0]).unwrap();
        index.add_document(&[0.0, 1.0]).unwrap();
        index
            .finalize(&VideoGoogleTf, &VideoGoogleIdf)
            .unwrap();

        assert_eq!(index.document_frequency(0), 1);
        assert_eq!(index.document_frequency(1), 1);

        let results = index
            .query(&[1.0, 0.0], &VideoGoogleTf, &VideoGoogleIdf, 2)
            .unwrap();
        assert_eq!(results[0].1, 0);
        assert!(results[0].0 > results[1].0);
    }

    #[test]
    fn documents_are_unit_length_after_finalize() {
        let mut index = InvertedIndex::new(8).unwrap();
        index
            .add_document(&[0.0, 2.0, 0.0, 1.0, 0.0, 0.0, 3.0, 0.5])
            .unwrap();
        index
            .add_document(&[1.0, 0.0, 0.0, 0.0, 4.0, 0.0, 0.0, 0.0])
            .unwrap();
        index.add_document(&[0.0; 8]).unwrap();
        index.finalize(&LogTf, &VideoGoogleIdf).unwrap();

        assert!((l2_length_of_doc(&index, 0) - 1.0).abs() < 1e-5);
        assert!((l2_length_of_doc(&index, 1) - 1.0).abs() < 1e-5);
        // The empty document has no postings and stays at length zero.
        assert_eq!(l2_length_of_doc(&index, 2), 0.0);
    }

    #[test]
    fn add_after_finalize_requires_refinalize() {
        let mut index = InvertedIndex::new(2).unwrap();
        index.add_document(&[1.0, 0.0]).unwrap();
        index.finalize(&ConstantTf, &ConstantIdf).unwrap();
        assert!(index.is_finalized());

        index.add_document(&[0.0, 1.0]).unwrap();
        assert!(!index.is_finalized());
        assert!(index.query(&[1.0, 0.0], &ConstantTf, &ConstantIdf, 1).is_err());
        assert!(index.save("/tmp/never-written").is_err());
    }

    #[test]
    fn histogram_width_is_checked() {
        let mut index = InvertedIndex::new(3).unwrap();
        let err = index.add_document(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, crate::RetrievalError::Shape { .. }));
    }

    #[test]
    fn save_load_query_equivalence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.bin");

        let mut index = InvertedIndex::new(4).unwrap();
        index.add_document(&[1.0, 0.0, 2.0, 0.0]).unwrap();
        index.add_document(&[0.0, 1.0, 1.0, 0.0]).unwrap();
        index.add_document(&[0.5, 0.5, 0.0, 3.0]).unwrap();
        index.finalize(&VideoGoogleTf, &VideoGoogleIdf).unwrap();
        index.save(&path).unwrap();

        let loaded = InvertedIndex::load(&path).unwrap();
        assert!(loaded.is_finalized());
        assert_eq!(loaded.num_documents(), 3);
        assert_eq!(loaded.avg_doc_size(), index.avg_doc_size());

        let query = [0.5, 0.0, 1.0, 1.0];
        let before = index
            .query(&query, &VideoGoogleTf, &VideoGoogleIdf, 3)
            .unwrap();
        let after = loaded
            .query(&query, &VideoGoogleTf, &VideoGoogleIdf, 3)
            .unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn top_k_matches_full_sort() {
        let mut index = InvertedIndex::new(6).unwrap();
        let docs: [[f32; 6]; 5] = [
            [1.0, 0.0, 0.0, 2.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            [1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 2.0, 0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
        ];
        for doc in &docs {
            index.add_document(doc).unwrap();
        }
        index.finalize(&LogTf, &VideoGoogleIdf).unwrap();

        let query = [1.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        let all = index
            .query(&query, &LogTf, &VideoGoogleIdf, docs.len())
            .unwrap();
        for k in 1..=docs.len() {
            let top = index.query(&query, &LogTf, &VideoGoogleIdf, k).unwrap();
            assert_eq!(top, all[..k], "k = {k}");
        }
    }
}
