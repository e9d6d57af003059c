//! Property-based tests for the serialization codec, quantization,
//! histogram assembly and ranking invariants.

use std::collections::{BTreeMap, BTreeSet};

use imbow::distance::l2_squared_distance;
use imbow::index::InvertedIndex;
use imbow::index::tfidf::{ConstantIdf, ConstantTf, LogTf, VideoGoogleIdf};
use imbow::property::{read_property, write_property};
use imbow::quantize::{Quantizer, build_histvw, quantize_batch};
use proptest::prelude::*;

fn arb_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-10.0f32..10.0, dim)
}

fn arb_codebook() -> impl Strategy<Value = Vec<Vec<f32>>> {
    prop::collection::vec(arb_vector(4), 1..12)
}

mod codec_props {
    use super::*;

    fn roundtrip_file<T>(records: Vec<T>) -> Vec<T>
    where
        T: imbow::property::Record + PartialEq + std::fmt::Debug,
    {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("records");
        write_property(&records, &path).unwrap();
        read_property::<T>(&path).unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn f32_vectors_roundtrip(records in prop::collection::vec(arb_vector(8), 0..20)) {
            let back = roundtrip_file(records.clone());
            prop_assert_eq!(back, records);
        }

        #[test]
        fn nested_vectors_roundtrip(
            records in prop::collection::vec(
                prop::collection::vec(arb_vector(3), 0..5),
                0..10,
            )
        ) {
            let back = roundtrip_file(records.clone());
            prop_assert_eq!(back, records);
        }

        #[test]
        fn strings_and_maps_roundtrip(
            records in prop::collection::vec(
                prop::collection::btree_map("[a-z]{0,8}", any::<i32>(), 0..5),
                0..8,
            )
        ) {
            let records: Vec<BTreeMap<String, i32>> = records;
            let back = roundtrip_file(records.clone());
            prop_assert_eq!(back, records);
        }

        #[test]
        fn pairs_and_sets_roundtrip(
            records in prop::collection::vec(
                (
                    prop::collection::vec((any::<u32>(), -100.0f32..100.0), 0..6),
                    prop::collection::btree_set(any::<u32>(), 0..6),
                ),
                0..6,
            )
        ) {
            let records: Vec<(Vec<(u32, f32)>, BTreeSet<u32>)> = records;
            let back = roundtrip_file(records.clone());
            prop_assert_eq!(back, records);
        }
    }
}

mod quantize_props {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn hard_quantization_is_one_hot(
            sample in arb_vector(4),
            codebook in arb_codebook(),
        ) {
            let q = Quantizer::Hard.quantize(&sample, &codebook).unwrap();
            prop_assert_eq!(q.len(), codebook.len());
            prop_assert_eq!(q.iter().filter(|&&w| w != 0.0).count(), 1);
            prop_assert_eq!(q.iter().sum::<f32>(), 1.0);

            // The hot entry is a true arg-min, and the first one at that.
            let hot = q.iter().position(|&w| w == 1.0).unwrap();
            let best = l2_squared_distance(&sample, &codebook[hot]);
            for (i, word) in codebook.iter().enumerate() {
                let d = l2_squared_distance(&sample, word);
                prop_assert!(d >= best);
                if i < hot {
                    prop_assert!(d > best);
                }
            }
        }

        #[test]
        fn fuzzy_quantization_is_l1_normalized(
            sample in arb_vector(4),
            codebook in arb_codebook(),
            sigma in 0.05f32..4.0,
        ) {
            let quantizer = Quantizer::fuzzy(sigma).unwrap();
            let q = quantizer.quantize(&sample, &codebook).unwrap();
            let sum: f32 = q.iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-4);
            prop_assert!(q.iter().all(|&w| (0.0..=1.0 + 1e-6).contains(&w)));
        }

        #[test]
        fn hard_histogram_mass_equals_sample_count(
            samples in prop::collection::vec(arb_vector(4), 0..30),
            codebook in arb_codebook(),
        ) {
            let quantized = quantize_batch(&samples, &codebook, Quantizer::Hard).unwrap();
            let histogram =
                build_histvw(&quantized, codebook.len(), None, 1, false).unwrap();
            let mass: f32 = histogram.iter().sum();
            prop_assert_eq!(mass, samples.len() as f32);
        }

        #[test]
        fn pyramid_cells_partition_the_plain_histogram(
            samples in prop::collection::vec(arb_vector(4), 1..30),
            codebook in arb_codebook(),
            resolution in 1usize..5,
            positions_seed in any::<u64>(),
        ) {
            use rand::{Rng, SeedableRng};
            let mut rng = rand::rngs::StdRng::seed_from_u64(positions_seed);
            let positions: Vec<[f32; 2]> = (0..samples.len())
                .map(|_| [rng.random_range(0.0f32..=1.0), rng.random_range(0.0f32..=1.0)])
                .collect();

            let quantized = quantize_batch(&samples, &codebook, Quantizer::Hard).unwrap();
            let k = codebook.len();
            let plain = build_histvw(&quantized, k, None, 1, false).unwrap();
            let pyramid =
                build_histvw(&quantized, k, Some(&positions), resolution, false).unwrap();

            prop_assert_eq!(pyramid.len(), k * resolution * resolution);
            // Summing each word over all cells recovers the plain histogram.
            for word in 0..k {
                let total: f32 = (0..resolution * resolution)
                    .map(|cell| pyramid[cell * k + word])
                    .sum();
                prop_assert!((total - plain[word]).abs() < 1e-4);
            }
        }
    }
}

mod ranking_props {
    use super::*;

    fn arb_corpus() -> impl Strategy<Value = Vec<Vec<f32>>> {
        prop::collection::vec(prop::collection::vec(0.0f32..4.0, 5), 1..12)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn query_top_k_is_a_prefix_of_the_full_ranking(
            corpus in arb_corpus(),
            query in prop::collection::vec(0.0f32..4.0, 5),
        ) {
            let mut index = InvertedIndex::new(5).unwrap();
            for histogram in &corpus {
                index.add_document(histogram).unwrap();
            }
            index.finalize(&LogTf, &VideoGoogleIdf).unwrap();

            let full = index
                .query(&query, &LogTf, &VideoGoogleIdf, corpus.len())
                .unwrap();
            prop_assert_eq!(full.len(), corpus.len());
            prop_assert!(full.windows(2).all(|w| w[0].0 >= w[1].0));

            for k in 1..corpus.len() {
                let top = index.query(&query, &LogTf, &VideoGoogleIdf, k).unwrap();
                prop_assert_eq!(&top[..], &full[..k]);
            }
        }

        #[test]
        fn nonempty_documents_have_unit_length(corpus in arb_corpus()) {
            let mut index = InvertedIndex::new(5).unwrap();
            for histogram in &corpus {
                index.add_document(histogram).unwrap();
            }
            index.finalize(&ConstantTf, &ConstantIdf).unwrap();

            for doc in 0..corpus.len() as u32 {
                let mut length = 0.0f32;
                for term in 0..5u32 {
                    for (posting, weight) in
                        index.postings(term).iter().zip(index.posting_weights(term))
                    {
                        if posting.0 == doc {
                            length += weight * weight;
                        }
                    }
                }
                let nonzero = corpus[doc as usize].iter().any(|&x| x != 0.0);
                if nonzero {
                    prop_assert!((length.sqrt() - 1.0).abs() < 1e-4);
                } else {
                    prop_assert_eq!(length, 0.0);
                }
            }
        }
    }
}
