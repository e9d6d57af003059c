//! Term-weighted inverted index over histograms of visual words.

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::{BTreeSet, BinaryHeap};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::index::tfidf::{IdfWeight, TfWeight};
use crate::property::Record;
use crate::{Result, RetrievalError};

/// An inverted index mapping visual-word ids to the documents containing
/// them, with the statistics tf-idf weighting needs.
///
/// Lifecycle: construct with the vocabulary size, grow with
/// [`InvertedIndex::add_document`], freeze with
/// [`InvertedIndex::finalize`] (which bakes tf·idf weights, L2-normalized
/// per document, into the posting lists), then query or save. A loaded
/// index is already finalized.
pub struct InvertedIndex {
    num_words: u32,
    num_documents: u32,
    avg_doc_size: f32,
    avg_unique_doc_size: f32,
    /// Total occurrences of each term over the corpus (`F[t]`).
    collection_frequency: Vec<f32>,
    /// Terms with at least one occurrence anywhere.
    unique_terms: BTreeSet<u32>,
    /// Number of documents containing each term (`f[t]`).
    document_frequency: Vec<u32>,
    /// Per term, `(doc id, raw count)` in ascending doc order.
    postings: Vec<Vec<(u32, f32)>>,
    /// Per term, the finalized weight of each posting. Empty rows until
    /// finalization.
    weights: Vec<Vec<f32>>,
    /// Total weight of each document.
    doc_sizes: Vec<f32>,
    /// Number of distinct terms in each document.
    unique_doc_sizes: Vec<i32>,
    finalized: bool,
}

/// Accumulator entry ordered by score, then document id.
struct Scored {
    score: f32,
    doc: u32,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.doc.cmp(&other.doc))
    }
}

impl InvertedIndex {
    /// Empty index over a vocabulary of `num_words` terms.
    pub fn new(num_words: usize) -> Result<Self> {
        if num_words == 0 {
            return Err(RetrievalError::Config(
                "vocabulary size must be > 0".to_string(),
            ));
        }
        Ok(Self {
            num_words: num_words as u32,
            num_documents: 0,
            avg_doc_size: 0.0,
            avg_unique_doc_size: 0.0,
            collection_frequency: vec![0.0; num_words],
            unique_terms: BTreeSet::new(),
            document_frequency: vec![0; num_words],
            postings: vec![Vec::new(); num_words],
            weights: vec![Vec::new(); num_words],
            doc_sizes: Vec::new(),
            unique_doc_sizes: Vec::new(),
            finalized: false,
        })
    }

    /// Vocabulary size `K`.
    #[must_use]
    pub fn num_words(&self) -> u32 {
        self.num_words
    }

    /// Number of documents added.
    #[must_use]
    pub fn num_documents(&self) -> u32 {
        self.num_documents
    }

    /// Mean document size over the corpus (valid after finalization).
    #[must_use]
    pub fn avg_doc_size(&self) -> f32 {
        self.avg_doc_size
    }

    /// Mean number of distinct terms per document (valid after
    /// finalization).
    #[must_use]
    pub fn avg_unique_doc_size(&self) -> f32 {
        self.avg_unique_doc_size
    }

    /// Total weight of document `doc`.
    #[must_use]
    pub fn doc_size(&self, doc: u32) -> f32 {
        self.doc_sizes.get(doc as usize).copied().unwrap_or(0.0)
    }

    /// Number of documents term `term` occurs in (`f[t]`).
    #[must_use]
    pub fn document_frequency(&self, term: u32) -> u32 {
        self.document_frequency
            .get(term as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Total occurrences of `term` over the corpus (`F[t]`).
    #[must_use]
    pub fn collection_frequency(&self, term: u32) -> f32 {
        self.collection_frequency
            .get(term as usize)
            .copied()
            .unwrap_or(0.0)
    }

    /// Raw count stored in posting `list_index` of `term`.
    #[must_use]
    pub fn posting_count(&self, term: u32, list_index: usize) -> f32 {
        self.postings
            .get(term as usize)
            .and_then(|postings| postings.get(list_index))
            .map(|&(_, count)| count)
            .unwrap_or(0.0)
    }

    /// Terms with at least one occurrence in any document.
    #[must_use]
    pub fn unique_terms(&self) -> &BTreeSet<u32> {
        &self.unique_terms
    }

    /// Posting list of `term` as `(doc id, raw count)` pairs.
    #[must_use]
    pub fn postings(&self, term: u32) -> &[(u32, f32)] {
        self.postings
            .get(term as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Finalized weights parallel to [`InvertedIndex::postings`]. Empty
    /// before finalization.
    #[must_use]
    pub fn posting_weights(&self, term: u32) -> &[f32] {
        self.weights
            .get(term as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the index is frozen and queryable.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Append a document histogram, assigning it the next document id.
    ///
    /// Unsets finalization: corpus statistics are only consistent once
    /// every document is in and [`InvertedIndex::finalize`] ran again.
    pub fn add_document(&mut self, histogram: &[f32]) -> Result<()> {
        if histogram.len() != self.num_words as usize {
            return Err(RetrievalError::Shape {
                context: "document histogram width",
                expected: self.num_words as usize,
                actual: histogram.len(),
            });
        }
        self.finalized = false;

        let doc = self.num_documents;
        let mut doc_size = 0.0f32;
        let mut unique = 0i32;

        for (term, &count) in histogram.iter().enumerate() {
            if count != 0.0 {
                doc_size += count;
                unique += 1;
                self.document_frequency[term] += 1;
                self.collection_frequency[term] += count;
                self.postings[term].push((doc, count));
                self.unique_terms.insert(term as u32);
            }
        }

        self.doc_sizes.push(doc_size);
        self.unique_doc_sizes.push(unique);
        self.num_documents += 1;
        Ok(())
    }

    /// Freeze the index, weighting every posting with `tf · idf` and
    /// L2-normalizing per document, using this index's own corpus
    /// statistics for the idf.
    pub fn finalize(&mut self, tf: &dyn TfWeight, idf: &dyn IdfWeight) -> Result<()> {
        self.finalize_impl(None, tf, idf)
    }

    /// Freeze a (usually single-document) index, taking idf statistics
    /// from `collection` instead of from this index.
    ///
    /// This is how a query histogram gets weighted: term frequency is
    /// relative to the query document itself, but rarity only means
    /// anything over the searched collection.
    pub fn finalize_against(
        &mut self,
        collection: &InvertedIndex,
        tf: &dyn TfWeight,
        idf: &dyn IdfWeight,
    ) -> Result<()> {
        self.finalize_impl(Some(collection), tf, idf)
    }

    fn finalize_impl(
        &mut self,
        collection: Option<&InvertedIndex>,
        tf: &dyn TfWeight,
        idf: &dyn IdfWeight,
    ) -> Result<()> {
        let num_documents = self.num_documents as usize;
        if num_documents > 0 {
            self.avg_doc_size = self.doc_sizes.iter().sum::<f32>() / num_documents as f32;
            self.avg_unique_doc_size =
                self.unique_doc_sizes.iter().sum::<i32>() as f32 / num_documents as f32;
        }

        let mut lengths = vec![0.0f32; num_documents];
        let mut weights: Vec<Vec<f32>> = Vec::with_capacity(self.num_words as usize);

        for term in 0..self.num_words {
            let postings = &self.postings[term as usize];
            let mut row = Vec::with_capacity(postings.len());
            for (list_index, &(doc, _)) in postings.iter().enumerate() {
                let w_tf = tf.weight(self, term, doc, list_index);
                let w_idf = idf.weight(collection.unwrap_or(self), term);
                let weight = w_tf * w_idf;
                lengths[doc as usize] += weight * weight;
                row.push(weight);
            }
            weights.push(row);
        }

        for length in &mut lengths {
            *length = length.sqrt();
        }

        // Normalize so every document has unit L2 length. A zero length
        // (empty document, or a weighting that zeroed every term) is left
        // untouched instead of producing NaNs.
        for (term_postings, term_weights) in self.postings.iter().zip(&mut weights) {
            for (&(doc, _), weight) in term_postings.iter().zip(term_weights) {
                let length = lengths[doc as usize];
                if length > 0.0 {
                    *weight /= length;
                }
            }
        }

        self.weights = weights;
        self.finalized = true;
        Ok(())
    }

    /// Rank the `num_results` most similar documents to `histogram` by
    /// tf-idf cosine similarity, best first.
    ///
    /// The query is weighted through a one-document index finalized
    /// against this collection, so tf applies to the query histogram
    /// while idf reads corpus statistics. Accumulation walks only the
    /// posting lists of the query's nonzero terms; selection uses a
    /// bounded min-heap of `num_results` entries.
    pub fn query(
        &self,
        histogram: &[f32],
        tf: &dyn TfWeight,
        idf: &dyn IdfWeight,
        num_results: usize,
    ) -> Result<Vec<(f32, u32)>> {
        if !self.finalized {
            return Err(RetrievalError::State(
                "inverted index must be finalized before querying".to_string(),
            ));
        }
        let num_results = num_results.min(self.num_documents as usize);

        let mut query_index = InvertedIndex::new(self.num_words as usize)?;
        query_index.add_document(histogram)?;
        query_index.finalize_against(self, tf, idf)?;

        let mut accumulators = vec![0.0f32; self.num_documents as usize];
        for &term in query_index.unique_terms() {
            let query_weight = query_index.weights[term as usize][0];
            let postings = &self.postings[term as usize];
            let weights = &self.weights[term as usize];
            for (&(doc, _), &doc_weight) in postings.iter().zip(weights) {
                accumulators[doc as usize] += doc_weight * query_weight;
            }
        }

        // Bounded min-heap: push every accumulator, evict the smallest
        // whenever the heap grows past `num_results`.
        let mut heap: BinaryHeap<Reverse<Scored>> =
            BinaryHeap::with_capacity(num_results + 1);
        for (doc, &score) in accumulators.iter().enumerate() {
            heap.push(Reverse(Scored {
                score,
                doc: doc as u32,
            }));
            if heap.len() > num_results {
                heap.pop();
            }
        }

        let mut results = Vec::with_capacity(heap.len());
        while let Some(Reverse(entry)) = heap.pop() {
            results.push((entry.score, entry.doc));
        }
        results.reverse();
        Ok(results)
    }

    /// Serialize the finalized index to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        if !self.finalized {
            return Err(RetrievalError::State(
                "inverted index must be finalized before saving".to_string(),
            ));
        }
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            RetrievalError::Io(io::Error::new(
                e.kind(),
                format!("cannot create index file {}: {e}", path.display()),
            ))
        })?;
        let mut out = BufWriter::new(file);

        self.num_words.write_to(&mut out)?;
        self.num_documents.write_to(&mut out)?;
        self.avg_doc_size.write_to(&mut out)?;
        self.avg_unique_doc_size.write_to(&mut out)?;
        self.collection_frequency.write_to(&mut out)?;
        self.unique_terms.write_to(&mut out)?;
        self.document_frequency.write_to(&mut out)?;
        self.postings.write_to(&mut out)?;
        self.weights.write_to(&mut out)?;
        self.doc_sizes.write_to(&mut out)?;
        self.unique_doc_sizes.write_to(&mut out)?;
        out.flush()?;

        info!(path = %path.display(), documents = self.num_documents, "saved inverted index");
        Ok(())
    }

    /// Load an index saved with [`InvertedIndex::save`]. The result is
    /// finalized and ready to query.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            RetrievalError::Io(io::Error::new(
                e.kind(),
                format!("cannot open index file {}: {e}", path.display()),
            ))
        })?;
        let mut input = BufReader::new(file);

        let num_words = u32::read_from(&mut input)?;
        let num_documents = u32::read_from(&mut input)?;
        let avg_doc_size = f32::read_from(&mut input)?;
        let avg_unique_doc_size = f32::read_from(&mut input)?;
        let collection_frequency = Vec::<f32>::read_from(&mut input)?;
        let unique_terms = BTreeSet::<u32>::read_from(&mut input)?;
        let document_frequency = Vec::<u32>::read_from(&mut input)?;
        let postings = Vec::<Vec<(u32, f32)>>::read_from(&mut input)?;
        let weights = Vec::<Vec<f32>>::read_from(&mut input)?;
        let doc_sizes = Vec::<f32>::read_from(&mut input)?;
        let unique_doc_sizes = Vec::<i32>::read_from(&mut input)?;

        let term_tables = [
            collection_frequency.len(),
            document_frequency.len(),
            postings.len(),
            weights.len(),
        ];
        if term_tables.iter().any(|&len| len != num_words as usize) {
            return Err(RetrievalError::malformed(format!(
                "{}: term table sizes {term_tables:?} disagree with vocabulary size {num_words}",
                path.display()
            )));
        }

        debug!(path = %path.display(), documents = num_documents, "loaded inverted index");
        Ok(Self {
            num_words,
            num_documents,
            avg_doc_size,
            avg_unique_doc_size,
            collection_frequency,
            unique_terms,
            document_frequency,
            postings,
            weights,
            doc_sizes,
            unique_doc_sizes,
            finalized: true,
        })
    }
}
