//! Pluggable tf and idf weighting functions.
//!
//! A tf function scores a term's raw count within one document; an idf
//! function scores the term's rarity over the whole collection. During
//! [`crate::index::InvertedIndex::finalize`] the two are multiplied per
//! posting; during a query the tf is evaluated on the one-document query
//! index while the idf keeps reading the collection's statistics.

use std::sync::Arc;

use crate::index::InvertedIndex;
use crate::registry::Registry;

/// Term-frequency weight of one posting.
pub trait TfWeight: Send + Sync {
    /// Weight for the posting at `list_index` of `term` in `index`,
    /// belonging to document `doc`.
    fn weight(&self, index: &InvertedIndex, term: u32, doc: u32, list_index: usize) -> f32;
}

/// Inverse-document-frequency weight of a term over `collection`.
pub trait IdfWeight: Send + Sync {
    fn weight(&self, collection: &InvertedIndex, term: u32) -> f32;
}

/// tf = 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantTf;

impl TfWeight for ConstantTf {
    fn weight(&self, _index: &InvertedIndex, _term: u32, _doc: u32, _list_index: usize) -> f32 {
        1.0
    }
}

/// tf = count / document size, after Sivic & Zisserman's Video Google.
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoGoogleTf;

impl TfWeight for VideoGoogleTf {
    fn weight(&self, index: &InvertedIndex, term: u32, doc: u32, list_index: usize) -> f32 {
        let count = index.posting_count(term, list_index);
        let doc_size = index.doc_size(doc);
        if doc_size > 0.0 { count / doc_size } else { 0.0 }
    }
}

/// tf = 1 + ln(count) for positive counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTf;

impl TfWeight for LogTf {
    fn weight(&self, index: &InvertedIndex, term: u32, _doc: u32, list_index: usize) -> f32 {
        let count = index.posting_count(term, list_index);
        if count > 0.0 { 1.0 + count.ln() } else { 0.0 }
    }
}

/// tf = 1 if the term occurs at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryTf;

impl TfWeight for BinaryTf {
    fn weight(&self, index: &InvertedIndex, term: u32, _doc: u32, list_index: usize) -> f32 {
        if index.posting_count(term, list_index) > 0.0 {
            1.0
        } else {
            0.0
        }
    }
}

/// idf = 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantIdf;

impl IdfWeight for ConstantIdf {
    fn weight(&self, _collection: &InvertedIndex, _term: u32) -> f32 {
        1.0
    }
}

/// idf = ln(M / f[t]), guarded against terms absent from the collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoGoogleIdf;

impl IdfWeight for VideoGoogleIdf {
    fn weight(&self, collection: &InvertedIndex, term: u32) -> f32 {
        let document_frequency = collection.document_frequency(term);
        if document_frequency == 0 {
            return 0.0;
        }
        (collection.num_documents() as f32 / document_frequency as f32).ln()
    }
}

/// Registry with the built-in tf functions under their configuration
/// names. Callers can register additional implementations before handing
/// the registry to the search façade.
#[must_use]
pub fn default_tf_functions() -> Registry<Arc<dyn TfWeight>> {
    let mut registry = Registry::new("tf function");
    registry
        .register("constant", Arc::new(ConstantTf) as Arc<dyn TfWeight>)
        .register("video_google", Arc::new(VideoGoogleTf))
        .register("log", Arc::new(LogTf))
        .register("binary", Arc::new(BinaryTf));
    registry
}

/// Registry with the built-in idf functions under their configuration
/// names.
#[must_use]
pub fn default_idf_functions() -> Registry<Arc<dyn IdfWeight>> {
    let mut registry = Registry::new("idf function");
    registry
        .register("constant", Arc::new(ConstantIdf) as Arc<dyn IdfWeight>)
        .register("video_google", Arc::new(VideoGoogleIdf));
    registry
}
