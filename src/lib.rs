//! imbow: offline bag-of-features image retrieval.
//!
//! The engine indexes a corpus of images (or sketches) in four stages and
//! answers nearest-image queries against the result:
//!
//! 1. **Extraction** — [`pipeline`] applies a [`descriptor`] generator to
//!    every image with a pool of workers and serializes each output
//!    stream into a [`property`] file, strictly in file-list order.
//! 2. **Vocabulary** — [`vocabulary`] samples the extracted local
//!    descriptors and clusters them into a visual codebook with parallel
//!    k-means.
//! 3. **Histograms** — [`quantize`] assigns descriptors to codebook
//!    entries (hard or fuzzy) and accumulates per-image histograms of
//!    visual words, optionally as a spatial pyramid.
//! 4. **Indexing** — [`index`] builds a term-weighted inverted index over
//!    the histograms, with pluggable tf/idf functions and L2-normalized
//!    document vectors.
//!
//! Queries go through the [`search`] façade: either a direct linear scan
//! over global descriptors under a named [`distance`] function, or a
//! tf-idf cosine ranking backed by the inverted index. Both return
//! `(score, image index)` pairs whose indices point back into the file
//! list the corpus was extracted from.
//!
//! ```rust,ignore
//! use imbow::search::{Searcher, SearchConfig};
//!
//! let searcher = Searcher::from_json(
//!     r#"{ "search_type": "BofSearch", "index_file": "corpus.index",
//!          "tf": "video_google", "idf": "video_google" }"#,
//! )?;
//! let ranked = searcher.query(&query_histogram, 20)?;
//! ```
//!
//! Image decoding, concrete descriptors and command-line tooling live
//! outside this crate; everything here works on plain float vectors and
//! paths.

pub mod descriptor;
pub mod distance;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod property;
pub mod quantize;
pub mod registry;
pub mod search;
pub mod vocabulary;

pub use error::{Result, RetrievalError};
