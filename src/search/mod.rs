//! Search façade: configuration-driven dispatch between linear vector
//! search and bag-of-features inverted-index search.
//!
//! Both strategies answer a query with an ordered `Vec<(score, image
//! index)>`; the image index points into the file list the descriptors
//! were computed from. Linear search ranks ascending (scores are
//! distances), BoF search ranks descending (scores are cosine
//! similarities).

mod bof;
mod linear;

pub use bof::{BofSearch, query_histogram};
pub use linear::LinearSearch;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::distance::{Distance, default_distances};
use crate::index::tfidf::{IdfWeight, TfWeight};
use crate::index::{default_idf_functions, default_tf_functions};
use crate::registry::Registry;
use crate::{Result, RetrievalError};

fn default_weight_name() -> String {
    "constant".to_string()
}

/// Parameters for [`BofSearch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BofSearchConfig {
    /// Path of a saved [`crate::index::InvertedIndex`].
    pub index_file: PathBuf,
    /// tf function used to weight query histograms.
    #[serde(default = "default_weight_name")]
    pub tf: String,
    /// idf function used to weight query histograms.
    #[serde(default = "default_weight_name")]
    pub idf: String,
}

/// Parameters for [`LinearSearch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSearchConfig {
    /// Path of a `vec<f32>` descriptor property file.
    pub descriptor_file: PathBuf,
    /// Distance function name.
    pub distfn: String,
}

/// Query-time search configuration, dispatched on `search_type`.
///
/// The JSON shape matches the engine's config files:
///
/// ```json
/// { "search_type": "BofSearch", "index_file": "corpus.index",
///   "tf": "video_google", "idf": "video_google" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "search_type")]
pub enum SearchConfig {
    BofSearch(BofSearchConfig),
    LinearSearch(LinearSearchConfig),
}

/// The registries a [`Searcher`] resolves configuration names against.
///
/// [`SearchRegistries::default`] carries the built-in distance, tf and
/// idf functions; extend the individual registries to add custom
/// implementations before constructing searchers.
pub struct SearchRegistries {
    pub distances: Registry<Arc<dyn Distance>>,
    pub tf_functions: Registry<Arc<dyn TfWeight>>,
    pub idf_functions: Registry<Arc<dyn IdfWeight>>,
}

impl Default for SearchRegistries {
    fn default() -> Self {
        Self {
            distances: default_distances(),
            tf_functions: default_tf_functions(),
            idf_functions: default_idf_functions(),
        }
    }
}

/// A constructed search strategy.
pub enum Searcher {
    Linear(LinearSearch),
    Bof(BofSearch),
}

impl Searcher {
    /// Build the searcher a config asks for, resolving names against the
    /// built-in registries.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        Self::from_config_with(config, &SearchRegistries::default())
    }

    /// Build the searcher a config asks for, resolving names against
    /// caller-supplied registries.
    pub fn from_config_with(config: &SearchConfig, registries: &SearchRegistries) -> Result<Self> {
        match config {
            SearchConfig::LinearSearch(config) => Ok(Searcher::Linear(
                LinearSearch::from_config(config, &registries.distances)?,
            )),
            SearchConfig::BofSearch(config) => Ok(Searcher::Bof(BofSearch::from_config(
                config,
                &registries.tf_functions,
                &registries.idf_functions,
            )?)),
        }
    }

    /// Parse a JSON config object and build the searcher it describes.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SearchConfig = serde_json::from_str(json)
            .map_err(|e| RetrievalError::Config(format!("bad search config: {e}")))?;
        Self::from_config(&config)
    }

    /// Run a query against whichever strategy is configured.
    ///
    /// `descriptor` is a global descriptor for linear search and a
    /// histogram of visual words for BoF search.
    pub fn query(&self, descriptor: &[f32], num_results: usize) -> Result<Vec<(f32, u32)>> {
        match self {
            Searcher::Linear(search) => search.query(descriptor, num_results),
            Searcher::Bof(search) => search.query(descriptor, num_results),
        }
    }
}
