//! Name-addressable registries for pluggable components.
//!
//! Generators, distance functions and tf/idf weights are all selected at
//! runtime by a name taken from configuration. A [`Registry`] is a plain
//! value built explicitly at program start and passed to whatever loads the
//! configuration; there is no process-wide registration and no load-order
//! dependence.

use std::collections::BTreeMap;

use crate::{Result, RetrievalError};

/// A map from component name to component, with error messages that name
/// the kind of thing being looked up.
pub struct Registry<T> {
    kind: &'static str,
    entries: BTreeMap<String, T>,
}

impl<T> Registry<T> {
    /// Create an empty registry. `kind` is a short noun used in error
    /// messages, e.g. `"distance function"`.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Register `value` under `name`, replacing any previous entry.
    ///
    /// Returns `&mut self` so registrations chain.
    pub fn register(&mut self, name: impl Into<String>, value: T) -> &mut Self {
        self.entries.insert(name.into(), value);
        self
    }

    /// Look up an entry, failing with a [`RetrievalError::Config`] that
    /// lists the registered names.
    pub fn get(&self, name: &str) -> Result<&T> {
        self.entries.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.entries.keys().map(String::as_str).collect();
            RetrievalError::Config(format!(
                "unknown {} '{}' (registered: {})",
                self.kind,
                name,
                known.join(", ")
            ))
        })
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<T> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
