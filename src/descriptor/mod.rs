//! The descriptor generator contract shared by the extraction pipeline.
//!
//! A generator turns one image into a set of named record streams: a
//! global descriptor is a single `features` vector, a local descriptor
//! emits `features` (one vector per keypoint), `positions` (keypoint
//! coordinates in `[0,1]²`) and `numfeatures` (the keypoint count).
//! Streams are declared up front through [`DescriptorGenerator::schema`]
//! so the pipeline can open one property file per stream before any image
//! is touched — there is no runtime type probing.
//!
//! Concrete image descriptors (tiny-image, GIST, histogram-of-gradients
//! variants) live outside this crate; anything implementing
//! [`DescriptorGenerator`] plugs in.

use std::collections::BTreeMap;
use std::path::Path;

use crate::property::PropertyWriter;
use crate::registry::Registry;
use crate::{Result, RetrievalError};

/// One record handed from a generator to the pipeline.
///
/// The closed set of variants mirrors the record types the property file
/// layer supports for descriptor data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A single dense vector (global descriptor).
    F32Vec(Vec<f32>),
    /// A sequence of dense vectors (local descriptors of one image).
    F32VecVec(Vec<Vec<f32>>),
    /// A scalar count.
    I32(i32),
    /// Keypoint positions, each in `[0,1]²`.
    Positions(Vec<[f32; 2]>),
}

impl Value {
    /// The kind tag of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::F32Vec(_) => ValueKind::F32Vec,
            Value::F32VecVec(_) => ValueKind::F32VecVec,
            Value::I32(_) => ValueKind::I32,
            Value::Positions(_) => ValueKind::Positions,
        }
    }
}

/// Kind tag for [`Value`], used in stream declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    F32Vec,
    F32VecVec,
    I32,
    Positions,
}

/// Declaration of one output stream: its name and record kind.
#[derive(Debug, Clone, Copy)]
pub struct StreamSchema {
    pub name: &'static str,
    pub kind: ValueKind,
}

impl StreamSchema {
    #[must_use]
    pub const fn new(name: &'static str, kind: ValueKind) -> Self {
        Self { name, kind }
    }
}

/// The named outputs a generator produced for one image.
pub type DescriptorOutput = BTreeMap<String, Value>;

/// A producer of descriptor record streams from images.
///
/// Implementations must be shareable across the pipeline's worker threads;
/// `compute` is called concurrently for different images.
pub trait DescriptorGenerator: Send + Sync {
    /// Configuration name of this generator.
    fn name(&self) -> &str;

    /// The streams every call to `compute` fills, declared once.
    fn schema(&self) -> &[StreamSchema];

    /// Extract descriptors from the image at `path`.
    ///
    /// The returned map must contain every declared stream with the
    /// declared kind. Failures should carry the image path via
    /// [`RetrievalError::Compute`].
    fn compute(&self, path: &Path) -> Result<DescriptorOutput>;
}

/// A property writer for one declared stream, checked against its kind.
pub enum StreamWriter {
    F32Vec(PropertyWriter<Vec<f32>>),
    F32VecVec(PropertyWriter<Vec<Vec<f32>>>),
    I32(PropertyWriter<i32>),
    Positions(PropertyWriter<Vec<[f32; 2]>>),
}

impl StreamWriter {
    /// Open a writer of the right record type for `kind` at `path`.
    pub fn create(kind: ValueKind, path: impl AsRef<Path>) -> Result<Self> {
        Ok(match kind {
            ValueKind::F32Vec => StreamWriter::F32Vec(PropertyWriter::create(path)?),
            ValueKind::F32VecVec => StreamWriter::F32VecVec(PropertyWriter::create(path)?),
            ValueKind::I32 => StreamWriter::I32(PropertyWriter::create(path)?),
            ValueKind::Positions => StreamWriter::Positions(PropertyWriter::create(path)?),
        })
    }

    /// The kind this writer accepts.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            StreamWriter::F32Vec(_) => ValueKind::F32Vec,
            StreamWriter::F32VecVec(_) => ValueKind::F32VecVec,
            StreamWriter::I32(_) => ValueKind::I32,
            StreamWriter::Positions(_) => ValueKind::Positions,
        }
    }

    /// Write `value` at logical index `index`.
    pub fn insert_at(&mut self, index: usize, value: &Value) -> Result<()> {
        match (self, value) {
            (StreamWriter::F32Vec(w), Value::F32Vec(v)) => w.insert_at(index, v),
            (StreamWriter::F32VecVec(w), Value::F32VecVec(v)) => w.insert_at(index, v),
            (StreamWriter::I32(w), Value::I32(v)) => w.insert_at(index, v),
            (StreamWriter::Positions(w), Value::Positions(v)) => w.insert_at(index, v),
            (writer, value) => Err(RetrievalError::Config(format!(
                "stream writer accepts {:?}, generator produced {:?}",
                writer.kind(),
                value.kind()
            ))),
        }
    }

    /// Finish the underlying property file.
    pub fn finish(self) -> Result<()> {
        match self {
            StreamWriter::F32Vec(w) => w.finish(),
            StreamWriter::F32VecVec(w) => w.finish(),
            StreamWriter::I32(w) => w.finish(),
            StreamWriter::Positions(w) => w.finish(),
        }
    }
}

/// Factory resolving a JSON parameter tree into a generator instance.
pub type GeneratorFactory =
    Box<dyn Fn(&serde_json::Value) -> Result<Box<dyn DescriptorGenerator>> + Send + Sync>;

/// Registry of generator factories keyed by configuration name.
///
/// Built explicitly by the embedding binary; the config shape is
/// `{"generator": {"name": "...", <generator-specific params>...}}`.
pub struct GeneratorRegistry {
    inner: Registry<GeneratorFactory>,
}

impl GeneratorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Registry::new("descriptor generator"),
        }
    }

    /// Register a factory under `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: GeneratorFactory) -> &mut Self {
        self.inner.register(name, factory);
        self
    }

    /// Registered generator names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.names()
    }

    /// Build a generator from a parameter tree, dispatching on
    /// `generator.name`.
    pub fn from_config(&self, config: &serde_json::Value) -> Result<Box<dyn DescriptorGenerator>> {
        let name = config
            .get("generator")
            .and_then(|g| g.get("name"))
            .and_then(|n| n.as_str())
            .ok_or_else(|| {
                RetrievalError::Config("generator config is missing 'generator.name'".to_string())
            })?;
        (self.inner.get(name)?)(config)
    }

    /// Build a generator by name with an otherwise-empty parameter tree,
    /// i.e. all generator-specific parameters at their defaults.
    pub fn from_default_parameters(&self, name: &str) -> Result<Box<dyn DescriptorGenerator>> {
        let config = serde_json::json!({ "generator": { "name": name } });
        (self.inner.get(name)?)(&config)
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
