//! Read side of the property file container.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::property::codec::Record;
use crate::property::{FORMAT_VERSION, KEY_OFFSETS, KEY_TYPEINFO, KEY_VERSION};
use crate::{Result, RetrievalError};

/// Reads a property file written by [`crate::property::PropertyWriter`].
///
/// Opening bootstraps from the trailer: the final 8 bytes point at the
/// metadata map, which carries the format version, the record type tag and
/// the position of the offset table. After that every record is one seek
/// plus one decode away.
#[derive(Debug)]
pub struct PropertyReader<T: Record> {
    input: BufReader<File>,
    path: PathBuf,
    offsets: Vec<i64>,
    metadata: BTreeMap<String, String>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> PropertyReader<T> {
    /// Open `path` read-only and validate version and record type.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            RetrievalError::Io(io::Error::new(
                e.kind(),
                format!("cannot open property file {}: {e}", path.display()),
            ))
        })?;
        let mut input = BufReader::new(file);

        input.seek(SeekFrom::End(-8))?;
        let metadata_pos = i64::read_from(&mut input)?;
        let metadata_pos = u64::try_from(metadata_pos).map_err(|_| {
            RetrievalError::malformed(format!(
                "{}: bad metadata pointer {metadata_pos}",
                path.display()
            ))
        })?;

        input.seek(SeekFrom::Start(metadata_pos))?;
        let metadata = BTreeMap::<String, String>::read_from(&mut input)?;

        let version = metadata.get(KEY_VERSION).ok_or_else(|| {
            RetrievalError::malformed(format!("{}: missing {KEY_VERSION}", path.display()))
        })?;
        if version != &FORMAT_VERSION.to_string() {
            return Err(RetrievalError::malformed(format!(
                "{}: unsupported property file version {version} (expected {FORMAT_VERSION})",
                path.display()
            )));
        }

        let typeinfo = metadata.get(KEY_TYPEINFO).ok_or_else(|| {
            RetrievalError::malformed(format!("{}: missing {KEY_TYPEINFO}", path.display()))
        })?;
        let expected = T::type_name();
        if typeinfo != &expected {
            return Err(RetrievalError::malformed(format!(
                "{}: record type is '{typeinfo}', asked for '{expected}'",
                path.display()
            )));
        }

        let offsets_pos: u64 = metadata
            .get(KEY_OFFSETS)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                RetrievalError::malformed(format!("{}: missing {KEY_OFFSETS}", path.display()))
            })?;
        input.seek(SeekFrom::Start(offsets_pos))?;
        let offsets = Vec::<i64>::read_from(&mut input)?;

        Ok(Self {
            input,
            path,
            offsets,
            metadata,
            _record: PhantomData,
        })
    }

    /// Number of records in the file.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the file holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Random-access read of record `index`.
    pub fn get(&mut self, index: usize) -> Result<T> {
        let offset = *self.offsets.get(index).ok_or_else(|| {
            RetrievalError::malformed(format!(
                "{}: record index {index} out of range (len {})",
                self.path.display(),
                self.offsets.len()
            ))
        })?;
        let offset = u64::try_from(offset).map_err(|_| {
            RetrievalError::malformed(format!(
                "{}: record {index} was never written",
                self.path.display()
            ))
        })?;
        self.input.seek(SeekFrom::Start(offset))?;
        Ok(T::read_from(&mut self.input)?)
    }

    /// The file's metadata map (includes the reserved `__` keys).
    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

/// Write a complete slice as a property file.
pub fn write_property<T: Record>(records: &[T], path: impl AsRef<Path>) -> Result<()> {
    let mut writer = crate::property::PropertyWriter::create(path)?;
    for record in records {
        writer.append(record)?;
    }
    writer.finish()
}

/// Read a complete property file into memory.
pub fn read_property<T: Record>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let mut reader = PropertyReader::<T>::open(path)?;
    let mut out = Vec::with_capacity(reader.len());
    for i in 0..reader.len() {
        out.push(reader.get(i)?);
    }
    Ok(out)
}
