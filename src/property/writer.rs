//! Write side of the property file container.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::property::codec::Record;
use crate::property::{FORMAT_VERSION, KEY_OFFSETS, KEY_TYPEINFO, KEY_VERSION, OFFSET_HOLE};
use crate::{Result, RetrievalError};

/// Writes a typed, append-only property file.
///
/// Records are serialized back to back as they arrive; the byte offset of
/// each record is kept in memory and appended as part of the trailer when
/// the writer is finished. Files of hundreds of gigabytes are fine; the
/// only in-memory state is one `i64` per record.
///
/// Call [`PropertyWriter::finish`] to emit the trailer and surface any
/// write error. Dropping an unfinished writer emits the trailer on a
/// best-effort basis so the file is usually still readable, but errors
/// are lost on that path.
pub struct PropertyWriter<T: Record> {
    out: BufWriter<File>,
    path: PathBuf,
    /// Logical write position; the file is never seeked.
    pos: u64,
    offsets: Vec<i64>,
    metadata: BTreeMap<String, String>,
    finished: bool,
    _record: PhantomData<fn(&T)>,
}

impl<T: Record> PropertyWriter<T> {
    /// Open `path` for writing, truncating any existing content.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| {
            RetrievalError::Io(io::Error::new(
                e.kind(),
                format!("cannot create property file {}: {e}", path.display()),
            ))
        })?;

        let mut metadata = BTreeMap::new();
        metadata.insert(KEY_VERSION.to_string(), FORMAT_VERSION.to_string());
        metadata.insert(KEY_TYPEINFO.to_string(), T::type_name());

        Ok(Self {
            out: BufWriter::new(file),
            path,
            pos: 0,
            offsets: Vec::new(),
            metadata,
            finished: false,
            _record: PhantomData,
        })
    }

    /// Number of record slots assigned so far (including any holes left
    /// by [`PropertyWriter::insert_at`]).
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether no record slot has been assigned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Append a record, assigning it the next index.
    pub fn append(&mut self, record: &T) -> Result<()> {
        self.offsets.push(self.pos as i64);
        self.pos += record.write_to(&mut self.out)?;
        Ok(())
    }

    /// Write a record whose logical index is `index`.
    ///
    /// The record's bytes still go to the current end of the file; only
    /// the offset table entry lands at `index`. Slots skipped over are
    /// filled with a hole marker and stay unreadable until written.
    pub fn insert_at(&mut self, index: usize, record: &T) -> Result<()> {
        if self.offsets.len() <= index {
            self.offsets.resize(index + 1, OFFSET_HOLE);
        }
        self.offsets[index] = self.pos as i64;
        self.pos += record.write_to(&mut self.out)?;
        Ok(())
    }

    /// Emit the trailer and flush the file.
    pub fn finish(mut self) -> Result<()> {
        self.write_trailer()?;
        self.out.flush()?;
        Ok(())
    }

    fn write_trailer(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        // Placeholder slot reserved by the format.
        self.pos += 0i64.write_to(&mut self.out)?;

        let offsets_pos = self.pos;
        self.metadata
            .insert(KEY_OFFSETS.to_string(), offsets_pos.to_string());
        self.pos += self.offsets.write_to(&mut self.out)?;

        let metadata_pos = self.pos;
        self.pos += self.metadata.write_to(&mut self.out)?;
        self.pos += (metadata_pos as i64).write_to(&mut self.out)?;
        Ok(())
    }
}

impl<T: Record> Drop for PropertyWriter<T> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                path = %self.path.display(),
                "property writer dropped without finish(), emitting trailer best-effort"
            );
            let _ = self.write_trailer();
            let _ = self.out.flush();
        }
    }
}
