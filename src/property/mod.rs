//! Typed, append-only, random-access record containers ("property files").
//!
//! A property file maps a 0-based integer index to one serialized record
//! of a fixed type. The write path is strictly sequential; an offset table
//! and a string metadata map are appended as a trailer when the writer
//! finishes, and the reader bootstraps from a pointer in the final 8 bytes:
//!
//! ```text
//! ┌───────────────────────────────┐
//! │ record 0 │ record 1 │ ...     │  declaration order
//! ├───────────────────────────────┤
//! │ i64 placeholder (0)           │
//! │ offsets: i64 count, offsets   │  -1 marks a hole
//! │ metadata: map<string,string>  │  __version __typeinfo __offsets
//! │ i64 metadata position         │
//! └───────────────────────────────┘
//! ```
//!
//! Records can be any composition from the closed set in [`codec`]. Typical
//! uses here: `Vec<f32>` for one global descriptor per image,
//! `Vec<Vec<f32>>` for the local descriptors of one image, `i32` for
//! per-image feature counts.
//!
//! Endianness is not normalized: primitives are fixed-width little-endian,
//! so files move freely between the little-endian hosts this targets but
//! not across endianness.

pub mod codec;
mod reader;
mod writer;

pub use codec::Record;
pub use reader::{PropertyReader, read_property, write_property};
pub use writer::PropertyWriter;

/// On-disk format version, bumped on incompatible change.
pub const FORMAT_VERSION: u32 = 2;

/// Offset table entry for a slot that was reserved but never written.
pub const OFFSET_HOLE: i64 = -1;

pub(crate) const KEY_VERSION: &str = "__version";
pub(crate) const KEY_TYPEINFO: &str = "__typeinfo";
pub(crate) const KEY_OFFSETS: &str = "__offsets";
