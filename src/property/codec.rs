//! Binary record serialization for property files.
//!
//! Every value stored in a property file is built from a closed set of
//! shapes: width-explicit integers and IEEE floats, length-prefixed
//! strings, fixed arrays, count-prefixed sequences, string-keyed maps and
//! ordered sets, nested arbitrarily. Primitives are written little-endian;
//! counts are `i64`, string lengths `i32`. Files written on two machines
//! of the same endianness are byte-identical.
//!
//! Each type also exposes a stable structural name (`vec<vec<f32>>`,
//! `map<string,string>`, ...) which the writer records in the file
//! metadata and the reader checks before handing out records.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read, Write};

/// A value that can be stored as one record of a property file.
pub trait Record: Sized {
    /// Stable structural name of this type, recorded as the file's type
    /// tag and checked on read.
    fn type_name() -> String;

    /// Serialize into `w`, returning the number of bytes written.
    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<u64>;

    /// Deserialize one value from `r`.
    fn read_from<R: Read>(r: &mut R) -> io::Result<Self>;

    /// Serialize a run of values back to back (no count prefix).
    ///
    /// Scalar types override this with a single contiguous write, which
    /// is where sequence throughput comes from; composite types recurse
    /// element by element.
    fn write_slice<W: Write>(items: &[Self], w: &mut W) -> io::Result<u64> {
        let mut written = 0;
        for item in items {
            written += item.write_to(w)?;
        }
        Ok(written)
    }

    /// Deserialize `count` values written by [`Record::write_slice`].
    fn read_many<R: Read>(r: &mut R, count: usize) -> io::Result<Vec<Self>> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(Self::read_from(r)?);
        }
        Ok(out)
    }
}

macro_rules! scalar_record {
    ($($ty:ty => $name:literal),+ $(,)?) => {$(
        impl Record for $ty {
            fn type_name() -> String {
                $name.to_string()
            }

            fn write_to<W: Write>(&self, w: &mut W) -> io::Result<u64> {
                w.write_all(&self.to_le_bytes())?;
                Ok(std::mem::size_of::<$ty>() as u64)
            }

            fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                r.read_exact(&mut buf)?;
                Ok(<$ty>::from_le_bytes(buf))
            }

            fn write_slice<W: Write>(items: &[Self], w: &mut W) -> io::Result<u64> {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                let mut buf = Vec::with_capacity(items.len() * WIDTH);
                for item in items {
                    buf.extend_from_slice(&item.to_le_bytes());
                }
                w.write_all(&buf)?;
                Ok(buf.len() as u64)
            }

            fn read_many<R: Read>(r: &mut R, count: usize) -> io::Result<Vec<Self>> {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                let mut buf = vec![0u8; count * WIDTH];
                r.read_exact(&mut buf)?;
                let mut out = Vec::with_capacity(count);
                let mut chunk = [0u8; WIDTH];
                for bytes in buf.chunks_exact(WIDTH) {
                    chunk.copy_from_slice(bytes);
                    out.push(<$ty>::from_le_bytes(chunk));
                }
                Ok(out)
            }
        }
    )+};
}

scalar_record!(
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    f32 => "f32",
    f64 => "f64",
);

/// Read a count prefix, rejecting negative values from damaged files.
fn read_count<R: Read>(r: &mut R, what: &str) -> io::Result<usize> {
    let count = i64::read_from(r)?;
    usize::try_from(count).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("negative {what} count: {count}"),
        )
    })
}

impl Record for String {
    fn type_name() -> String {
        "string".to_string()
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<u64> {
        let mut written = (self.len() as i32).write_to(w)?;
        w.write_all(self.as_bytes())?;
        written += self.len() as u64;
        Ok(written)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let len = i32::read_from(r)?;
        let len = usize::try_from(len).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("negative string length: {len}"),
            )
        })?;
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }
}

impl<T: Record, const N: usize> Record for [T; N] {
    fn type_name() -> String {
        format!("array<{},{}>", T::type_name(), N)
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<u64> {
        T::write_slice(self, w)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let items = T::read_many(r, N)?;
        items.try_into().map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "short fixed-array read")
        })
    }
}

impl<T: Record> Record for Vec<T> {
    fn type_name() -> String {
        format!("vec<{}>", T::type_name())
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<u64> {
        let mut written = (self.len() as i64).write_to(w)?;
        written += T::write_slice(self, w)?;
        Ok(written)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let count = read_count(r, "sequence")?;
        T::read_many(r, count)
    }
}

impl<A: Record, B: Record> Record for (A, B) {
    fn type_name() -> String {
        format!("pair<{},{}>", A::type_name(), B::type_name())
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<u64> {
        Ok(self.0.write_to(w)? + self.1.write_to(w)?)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let a = A::read_from(r)?;
        let b = B::read_from(r)?;
        Ok((a, b))
    }
}

impl<T: Record> Record for BTreeMap<String, T> {
    fn type_name() -> String {
        format!("map<string,{}>", T::type_name())
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<u64> {
        let mut written = (self.len() as i64).write_to(w)?;
        for (key, value) in self {
            written += key.write_to(w)?;
            written += value.write_to(w)?;
        }
        Ok(written)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let count = read_count(r, "map")?;
        let mut out = BTreeMap::new();
        for _ in 0..count {
            let key = String::read_from(r)?;
            let value = T::read_from(r)?;
            out.insert(key, value);
        }
        Ok(out)
    }
}

impl<T: Record + Ord> Record for BTreeSet<T> {
    fn type_name() -> String {
        format!("set<{}>", T::type_name())
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<u64> {
        let mut written = (self.len() as i64).write_to(w)?;
        for item in self {
            written += item.write_to(w)?;
        }
        Ok(written)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let count = read_count(r, "set")?;
        let mut out = BTreeSet::new();
        for _ in 0..count {
            out.insert(T::read_from(r)?);
        }
        Ok(out)
    }
}
