//! Primitive wire data types, both directions.
//!
//! Everything is big-endian. Variable-length fields carry a `u32` length
//! prefix and are bounded; an oversized prefix is a protocol error, never an
//! allocation.

use std::io::{self, Read, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::{FromPrimitive, ToPrimitive};

use super::{Error, Result};

/// Parses a `u32` in big-endian order.
pub fn u32(src: &mut impl Read) -> Result<u32> {
    Ok(src.read_u32::<BigEndian>()?)
}

/// Parses a `u64` in big-endian order.
pub fn u64(src: &mut impl Read) -> Result<u64> {
    Ok(src.read_u64::<BigEndian>()?)
}

/// Parses an `i64` in big-endian order.
pub fn i64(src: &mut impl Read) -> Result<i64> {
    Ok(src.read_i64::<BigEndian>()?)
}

/// Parses a bool encoded as a `u32` 0/1.
pub fn bool(src: &mut impl Read) -> Result<bool> {
    match u32(src)? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Error::EnumDiscMismatch),
    }
}

/// Parses an optional value, encoded as a bool followed by the value.
pub fn option<T, S: Read>(
    src: &mut S,
    cont: impl FnOnce(&mut S) -> Result<T>,
) -> Result<Option<T>> {
    match bool(src)? {
        true => Ok(Some(cont(src)?)),
        false => Ok(None),
    }
}

/// Parses a length-prefixed byte string of at most `max` bytes.
pub fn bytes_max(src: &mut impl Read, max: usize) -> Result<Vec<u8>> {
    let len = u32(src)? as usize;
    if len > max {
        return Err(Error::MaxElemLimit);
    }
    let mut buf = vec![0u8; len];
    src.read_exact(&mut buf)?;
    Ok(buf)
}

/// Parses a length-prefixed UTF-8 string of at most `max` bytes.
pub fn string_max(src: &mut impl Read, max: usize) -> Result<String> {
    String::from_utf8(bytes_max(src, max)?).map_err(Error::IncorrectString)
}

/// Parses an enum discriminant encoded as a `u32`.
pub fn variant<T: FromPrimitive>(src: &mut impl Read) -> Result<T> {
    FromPrimitive::from_u32(u32(src)?).ok_or(Error::EnumDiscMismatch)
}

/// Parses a timestamp encoded as seconds and nanoseconds since the epoch.
///
/// Pre-epoch values clamp to the epoch.
pub fn time(src: &mut impl Read) -> Result<SystemTime> {
    let seconds = i64(src)?;
    let nanos = u32(src)?;
    let since_epoch = Duration::new(seconds.max(0) as u64, nanos);
    Ok(UNIX_EPOCH + since_epoch)
}

/// Serializes a `u32` in big-endian order.
pub fn put_u32(dest: &mut impl Write, n: u32) -> io::Result<()> {
    dest.write_u32::<BigEndian>(n)
}

/// Serializes a `u64` in big-endian order.
pub fn put_u64(dest: &mut impl Write, n: u64) -> io::Result<()> {
    dest.write_u64::<BigEndian>(n)
}

/// Serializes an `i64` in big-endian order.
pub fn put_i64(dest: &mut impl Write, n: i64) -> io::Result<()> {
    dest.write_i64::<BigEndian>(n)
}

/// Serializes a bool as a `u32` 0/1.
pub fn put_bool(dest: &mut impl Write, b: bool) -> io::Result<()> {
    put_u32(dest, b as u32)
}

/// Serializes an optional value as a bool discriminator plus the value.
pub fn put_option<T, S: Write>(
    dest: &mut S,
    opt: Option<&T>,
    cont: impl FnOnce(&T, &mut S) -> io::Result<()>,
) -> io::Result<()> {
    match opt {
        Some(val) => put_bool(dest, true).and_then(|_| cont(val, dest)),
        None => put_bool(dest, false),
    }
}

/// Serializes a length-prefixed byte string.
pub fn put_bytes(dest: &mut impl Write, buf: &[u8]) -> io::Result<()> {
    put_u32(dest, buf.len() as u32)?;
    dest.write_all(buf)
}

/// Serializes a length-prefixed UTF-8 string.
pub fn put_string(dest: &mut impl Write, s: &str) -> io::Result<()> {
    put_bytes(dest, s.as_bytes())
}

/// Serializes an enum discriminant as a `u32`.
pub fn put_variant<T: ToPrimitive>(dest: &mut impl Write, v: &T) -> io::Result<()> {
    put_u32(dest, v.to_u32().unwrap_or(u32::MAX))
}

/// Serializes a timestamp as seconds and nanoseconds since the epoch.
pub fn put_time(dest: &mut impl Write, t: SystemTime) -> io::Result<()> {
    let since_epoch = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    put_i64(dest, since_epoch.as_secs() as i64)?;
    put_u32(dest, since_epoch.subsec_nanos())
}
