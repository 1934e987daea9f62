//! Wire protocol for the remote facade.
//!
//! Every facade method is one numbered procedure carrying a single request
//! record and a single response record. Records travel inside
//! length-prefixed frames; a call body is `xid ++ method ++ record`, a reply
//! body is `xid ++ record`. All integers are big-endian. UUIDs travel as
//! length-prefixed raw 16-byte strings, the nil UUID as an empty string.
//! Response records embed the [`records::ErrorEnvelope`].

pub mod primitive;
pub mod records;

#[cfg(test)]
mod tests;

use std::fmt;
use std::io::{self, Read, Write};
use std::string::FromUtf8Error;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_derive::{FromPrimitive, ToPrimitive};
use uuid::Uuid;

/// Result of wire encode/decode operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Upper bound on a frame body, listings included.
pub const MAX_FRAME_LEN: usize = 64 << 20;

/// Upper bound on names crossing the wire.
pub const MAX_NAME_LEN: usize = 255;

/// Upper bound on a single read or write payload.
pub const MAX_DATA_LEN: usize = 16 << 20;

/// Wire encode/decode errors.
#[derive(Debug)]
pub enum Error {
    /// Stream failure while reading or writing.
    Io(io::Error),
    /// A discriminant (bool, method id) outside its legal range.
    EnumDiscMismatch,
    /// The peer does not speak this method.
    UnknownMethod(u32),
    /// A string field was not valid UTF-8.
    IncorrectString(FromUtf8Error),
    /// A length prefix exceeded the allowed maximum.
    MaxElemLimit,
    /// A reply carried a transaction id we never sent.
    XidMismatch { sent: u32, received: u32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "stream error: {err}"),
            Error::EnumDiscMismatch => write!(f, "illegal discriminant"),
            Error::UnknownMethod(id) => write!(f, "unknown method {id}"),
            Error::IncorrectString(err) => write!(f, "malformed string: {err}"),
            Error::MaxElemLimit => write!(f, "length limit exceeded"),
            Error::XidMismatch { sent, received } => {
                write!(f, "transaction id mismatch: sent {sent}, received {received}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// Procedure numbers of the facade service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum Method {
    Lookup = 0,
    Chtimes = 1,
    Truncate = 2,
    WriteAt = 3,
    Readdir = 4,
    HlMkdir = 5,
    HlMkfile = 6,
    HlStat = 7,
    HlDelete = 8,
    HlReadAt = 9,
    HlMovelink = 10,
}

/// Parses a raw wire UUID. The nil (empty) form yields `None`.
pub fn parse_uuid(raw: &[u8]) -> Option<Uuid> {
    Uuid::from_slice(raw).ok()
}

/// Reads one length-prefixed frame body from a synchronous stream.
pub fn read_frame(src: &mut impl Read) -> Result<Vec<u8>> {
    let len = src.read_u32::<BigEndian>()? as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::MaxElemLimit);
    }
    let mut body = vec![0u8; len];
    src.read_exact(&mut body)?;
    Ok(body)
}

/// Writes one length-prefixed frame body to a synchronous stream.
pub fn write_frame(dest: &mut impl Write, body: &[u8]) -> io::Result<()> {
    dest.write_u32::<BigEndian>(body.len() as u32)?;
    dest.write_all(body)
}
