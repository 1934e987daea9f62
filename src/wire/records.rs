//! Request and response records, one pair per facade method.
//!
//! Field order on the wire is declaration order. Several methods share the
//! `DirentArgs` shape; every response embeds an [`ErrorEnvelope`].

use std::io::{self, Read, Write};
use std::time::SystemTime;

use num_traits::FromPrimitive;

use super::primitive::{
    bool, bytes_max, i64, option, put_bool, put_bytes, put_i64, put_option, put_string, put_time,
    put_u32, put_u64, put_variant, string_max, time, u32, u64,
};
use super::{Error, Method, Result, MAX_DATA_LEN, MAX_NAME_LEN};
use crate::facade::{self, Statbuf};

/// Raw length of a non-nil wire UUID.
pub const UUID_LEN: usize = 16;

/// Upper bound on an error message crossing the wire.
const MAX_MESSAGE_LEN: usize = 4096;

/// Upper bound on the entry count of one listing reply.
const MAX_DIR_ENTRIES: usize = 1 << 20;

/// Error envelope embedded in every response record.
///
/// `bad = false` with an empty message is success; `bad = true` reproduces
/// the message as a remote error on the caller's side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub message: String,
    pub bad: bool,
}

impl ErrorEnvelope {
    pub fn ok() -> Self {
        Self { message: String::new(), bad: false }
    }

    pub fn from_error(err: &facade::Error) -> Self {
        Self { message: err.to_string(), bad: true }
    }

    /// Envelope for an operation result, discarding the value.
    pub fn from_result<T>(res: &facade::Result<T>) -> Self {
        match res {
            Ok(_) => Self::ok(),
            Err(err) => Self::from_error(err),
        }
    }

    /// Envelope for an error riding alongside payload data.
    pub fn from_option(err: &Option<facade::Error>) -> Self {
        match err {
            Some(err) => Self::from_error(err),
            None => Self::ok(),
        }
    }

    /// Reproduces the carried error, if any.
    pub fn into_result(self) -> facade::Result<()> {
        if self.bad {
            Err(facade::Error::Remote(self.message))
        } else {
            Ok(())
        }
    }

    pub fn parse(src: &mut impl Read) -> Result<Self> {
        let message = string_max(src, MAX_MESSAGE_LEN)?;
        let bad = bool(src)?;
        Ok(Self { message, bad })
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        put_string(dest, &self.message)?;
        put_bool(dest, self.bad)
    }
}

fn uuid_raw(src: &mut impl Read) -> Result<Vec<u8>> {
    bytes_max(src, UUID_LEN)
}

fn statbuf(src: &mut impl Read) -> Result<Statbuf> {
    let size = i64(src)?;
    let mod_time = time(src)?;
    let is_dir = bool(src)?;
    let is_regular = bool(src)?;
    Ok(Statbuf { size, mod_time, is_dir, is_regular })
}

fn put_statbuf(sb: &Statbuf, dest: &mut impl Write) -> io::Result<()> {
    put_i64(dest, sb.size)?;
    put_time(dest, sb.mod_time)?;
    put_bool(dest, sb.is_dir)?;
    put_bool(dest, sb.is_regular)
}

/// Directory entry address: one object plus one name. Shared by `Lookup`,
/// `HLMkdir`, `HLMkfile` and `HLDelete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirentArgs {
    pub id: Vec<u8>,
    pub name: String,
}

impl DirentArgs {
    pub fn parse(src: &mut impl Read) -> Result<Self> {
        Ok(Self { id: uuid_raw(src)?, name: string_max(src, MAX_NAME_LEN)? })
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        put_bytes(dest, &self.id)?;
        put_string(dest, &self.name)
    }
}

/// A single object address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdArgs {
    pub id: Vec<u8>,
}

impl IdArgs {
    pub fn parse(src: &mut impl Read) -> Result<Self> {
        Ok(Self { id: uuid_raw(src)? })
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        put_bytes(dest, &self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChtimesArgs {
    pub id: Vec<u8>,
    pub atime: SystemTime,
    pub mtime: SystemTime,
}

impl ChtimesArgs {
    pub fn parse(src: &mut impl Read) -> Result<Self> {
        Ok(Self { id: uuid_raw(src)?, atime: time(src)?, mtime: time(src)? })
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        put_bytes(dest, &self.id)?;
        put_time(dest, self.atime)?;
        put_time(dest, self.mtime)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncateArgs {
    pub id: Vec<u8>,
    pub size: u64,
}

impl TruncateArgs {
    pub fn parse(src: &mut impl Read) -> Result<Self> {
        Ok(Self { id: uuid_raw(src)?, size: u64(src)? })
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        put_bytes(dest, &self.id)?;
        put_u64(dest, self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAtArgs {
    pub id: Vec<u8>,
    pub data: Vec<u8>,
    pub offset: u64,
}

impl WriteAtArgs {
    pub fn parse(src: &mut impl Read) -> Result<Self> {
        Ok(Self {
            id: uuid_raw(src)?,
            data: bytes_max(src, MAX_DATA_LEN)?,
            offset: u64(src)?,
        })
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        put_bytes(dest, &self.id)?;
        put_bytes(dest, &self.data)?;
        put_u64(dest, self.offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadAtArgs {
    pub id: Vec<u8>,
    pub size: u32,
    pub offset: u64,
}

impl ReadAtArgs {
    pub fn parse(src: &mut impl Read) -> Result<Self> {
        let id = uuid_raw(src)?;
        let size = u32(src)?;
        if size as usize > MAX_DATA_LEN {
            return Err(Error::MaxElemLimit);
        }
        Ok(Self { id, size, offset: u64(src)? })
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        put_bytes(dest, &self.id)?;
        put_u32(dest, self.size)?;
        put_u64(dest, self.offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovelinkArgs {
    pub old_id: Vec<u8>,
    pub old_name: String,
    pub new_id: Vec<u8>,
    pub new_name: String,
}

impl MovelinkArgs {
    pub fn parse(src: &mut impl Read) -> Result<Self> {
        Ok(Self {
            old_id: uuid_raw(src)?,
            old_name: string_max(src, MAX_NAME_LEN)?,
            new_id: uuid_raw(src)?,
            new_name: string_max(src, MAX_NAME_LEN)?,
        })
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        put_bytes(dest, &self.old_id)?;
        put_string(dest, &self.old_name)?;
        put_bytes(dest, &self.new_id)?;
        put_string(dest, &self.new_name)
    }
}

/// Reply carrying an object id: `Lookup`, `HLMkdir`, `HLMkfile`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdReply {
    pub id: Vec<u8>,
    pub err: ErrorEnvelope,
}

impl IdReply {
    pub fn parse(src: &mut impl Read) -> Result<Self> {
        Ok(Self { id: uuid_raw(src)?, err: ErrorEnvelope::parse(src)? })
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        put_bytes(dest, &self.id)?;
        self.err.serialize(dest)
    }
}

/// Reply carrying nothing but the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckReply {
    pub err: ErrorEnvelope,
}

impl AckReply {
    pub fn parse(src: &mut impl Read) -> Result<Self> {
        Ok(Self { err: ErrorEnvelope::parse(src)? })
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        self.err.serialize(dest)
    }
}

/// `WriteAt` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReply {
    pub count: u32,
    pub err: ErrorEnvelope,
}

impl WriteReply {
    pub fn parse(src: &mut impl Read) -> Result<Self> {
        Ok(Self { count: u32(src)?, err: ErrorEnvelope::parse(src)? })
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        put_u32(dest, self.count)?;
        self.err.serialize(dest)
    }
}

/// `Readdir` reply: the full listing in one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamesReply {
    pub names: Vec<String>,
    pub err: ErrorEnvelope,
}

impl NamesReply {
    pub fn parse(src: &mut impl Read) -> Result<Self> {
        let count = u32(src)? as usize;
        if count > MAX_DIR_ENTRIES {
            return Err(Error::MaxElemLimit);
        }
        let mut names = Vec::with_capacity(count);
        for _ in 0..count {
            names.push(string_max(src, MAX_NAME_LEN)?);
        }
        Ok(Self { names, err: ErrorEnvelope::parse(src)? })
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        put_u32(dest, self.names.len() as u32)?;
        for name in &self.names {
            put_string(dest, name)?;
        }
        self.err.serialize(dest)
    }
}

/// `HLStat` reply.
#[derive(Debug, Clone, PartialEq)]
pub struct StatReply {
    pub stat: Option<Statbuf>,
    pub err: ErrorEnvelope,
}

impl StatReply {
    pub fn parse(src: &mut impl Read) -> Result<Self> {
        Ok(Self { stat: option(src, statbuf)?, err: ErrorEnvelope::parse(src)? })
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        put_option(dest, self.stat.as_ref(), put_statbuf)?;
        self.err.serialize(dest)
    }
}

/// `HLReadAt` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataReply {
    pub data: Vec<u8>,
    pub err: ErrorEnvelope,
}

impl DataReply {
    pub fn parse(src: &mut impl Read) -> Result<Self> {
        Ok(Self { data: bytes_max(src, MAX_DATA_LEN)?, err: ErrorEnvelope::parse(src)? })
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        put_bytes(dest, &self.data)?;
        self.err.serialize(dest)
    }
}

/// A parsed call: method discriminant plus its request record.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Lookup(DirentArgs),
    Chtimes(ChtimesArgs),
    Truncate(TruncateArgs),
    WriteAt(WriteAtArgs),
    Readdir(IdArgs),
    HlMkdir(DirentArgs),
    HlMkfile(DirentArgs),
    HlStat(IdArgs),
    HlDelete(DirentArgs),
    HlReadAt(ReadAtArgs),
    HlMovelink(MovelinkArgs),
}

impl Request {
    pub fn parse(src: &mut impl Read) -> Result<Self> {
        let raw = u32(src)?;
        let method = Method::from_u32(raw).ok_or(Error::UnknownMethod(raw))?;
        Ok(match method {
            Method::Lookup => Request::Lookup(DirentArgs::parse(src)?),
            Method::Chtimes => Request::Chtimes(ChtimesArgs::parse(src)?),
            Method::Truncate => Request::Truncate(TruncateArgs::parse(src)?),
            Method::WriteAt => Request::WriteAt(WriteAtArgs::parse(src)?),
            Method::Readdir => Request::Readdir(IdArgs::parse(src)?),
            Method::HlMkdir => Request::HlMkdir(DirentArgs::parse(src)?),
            Method::HlMkfile => Request::HlMkfile(DirentArgs::parse(src)?),
            Method::HlStat => Request::HlStat(IdArgs::parse(src)?),
            Method::HlDelete => Request::HlDelete(DirentArgs::parse(src)?),
            Method::HlReadAt => Request::HlReadAt(ReadAtArgs::parse(src)?),
            Method::HlMovelink => Request::HlMovelink(MovelinkArgs::parse(src)?),
        })
    }

    pub fn method(&self) -> Method {
        match self {
            Request::Lookup(_) => Method::Lookup,
            Request::Chtimes(_) => Method::Chtimes,
            Request::Truncate(_) => Method::Truncate,
            Request::WriteAt(_) => Method::WriteAt,
            Request::Readdir(_) => Method::Readdir,
            Request::HlMkdir(_) => Method::HlMkdir,
            Request::HlMkfile(_) => Method::HlMkfile,
            Request::HlStat(_) => Method::HlStat,
            Request::HlDelete(_) => Method::HlDelete,
            Request::HlReadAt(_) => Method::HlReadAt,
            Request::HlMovelink(_) => Method::HlMovelink,
        }
    }

    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        put_variant(dest, &self.method())?;
        match self {
            Request::Lookup(args)
            | Request::HlMkdir(args)
            | Request::HlMkfile(args)
            | Request::HlDelete(args) => args.serialize(dest),
            Request::Chtimes(args) => args.serialize(dest),
            Request::Truncate(args) => args.serialize(dest),
            Request::WriteAt(args) => args.serialize(dest),
            Request::Readdir(args) | Request::HlStat(args) => args.serialize(dest),
            Request::HlReadAt(args) => args.serialize(dest),
            Request::HlMovelink(args) => args.serialize(dest),
        }
    }
}

/// A response record ready to serialize.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Id(IdReply),
    Ack(AckReply),
    Write(WriteReply),
    Names(NamesReply),
    Stat(StatReply),
    Data(DataReply),
}

impl Response {
    pub fn serialize(&self, dest: &mut impl Write) -> io::Result<()> {
        match self {
            Response::Id(reply) => reply.serialize(dest),
            Response::Ack(reply) => reply.serialize(dest),
            Response::Write(reply) => reply.serialize(dest),
            Response::Names(reply) => reply.serialize(dest),
            Response::Stat(reply) => reply.serialize(dest),
            Response::Data(reply) => reply.serialize(dest),
        }
    }
}
