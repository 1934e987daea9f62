//! Synchronous client for the remote facade.
//!
//! One outstanding call per connection; replies are matched by transaction
//! id. The client implements both facade traits, so the FUSE binding and
//! other consumers use a remote pool exactly like a local one.
//!
//! Three error sources meet here: an error returned by the remote side, a
//! malformed UUID in the reply, and the transport itself. A transport
//! failure short-circuits; with a reply in hand, the envelope wins over the
//! UUID check.

use std::io::{self, Cursor};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use uuid::Uuid;

use crate::facade::{Error, Facade, HighFacade, PartialRead, Result, Statbuf};
use crate::wire::records::{
    AckReply, ChtimesArgs, DataReply, DirentArgs, IdArgs, IdReply, MovelinkArgs, NamesReply,
    ReadAtArgs, Request, StatReply, TruncateArgs, WriteAtArgs, WriteReply,
};
use crate::wire::{self, parse_uuid, primitive};

struct Conn {
    stream: TcpStream,
    next_xid: u32,
}

/// A remote pool behind a TCP connection.
pub struct RemoteFacade {
    conn: Mutex<Conn>,
}

fn transport(err: io::Error) -> Error {
    Error::Transport(wire::Error::Io(err))
}

fn raw(id: &Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

impl RemoteFacade {
    /// Connects to a serving pool.
    pub fn dial(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self { conn: Mutex::new(Conn { stream, next_xid: 1 }) })
    }

    fn lock(&self) -> MutexGuard<'_, Conn> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn call<R>(
        &self,
        request: &Request,
        parse: impl FnOnce(&mut Cursor<&[u8]>) -> wire::Result<R>,
    ) -> Result<R> {
        let mut conn = self.lock();
        let xid = conn.next_xid;
        conn.next_xid = conn.next_xid.wrapping_add(1);

        let mut body = Vec::new();
        primitive::put_u32(&mut body, xid).map_err(transport)?;
        request.serialize(&mut body).map_err(transport)?;
        wire::write_frame(&mut conn.stream, &body).map_err(transport)?;

        let reply = wire::read_frame(&mut conn.stream)?;
        let mut src = Cursor::new(reply.as_slice());
        let received = primitive::u32(&mut src)?;
        if received != xid {
            return Err(Error::Transport(wire::Error::XidMismatch { sent: xid, received }));
        }
        Ok(parse(&mut src)?)
    }

    fn call_id(&self, request: Request) -> Result<Uuid> {
        let reply = self.call(&request, |c| IdReply::parse(c))?;
        reply.err.into_result()?;
        parse_uuid(&reply.id).ok_or(Error::InvalidArgument("malformed object id in reply"))
    }

    fn call_ack(&self, request: Request) -> Result<()> {
        let reply = self.call(&request, |c| AckReply::parse(c))?;
        reply.err.into_result()
    }

    /// One `HLReadAt` round trip. The reply's data rides alongside its
    /// envelope, so a partial read that failed still delivers its prefix.
    fn read_chunk(&self, id: &Uuid, size: u32, offset: u64) -> PartialRead<Vec<u8>> {
        let request = Request::HlReadAt(ReadAtArgs { id: raw(id), size, offset });
        match self.call(&request, |c| DataReply::parse(c)) {
            Ok(reply) => {
                PartialRead { data: reply.data, error: reply.err.into_result().err() }
            }
            Err(err) => PartialRead { data: Vec::new(), error: Some(err) },
        }
    }
}

impl Facade for RemoteFacade {
    fn lookup(&self, id: &Uuid, name: &str) -> Result<Uuid> {
        self.call_id(Request::Lookup(DirentArgs { id: raw(id), name: name.to_owned() }))
    }

    fn chtimes(&self, id: &Uuid, atime: SystemTime, mtime: SystemTime) -> Result<()> {
        self.call_ack(Request::Chtimes(ChtimesArgs { id: raw(id), atime, mtime }))
    }

    fn truncate(&self, id: &Uuid, size: u64) -> Result<()> {
        self.call_ack(Request::Truncate(TruncateArgs { id: raw(id), size }))
    }

    fn write_at(&self, id: &Uuid, buf: &[u8], offset: u64) -> Result<usize> {
        let request =
            Request::WriteAt(WriteAtArgs { id: raw(id), data: buf.to_vec(), offset });
        let reply = self.call(&request, |c| WriteReply::parse(c))?;
        reply.err.into_result()?;
        Ok(reply.count as usize)
    }

    fn readdirnames(&self, id: &Uuid) -> Result<Vec<String>> {
        let request = Request::Readdir(IdArgs { id: raw(id) });
        let reply = self.call(&request, |c| NamesReply::parse(c))?;
        reply.err.into_result()?;
        Ok(reply.names)
    }
}

impl HighFacade for RemoteFacade {
    fn hl_mkdir(&self, parent: &Uuid, name: &str) -> Result<Uuid> {
        self.call_id(Request::HlMkdir(DirentArgs { id: raw(parent), name: name.to_owned() }))
    }

    fn hl_mkfile(&self, parent: &Uuid, name: &str) -> Result<Uuid> {
        self.call_id(Request::HlMkfile(DirentArgs { id: raw(parent), name: name.to_owned() }))
    }

    fn hl_stat(&self, id: &Uuid) -> Result<Statbuf> {
        let request = Request::HlStat(IdArgs { id: raw(id) });
        let reply = self.call(&request, |c| StatReply::parse(c))?;
        reply.err.into_result()?;
        reply.stat.ok_or(Error::InvalidArgument("stat record missing from reply"))
    }

    fn hl_delete(&self, parent: &Uuid, name: &str) -> Result<()> {
        self.call_ack(Request::HlDelete(DirentArgs { id: raw(parent), name: name.to_owned() }))
    }

    fn hl_read_at<'a>(
        &self,
        id: &Uuid,
        buf: &'a mut [u8],
        offset: u64,
    ) -> PartialRead<&'a [u8]> {
        let size = match u32::try_from(buf.len()) {
            Ok(size) => size,
            Err(_) => {
                return PartialRead {
                    data: &buf[..0],
                    error: Some(Error::InvalidArgument("read buffer too large")),
                }
            }
        };
        let chunk = self.read_chunk(id, size, offset);
        let n = chunk.data.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk.data[..n]);
        PartialRead { data: &buf[..n], error: chunk.error }
    }

    fn hl_read_at2(&self, id: &Uuid, size: usize, offset: u64) -> PartialRead<Vec<u8>> {
        match u32::try_from(size) {
            Ok(size) => self.read_chunk(id, size, offset),
            Err(_) => PartialRead {
                data: Vec::new(),
                error: Some(Error::InvalidArgument("read size too large")),
            },
        }
    }

    fn hl_movelink(
        &self,
        old_parent: &Uuid,
        old_name: &str,
        new_parent: &Uuid,
        new_name: &str,
    ) -> Result<()> {
        self.call_ack(Request::HlMovelink(MovelinkArgs {
            old_id: raw(old_parent),
            old_name: old_name.to_owned(),
            new_id: raw(new_parent),
            new_name: new_name.to_owned(),
        }))
    }
}
