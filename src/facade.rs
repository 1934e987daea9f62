//! Facade traits for the object pool.
//!
//! The pool is exposed through two capability layers. [`Facade`] holds the
//! operations that make sense against any rendition of the pool, local or
//! remote. [`LowFacade`] adds the storage primitives that only a local
//! backend can provide, one object at a time. [`HighFacade`] adds the
//! named-child compositions (create, delete, move-link) and is implemented
//! once, as a blanket over every [`LowFacade`]; remote clients implement it
//! directly instead.

use std::fmt;
use std::fs::Metadata;
use std::io;
use std::time::SystemTime;

use uuid::Uuid;

/// Result alias used by all facade operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The well-known root directory object.
pub const ROOT_OBJECT: Uuid = Uuid::NAMESPACE_URL;

/// Errors surfaced by facade operations.
#[derive(Debug)]
pub enum Error {
    /// The target object or directory entry does not exist.
    NotFound,
    /// Creation of an entry or object whose name is already taken.
    AlreadyExists,
    /// Malformed UUID, illegal name or otherwise unusable argument.
    InvalidArgument(&'static str),
    /// Host filesystem failure.
    Io(io::Error),
    /// An error reported by the remote side of an RPC call.
    Remote(String),
    /// The RPC call itself failed to reach the server or to unmarshal.
    Transport(crate::wire::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound => write!(f, "no such object or entry"),
            Error::AlreadyExists => write!(f, "object or entry already exists"),
            Error::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::Remote(msg) => write!(f, "remote error: {msg}"),
            Error::Transport(err) => write!(f, "transport error: {err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        use io::ErrorKind::*;
        match err.kind() {
            NotFound => Error::NotFound,
            AlreadyExists => Error::AlreadyExists,
            _ => Error::Io(err),
        }
    }
}

impl From<crate::wire::Error> for Error {
    fn from(err: crate::wire::Error) -> Self {
        Error::Transport(err)
    }
}

/// Outcome of a high-level positional read: the filled prefix of the buffer
/// together with the error that cut the read short, if any.
///
/// Data and error travel together so the caller can inspect both; a read
/// that fails midway still hands over whatever was read first.
#[derive(Debug)]
pub struct PartialRead<T> {
    pub data: T,
    pub error: Option<Error>,
}

/// Portable stat record.
///
/// Carries the only metadata the pool exposes; everything else stays with
/// the host filesystem.
#[derive(Debug, Clone, PartialEq)]
pub struct Statbuf {
    pub size: i64,
    pub mod_time: SystemTime,
    pub is_dir: bool,
    pub is_regular: bool,
}

impl Statbuf {
    /// Projects host metadata onto the portable record.
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            size: meta.len() as i64,
            mod_time: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            is_dir: meta.is_dir(),
            is_regular: meta.is_file(),
        }
    }
}

/// Operations shared by every rendition of the pool.
pub trait Facade {
    /// Resolves `name` inside the directory object `id` to the child's UUID.
    fn lookup(&self, id: &Uuid, name: &str) -> Result<Uuid>;

    /// Adjusts both timestamps of an object.
    fn chtimes(&self, id: &Uuid, atime: SystemTime, mtime: SystemTime) -> Result<()>;

    /// Sets the size of a regular file object.
    fn truncate(&self, id: &Uuid, size: u64) -> Result<()>;

    /// Positional write. Returns the number of bytes written.
    fn write_at(&self, id: &Uuid, buf: &[u8], offset: u64) -> Result<usize>;

    /// Lists the entry names of a directory object, unordered and unfiltered.
    fn readdirnames(&self, id: &Uuid) -> Result<Vec<String>>;
}

/// Storage primitives of a local pool backend.
pub trait LowFacade: Facade {
    /// Host stat of the object's artifact.
    fn stat(&self, id: &Uuid) -> Result<Statbuf>;

    /// Creates an empty regular file object, mode 0600.
    fn mkfile(&self, id: &Uuid) -> Result<()>;

    /// Creates an empty directory object, mode 0700.
    fn mkdir(&self, id: &Uuid) -> Result<()>;

    /// Installs the entry `name -> child` in the directory object `parent`.
    fn put_dirent(&self, parent: &Uuid, name: &str, child: &Uuid) -> Result<()>;

    /// Removes the entry only; the child artifact is untouched.
    fn del_dirent(&self, parent: &Uuid, name: &str) -> Result<()>;

    /// Removes the entry and then the artifact it pointed to.
    ///
    /// The entry is removed first; if that fails the artifact is untouched.
    fn del_dirent_full(&self, parent: &Uuid, name: &str) -> Result<()>;

    /// Single positional read with host semantics; may return fewer bytes
    /// than requested, and zero at or past end of file.
    fn read_at(&self, id: &Uuid, buf: &mut [u8], offset: u64) -> Result<usize>;
}

/// Named-child operations composed from the low primitives.
pub trait HighFacade: Facade {
    /// Mints a fresh directory object and installs it under `name`.
    fn hl_mkdir(&self, parent: &Uuid, name: &str) -> Result<Uuid>;

    /// Mints a fresh regular file object and installs it under `name`.
    fn hl_mkfile(&self, parent: &Uuid, name: &str) -> Result<Uuid>;

    /// Stat projected onto the portable record.
    fn hl_stat(&self, id: &Uuid) -> Result<Statbuf>;

    /// Removes the entry `name` and the object it points to.
    fn hl_delete(&self, parent: &Uuid, name: &str) -> Result<()>;

    /// Positional read that fills `buf` unless the file ends or an error
    /// cuts it short. The filled prefix is returned in either case.
    fn hl_read_at<'a>(&self, id: &Uuid, buf: &'a mut [u8], offset: u64)
        -> PartialRead<&'a [u8]>;

    /// Variant of [`HighFacade::hl_read_at`] that allocates its own buffer,
    /// sized for serving reads over the wire.
    fn hl_read_at2(&self, id: &Uuid, size: usize, offset: u64) -> PartialRead<Vec<u8>>;

    /// Transplants the child `old_name` of `old_parent` to `new_name` under
    /// `new_parent`. On success the old entry is gone; the child keeps its
    /// identity. Not atomic across the two directories.
    fn hl_movelink(
        &self,
        old_parent: &Uuid,
        old_name: &str,
        new_parent: &Uuid,
        new_name: &str,
    ) -> Result<()>;
}

impl<T: LowFacade> HighFacade for T {
    fn hl_mkdir(&self, parent: &Uuid, name: &str) -> Result<Uuid> {
        let child = Uuid::new_v4();
        self.mkdir(&child)?;
        // An entry-install failure strands the fresh directory on disk.
        self.put_dirent(parent, name, &child)?;
        Ok(child)
    }

    fn hl_mkfile(&self, parent: &Uuid, name: &str) -> Result<Uuid> {
        let child = Uuid::new_v4();
        self.mkfile(&child)?;
        self.put_dirent(parent, name, &child)?;
        Ok(child)
    }

    fn hl_stat(&self, id: &Uuid) -> Result<Statbuf> {
        self.stat(id)
    }

    fn hl_delete(&self, parent: &Uuid, name: &str) -> Result<()> {
        self.del_dirent_full(parent, name)
    }

    fn hl_read_at<'a>(
        &self,
        id: &Uuid,
        buf: &'a mut [u8],
        offset: u64,
    ) -> PartialRead<&'a [u8]> {
        let mut filled = 0;
        let mut error = None;
        while filled < buf.len() {
            match self.read_at(id, &mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) => {
                    error = Some(err);
                    break;
                }
            }
        }
        PartialRead { data: &buf[..filled], error }
    }

    fn hl_read_at2(&self, id: &Uuid, size: usize, offset: u64) -> PartialRead<Vec<u8>> {
        let mut buf = vec![0u8; size];
        let PartialRead { data, error } = self.hl_read_at(id, &mut buf, offset);
        let filled = data.len();
        buf.truncate(filled);
        PartialRead { data: buf, error }
    }

    fn hl_movelink(
        &self,
        old_parent: &Uuid,
        old_name: &str,
        new_parent: &Uuid,
        new_name: &str,
    ) -> Result<()> {
        let child = self.lookup(old_parent, old_name)?;
        self.put_dirent(new_parent, new_name, &child)?;
        if let Err(err) = self.del_dirent(old_parent, old_name) {
            // Best-effort rollback of the new entry; its own error is dropped.
            let _ = self.del_dirent(new_parent, new_name);
            return Err(err);
        }
        Ok(())
    }
}
