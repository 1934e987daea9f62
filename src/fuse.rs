//! FUSE binding over a high facade.
//!
//! The kernel speaks inode numbers; the pool speaks UUIDs. [`FuseFs`] keeps
//! the translation table, rejects illegal names before they reach the core,
//! and maps facade errors onto errnos by kind: a missing object or entry
//! becomes `ENOENT`, host failures surface their own errno (`EIO` when there
//! is none), remote and transport failures are `EIO`, and opening a
//! directory as a file is `EISDIR`.
//!
//! Works the same over a local [`crate::cache::CachedStore`] and a
//! [`crate::client::RemoteFacade`].

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
    FUSE_ROOT_ID,
};
use tracing::debug;
use uuid::Uuid;

use crate::facade::{Error, HighFacade, Statbuf};

const TTL: Duration = Duration::from_secs(1);
const BLOCK_SIZE: u64 = 512;

/// Names the pool never accepts from the kernel.
pub fn is_illegal_name(name: &str) -> bool {
    matches!(name, "" | "." | "..") || name.contains(['/', '\\'])
}

/// Maps a facade error onto the errno the kernel expects, by error kind.
fn errno(err: &Error) -> i32 {
    match err {
        Error::NotFound => libc::ENOENT,
        Error::AlreadyExists => libc::EEXIST,
        Error::InvalidArgument(_) => libc::EINVAL,
        Error::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
        Error::Remote(_) | Error::Transport(_) => libc::EIO,
    }
}

/// Inode to UUID translation, both directions. Inode 1 is pinned to the
/// root object.
struct InodeTable {
    by_ino: HashMap<u64, Uuid>,
    by_id: HashMap<Uuid, u64>,
    next: u64,
}

impl InodeTable {
    fn new(root: Uuid) -> Self {
        let mut table = Self { by_ino: HashMap::new(), by_id: HashMap::new(), next: 2 };
        table.by_ino.insert(FUSE_ROOT_ID, root);
        table.by_id.insert(root, FUSE_ROOT_ID);
        table
    }

    fn get(&self, ino: u64) -> Option<Uuid> {
        self.by_ino.get(&ino).copied()
    }

    fn ensure(&mut self, id: Uuid) -> u64 {
        if let Some(ino) = self.by_id.get(&id) {
            return *ino;
        }
        let ino = self.next;
        self.next += 1;
        self.by_ino.insert(ino, id);
        self.by_id.insert(id, ino);
        ino
    }

    fn forget_id(&mut self, id: &Uuid) {
        if let Some(ino) = self.by_id.remove(id) {
            self.by_ino.remove(&ino);
        }
    }
}

/// A mounted view of one facade.
pub struct FuseFs<F> {
    facade: F,
    inodes: InodeTable,
}

impl<F: HighFacade> FuseFs<F> {
    /// Binds the facade with `root` as the mount's root directory object.
    pub fn new(facade: F, root: Uuid) -> Self {
        Self { facade, inodes: InodeTable::new(root) }
    }

    fn attr(&self, ino: u64, sb: &Statbuf, req: &Request<'_>) -> FileAttr {
        let size = sb.size.max(0) as u64;
        let kind = if sb.is_dir { FileType::Directory } else { FileType::RegularFile };
        let perm = if sb.is_dir { 0o777 } else { 0o666 };
        FileAttr {
            ino,
            size,
            blocks: size.div_ceil(BLOCK_SIZE),
            atime: sb.mod_time,
            mtime: sb.mod_time,
            ctime: sb.mod_time,
            crtime: sb.mod_time,
            kind,
            perm,
            nlink: 1,
            uid: req.uid(),
            gid: req.gid(),
            rdev: 0,
            blksize: BLOCK_SIZE as u32,
            flags: 0,
        }
    }

    /// Common tail of the entry-producing operations.
    fn reply_entry(&mut self, req: &Request<'_>, id: Uuid, reply: ReplyEntry) {
        match self.facade.hl_stat(&id) {
            Ok(sb) => {
                let ino = self.inodes.ensure(id);
                reply.entry(&TTL, &self.attr(ino, &sb, req), 0);
            }
            Err(err) => reply.error(errno(&err)),
        }
    }
}

impl<F: HighFacade> FuseFs<F>
where
    F: Send + 'static,
{
    /// Mounts the facade and serves the kernel until unmount.
    pub fn mount(self, mountpoint: impl AsRef<Path>) -> io::Result<()> {
        let options = [MountOption::RW, MountOption::FSName("poolfs".to_owned())];
        fuser::mount2(self, mountpoint, &options)
    }
}

impl<F: HighFacade> Filesystem for FuseFs<F> {
    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let (Some(parent_id), Some(name)) = (self.inodes.get(parent), name.to_str()) else {
            reply.error(libc::ENOENT);
            return;
        };
        if is_illegal_name(name) {
            reply.error(libc::ENOENT);
            return;
        }
        match self.facade.lookup(&parent_id, name) {
            Ok(child) => self.reply_entry(req, child, reply),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(id) = self.inodes.get(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.facade.hl_stat(&id) {
            Ok(sb) => reply.attr(&TTL, &self.attr(ino, &sb, req)),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(id) = self.inodes.get(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        debug!(ino, ?size, "setattr");
        if let Some(size) = size {
            if let Err(err) = self.facade.truncate(&id, size) {
                reply.error(errno(&err));
                return;
            }
        }
        if atime.is_some() || mtime.is_some() {
            let resolve = |t: Option<TimeOrNow>| match t {
                Some(TimeOrNow::SpecificTime(t)) => t,
                _ => SystemTime::now(),
            };
            if let Err(err) = self.facade.chtimes(&id, resolve(atime), resolve(mtime)) {
                reply.error(errno(&err));
                return;
            }
        }
        match self.facade.hl_stat(&id) {
            Ok(sb) => reply.attr(&TTL, &self.attr(ino, &sb, req)),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn mknod(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let Some(parent_id) = self.inodes.get(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(name) = name.to_str().filter(|n| !is_illegal_name(n)) else {
            reply.error(libc::EINVAL);
            return;
        };
        debug!(parent, name, "mknod");
        match self.facade.hl_mkfile(&parent_id, name) {
            Ok(child) => self.reply_entry(req, child, reply),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(parent_id) = self.inodes.get(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(name) = name.to_str().filter(|n| !is_illegal_name(n)) else {
            reply.error(libc::EINVAL);
            return;
        };
        debug!(parent, name, "mkdir");
        match self.facade.hl_mkdir(&parent_id, name) {
            Ok(child) => self.reply_entry(req, child, reply),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(parent_id) = self.inodes.get(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(name) = name.to_str().filter(|n| !is_illegal_name(n)) else {
            reply.error(libc::EINVAL);
            return;
        };
        debug!(parent, name, "unlink");
        let child = self.facade.lookup(&parent_id, name).ok();
        match self.facade.hl_delete(&parent_id, name) {
            Ok(()) => {
                if let Some(child) = child {
                    self.inodes.forget_id(&child);
                }
                reply.ok();
            }
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn rmdir(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        self.unlink(req, parent, name, reply)
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let (Some(old_id), Some(new_id)) = (self.inodes.get(parent), self.inodes.get(newparent))
        else {
            reply.error(libc::ENOENT);
            return;
        };
        let names = (
            name.to_str().filter(|n| !is_illegal_name(n)),
            newname.to_str().filter(|n| !is_illegal_name(n)),
        );
        let (Some(old_name), Some(new_name)) = names else {
            reply.error(libc::EINVAL);
            return;
        };
        debug!(parent, old_name, newparent, new_name, "rename");
        match self.facade.hl_movelink(&old_id, old_name, &new_id, new_name) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let Some(id) = self.inodes.get(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.facade.hl_stat(&id) {
            Ok(sb) if sb.is_dir => {
                reply.error(libc::EISDIR);
                return;
            }
            Ok(_) => {}
            Err(err) => {
                reply.error(errno(&err));
                return;
            }
        }
        if flags & libc::O_TRUNC != 0 {
            if let Err(err) = self.facade.truncate(&id, 0) {
                reply.error(errno(&err));
                return;
            }
        }
        reply.opened(0, 0);
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(parent_id) = self.inodes.get(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(name) = name.to_str().filter(|n| !is_illegal_name(n)) else {
            reply.error(libc::EINVAL);
            return;
        };
        debug!(parent, name, "create");
        let child = match self.facade.hl_mkfile(&parent_id, name) {
            Ok(child) => child,
            Err(err) => {
                reply.error(errno(&err));
                return;
            }
        };
        match self.facade.hl_stat(&child) {
            Ok(sb) => {
                let ino = self.inodes.ensure(child);
                reply.created(&TTL, &self.attr(ino, &sb, req), 0, 0, 0);
            }
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(id) = self.inodes.get(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        let mut buf = vec![0u8; size as usize];
        let read = self.facade.hl_read_at(&id, &mut buf, offset as u64);
        match read.error {
            // A read that produced data is served; its error waits for the
            // next attempt.
            Some(err) if read.data.is_empty() => reply.error(errno(&err)),
            _ => reply.data(read.data),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(id) = self.inodes.get(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        match self.facade.write_at(&id, data, offset as u64) {
            Ok(written) => reply.written(written as u32),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(id) = self.inodes.get(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let names = match self.facade.readdirnames(&id) {
            Ok(names) => names,
            // Listing a non-directory surfaces the host's ENOTDIR here.
            Err(err) => {
                reply.error(errno(&err));
                return;
            }
        };
        let mut index = 0i64;
        for name in names.iter().filter(|n| !is_illegal_name(n)) {
            if index >= offset {
                // Dangling entries read as absent: they keep their offset
                // slot but are not reported.
                let resolved = self
                    .facade
                    .lookup(&id, name)
                    .and_then(|child| Ok((child, self.facade.hl_stat(&child)?)));
                if let Ok((child, sb)) = resolved {
                    let kind =
                        if sb.is_dir { FileType::Directory } else { FileType::RegularFile };
                    let child_ino = self.inodes.ensure(child);
                    if reply.add(child_ino, index + 1, kind, name) {
                        break;
                    }
                }
            }
            index += 1;
        }
        reply.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::{is_illegal_name, InodeTable};
    use uuid::Uuid;

    #[test]
    fn rejects_reserved_and_separator_names() {
        for bad in ["", ".", "..", "a/b", "a\\b", "/", "\\"] {
            assert!(is_illegal_name(bad), "{bad:?} should be illegal");
        }
        for good in ["a", "a.b", "...", "readme.txt"] {
            assert!(!is_illegal_name(good), "{good:?} should be legal");
        }
    }

    #[test]
    fn inode_numbers_are_stable_per_object() {
        let root = Uuid::NAMESPACE_URL;
        let mut table = InodeTable::new(root);
        assert_eq!(table.get(fuser::FUSE_ROOT_ID), Some(root));

        let id = Uuid::new_v4();
        let ino = table.ensure(id);
        assert_eq!(table.ensure(id), ino);
        assert_eq!(table.get(ino), Some(id));

        table.forget_id(&id);
        assert_eq!(table.get(ino), None);
        assert_ne!(table.ensure(id), ino);
    }
}
