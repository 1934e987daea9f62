//! Bounded cache of open file descriptors.
//!
//! Repeatedly accessed file objects keep one RDWR descriptor alive in a
//! fixed-capacity LRU, keyed by the UUID text form. The cache owns its
//! descriptors outright; eviction is the single channel that returns one to
//! the OS, and the evicted descriptor is closed inside the cache lock,
//! before the admitting call returns.

use std::fs::{File, OpenOptions};
use std::io;
use std::num::NonZeroUsize;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use lru::LruCache;
use tracing::trace;
use uuid::Uuid;

use crate::facade::{Facade, LowFacade, Result, Statbuf};
use crate::store::ObjectStore;

type Files = LruCache<String, File>;

/// Fixed-capacity LRU of open descriptors keyed by UUID text.
///
/// Capacity zero disables retention: every operation opens and closes its
/// own descriptor.
pub struct HandleCache {
    files: Option<Mutex<Files>>,
}

fn lock(files: &Mutex<Files>) -> MutexGuard<'_, Files> {
    files.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HandleCache {
    pub fn new(capacity: usize) -> Self {
        let files = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self { files }
    }

    /// Number of descriptors currently held.
    pub fn len(&self) -> usize {
        self.files.as_ref().map_or(0, |files| lock(files).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `op` against the cached descriptor for `key`, admitting one via
    /// `open` on a miss. Hits and admissions promote the entry to
    /// most-recently-used; the descriptor evicted by an admission is closed
    /// before this returns.
    pub fn with_file<R>(
        &self,
        key: &str,
        open: impl FnOnce() -> Result<File>,
        op: impl FnOnce(&File) -> io::Result<R>,
    ) -> Result<R> {
        let Some(files) = &self.files else {
            let file = open()?;
            return Ok(op(&file)?);
        };
        let mut files = lock(files);
        if let Some(file) = files.get(key) {
            return Ok(op(file)?);
        }
        let file = open()?;
        let result = op(&file);
        if let Some((evicted, handle)) = files.push(key.to_owned(), file) {
            trace!(key = %evicted, "closing evicted pool handle");
            drop(handle);
        }
        Ok(result?)
    }

    /// Runs `op` against the cached descriptor for `key` if one is held,
    /// without disturbing the LRU order. Returns `None` on a miss.
    pub fn peek<R>(&self, key: &str, op: impl FnOnce(&File) -> io::Result<R>) -> Option<io::Result<R>> {
        let files = self.files.as_ref()?;
        let files = lock(files);
        files.peek(key).map(op)
    }
}

/// The complete low facade: an [`ObjectStore`] with a [`HandleCache`] in
/// front of its file I/O.
pub struct CachedStore {
    store: ObjectStore,
    cache: HandleCache,
}

impl CachedStore {
    pub fn new(store: ObjectStore, capacity: usize) -> Self {
        Self { store, cache: HandleCache::new(capacity) }
    }

    /// Borrows the underlying store.
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Number of descriptors currently held by the cache.
    pub fn cached_handles(&self) -> usize {
        self.cache.len()
    }

    fn with_file<R>(&self, id: &Uuid, op: impl FnOnce(&File) -> io::Result<R>) -> Result<R> {
        let key = id.to_string();
        self.cache.with_file(
            &key,
            || {
                self.store
                    .open(id, OpenOptions::new().read(true).write(true).mode(0o600))
            },
            op,
        )
    }
}

impl Facade for CachedStore {
    fn lookup(&self, id: &Uuid, name: &str) -> Result<Uuid> {
        self.store.lookup(id, name)
    }

    fn chtimes(&self, id: &Uuid, atime: SystemTime, mtime: SystemTime) -> Result<()> {
        self.store.chtimes(id, atime, mtime)
    }

    fn truncate(&self, id: &Uuid, size: u64) -> Result<()> {
        // A cached descriptor sees unflushed state; the hit does not promote.
        match self.cache.peek(&id.to_string(), |file| file.set_len(size)) {
            Some(done) => Ok(done?),
            None => self.store.truncate(id, size),
        }
    }

    fn write_at(&self, id: &Uuid, buf: &[u8], offset: u64) -> Result<usize> {
        self.with_file(id, |file| {
            file.write_all_at(buf, offset)?;
            Ok(buf.len())
        })
    }

    fn readdirnames(&self, id: &Uuid) -> Result<Vec<String>> {
        self.store.readdirnames(id)
    }
}

impl LowFacade for CachedStore {
    fn stat(&self, id: &Uuid) -> Result<Statbuf> {
        match self.cache.peek(&id.to_string(), |file| file.metadata()) {
            Some(meta) => Ok(Statbuf::from_metadata(&meta?)),
            None => Ok(Statbuf::from_metadata(&self.store.stat(id)?)),
        }
    }

    fn mkfile(&self, id: &Uuid) -> Result<()> {
        self.store.mkfile(id)
    }

    fn mkdir(&self, id: &Uuid) -> Result<()> {
        self.store.mkdir(id)
    }

    fn put_dirent(&self, parent: &Uuid, name: &str, child: &Uuid) -> Result<()> {
        self.store.put_dirent(parent, name, child)
    }

    fn del_dirent(&self, parent: &Uuid, name: &str) -> Result<()> {
        self.store.del_dirent(parent, name)
    }

    fn del_dirent_full(&self, parent: &Uuid, name: &str) -> Result<()> {
        self.store.del_dirent_full(parent, name)
    }

    fn read_at(&self, id: &Uuid, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.with_file(id, |file| loop {
            match file.read_at(buf, offset) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        })
    }
}
